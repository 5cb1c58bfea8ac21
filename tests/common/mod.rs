#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use maplead::{
    configuration::{DelayRange, Settings},
    domain::locator::{Field, CANDIDATE_LOCATORS, DETAIL_CHAINS, FEED_LOCATORS, NAME_CHAIN},
    services::{BrowserSession, DriverError, DriverInitError, PageDriver, SessionFactory},
};

/// Settings with every wait collapsed so scripted runs finish instantly.
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.discovery.feed_wait_secs = 0;
    settings.discovery.feed_poll_ms = 0;
    settings.discovery.page_settle = DelayRange::ZERO;
    settings.discovery.scroll_pause = DelayRange::ZERO;
    settings.discovery.post_scroll_pause_ms = 0;
    settings.extraction.scroll_into_view_pause_ms = 0;
    settings.extraction.activation_settle = DelayRange::ZERO;
    settings.enrichment.request_delay = DelayRange::ZERO;
    settings.enrichment.min_text_len = 0;
    settings
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakeElement {
    Feed,
    Link(usize),
    Field(usize, Field),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GotoFailure {
    Timeout,
    Refused,
}

/// What the detail panel of one result shows.
#[derive(Debug, Clone, Default)]
pub struct FakeDetail {
    pub fields: Vec<(Field, String)>,
    pub fail_activation: bool,
    pub stale: bool,
}

impl FakeDetail {
    pub fn named(name: &str) -> Self {
        FakeDetail {
            fields: vec![(Field::Name, name.to_string())],
            ..Default::default()
        }
    }

    pub fn with(mut self, field: Field, value: &str) -> Self {
        self.fields.push((field, value.to_string()));
        self
    }

    fn value(&self, field: Field) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FakeLink {
    pub href: String,
    pub detail: FakeDetail,
}

/// A scripted results page.
#[derive(Debug, Default)]
pub struct FakePage {
    pub goto_failure: Option<GotoFailure>,
    pub has_feed: bool,
    pub heights: Vec<i64>,
    pub fail_scroll: bool,
    pub links: Vec<FakeLink>,
    height_reads: Mutex<usize>,
    active: Mutex<Option<usize>>,
    pub activations: Mutex<Vec<usize>>,
    pub visited: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn new() -> Self {
        FakePage {
            has_feed: true,
            heights: vec![1_000],
            ..Default::default()
        }
    }

    /// `n` well-formed results named `Business 1..=n`.
    pub fn with_businesses(n: usize) -> Self {
        let mut page = FakePage::new();
        for i in 1..=n {
            page.links.push(place_link(
                i,
                FakeDetail::named(&format!("Business {}", i))
                    .with(Field::Phone, &format!("+91 98200 1100{}", i))
                    .with(Field::Rating, "4.5")
                    .with(Field::ReviewCount, "1,024 reviews"),
            ));
        }
        page
    }

    pub fn heights(mut self, heights: &[i64]) -> Self {
        self.heights = heights.to_vec();
        self
    }

    pub fn detail_mut(&mut self, index: usize) -> &mut FakeDetail {
        &mut self.links[index - 1].detail
    }

    fn active_detail(&self) -> Option<(usize, &FakeDetail)> {
        let active = (*self.active.lock().unwrap())?;
        self.links.get(active - 1).map(|link| (active, &link.detail))
    }

    fn field_value(&self, index: usize, field: Field) -> Option<String> {
        self.links
            .get(index - 1)
            .and_then(|link| link.detail.value(field))
            .map(str::to_string)
    }
}

pub fn place_link(index: usize, detail: FakeDetail) -> FakeLink {
    FakeLink {
        href: format!("https://www.google.com/maps/place/Business+{}/data=!4m7", index),
        detail,
    }
}

/// Counts how often sessions were opened and actually torn down.
#[derive(Debug, Default, Clone)]
pub struct SessionCounters {
    pub acquired: Arc<AtomicUsize>,
    pub release_calls: Arc<AtomicUsize>,
    pub teardowns: Arc<AtomicUsize>,
}

impl SessionCounters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    pub page: Arc<FakePage>,
    open: bool,
    counters: SessionCounters,
}

impl FakeSession {
    pub fn new(page: FakePage) -> Self {
        FakeSession {
            page: Arc::new(page),
            open: true,
            counters: SessionCounters::default(),
        }
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters.clone()
    }
}

impl PageDriver for FakeSession {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page.visited.lock().unwrap().push(url.to_string());
        match self.page.goto_failure {
            None => Ok(()),
            Some(GotoFailure::Timeout) => Err(DriverError::Timeout("page load".into())),
            Some(GotoFailure::Refused) => Err(DriverError::Command("net::ERR_CONNECTION_REFUSED".into())),
        }
    }

    async fn find_all(&self, xpath: &str) -> Result<Vec<FakeElement>, DriverError> {
        if FEED_LOCATORS.iter().any(|locator| *locator == xpath) {
            return Ok(match self.page.has_feed {
                true => vec![FakeElement::Feed],
                false => vec![],
            });
        }
        if xpath == CANDIDATE_LOCATORS[0] {
            return Ok((1..=self.page.links.len()).map(FakeElement::Link).collect());
        }
        if CANDIDATE_LOCATORS.iter().any(|locator| *locator == xpath) {
            return Ok(vec![]);
        }

        let field = std::iter::once(&NAME_CHAIN)
            .chain(DETAIL_CHAINS.iter())
            .find(|chain| chain.steps[0].xpath == xpath)
            .map(|chain| chain.field);
        let (Some(field), Some((index, detail))) = (field, self.page.active_detail()) else {
            return Ok(vec![]);
        };
        if detail.stale {
            return Err(DriverError::Stale("element is not attached to the page document".into()));
        }
        Ok(match detail.value(field) {
            Some(_) => vec![FakeElement::Field(index, field)],
            None => vec![],
        })
    }

    async fn attr(&self, element: &FakeElement, name: &str) -> Result<Option<String>, DriverError> {
        Ok(match (element, name) {
            (FakeElement::Link(i), "href") => self.page.links.get(i - 1).map(|l| l.href.clone()),
            (FakeElement::Field(i, Field::Website), "href") => self.page.field_value(*i, Field::Website),
            (FakeElement::Field(i, Field::ReviewCount), "aria-label") => {
                self.page.field_value(*i, Field::ReviewCount)
            }
            _ => None,
        })
    }

    async fn text(&self, element: &FakeElement) -> Result<String, DriverError> {
        Ok(match element {
            FakeElement::Field(i, field) => self.page.field_value(*i, *field).unwrap_or_default(),
            _ => String::new(),
        })
    }

    async fn scroll_height(&self, _element: &FakeElement) -> Result<i64, DriverError> {
        let mut reads = self.page.height_reads.lock().unwrap();
        let index = (*reads).min(self.page.heights.len() - 1);
        *reads += 1;
        Ok(self.page.heights[index])
    }

    async fn scroll_to_bottom(&self, _element: &FakeElement) -> Result<(), DriverError> {
        match self.page.fail_scroll {
            true => Err(DriverError::Command("javascript error: feed detached".into())),
            false => Ok(()),
        }
    }

    async fn scroll_into_view(&self, _element: &FakeElement) -> Result<(), DriverError> {
        Ok(())
    }

    async fn activate(&self, element: &FakeElement) -> Result<(), DriverError> {
        let FakeElement::Link(index) = element else {
            return Err(DriverError::Command("element is not clickable".into()));
        };
        self.page.activations.lock().unwrap().push(*index);
        if self.page.links[index - 1].detail.fail_activation {
            return Err(DriverError::Command("javascript error: click intercepted".into()));
        }
        *self.page.active.lock().unwrap() = Some(*index);
        Ok(())
    }
}

impl BrowserSession for FakeSession {
    async fn release(&mut self) {
        self.counters.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.open {
            self.open = false;
            self.counters.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Hands out sessions over one shared scripted page.
pub struct FakeFactory {
    pub page: Arc<FakePage>,
    pub fail_init: bool,
    pub counters: SessionCounters,
}

impl FakeFactory {
    pub fn new(page: FakePage) -> Self {
        FakeFactory {
            page: Arc::new(page),
            fail_init: false,
            counters: SessionCounters::default(),
        }
    }

    pub fn failing() -> Self {
        FakeFactory {
            fail_init: true,
            ..FakeFactory::new(FakePage::new())
        }
    }
}

impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn acquire(&self) -> Result<FakeSession, DriverInitError> {
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(DriverInitError::Session("chrome not reachable".into()));
        }
        Ok(FakeSession {
            page: self.page.clone(),
            open: true,
            counters: self.counters.clone(),
        })
    }
}
