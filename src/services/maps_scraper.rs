use std::time::{Duration, Instant};

use thiserror::Error;
use url::form_urlencoded;

use crate::{
    configuration::DiscoverySettings,
    domain::{locator::FEED_LOCATORS, ErrorKind, Phase, ProgressEvent},
};

use super::{cancel, Cancelled, DriverError, PageDriver, RunContext};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Map results page load timeout. Check internet connection.")]
    PageLoadTimeout { url: String },
    #[error("Failed to load map results: {source}")]
    PageLoad {
        url: String,
        #[source]
        source: DriverError,
    },
    #[error("Could not find results for '{query}'. Try broader keywords, check spelling or use a different location.")]
    PanelNotFound { query: String },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub location: String,
}

impl SearchQuery {
    pub fn describe(&self) -> String {
        format!("{} in {}", self.keyword, self.location)
    }

    /// `{base}{keyword} in {location}` with the query form-encoded, so spaces
    /// become `+`.
    pub fn search_url(&self, base_url: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(self.describe().as_bytes()).collect();
        format!("{}{}", base_url, encoded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollReport {
    /// Scroll iterations performed. The iteration whose read completed the
    /// stable run is counted too, so heights `[100, 200, 200, 200]` give 4,
    /// one more than a loop that only counts scrolls that changed nothing yet.
    pub iterations: u32,
    /// True when growth stopped before the iteration cap.
    pub converged: bool,
    pub final_height: i64,
}

/// Loads the search page, finds the results feed and scrolls it until it
/// stops growing. Candidates are looked up page-wide afterwards, so only the
/// scroll outcome is returned.
pub async fn discover<D: PageDriver>(
    driver: &D,
    query: &SearchQuery,
    settings: &DiscoverySettings,
    ctx: &mut RunContext,
) -> Result<ScrollReport, DiscoveryError> {
    load_search_page(driver, query, settings, ctx).await?;

    ctx.report(ProgressEvent::new(Phase::WaitingForResults));
    let (element, locator) = locate_feed(driver, settings, ctx)
        .await?
        .ok_or_else(|| {
            ctx.record(
                ErrorKind::NoPanel,
                "Results panel not found",
                Some(format!("Query: {}", query.describe())),
            );
            DiscoveryError::PanelNotFound {
                query: query.describe(),
            }
        })?;
    log::info!("Results feed located with {}", locator);

    ctx.report(ProgressEvent::new(Phase::Scrolling));
    let scroll = scroll_feed(driver, &element, settings, ctx).await?;
    ctx.report(ProgressEvent::counted(
        Phase::ScrollComplete,
        scroll.iterations as usize,
        settings.max_scrolls as usize,
    ));

    cancel::sleep(&ctx.cancel, Duration::from_millis(settings.post_scroll_pause_ms)).await?;

    Ok(scroll)
}

pub async fn load_search_page<D: PageDriver>(
    driver: &D,
    query: &SearchQuery,
    settings: &DiscoverySettings,
    ctx: &mut RunContext,
) -> Result<(), DiscoveryError> {
    let url = query.search_url(&settings.base_url);
    log::info!("Loading {}", url);

    match driver.goto(&url).await {
        Ok(()) => {}
        Err(DriverError::Timeout(_)) => {
            ctx.record(ErrorKind::PageTimeout, "Failed to load map results", Some(url.clone()));
            return Err(DiscoveryError::PageLoadTimeout { url });
        }
        Err(e) => {
            ctx.record(ErrorKind::PageLoad, "Could not open map results", Some(e.to_string()));
            return Err(DiscoveryError::PageLoad { url, source: e });
        }
    }

    cancel::sleep(&ctx.cancel, settings.page_settle.sample()).await?;
    Ok(())
}

/// Tries each feed strategy in order, giving every one a bounded wait.
pub async fn locate_feed<D: PageDriver>(
    driver: &D,
    settings: &DiscoverySettings,
    ctx: &mut RunContext,
) -> Result<Option<(D::Element, &'static str)>, Cancelled> {
    for locator in FEED_LOCATORS {
        if let Some(element) =
            wait_for_first(driver, locator, settings.feed_wait(), settings.feed_poll(), ctx).await?
        {
            return Ok(Some((element, *locator)));
        }
        log::warn!("Feed strategy {} found nothing", locator);
    }
    Ok(None)
}

/// Polls `xpath` until it matches or `timeout` elapses. A lookup error gives
/// up on this strategy and is recorded.
pub async fn wait_for_first<D: PageDriver>(
    driver: &D,
    xpath: &str,
    timeout: Duration,
    poll: Duration,
    ctx: &mut RunContext,
) -> Result<Option<D::Element>, Cancelled> {
    let started = Instant::now();

    loop {
        match driver.find_all(xpath).await {
            Ok(elements) => {
                if let Some(first) = elements.into_iter().next() {
                    return Ok(Some(first));
                }
            }
            Err(e) => {
                ctx.record(ErrorKind::PanelLocate, "Error finding panel", Some(e.to_string()));
                return Ok(None);
            }
        }

        if started.elapsed() >= timeout {
            return Ok(None);
        }
        cancel::sleep(&ctx.cancel, poll).await?;
    }
}

/// Scrolls the feed to its bottom until the height stays the same for
/// `stable_reads` consecutive iterations or `max_scrolls` is reached. Every
/// scroll counts toward `iterations`, including the converging one.
pub async fn scroll_feed<D: PageDriver>(
    driver: &D,
    feed: &D::Element,
    settings: &DiscoverySettings,
    ctx: &mut RunContext,
) -> Result<ScrollReport, Cancelled> {
    let mut report = ScrollReport::default();

    let mut last_height = match driver.scroll_height(feed).await {
        Ok(height) => height,
        Err(e) => {
            ctx.record(ErrorKind::ScrollError, "Failed to measure feed", Some(e.to_string()));
            return Ok(report);
        }
    };
    report.final_height = last_height;
    let mut unchanged = 0;

    while report.iterations < settings.max_scrolls {
        if let Err(e) = driver.scroll_to_bottom(feed).await {
            ctx.record(ErrorKind::ScrollError, "Failed to scroll", Some(e.to_string()));
            break;
        }

        cancel::sleep(&ctx.cancel, settings.scroll_pause.sample()).await?;

        let new_height = match driver.scroll_height(feed).await {
            Ok(height) => height,
            Err(e) => {
                ctx.record(ErrorKind::ScrollError, "Failed to scroll", Some(e.to_string()));
                break;
            }
        };
        report.iterations += 1;
        report.final_height = new_height;

        if new_height == last_height {
            unchanged += 1;
            if unchanged >= settings.stable_reads {
                report.converged = true;
                break;
            }
        } else {
            unchanged = 0;
            last_height = new_height;
        }
    }

    log::info!(
        "Scrolled feed {} times (converged: {}, height: {})",
        report.iterations,
        report.converged,
        report.final_height
    );
    Ok(report)
}
