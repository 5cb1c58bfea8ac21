//! Ordered fallback locator chains for the map results page.
//!
//! Every chain is plain data: a list of XPath strategies tried in order, each
//! paired with the extractor that turns a matched element into a value. The
//! first strategy producing a non-empty value wins. The markup these target is
//! unversioned and changes often, so updating a selector means editing a table
//! here and nothing else.

use once_cell::sync::Lazy;
use regex::Regex;

/// Strategies for the scrollable results feed.
pub const FEED_LOCATORS: &[&str] = &[
    "//div[@role='feed']",
    "//div[contains(@class, 'm6QErb')]",
];

/// Strategies for result links inside the feed.
pub const CANDIDATE_LOCATORS: &[&str] = &[
    "//a[contains(@href, 'https://www.google.com/maps/place')]",
    "//a[contains(@class, 'hfpxzc')]",
];

/// A candidate link is only usable when its target is a place detail page.
pub const PLACE_LINK_MARKER: &str = "maps/place";

static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\+\(\d][\d\s\-\(\)\.]{7,}").expect("phone pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Phone,
    Address,
    Website,
    Category,
    Rating,
    ReviewCount,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Phone => "phone",
            Field::Address => "address",
            Field::Website => "website",
            Field::Category => "category",
            Field::Rating => "rating",
            Field::ReviewCount => "review count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Visible text of the element.
    Text,
    /// Phone number from the aria-label, a `tel:` href or the text.
    Phone,
    /// Address from the aria-label (after the first `:`) or the text.
    Address,
    /// An `href` that leaves the map host.
    ExternalHref,
    /// Review count from the aria-label, e.g. `1,204 reviews`.
    ReviewCount,
}

impl Extractor {
    /// Attributes that must be read from the element before `apply`.
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            Extractor::Text => &[],
            Extractor::Phone => &["aria-label", "href"],
            Extractor::Address => &["aria-label"],
            Extractor::ExternalHref => &["href"],
            Extractor::ReviewCount => &["aria-label"],
        }
    }

    pub fn needs_text(&self) -> bool {
        matches!(
            self,
            Extractor::Text | Extractor::Phone | Extractor::Address
        )
    }

    pub fn apply(&self, element: &ElementSnapshot) -> Option<String> {
        match self {
            Extractor::Text => non_empty(element.text.as_deref()),
            Extractor::Phone => phone_from(
                element.attr("aria-label"),
                element.attr("href"),
                element.text.as_deref(),
            ),
            Extractor::Address => address_from(element.attr("aria-label"), element.text.as_deref()),
            Extractor::ExternalHref => website_from(element.attr("href")),
            Extractor::ReviewCount => review_count_from(element.attr("aria-label")),
        }
    }
}

/// The values read from one matched element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSnapshot {
    pub text: Option<String>,
    pub attributes: Vec<(&'static str, Option<String>)>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| value.as_deref())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LocatorStep {
    pub xpath: &'static str,
    pub extractor: Extractor,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldChain {
    pub field: Field,
    pub steps: &'static [LocatorStep],
}

const fn step(xpath: &'static str, extractor: Extractor) -> LocatorStep {
    LocatorStep { xpath, extractor }
}

pub const NAME_CHAIN: FieldChain = FieldChain {
    field: Field::Name,
    steps: &[
        step("//h1[contains(@class, 'DUwDvf')]", Extractor::Text),
        step("//h1[@class='fontHeadlineLarge']", Extractor::Text),
        step("//div[@role='main']//h1", Extractor::Text),
    ],
};

pub const PHONE_CHAIN: FieldChain = FieldChain {
    field: Field::Phone,
    steps: &[
        step("//button[contains(@data-item-id, 'phone')]", Extractor::Phone),
        step("//button[contains(@aria-label, 'Phone')]", Extractor::Phone),
        step("//a[starts-with(@href, 'tel:')]", Extractor::Phone),
        step(
            "//div[contains(@class, 'AeaXub')]//button[contains(@class, 'CsEnBe')]",
            Extractor::Phone,
        ),
    ],
};

pub const ADDRESS_CHAIN: FieldChain = FieldChain {
    field: Field::Address,
    steps: &[
        step("//button[contains(@data-item-id, 'address')]", Extractor::Address),
        step("//button[contains(@aria-label, 'Address')]", Extractor::Address),
        step("//div[contains(@class, 'Io6YTe')]", Extractor::Address),
    ],
};

pub const WEBSITE_CHAIN: FieldChain = FieldChain {
    field: Field::Website,
    steps: &[
        step("//a[contains(@data-item-id, 'authority')]", Extractor::ExternalHref),
        step("//a[contains(@aria-label, 'Website')]", Extractor::ExternalHref),
        step(
            "//a[contains(@class, 'CsEnBe') and contains(@href, 'http')]",
            Extractor::ExternalHref,
        ),
    ],
};

pub const CATEGORY_CHAIN: FieldChain = FieldChain {
    field: Field::Category,
    steps: &[
        step("//button[contains(@class, 'DkEaL')]", Extractor::Text),
        step("//button[@jsaction='pane.rating.category']", Extractor::Text),
    ],
};

pub const RATING_CHAIN: FieldChain = FieldChain {
    field: Field::Rating,
    steps: &[step(
        "//div[contains(@class, 'F7nice')]//span[@aria-hidden='true']",
        Extractor::Text,
    )],
};

pub const REVIEW_COUNT_CHAIN: FieldChain = FieldChain {
    field: Field::ReviewCount,
    steps: &[step(
        "//div[contains(@class, 'F7nice')]//span[@aria-label]",
        Extractor::ReviewCount,
    )],
};

/// Optional fields, in the order they are read after the name.
pub const DETAIL_CHAINS: &[FieldChain] = &[
    PHONE_CHAIN,
    ADDRESS_CHAIN,
    WEBSITE_CHAIN,
    CATEGORY_CHAIN,
    RATING_CHAIN,
    REVIEW_COUNT_CHAIN,
];

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn phone_from(aria_label: Option<&str>, href: Option<&str>, text: Option<&str>) -> Option<String> {
    if let Some(found) = aria_label.and_then(|label| PHONE_REGEX.find(label)) {
        return Some(found.as_str().trim().to_string());
    }
    if let Some(number) = href.and_then(|h| h.strip_prefix("tel:")) {
        if let Some(number) = non_empty(Some(number)) {
            return Some(number);
        }
    }
    text.and_then(|t| PHONE_REGEX.find(t))
        .map(|found| found.as_str().trim().to_string())
}

pub fn address_from(aria_label: Option<&str>, text: Option<&str>) -> Option<String> {
    if let Some(label) = non_empty(aria_label) {
        return match label.split_once(':') {
            Some((_, address)) => non_empty(Some(address)),
            None => Some(label),
        };
    }
    non_empty(text)
}

pub fn website_from(href: Option<&str>) -> Option<String> {
    non_empty(href).filter(|h| !h.contains("google.com"))
}

pub fn review_count_from(aria_label: Option<&str>) -> Option<String> {
    let label = non_empty(aria_label)?;
    if !label.contains("reviews") {
        return Some(label);
    }
    label
        .split_whitespace()
        .next()
        .map(|count| count.replace(',', ""))
}
