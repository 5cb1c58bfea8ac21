//! Email and social profile extraction from fetched pages. Pure functions,
//! no network access.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::domain::{SocialPlatform, SocialProfiles, MAX_EMAILS};

/// Tokens this long or longer are treated as garbage.
pub const MAX_EMAIL_LEN: usize = 100;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern is valid")
});
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body selector is valid"));

/// Placeholder hosts; matched as the whole domain or a parent of it.
const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "domain.com",
    "test.com",
    "sample.com",
    "yoursite.com",
    "yourdomain.com",
    "email.com",
    "mail.com",
];

/// Fragments marking tracking or asset hosts anywhere in the domain.
const DOMAIN_MARKERS: &[&str] = &["image", "sentry", "wixpress", "placeholder", "dummy", "fake"];

/// Retina asset names like `logo@2x.png` look like addresses.
const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];

const SOCIAL_PLATFORMS: &[(SocialPlatform, &[&str])] = &[
    (SocialPlatform::Facebook, &["facebook.com", "fb.com"]),
    (SocialPlatform::Instagram, &["instagram.com"]),
    (SocialPlatform::Twitter, &["twitter.com", "x.com"]),
    (SocialPlatform::Linkedin, &["linkedin.com"]),
    (SocialPlatform::Youtube, &["youtube.com"]),
];

const CONTACT_WORDS: &[&str] = &["contact", "about"];

/// Up to three distinct addresses found in `text`, in the order first seen.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut emails = collect_emails(text);
    emails.truncate(MAX_EMAILS);
    emails
}

/// Every acceptable address in `text`, deduplicated, uncapped.
pub fn collect_emails(text: &str) -> Vec<String> {
    let mut emails: Vec<String> = vec![];
    for found in EMAIL_REGEX.find_iter(text) {
        push_email(&mut emails, found.as_str());
    }
    emails
}

/// Targets of `mailto:` links with any query part removed.
pub fn extract_mailto(document: &Html) -> Vec<String> {
    let mut emails: Vec<String> = vec![];
    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        match href.get(..7) {
            Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => {}
            _ => continue,
        }
        let address = href[7..].split('?').next().unwrap_or("").trim();
        if address.contains('@') {
            push_email(&mut emails, address);
        }
    }
    emails
}

/// Merges `extra` into `emails`, keeping order, dropping duplicates and
/// stopping at three.
pub fn merge_emails(mut emails: Vec<String>, extra: Vec<String>) -> Vec<String> {
    for email in extra {
        if !emails.contains(&email) {
            emails.push(email);
        }
    }
    emails.truncate(MAX_EMAILS);
    emails
}

fn push_email(emails: &mut Vec<String>, candidate: &str) {
    if is_acceptable_email(candidate) && !emails.iter().any(|e| e == candidate) {
        emails.push(candidate.to_string());
    }
}

pub fn is_acceptable_email(email: &str) -> bool {
    if email.len() >= MAX_EMAIL_LEN {
        return false;
    }
    let lower = email.to_lowercase();
    let Some((_, domain)) = lower.rsplit_once('@') else {
        return false;
    };
    if domain.is_empty() {
        return false;
    }
    if ASSET_SUFFIXES.iter().any(|suffix| domain.ends_with(suffix)) {
        return false;
    }
    if DOMAIN_MARKERS.iter().any(|marker| domain.contains(marker)) {
        return false;
    }
    !PLACEHOLDER_DOMAINS
        .iter()
        .any(|placeholder| host_matches(domain, placeholder))
}

/// True when `host` is `domain` or a subdomain of it.
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .map_or(false, |prefix| prefix.ends_with('.'))
}

/// Visible text of the page body, fragments separated by spaces.
pub fn page_text(document: &Html) -> String {
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());
    let mut text = String::new();
    for fragment in root.text() {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(fragment);
    }
    text
}

/// First profile link per platform; relative links are resolved against
/// `base_url` and query strings are dropped.
pub fn extract_social(document: &Html, base_url: &Url) -> SocialProfiles {
    let mut profiles = SocialProfiles::default();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        if profiles.len() == SOCIAL_PLATFORMS.len() {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(target) = base_url.join(href.trim()) else {
            continue;
        };
        let Some(host) = target.host_str().map(str::to_lowercase) else {
            continue;
        };

        let platform = SOCIAL_PLATFORMS.iter().find(|(_, aliases)| {
            aliases
                .iter()
                .any(|alias| host_matches(&host, alias))
        });
        if let Some((platform, _)) = platform {
            profiles.insert_first(*platform, strip_query(&target));
        }
    }

    profiles
}

fn strip_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

/// Links that look like a contact or about page, resolved and deduplicated
/// in page order.
pub fn find_contact_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links: Vec<Url> = vec![];

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href_lower = href.to_lowercase();
        let text_lower = anchor.text().collect::<String>().to_lowercase();
        if !CONTACT_WORDS
            .iter()
            .any(|word| href_lower.contains(word) || text_lower.contains(word))
        {
            continue;
        }
        let Ok(target) = base_url.join(href.trim()) else {
            continue;
        };
        if !matches!(target.scheme(), "http" | "https") {
            continue;
        }
        if !links.contains(&target) {
            links.push(target);
        }
    }

    links
}
