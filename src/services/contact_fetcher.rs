use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE},
    redirect, Client,
};
use scraper::Html;
use thiserror::Error;
use url::Url;

use crate::{
    configuration::EnrichmentSettings,
    domain::{ContactInfo, SocialProfiles, NOT_AVAILABLE},
};

use super::contact_extractor::{
    collect_emails, extract_mailto, extract_social, find_contact_links, merge_emails, page_text,
};

const MAX_REDIRECTS: usize = 10;
const ERROR_DETAIL_LEN: usize = 30;

/// Why a page could not be used. The display strings end up in
/// `ContactInfo::error`.
#[derive(Debug, Error, PartialEq)]
pub enum FetchError {
    #[error("No website URL")]
    NoWebsite,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Timeout ({0}s)")]
    Timeout(u64),
    #[error("Connection failed")]
    Connection,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Non-HTML: {0}")]
    NonHtml(String),
    #[error("Empty content")]
    EmptyContent,
    #[error("Error: {0}")]
    Other(String),
}

/// What one fetched page yielded.
#[derive(Debug, Default)]
pub struct PageScan {
    pub emails: Vec<String>,
    pub social_profiles: SocialProfiles,
    pub contact_links: Vec<Url>,
}

/// Fetches business websites and pulls contact details out of them.
#[derive(Clone)]
pub struct ContactFetcher {
    client: Client,
    settings: EnrichmentSettings,
}

impl ContactFetcher {
    pub fn new(settings: EnrichmentSettings) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        // Only public marketing pages are fetched, so reachability wins over
        // strict certificate checks.
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(ContactFetcher { client, settings })
    }

    /// Fetches `website` and extracts emails and social profiles. When the
    /// homepage has no email, the first contact/about link is tried and its
    /// emails replace the homepage result. Never fails; problems are reported
    /// through `ContactInfo::error`.
    pub async fn enrich(&self, website: &str, timeout: Duration) -> ContactInfo {
        let url = match normalize_website(website) {
            Ok(url) => url,
            Err(e) => return ContactInfo::failed(e.to_string()),
        };

        let homepage = match self.fetch_html(&url, timeout).await {
            Ok(body) => scan_page(&body, &url, self.settings.min_text_len),
            Err(e) => Err(e),
        };
        let homepage = match homepage {
            Ok(scan) => scan,
            Err(e) => {
                log::warn!("Website scrape failed for {}: {}", url, e);
                return ContactInfo::failed(e.to_string());
            }
        };

        let mut info = ContactInfo {
            emails: homepage.emails,
            social_profiles: homepage.social_profiles,
            error: None,
        };

        if info.emails.is_empty() {
            if let Some(contact_url) = homepage.contact_links.first() {
                match self.scan_secondary(contact_url).await {
                    Ok(scan) => info.emails = scan.emails,
                    Err(e) => log::debug!("Contact page {} unusable: {}", contact_url, e),
                }
            }
        }

        if info.is_empty() {
            info.error = Some("No contact info found".to_string());
        }
        info
    }

    async fn scan_secondary(&self, url: &Url) -> Result<PageScan, FetchError> {
        let body = self
            .fetch_html(url, self.settings.fallback_timeout())
            .await?;
        scan_page(&body, url, 0)
    }

    /// GETs `url` and returns the body of a successful HTML response.
    async fn fetch_html(&self, url: &Url, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.to_lowercase().contains("text/html") {
            return Err(FetchError::NonHtml(content_type));
        }

        response
            .text()
            .await
            .map_err(|e| classify_request_error(e, timeout))
    }
}

/// Adds `https://` when the scheme is missing.
pub fn normalize_website(website: &str) -> Result<Url, FetchError> {
    let website = website.trim();
    if website.is_empty() || website == NOT_AVAILABLE {
        return Err(FetchError::NoWebsite);
    }

    let lower = website.to_lowercase();
    let candidate = match lower.starts_with("http://") || lower.starts_with("https://") {
        true => website.to_string(),
        false => format!("https://{}", website),
    };
    Url::parse(&candidate).map_err(|e| FetchError::InvalidUrl(e.to_string()))
}

/// Parses one page. Pages whose visible text is shorter than `min_text_len`
/// characters are rejected.
pub fn scan_page(body: &str, base_url: &Url, min_text_len: usize) -> Result<PageScan, FetchError> {
    let document = Html::parse_document(body);
    let text = page_text(&document);
    if text.chars().count() < min_text_len {
        return Err(FetchError::EmptyContent);
    }

    Ok(PageScan {
        emails: merge_emails(collect_emails(&text), extract_mailto(&document)),
        social_profiles: extract_social(&document, base_url),
        contact_links: find_contact_links(&document, base_url),
    })
}

fn classify_request_error(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout.as_secs())
    } else if e.is_connect() {
        FetchError::Connection
    } else if let Some(status) = e.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Other(e.to_string().chars().take(ERROR_DETAIL_LEN).collect())
    }
}
