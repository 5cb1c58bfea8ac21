use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of entries surfaced to callers.
pub const DIAGNOSTIC_TAIL: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    PageTimeout,
    PageLoad,
    PanelLocate,
    NoPanel,
    ScrollError,
    ElementFind,
    NoResults,
    NoLinks,
    NameExtract,
    StaleElement,
    ExtractError,
    FieldDegraded,
    WebsiteScrape,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ErrorKind::PageTimeout => "PAGE_TIMEOUT",
            ErrorKind::PageLoad => "PAGE_LOAD",
            ErrorKind::PanelLocate => "PANEL_LOCATE",
            ErrorKind::NoPanel => "NO_PANEL",
            ErrorKind::ScrollError => "SCROLL_ERROR",
            ErrorKind::ElementFind => "ELEMENT_FIND",
            ErrorKind::NoResults => "NO_RESULTS",
            ErrorKind::NoLinks => "NO_LINKS",
            ErrorKind::NameExtract => "NAME_EXTRACT",
            ErrorKind::StaleElement => "STALE_ELEMENT",
            ErrorKind::ExtractError => "EXTRACT_ERROR",
            ErrorKind::FieldDegraded => "FIELD_DEGRADED",
            ErrorKind::WebsiteScrape => "WEBSITE_SCRAPE",
            ErrorKind::Cancelled => "CANCELLED",
        };
        f.write_str(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<String>,
}

/// Run-scoped log of recoverable faults. A new one is created for every run.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    entries: Vec<ErrorLogEntry>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ErrorKind, message: impl Into<String>, details: Option<String>) {
        let entry = ErrorLogEntry {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            details,
        };
        log::error!(
            "{}: {} - {}",
            entry.kind,
            entry.message,
            entry.details.as_deref().unwrap_or("")
        );
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in the order they were recorded.
    pub fn entries(&self) -> &[ErrorLogEntry] {
        &self.entries
    }

    /// The last `n` entries, most recent first.
    pub fn recent(&self, n: usize) -> Vec<ErrorLogEntry> {
        self.entries.iter().rev().take(n).cloned().collect()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_returns_newest_first_and_is_bounded() {
        let mut log = DiagnosticLog::new();
        for i in 0..25 {
            log.record(ErrorKind::ExtractError, format!("Business #{}", i), None);
        }

        let tail = log.recent(DIAGNOSTIC_TAIL);

        assert_eq!(tail.len(), DIAGNOSTIC_TAIL);
        assert_eq!(tail[0].message, "Business #24");
        assert_eq!(tail[19].message, "Business #5");
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = DiagnosticLog::new();
        log.record(ErrorKind::NoPanel, "Results panel not found", Some("q".into()));
        assert_eq!(log.count(ErrorKind::NoPanel), 1);

        log.clear();

        assert!(log.is_empty());
    }
}
