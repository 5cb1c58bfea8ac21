//! Seams between the pipeline and the browser automation backend.
//!
//! The pipeline only talks to these traits; `Droid` implements them on top
//! of a WebDriver session and tests script them with an in-memory page.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("stale element reference: {0}")]
    Stale(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("webdriver command failed: {0}")]
    Command(String),
}

impl DriverError {
    pub fn is_stale(&self) -> bool {
        matches!(self, DriverError::Stale(_))
    }
}

#[derive(Debug, Error)]
pub enum DriverInitError {
    #[error("failed to spawn driver at {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("driver did not become ready within {0:?}")]
    NotReady(Duration),
    #[error("invalid browser capabilities: {0}")]
    Capabilities(String),
    #[error("failed to open a browser session: {0}")]
    Session(String),
}

/// One browser tab driven through XPath lookups and small scripts.
pub trait PageDriver {
    type Element: Clone;

    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    /// All elements currently matching `xpath`. An empty result is not an error.
    async fn find_all(&self, xpath: &str) -> Result<Vec<Self::Element>, DriverError>;

    async fn attr(&self, element: &Self::Element, name: &str)
        -> Result<Option<String>, DriverError>;

    async fn text(&self, element: &Self::Element) -> Result<String, DriverError>;

    async fn scroll_height(&self, element: &Self::Element) -> Result<i64, DriverError>;

    async fn scroll_to_bottom(&self, element: &Self::Element) -> Result<(), DriverError>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<(), DriverError>;

    /// Synthetic click issued from script, bypassing overlay hit-testing.
    async fn activate(&self, element: &Self::Element) -> Result<(), DriverError>;
}

pub trait BrowserSession: PageDriver {
    /// Tears the session down. Calling it again is a no-op and it never fails;
    /// teardown problems are only logged.
    async fn release(&mut self);
}

/// Creates a fresh session for every run.
pub trait SessionFactory {
    type Session: BrowserSession;

    async fn acquire(&self) -> Result<Self::Session, DriverInitError>;
}
