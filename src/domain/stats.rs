use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub total_found: usize,
    pub successfully_extracted: usize,
    pub discovery_errors: usize,
    pub websites_scraped: usize,
    pub website_errors: usize,
    pub emails_found: usize,
    pub social_found: usize,
}

impl ExtractionStats {
    /// Every found candidate has landed in exactly one bucket.
    pub fn is_balanced(&self) -> bool {
        self.successfully_extracted + self.discovery_errors == self.total_found
    }
}
