use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitSession,
    LoadingPage,
    WaitingForResults,
    Scrolling,
    ScrollComplete,
    ExtractingRecords,
    RecordExtracted,
    EnrichmentStarted,
    Enriching,
    EnrichmentSkipped,
    Done,
}

/// Structured progress notification. `current`/`total` are zero when the
/// phase has no natural counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub current: usize,
    pub total: usize,
    pub label: Option<String>,
}

impl ProgressEvent {
    pub fn new(phase: Phase) -> Self {
        ProgressEvent {
            phase,
            current: 0,
            total: 0,
            label: None,
        }
    }

    pub fn counted(phase: Phase, current: usize, total: usize) -> Self {
        ProgressEvent {
            phase,
            current,
            total,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Stage number this phase belongs to, 1 = map results, 2 = websites.
    pub fn stage(&self) -> u8 {
        match self.phase {
            Phase::EnrichmentStarted | Phase::Enriching | Phase::EnrichmentSkipped => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label.as_deref().unwrap_or("");
        let stage = self.stage();
        match self.phase {
            Phase::InitSession => write!(f, "Initializing browser session..."),
            Phase::LoadingPage => write!(f, "Step {}/2: Loading map results for {}...", stage, label),
            Phase::WaitingForResults => write!(f, "Step {}/2: Waiting for search results...", stage),
            Phase::Scrolling => write!(f, "Step {}/2: Scrolling to load more results...", stage),
            Phase::ScrollComplete => write!(f, "Completed {} scrolls", self.current),
            Phase::ExtractingRecords => write!(
                f,
                "Step {}/2: Found {} businesses. Extracting details...",
                stage, self.total
            ),
            Phase::RecordExtracted => write!(
                f,
                "Step {}/2: Extracted {}/{}: {}",
                stage, self.current, self.total, label
            ),
            Phase::EnrichmentStarted => write!(
                f,
                "Step {}/2: Scraping websites for {} businesses...",
                stage, self.total
            ),
            Phase::Enriching => write!(
                f,
                "Step {}/2: Scraping {}/{}: {}",
                stage, self.current, self.total, label
            ),
            Phase::EnrichmentSkipped => write!(
                f,
                "Step {}/2: Skipped {}/{}: No website",
                stage, self.current, self.total
            ),
            Phase::Done => write!(f, "Done: {} businesses", self.total),
        }
    }
}

/// Fire-and-forget receiver of progress events.
pub trait ProgressSink {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent),
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        // A closed receiver only means nobody is listening anymore.
        let _ = self.send(event);
    }
}

/// Sink that writes every event to the log.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, event: ProgressEvent) {
        log::info!("{}", event);
    }
}
