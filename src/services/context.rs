use tokio_util::sync::CancellationToken;

use crate::domain::{DiagnosticLog, ErrorKind, ProgressEvent, ProgressSink};

/// Caller-owned state for one extraction run. The caller builds it, hands it
/// to the pipeline and reads the diagnostics back afterwards.
#[derive(Default)]
pub struct RunContext {
    pub diagnostics: DiagnosticLog,
    pub cancel: CancellationToken,
    progress: Option<Box<dyn ProgressSink + Send>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + Send + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn report(&self, event: ProgressEvent) {
        if let Some(sink) = &self.progress {
            sink.report(event);
        }
    }

    pub fn record(&mut self, kind: ErrorKind, message: impl Into<String>, details: Option<String>) {
        self.diagnostics.record(kind, message, details);
    }
}
