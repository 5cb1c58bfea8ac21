use std::{ops::RangeInclusive, sync::Arc};

use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::Semaphore,
    task::{JoinError, JoinSet},
};
use uuid::Uuid;

use crate::{
    configuration::{EnrichmentSettings, Settings},
    domain::{
        BusinessRecord, ContactInfo, ErrorKind, ErrorLogEntry, ExtractionStats, Phase,
        ProgressEvent, DIAGNOSTIC_TAIL,
    },
};

use super::{
    cancel, discover, extract_candidates, extract_fields, BrowserSession, CandidateError, Cancelled,
    ContactFetcher, DiscoveryError, DriverInitError, PageDriver, RecordError, RunContext,
    SearchQuery, SessionFactory,
};

pub const MIN_RESULTS: usize = 3;
pub const MAX_RESULTS: usize = 15;

const LABEL_LEN: usize = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Business type is required")]
    EmptyKeyword,
    #[error("Location is required")]
    EmptyLocation,
    #[error("Number of results must be between {min} and {max}, got {value}")]
    ResultsOutOfRange { value: usize, min: usize, max: usize },
}

/// A validated extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub keyword: String,
    pub location: String,
    pub max_results: usize,
    pub with_enrichment: bool,
}

impl ExtractionRequest {
    pub fn new(
        keyword: impl Into<String>,
        location: impl Into<String>,
        max_results: usize,
        with_enrichment: bool,
    ) -> Result<Self, RequestError> {
        Self::with_limits(
            keyword,
            location,
            max_results,
            with_enrichment,
            MIN_RESULTS..=MAX_RESULTS,
        )
    }

    pub fn with_limits(
        keyword: impl Into<String>,
        location: impl Into<String>,
        max_results: usize,
        with_enrichment: bool,
        limits: RangeInclusive<usize>,
    ) -> Result<Self, RequestError> {
        let keyword = keyword.into().trim().to_string();
        let location = location.into().trim().to_string();

        if keyword.is_empty() {
            return Err(RequestError::EmptyKeyword);
        }
        if location.is_empty() {
            return Err(RequestError::EmptyLocation);
        }
        if !limits.contains(&max_results) {
            return Err(RequestError::ResultsOutOfRange {
                value: max_results,
                min: *limits.start(),
                max: *limits.end(),
            });
        }

        Ok(ExtractionRequest {
            keyword,
            location,
            max_results,
            with_enrichment,
        })
    }

    pub fn query(&self) -> SearchQuery {
        SearchQuery {
            keyword: self.keyword.clone(),
            location: self.location.clone(),
        }
    }
}

/// Fatal conditions that end a run without results.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to initialize browser: {0}")]
    Init(#[from] DriverInitError),
    #[error(transparent)]
    Discovery(DiscoveryError),
    #[error(transparent)]
    Candidates(#[from] CandidateError),
    #[error("Extracted 0 of {found} businesses. See error log.")]
    NothingExtracted { found: usize },
    #[error("Extraction cancelled")]
    Cancelled,
}

impl From<Cancelled> for RunError {
    fn from(_: Cancelled) -> Self {
        RunError::Cancelled
    }
}

impl From<DiscoveryError> for RunError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::Cancelled(_) => RunError::Cancelled,
            e => RunError::Discovery(e),
        }
    }
}

/// Uniform result of a run. `records` is empty exactly when `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub run_id: Uuid,
    pub records: Vec<BusinessRecord>,
    pub error: Option<String>,
    pub stats: ExtractionStats,
    /// Most recent diagnostics first.
    pub diagnostics: Vec<ErrorLogEntry>,
}

impl ExtractionReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs both stages for `request`. Never fails; fatal problems end up in
/// `ExtractionReport::error` and the browser session is released on every
/// path once it was acquired.
pub async fn run_extraction<F: SessionFactory>(
    factory: &F,
    fetcher: &ContactFetcher,
    settings: &Settings,
    request: &ExtractionRequest,
    ctx: &mut RunContext,
) -> ExtractionReport {
    let run_id = Uuid::new_v4();
    let mut stats = ExtractionStats::default();
    ctx.diagnostics.clear();

    log::info!(
        "Starting run {} for '{}' (max {}, enrichment: {})",
        run_id,
        request.query().describe(),
        request.max_results,
        request.with_enrichment
    );

    let outcome = match collect_with_session(factory, settings, request, &mut stats, ctx).await {
        Ok(mut records) if request.with_enrichment => {
            match enrich_records(fetcher, &settings.enrichment, &mut records, &mut stats, ctx).await
            {
                Ok(()) => Ok(records),
                Err(e) => Err(RunError::from(e)),
            }
        }
        outcome => outcome,
    };

    let (records, error) = match outcome {
        Ok(records) => {
            ctx.report(ProgressEvent::counted(Phase::Done, records.len(), records.len()));
            log::info!("Run {} finished with {} records", run_id, records.len());
            (records, None)
        }
        Err(e) => {
            if matches!(e, RunError::Cancelled) {
                ctx.record(ErrorKind::Cancelled, "Extraction cancelled", None);
            }
            log::error!("Run {} failed: {}", run_id, e);
            (vec![], Some(e.to_string()))
        }
    };

    ExtractionReport {
        run_id,
        records,
        error,
        stats,
        diagnostics: ctx.diagnostics.recent(DIAGNOSTIC_TAIL),
    }
}

/// Stage 1 inside a freshly acquired session that is released before
/// returning.
async fn collect_with_session<F: SessionFactory>(
    factory: &F,
    settings: &Settings,
    request: &ExtractionRequest,
    stats: &mut ExtractionStats,
    ctx: &mut RunContext,
) -> Result<Vec<BusinessRecord>, RunError> {
    cancel::check(&ctx.cancel)?;
    ctx.report(ProgressEvent::new(Phase::InitSession));

    let mut session = match factory.acquire().await {
        Ok(session) => session,
        Err(e) => {
            log::error!("Browser session could not be created: {}", e);
            return Err(RunError::Init(e));
        }
    };

    let outcome = collect_records(&session, settings, request, stats, ctx).await;
    session.release().await;
    outcome
}

/// Discovery followed by per-candidate extraction. A failing candidate is
/// counted and skipped; the loop always moves on to the next one.
pub async fn collect_records<D: PageDriver>(
    driver: &D,
    settings: &Settings,
    request: &ExtractionRequest,
    stats: &mut ExtractionStats,
    ctx: &mut RunContext,
) -> Result<Vec<BusinessRecord>, RunError> {
    let query = request.query();
    ctx.report(ProgressEvent::new(Phase::LoadingPage).with_label(query.describe()));
    let scroll = discover(driver, &query, &settings.discovery, ctx).await?;
    if !scroll.converged {
        log::warn!(
            "Results feed still growing after {} scrolls (height {}); extracting what loaded",
            scroll.iterations,
            scroll.final_height
        );
    }
    cancel::check(&ctx.cancel)?;

    let candidates =
        extract_candidates(driver, request.max_results, &query.describe(), ctx).await?;
    let total = candidates.len();
    stats.total_found = total;
    ctx.report(ProgressEvent::counted(Phase::ExtractingRecords, 0, total));

    let mut records = Vec::with_capacity(total);
    for candidate in &candidates {
        let result = match cancel::check(&ctx.cancel) {
            Ok(()) => {
                extract_fields(driver, candidate, &request.keyword, &settings.extraction, ctx).await
            }
            Err(e) => Err(RecordError::Cancelled(e)),
        };

        match result {
            Ok(record) => {
                stats.successfully_extracted += 1;
                ctx.report(
                    ProgressEvent::counted(Phase::RecordExtracted, candidate.index, total)
                        .with_label(short_label(&record.name)),
                );
                records.push(record);
            }
            Err(RecordError::Cancelled(_)) => {
                // Candidates never attempted still have to land in a bucket.
                stats.discovery_errors = total - stats.successfully_extracted;
                return Err(RunError::Cancelled);
            }
            Err(e) => {
                stats.discovery_errors += 1;
                ctx.record(
                    e.kind(),
                    format!("Business #{}: {}", candidate.index, e),
                    Some(candidate.href.clone()),
                );
            }
        }
    }

    if records.is_empty() {
        return Err(RunError::NothingExtracted { found: total });
    }
    Ok(records)
}

/// Stage 2. Sequential with a randomized pause between websites unless
/// `concurrency` asks for a worker pool.
pub async fn enrich_records(
    fetcher: &ContactFetcher,
    settings: &EnrichmentSettings,
    records: &mut [BusinessRecord],
    stats: &mut ExtractionStats,
    ctx: &mut RunContext,
) -> Result<(), Cancelled> {
    ctx.report(ProgressEvent::counted(Phase::EnrichmentStarted, 0, records.len()));

    match settings.concurrency > 1 {
        true => enrich_pooled(fetcher, settings, records, stats, ctx).await,
        false => enrich_sequential(fetcher, settings, records, stats, ctx).await,
    }
}

async fn enrich_sequential(
    fetcher: &ContactFetcher,
    settings: &EnrichmentSettings,
    records: &mut [BusinessRecord],
    stats: &mut ExtractionStats,
    ctx: &mut RunContext,
) -> Result<(), Cancelled> {
    let total = records.len();

    for (i, record) in records.iter_mut().enumerate() {
        cancel::check(&ctx.cancel)?;
        if !record.has_website() {
            ctx.report(ProgressEvent::counted(Phase::EnrichmentSkipped, i + 1, total));
            continue;
        }

        ctx.report(
            ProgressEvent::counted(Phase::Enriching, i + 1, total)
                .with_label(short_label(&record.name)),
        );
        let info = fetcher.enrich(&record.website, settings.timeout()).await;
        apply_enrichment(record, &info, stats, ctx);

        cancel::sleep(&ctx.cancel, settings.request_delay.sample()).await?;
    }

    Ok(())
}

async fn enrich_pooled(
    fetcher: &ContactFetcher,
    settings: &EnrichmentSettings,
    records: &mut [BusinessRecord],
    stats: &mut ExtractionStats,
    ctx: &mut RunContext,
) -> Result<(), Cancelled> {
    let total = records.len();
    let semaphore = Arc::new(Semaphore::new(settings.concurrency));
    let mut tasks = JoinSet::new();
    // Finished records, skipped ones included.
    let mut done = 0;

    for (i, record) in records.iter().enumerate() {
        if !record.has_website() {
            done += 1;
            ctx.report(ProgressEvent::counted(Phase::EnrichmentSkipped, done, total));
            continue;
        }

        let fetcher = fetcher.clone();
        let semaphore = semaphore.clone();
        let website = record.website.clone();
        let timeout = settings.timeout();
        let delay = settings.request_delay;
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let info = fetcher.enrich(&website, timeout).await;
            tokio::time::sleep(delay.sample()).await;
            (i, info)
        });
    }

    loop {
        let joined = tokio::select! {
            joined = tasks.join_next() => Some(joined),
            _ = ctx.cancel.cancelled() => None,
        };
        let Some(joined) = joined else {
            tasks.abort_all();
            return Err(Cancelled);
        };

        match joined {
            Some(Ok((i, info))) => {
                done += 1;
                ctx.report(
                    ProgressEvent::counted(Phase::Enriching, done, total)
                        .with_label(short_label(&records[i].name)),
                );
                apply_enrichment(&mut records[i], &info, stats, ctx);
            }
            Some(Err(e)) => {
                done += 1;
                record_worker_failure(&e, ctx);
            }
            None => break,
        }
    }

    Ok(())
}

/// Folds one enrichment result into its record and the run statistics.
pub fn apply_enrichment(
    record: &mut BusinessRecord,
    info: &ContactInfo,
    stats: &mut ExtractionStats,
    ctx: &mut RunContext,
) {
    stats.websites_scraped += 1;

    if !info.emails.is_empty() {
        stats.emails_found += 1;
    } else if let Some(error) = &info.error {
        stats.website_errors += 1;
        ctx.record(
            ErrorKind::WebsiteScrape,
            format!("{}: {}", short_label(&record.name), error),
            Some(record.website.clone()),
        );
    }
    if !info.social_profiles.is_empty() {
        stats.social_found += 1;
    }

    record.apply_contact_info(info);
}

fn record_worker_failure(error: &JoinError, ctx: &mut RunContext) {
    log::error!("Enrichment worker failed: {}", error);
    ctx.record(
        ErrorKind::WebsiteScrape,
        "Enrichment worker failed",
        Some(error.to_string()),
    );
}

fn short_label(name: &str) -> String {
    name.chars().take(LABEL_LEN).collect()
}
