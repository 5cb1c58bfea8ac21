use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use actix_web::{get, http::header::CONTENT_DISPOSITION, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    configuration::Settings,
    domain::LogProgress,
    services::{
        export::to_csv, run_extraction, ChromeFactory, ContactFetcher, ExtractionReport,
        ExtractionRequest, RunContext,
    },
};

/// Only one extraction may drive the browser at a time.
#[derive(Default)]
pub struct ExtractionGate {
    running: AtomicBool,
}

impl ExtractionGate {
    pub fn try_enter(&self) -> Option<GateGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Reopens the gate when dropped, including when the request is aborted.
pub struct GateGuard<'a> {
    gate: &'a ExtractionGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.running.store(false, Ordering::Release);
    }
}

/// Report of the last successful run, kept for export.
#[derive(Default)]
pub struct LastRun {
    report: Mutex<Option<ExtractionReport>>,
}

impl LastRun {
    pub fn store(&self, report: ExtractionReport) {
        *self.lock() = Some(report);
    }

    pub fn get(&self) -> Option<ExtractionReport> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ExtractionReport>> {
        self.report.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn default_max_results() -> usize {
    10
}

fn default_with_enrichment() -> bool {
    true
}

#[derive(Deserialize)]
pub struct LeadQuery {
    keyword: String,
    location: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default = "default_with_enrichment")]
    with_enrichment: bool,
}

#[post("")]
pub async fn extract_leads(
    body: web::Json<LeadQuery>,
    settings: web::Data<Settings>,
    factory: web::Data<ChromeFactory>,
    fetcher: web::Data<ContactFetcher>,
    gate: web::Data<ExtractionGate>,
    last_run: web::Data<LastRun>,
) -> HttpResponse {
    let body = body.into_inner();
    let request = match ExtractionRequest::with_limits(
        body.keyword,
        body.location,
        body.max_results,
        body.with_enrichment,
        settings.extraction.min_results..=settings.extraction.max_results,
    ) {
        Ok(request) => request,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    };

    let Some(_guard) = gate.try_enter() else {
        return HttpResponse::Conflict().json(json!({ "error": "An extraction is already in progress" }));
    };

    let mut ctx = RunContext::new().with_progress(LogProgress);
    let report = run_extraction(
        factory.get_ref(),
        fetcher.get_ref(),
        &settings,
        &request,
        &mut ctx,
    )
    .await;

    if report.is_success() {
        last_run.store(report.clone());
    }

    HttpResponse::Ok().json(report)
}

#[get("/export")]
pub async fn export_leads(last_run: web::Data<LastRun>) -> HttpResponse {
    let Some(report) = last_run.get() else {
        return HttpResponse::NotFound().json(json!({ "error": "No extraction results to export" }));
    };

    match to_csv(&report.records) {
        Ok(bytes) => {
            let filename = format!(
                "leads_{}.csv",
                chrono::Utc::now().format("%Y%m%d_%H%M%S")
            );
            HttpResponse::Ok()
                .content_type("text/csv; charset=utf-8")
                .insert_header((
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ))
                .body(bytes)
        }
        Err(e) => {
            log::error!("CSV export failed: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": "CSV export failed" }))
        }
    }
}
