mod common;

use std::sync::{Arc, Mutex};

use common::{fast_settings, place_link, FakeDetail, FakeFactory, FakePage, FakeSession, GotoFailure};
use maplead::{
    domain::{locator::Field, ErrorKind, ExtractionStats, Phase, ProgressEvent},
    services::{
        run_extraction, BrowserSession, ContactFetcher, ExtractionRequest, RunContext,
    },
};
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn fetcher() -> ContactFetcher {
    ContactFetcher::new(fast_settings().enrichment).unwrap()
}

fn request(max_results: usize) -> ExtractionRequest {
    ExtractionRequest::new("Coffee Shop", "Navi Mumbai", max_results, false).unwrap()
}

#[tokio::test]
async fn failing_record_does_not_stop_the_batch() {
    let mut page = FakePage::with_businesses(5);
    page.detail_mut(3).fail_activation = true;
    let factory = FakeFactory::new(page);
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(5), &mut ctx).await;

    assert!(report.is_success(), "unexpected error: {:?}", report.error);
    let names: Vec<_> = report.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Business 1", "Business 2", "Business 4", "Business 5"]);
    assert_eq!(*factory.page.activations.lock().unwrap(), vec![1, 2, 3, 4, 5]);

    assert_eq!(report.stats.total_found, 5);
    assert_eq!(report.stats.successfully_extracted, 4);
    assert_eq!(report.stats.discovery_errors, 1);
    assert!(report.stats.is_balanced());
    assert_eq!(ctx.diagnostics.count(ErrorKind::ExtractError), 1);
}

#[tokio::test]
async fn extracted_fields_are_normalised() {
    let factory = FakeFactory::new(FakePage::with_businesses(3));
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(3), &mut ctx).await;

    let first = &report.records[0];
    assert_eq!(first.phone, "+91 98200 11001");
    assert_eq!(first.rating, "4.5");
    assert_eq!(first.review_count, "1024");
    assert_eq!(first.category, "Coffee Shop");
    assert_eq!(first.address, "N/A");
    assert_eq!(first.website, "N/A");
    assert_eq!(
        factory.page.visited.lock().unwrap()[0],
        "https://www.google.com/maps/search/Coffee+Shop+in+Navi+Mumbai"
    );
}

#[tokio::test]
async fn session_is_released_exactly_once() {
    let factory = FakeFactory::new(FakePage::with_businesses(3));
    let mut ctx = RunContext::new();

    run_extraction(&factory, &fetcher(), &fast_settings(), &request(3), &mut ctx).await;

    assert_eq!(factory.counters.acquired(), 1);
    assert_eq!(factory.counters.release_calls(), 1);
    assert_eq!(factory.counters.teardowns(), 1);
}

#[tokio::test]
async fn session_is_released_when_the_feed_is_missing() {
    let mut page = FakePage::with_businesses(3);
    page.has_feed = false;
    let factory = FakeFactory::new(page);
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(3), &mut ctx).await;

    assert!(report.records.is_empty());
    assert!(report
        .error
        .as_deref()
        .unwrap()
        .starts_with("Could not find results for 'Coffee Shop in Navi Mumbai'"));
    assert_eq!(ctx.diagnostics.count(ErrorKind::NoPanel), 1);
    assert_eq!(factory.counters.release_calls(), 1);
    assert_eq!(report.stats, ExtractionStats::default());
}

#[tokio::test]
async fn release_is_idempotent() {
    let mut session = FakeSession::new(FakePage::new());
    let counters = session.counters();

    session.release().await;
    session.release().await;

    assert_eq!(counters.release_calls(), 2);
    assert_eq!(counters.teardowns(), 1);
}

#[tokio::test]
async fn driver_init_failure_returns_empty_report() {
    let factory = FakeFactory::failing();
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(3), &mut ctx).await;

    assert!(report.records.is_empty());
    assert!(report
        .error
        .as_deref()
        .unwrap()
        .starts_with("Failed to initialize browser"));
    assert_eq!(report.stats, ExtractionStats::default());
    assert_eq!(factory.counters.release_calls(), 0);
}

#[tokio::test]
async fn page_load_timeout_is_fatal() {
    let mut page = FakePage::with_businesses(3);
    page.goto_failure = Some(GotoFailure::Timeout);
    let factory = FakeFactory::new(page);
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(3), &mut ctx).await;

    assert_eq!(
        report.error.as_deref(),
        Some("Map results page load timeout. Check internet connection.")
    );
    assert_eq!(ctx.diagnostics.count(ErrorKind::PageTimeout), 1);
    assert_eq!(factory.counters.teardowns(), 1);
}

#[tokio::test]
async fn zero_extracted_records_is_reported_as_failure() {
    let mut page = FakePage::new();
    for i in 1..=3 {
        page.links.push(place_link(
            i,
            FakeDetail::default().with(Field::Phone, "+91 22 4000 1234"),
        ));
    }
    let factory = FakeFactory::new(page);
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(3), &mut ctx).await;

    assert_eq!(
        report.error.as_deref(),
        Some("Extracted 0 of 3 businesses. See error log.")
    );
    assert_eq!(report.stats.discovery_errors, 3);
    assert!(report.stats.is_balanced());
    assert_eq!(ctx.diagnostics.count(ErrorKind::NameExtract), 3);
}

#[tokio::test]
async fn stale_detail_panel_discards_only_that_record() {
    let mut page = FakePage::with_businesses(4);
    page.detail_mut(2).stale = true;
    let factory = FakeFactory::new(page);
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(4), &mut ctx).await;

    assert_eq!(report.records.len(), 3);
    assert_eq!(ctx.diagnostics.count(ErrorKind::StaleElement), 1);
    assert!(report.stats.is_balanced());
}

#[tokio::test]
async fn results_without_place_links_are_fatal() {
    let mut page = FakePage::with_businesses(3);
    for link in page.links.iter_mut() {
        link.href = "https://www.google.com/maps/search/nearby".to_string();
    }
    let factory = FakeFactory::new(page);
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(3), &mut ctx).await;

    assert!(report.records.is_empty());
    assert_eq!(ctx.diagnostics.count(ErrorKind::NoLinks), 1);
    assert_eq!(factory.counters.teardowns(), 1);
}

#[tokio::test]
async fn candidate_limit_is_respected() {
    let factory = FakeFactory::new(FakePage::with_businesses(12));
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(4), &mut ctx).await;

    assert_eq!(report.stats.total_found, 4);
    assert_eq!(report.records.len(), 4);
}

#[tokio::test]
async fn cancellation_ends_run_and_balances_stats() {
    let factory = FakeFactory::new(FakePage::with_businesses(5));
    let token = CancellationToken::new();
    let handle = token.clone();
    let mut ctx = RunContext::new()
        .with_cancel(token)
        .with_progress(move |event: ProgressEvent| {
            if event.phase == Phase::RecordExtracted && event.current == 2 {
                handle.cancel();
            }
        });

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request(5), &mut ctx).await;

    assert_eq!(report.error.as_deref(), Some("Extraction cancelled"));
    assert!(report.records.is_empty());
    assert_eq!(report.stats.successfully_extracted, 2);
    assert_eq!(report.stats.discovery_errors, 3);
    assert!(report.stats.is_balanced());
    assert_eq!(*factory.page.activations.lock().unwrap(), vec![1, 2]);
    assert_eq!(factory.counters.teardowns(), 1);
    assert_eq!(ctx.diagnostics.count(ErrorKind::Cancelled), 1);
}

#[tokio::test]
async fn progress_is_reported_per_stage() {
    let factory = FakeFactory::new(FakePage::with_businesses(3));
    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = events.clone();
    let mut ctx = RunContext::new().with_progress(move |event: ProgressEvent| {
        sink.lock().unwrap().push(event);
    });

    run_extraction(&factory, &fetcher(), &fast_settings(), &request(3), &mut ctx).await;

    let events = events.lock().unwrap();
    let phases: Vec<Phase> = events.iter().map(|e| e.phase).collect();
    assert_eq!(phases[0], Phase::InitSession);
    assert!(phases.contains(&Phase::ScrollComplete));
    assert_eq!(
        phases.iter().filter(|p| **p == Phase::RecordExtracted).count(),
        3
    );
    assert_eq!(*phases.last().unwrap(), Phase::Done);
    assert!(events
        .iter()
        .any(|e| e.to_string() == "Step 1/2: Extracted 3/3: Business 3"));
}

#[tokio::test]
async fn enrichment_fills_contact_data_and_stats() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/biz1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><p>Write to orders@business1.in</p>
               <a href="https://instagram.com/business1">Instagram</a></body></html>"#,
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/biz2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut page = FakePage::with_businesses(3);
    let site1 = format!("{}/biz1", server.uri());
    let site2 = format!("{}/biz2", server.uri());
    page.detail_mut(1).fields.push((Field::Website, site1));
    page.detail_mut(2).fields.push((Field::Website, site2));
    let factory = FakeFactory::new(page);
    let request = ExtractionRequest::new("Bakery", "Pune", 3, true).unwrap();
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &fast_settings(), &request, &mut ctx).await;

    assert!(report.is_success());
    assert_eq!(report.records[0].emails, vec!["orders@business1.in"]);
    assert_eq!(report.records[0].social_profiles.len(), 1);
    assert!(report.records[1].emails.is_empty());
    assert_eq!(report.stats.websites_scraped, 2);
    assert_eq!(report.stats.emails_found, 1);
    assert_eq!(report.stats.social_found, 1);
    assert_eq!(report.stats.website_errors, 1);
    assert_eq!(ctx.diagnostics.count(ErrorKind::WebsiteScrape), 1);
}

#[tokio::test]
async fn pooled_enrichment_matches_sequential_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><a href="mailto:desk@shop.co">Mail</a></body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    let mut page = FakePage::with_businesses(4);
    for i in 1..=4 {
        let site = format!("{}/shop{}", server.uri(), i);
        page.detail_mut(i).fields.push((Field::Website, site));
    }
    let factory = FakeFactory::new(page);
    let mut settings = fast_settings();
    settings.enrichment.concurrency = 3;
    let request = ExtractionRequest::new("Florist", "Thane", 4, true).unwrap();
    let mut ctx = RunContext::new();

    let report = run_extraction(&factory, &fetcher(), &settings, &request, &mut ctx).await;

    assert_eq!(report.records.len(), 4);
    assert!(report
        .records
        .iter()
        .all(|r| r.emails == vec!["desk@shop.co".to_string()]));
    assert_eq!(report.stats.websites_scraped, 4);
    assert_eq!(report.stats.emails_found, 4);
}

#[tokio::test]
async fn pooled_progress_follows_completed_fetches() {
    let server = MockServer::start().await;
    for i in 1..=4 {
        let response = ResponseTemplate::new(200).set_body_raw(
            format!(r#"<html><body><a href="mailto:desk{}@shop.co">Mail</a></body></html>"#, i),
            "text/html",
        );
        let response = match i {
            1 => response.set_delay(std::time::Duration::from_millis(400)),
            _ => response,
        };
        Mock::given(method("GET"))
            .and(path(format!("/shop{}", i)))
            .respond_with(response)
            .mount(&server)
            .await;
    }

    let mut page = FakePage::with_businesses(4);
    for i in 1..=4 {
        let site = format!("{}/shop{}", server.uri(), i);
        page.detail_mut(i).fields.push((Field::Website, site));
    }
    let factory = FakeFactory::new(page);
    let mut settings = fast_settings();
    settings.enrichment.concurrency = 3;
    let request = ExtractionRequest::new("Florist", "Thane", 4, true).unwrap();
    let events = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let sink = events.clone();
    let mut ctx = RunContext::new().with_progress(move |event: ProgressEvent| {
        sink.lock().unwrap().push(event);
    });

    let report = run_extraction(&factory, &fetcher(), &settings, &request, &mut ctx).await;
    assert_eq!(report.stats.emails_found, 4);

    let events = events.lock().unwrap();
    let enriching: Vec<&ProgressEvent> = events
        .iter()
        .filter(|e| e.phase == Phase::Enriching)
        .collect();
    let counts: Vec<usize> = enriching.iter().map(|e| e.current).collect();
    assert_eq!(counts, vec![1, 2, 3, 4]);
    // The slow site finishes last, so its event comes last.
    assert_eq!(enriching[3].label.as_deref(), Some("Business 1"));
}
