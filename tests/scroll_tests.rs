mod common;

use std::sync::{Arc, Mutex};

use common::{fast_settings, FakeElement, FakePage, FakeSession};
use maplead::{
    domain::{ErrorKind, Phase, ProgressEvent},
    services::{discover, scroll_feed, RunContext, SearchQuery},
};

async fn scroll(page: FakePage) -> (maplead::services::ScrollReport, RunContext) {
    let session = FakeSession::new(page);
    let mut ctx = RunContext::new();
    let report = scroll_feed(&session, &FakeElement::Feed, &fast_settings().discovery, &mut ctx)
        .await
        .unwrap();
    (report, ctx)
}

#[tokio::test]
async fn stops_after_three_unchanged_heights() {
    let (report, _) = scroll(FakePage::new().heights(&[100, 200, 200, 200, 200])).await;

    assert_eq!(report.iterations, 4);
    assert!(report.converged);
    assert_eq!(report.final_height, 200);
}

#[tokio::test]
async fn growth_resets_the_stability_counter() {
    let (report, _) = scroll(FakePage::new().heights(&[100, 200, 200, 200, 300, 300, 300])).await;

    // The sequence repeats its last value once exhausted.
    assert_eq!(report.iterations, 7);
    assert!(report.converged);
    assert_eq!(report.final_height, 300);
}

#[tokio::test]
async fn growing_feed_stops_at_the_cap() {
    let heights: Vec<i64> = (1..=20).map(|i| i * 500).collect();
    let (report, _) = scroll(FakePage::new().heights(&heights)).await;

    assert_eq!(report.iterations, fast_settings().discovery.max_scrolls);
    assert!(!report.converged);
}

#[tokio::test]
async fn scroll_failure_ends_scrolling_without_failing() {
    let mut page = FakePage::new().heights(&[100, 200, 300]);
    page.fail_scroll = true;

    let (report, ctx) = scroll(page).await;

    assert_eq!(report.iterations, 0);
    assert!(!report.converged);
    assert_eq!(ctx.diagnostics.count(ErrorKind::ScrollError), 1);
}

#[tokio::test]
async fn discovery_returns_the_feed_scroll_outcome() {
    let session = FakeSession::new(FakePage::new().heights(&[100, 200, 200, 200]));
    let events = Arc::new(Mutex::new(vec![]));
    let sink = events.clone();
    let mut ctx = RunContext::new()
        .with_progress(move |event: ProgressEvent| sink.lock().unwrap().push(event));
    let query = SearchQuery {
        keyword: "Bakery".to_string(),
        location: "Pune".to_string(),
    };

    let report = discover(&session, &query, &fast_settings().discovery, &mut ctx)
        .await
        .unwrap();

    assert_eq!(report.iterations, 4);
    assert!(report.converged);
    assert_eq!(report.final_height, 200);
    let events = events.lock().unwrap();
    let complete = events
        .iter()
        .find(|event| event.phase == Phase::ScrollComplete)
        .unwrap();
    assert_eq!(complete.current, 4);
}
