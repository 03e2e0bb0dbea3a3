//! Two runs against one data directory.

use std::sync::Arc;
use std::time::Duration;

use autocoupons_bridge::Bridge;
use autocoupons_config::PersistedState;
use autocoupons_enroller::{Waits, WorkerOptions, spawn_with_driver};
use autocoupons_sources::{SourceAdapter, Tutorialbar, run_sources};
use autocoupons_types::{Classification, RunReport, SpecificCourse};
use serde_json::json;

use crate::common::{FakePage, Listing, coupon_url, start_tutorialbar};

async fn run_once(data_dir: &std::path::Path, tutorialbar_url: &str) -> RunReport {
    let mut state = PersistedState::load(data_dir).unwrap();
    let adapter = SourceAdapter::from(Tutorialbar::new(tutorialbar_url).with_page_delay(Duration::ZERO));
    let adapter = adapter.with_state(state.source("tutorialbar"));
    let page = FakePage::new()
        .listing("free", Listing::Free)
        .listing("paid", Listing::Paid);
    let options = WorkerOptions {
        max_attempts: 0,
        waits: Waits {
            timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(5),
        },
    };

    let (bridge, consumer) = Bridge::open(Arc::new(state.courses().clone()));
    let worker = spawn_with_driver(consumer, options, move || Box::pin(async move { Ok(page) }))
        .unwrap();
    let adapters = run_sources(vec![adapter], reqwest::Client::new(), bridge.publisher())
        .await
        .unwrap();
    bridge.close().await.unwrap();
    let report = worker.wait().await.unwrap();

    report.merge_into(state.courses_mut()).unwrap();
    state.courses_mut().optimize();
    for adapter in &adapters {
        state
            .set_source(adapter.name(), adapter.persistent_state())
            .unwrap();
    }
    state.save(data_dir).unwrap();
    report
}

#[tokio::test]
async fn second_run_skips_everything_the_first_settled() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let server = start_tutorialbar(
        &[coupon_url("free", "A"), coupon_url("paid", "B")],
        "2026-04-01T09:30:00",
    )
    .await;

    let first = run_once(&data_dir, &server.uri()).await;
    assert_eq!(first.count(Classification::Enrolled), 1);
    assert_eq!(first.count(Classification::Paid), 1);

    let saved = PersistedState::load(&data_dir).unwrap();
    assert_eq!(
        saved.source("tutorialbar"),
        Some(&json!({ "last_date": "2026-04-01T09:30:00" }))
    );
    assert!(saved.courses().contains_specific(&SpecificCourse::new("free", "ANY")));
    assert!(saved.courses().contains_specific(&SpecificCourse::new("paid", "B")));
    assert!(!saved.courses().contains_specific(&SpecificCourse::new("paid", "C")));

    // The mock ignores `after`, so the same posts come back.
    let second = run_once(&data_dir, &server.uri()).await;
    assert!(second.is_empty());
}
