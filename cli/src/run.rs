//! One run of the pipeline, from saved state to saved state.

use std::sync::Arc;

use anyhow::{Context, Result};
use autocoupons_bridge::{Bridge, Consumer};
use autocoupons_config::{PersistedState, Settings};
use autocoupons_enroller::{
    BrowserProfile, DEFAULT_MAX_ATTEMPTS, WorkerError, WorkerHandle, WorkerOptions,
    spawn_worker_with,
};
use autocoupons_sources::{
    DEFAULT_BASE_URL, DEFAULT_PER_HOST, LinkPages, SourceAdapter, Tutorialbar, run_sources,
};
use autocoupons_types::{Classification, RunReport};
use reqwest::Client;

pub(crate) async fn run(settings: &Settings) -> Result<()> {
    let state = PersistedState::load(&settings.data_dir).context("failed to load saved state")?;
    let adapters = build_adapters(settings, &state);
    let client = Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let profile = browser_profile(settings);
    let options = WorkerOptions {
        max_attempts: settings.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        ..WorkerOptions::default()
    };

    let (state, report) = execute(state, adapters, client, move |consumer| {
        spawn_worker_with(consumer, profile, options)
    })
    .await?;

    state
        .save(&settings.data_dir)
        .context("failed to save state")?;
    log_summary(&report);
    Ok(())
}

fn browser_profile(settings: &Settings) -> BrowserProfile {
    BrowserProfile {
        chrome_executable: settings.chrome_executable.clone(),
        headless: settings.headless,
        ..BrowserProfile::new(
            settings.profile_directory.clone(),
            settings.user_data_dir.clone(),
        )
    }
}

fn build_adapters(settings: &Settings, state: &PersistedState) -> Vec<SourceAdapter> {
    let mut adapters: Vec<SourceAdapter> = Vec::new();
    if settings.tutorialbar {
        let base_url = settings
            .tutorialbar_base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL);
        adapters.push(Tutorialbar::new(base_url).into());
    }
    if !settings.link_pages.is_empty() {
        let per_host = settings
            .max_concurrency_per_host
            .unwrap_or(DEFAULT_PER_HOST);
        adapters.push(LinkPages::new(settings.link_pages.clone(), per_host).into());
    }

    adapters
        .into_iter()
        .map(|adapter| {
            let name = adapter.name();
            adapter.with_state(state.source(name))
        })
        .collect()
}

/// Run sources and the worker against `state` and fold the results back in.
///
/// The bridge is always closed and the worker always joined, whether or not
/// the sources succeeded. A source failure is reported only after that, and
/// leaves `state` unsaved.
pub(crate) async fn execute<F>(
    mut state: PersistedState,
    adapters: Vec<SourceAdapter>,
    client: Client,
    spawn_worker: F,
) -> Result<(PersistedState, RunReport)>
where
    F: FnOnce(Consumer) -> Result<WorkerHandle, WorkerError>,
{
    let known = Arc::new(state.courses().clone());
    let (bridge, consumer) = Bridge::open(known);
    let worker = spawn_worker(consumer).context("failed to start enrollment worker")?;

    let produced = run_sources(adapters, client, bridge.publisher()).await;
    let relayed = bridge.close().await;
    let report = worker.wait().await;

    let adapters = produced.context("course source failed")?;
    let stats = relayed.context("course relay failed")?;
    let report = report.context("enrollment worker failed")?;
    tracing::debug!(?stats, "Relay finished");

    report
        .merge_into(state.courses_mut())
        .context("failed to merge run results")?;
    state.courses_mut().optimize();
    for adapter in &adapters {
        state
            .set_source(adapter.name(), adapter.persistent_state())
            .context("failed to record source state")?;
    }

    Ok((state, report))
}

fn log_summary(report: &RunReport) {
    tracing::info!(
        "Enrolled in {} courses",
        report.count(Classification::Enrolled)
    );
    for classification in Classification::ALL {
        let count = report.count(classification);
        if count > 0 {
            tracing::info!("{classification}: {count}");
        }
    }
}
