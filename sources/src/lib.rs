//! Course URL sources.
//!
//! Each [`SourceAdapter`] scrapes one kind of site and publishes raw course
//! URLs to the bridge. Adapters never parse or deduplicate courses
//! themselves; the relay does that. [`run_sources`] runs all of them
//! concurrently on one HTTP client.

mod link_page;
mod redirects;
pub mod retry;
mod text_urls;
mod tutorialbar;

use autocoupons_bridge::{BridgeError, Publisher};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

pub use crate::link_page::{BLOCKED_HOSTS, LinkPages};
pub use crate::redirects::{DEFAULT_PER_HOST, HostLimits, RedirectPolicy, follow_redirects};
pub use crate::tutorialbar::{DEFAULT_BASE_URL, Tutorialbar};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with {status}")]
    Status { url: String, status: StatusCode },
    #[error("unexpected content from {url}: {message}")]
    Decode { url: String, message: String },
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("source task did not finish: {0}")]
    Task(#[from] JoinError),
}

/// Every source the binary knows about.
#[derive(Debug, Clone)]
pub enum SourceAdapter {
    Tutorialbar(Tutorialbar),
    LinkPages(LinkPages),
}

impl SourceAdapter {
    /// Stable key of the adapter's entry in the persisted state.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tutorialbar(_) => "tutorialbar",
            Self::LinkPages(_) => "link_pages",
        }
    }

    /// Hand the adapter the state it persisted after its last run.
    pub fn with_state(self, state: Option<&serde_json::Value>) -> Self {
        match self {
            Self::Tutorialbar(adapter) => Self::Tutorialbar(adapter.with_state(state)),
            Self::LinkPages(adapter) => Self::LinkPages(adapter),
        }
    }

    pub async fn run(&mut self, client: &Client, publisher: &Publisher) -> Result<(), SourceError> {
        match self {
            Self::Tutorialbar(adapter) => adapter.run(client, publisher).await,
            Self::LinkPages(adapter) => adapter.run(client, publisher).await,
        }
    }

    /// State to persist after a successful run. `None` persists nothing.
    #[must_use]
    pub fn persistent_state(&self) -> Option<serde_json::Value> {
        match self {
            Self::Tutorialbar(adapter) => adapter.persistent_state(),
            Self::LinkPages(_) => None,
        }
    }
}

impl From<Tutorialbar> for SourceAdapter {
    fn from(adapter: Tutorialbar) -> Self {
        Self::Tutorialbar(adapter)
    }
}

impl From<LinkPages> for SourceAdapter {
    fn from(adapter: LinkPages) -> Self {
        Self::LinkPages(adapter)
    }
}

/// Run every adapter to completion, concurrently.
///
/// On success the adapters come back in their original order so their new
/// state can be collected. The first failure aborts the adapters still
/// running and is returned.
pub async fn run_sources(
    adapters: Vec<SourceAdapter>,
    client: Client,
    publisher: Publisher,
) -> Result<Vec<SourceAdapter>, SourceError> {
    let mut tasks = JoinSet::new();
    for (index, mut adapter) in adapters.into_iter().enumerate() {
        let client = client.clone();
        let publisher = publisher.clone();
        tasks.spawn(async move {
            tracing::debug!(source = adapter.name(), "Starting source");
            let result = adapter.run(&client, &publisher).await;
            (index, adapter, result)
        });
    }

    let mut finished = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let (index, adapter, result) = match joined {
            Ok(done) => done,
            Err(err) => {
                tasks.abort_all();
                return Err(err.into());
            }
        };
        if let Err(err) = result {
            tracing::error!(source = adapter.name(), error = %err, "Source failed");
            tasks.abort_all();
            return Err(err);
        }
        tracing::debug!(source = adapter.name(), "Source finished");
        finished.push((index, adapter));
    }

    finished.sort_by_key(|(index, _)| *index);
    Ok(finished.into_iter().map(|(_, adapter)| adapter).collect())
}
