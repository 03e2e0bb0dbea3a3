//! Adapter over the tutorialbar WordPress posts API.
//!
//! Posts are requested oldest first in pages of [`PAGE_SIZE`]. Each post's
//! `acf.course_url` is published when it points at udemy. The date of the
//! newest post seen becomes the `after` filter of the next run.

use std::time::Duration;

use autocoupons_bridge::Publisher;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::SourceError;
use crate::retry::{RetryConfig, send_with_retry};

pub const DEFAULT_BASE_URL: &str = "https://www.tutorialbar.com";
const POSTS_PATH: &str = "wp-json/wp/v2/posts";
const PAGE_SIZE: usize = 100;
const PAGE_DELAY: Duration = Duration::from_secs(1);

/// Persisted between runs under the adapter's name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TutorialbarState {
    last_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Post {
    date: Option<String>,
    /// An object with `course_url`, or `[]` when the post has no fields.
    #[serde(default)]
    acf: serde_json::Value,
}

impl Post {
    fn course_url(&self) -> Option<&str> {
        self.acf.get("course_url")?.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct Tutorialbar {
    base_url: String,
    state: TutorialbarState,
    page_delay: Duration,
    retry: RetryConfig,
}

impl Tutorialbar {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: TutorialbarState::default(),
            page_delay: PAGE_DELAY,
            retry: RetryConfig::default(),
        }
    }

    /// Restore the blob produced by [`persistent_state`](Self::persistent_state)
    /// in a previous run. An unreadable blob is ignored.
    pub fn with_state(mut self, state: Option<&serde_json::Value>) -> Self {
        if let Some(state) = state {
            match TutorialbarState::deserialize(state) {
                Ok(state) => self.state = state,
                Err(err) => tracing::warn!(error = %err, "Ignoring unreadable tutorialbar state"),
            }
        }
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn last_date(&self) -> Option<&str> {
        self.state.last_date.as_deref()
    }

    /// `{"last_date": ...}` once any post has been seen, in this run or before.
    #[must_use]
    pub fn persistent_state(&self) -> Option<serde_json::Value> {
        self.state.last_date.as_ref()?;
        serde_json::to_value(&self.state).ok()
    }

    fn page_url(&self, offset: usize, after: Option<&str>) -> Result<Url, SourceError> {
        let base = format!("{}/{POSTS_PATH}", self.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&base).map_err(|err| SourceError::Decode {
            url: base.clone(),
            message: err.to_string(),
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("context", "embed")
                .append_pair("order", "asc")
                .append_pair("offset", &offset.to_string());
            if let Some(after) = after {
                query.append_pair("after", after);
            }
        }
        Ok(url)
    }

    async fn fetch_page(
        &self,
        client: &Client,
        offset: usize,
        after: Option<&str>,
    ) -> Result<Vec<Post>, SourceError> {
        let url = self.page_url(offset, after)?;
        tracing::debug!(%url, "Requesting tutorialbar posts");
        let response = send_with_retry(|| client.get(url.clone()), &self.retry)
            .await
            .into_result(url.as_str())?;
        let body = response.bytes().await.map_err(|source| SourceError::Http {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&body).map_err(|err| SourceError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    /// Publish every udemy course URL posted since the last run.
    ///
    /// Fetch failures end the adapter early and keep the previous state. Only
    /// a closed bridge is returned as an error.
    pub async fn run(&mut self, client: &Client, publisher: &Publisher) -> Result<(), SourceError> {
        // The filter stays fixed for the whole run even as `state` advances.
        let after = self.state.last_date.clone();
        let mut offset = 0;

        loop {
            let posts = match self.fetch_page(client, offset, after.as_deref()).await {
                Ok(posts) => posts,
                Err(err) => {
                    tracing::error!(error = %err, "Stopping tutorialbar scraping");
                    return Ok(());
                }
            };
            tracing::info!("Got {} urls from tutorialbar", posts.len());

            if let Some(date) = posts.last().and_then(|post| post.date.clone()) {
                self.state.last_date = Some(date);
            }

            for post in &posts {
                match post.course_url() {
                    Some(url) if url.contains("udemy") => publisher.publish(url)?,
                    Some(url) => tracing::debug!(url, "Not a udemy url"),
                    None => tracing::debug!(date = ?post.date, "Post has no course url"),
                }
            }

            if posts.len() < PAGE_SIZE {
                tracing::debug!(count = posts.len(), "Last tutorialbar page reached");
                return Ok(());
            }

            tokio::time::sleep(self.page_delay).await;
            offset += PAGE_SIZE;
        }
    }
}

impl Default for Tutorialbar {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
