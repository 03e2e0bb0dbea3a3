//! Resolve shortened and tracking links to the page they end up on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use tokio::sync::Semaphore;
use url::Url;

/// Default cap on concurrent requests to one host.
pub const DEFAULT_PER_HOST: usize = 2;

/// Interstitial pages that hold the real target in `span#url` instead of
/// redirecting.
const INTERSTITIAL_HOSTS: &[&str] = &["y7u2.top"];
const MAX_INTERSTITIAL_HOPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPolicy {
    /// Attempts per link; only timeouts are retried.
    pub max_attempts: u32,
    /// Sleep before retry `n` is `backoff * n`.
    pub backoff: Duration,
    /// Per request.
    pub timeout: Duration,
    pub interstitial_hosts: Vec<String>,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            backoff: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            interstitial_hosts: INTERSTITIAL_HOSTS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl RedirectPolicy {
    fn is_interstitial(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| self.interstitial_hosts.iter().any(|h| h == host))
    }
}

/// Per-host request limits, created lazily per host.
#[derive(Debug)]
pub struct HostLimits {
    per_host: usize,
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimits {
    #[must_use]
    pub fn new(per_host: usize) -> Self {
        Self {
            per_host: per_host.max(1),
            semaphores: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_host(&self, host: &str) -> Arc<Semaphore> {
        let mut semaphores = self.semaphores.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            semaphores
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_host))),
        )
    }
}

impl Default for HostLimits {
    fn default() -> Self {
        Self::new(DEFAULT_PER_HOST)
    }
}

/// Follow `url` to its final location.
///
/// Returns `None` when the link cannot be resolved: a malformed URL, a
/// transport or body error, or a timeout on every attempt.
pub async fn follow_redirects(
    client: &Client,
    url: &Url,
    limits: &HostLimits,
    policy: &RedirectPolicy,
) -> Option<String> {
    let host = url.host_str()?;
    let _permit = limits.for_host(host).acquire_owned().await.ok()?;

    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            tokio::time::sleep(policy.backoff * attempt).await;
        }
        match resolve(client, url.clone(), policy).await {
            Ok(resolved) => {
                tracing::debug!(%url, %resolved, "Resolved link");
                return Some(resolved);
            }
            Err(err) if err.is_timeout() => {
                tracing::debug!(%url, attempt, "Timed out resolving link");
            }
            Err(err) => {
                tracing::debug!(%url, error = %err, "Failed to resolve link");
                return None;
            }
        }
    }
    tracing::debug!(%url, "Gave up resolving link");
    None
}

async fn resolve(client: &Client, mut url: Url, policy: &RedirectPolicy) -> Result<String, reqwest::Error> {
    let mut hops = 0;
    loop {
        let response = client
            .get(url.clone())
            .header(USER_AGENT, "")
            .timeout(policy.timeout)
            .send()
            .await?;
        let landed = response.url().clone();

        if hops >= MAX_INTERSTITIAL_HOPS || !policy.is_interstitial(&landed) {
            return Ok(landed.into());
        }
        let html = response.text().await?;
        match interstitial_target(&html).and_then(|target| landed.join(&target).ok()) {
            Some(target) => {
                tracing::debug!(from = %landed, to = %target, "Leaving interstitial page");
                url = target;
                hops += 1;
            }
            None => return Ok(landed.into()),
        }
    }
}

fn interstitial_target(html: &str) -> Option<String> {
    let selector = Selector::parse("span#url").ok()?;
    let document = Html::parse_document(html);
    let text: String = document.select(&selector).next()?.text().collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
