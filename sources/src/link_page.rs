//! Adapter over coupon listing pages: every outbound link on the page, and
//! every URL written in its text, is a candidate course URL.

use std::collections::HashSet;
use std::sync::Arc;

use autocoupons_bridge::Publisher;
use futures_util::future::join_all;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::SourceError;
use crate::redirects::{HostLimits, RedirectPolicy, follow_redirects};
use crate::retry::{RetryConfig, send_with_retry};
use crate::text_urls::urls_in_text;

/// Hosts that never lead to a course: aggregators, social sites, file
/// hosts and link shorteners that end in ad walls. Subdomains match too.
pub const BLOCKED_HOSTS: &[&str] = &[
    "leveryth.com",
    "tutorialbar.com",
    "discudemy.com",
    "reddit.com",
    "cursotecaplus.com",
    "blog.facialix.com",
    "te.me",
    "twitter.com",
    "exe.io",
    "imini.in",
    "youtube.com",
    "youtu.be",
    "domestika.org",
    "linkvertise.com",
    "q.gs",
    "pheecith.com",
    "mega.nz",
    "shine.com",
    "crehana.com",
    "freewebcart.com",
    "theprogrammingbuddy.club",
];

const UDEMY_HOSTS: &[&str] = &["udemy.com", "www.udemy.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Blocked,
    Udemy,
    Other,
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn classify(link: &Url) -> LinkKind {
    let Some(host) = link.host_str() else {
        return LinkKind::Blocked;
    };
    if BLOCKED_HOSTS.iter().any(|domain| host_matches(host, domain)) {
        LinkKind::Blocked
    } else if UDEMY_HOSTS.contains(&host) {
        LinkKind::Udemy
    } else {
        LinkKind::Other
    }
}

/// Outbound http(s) links of `html`, resolved against `page`, in document
/// order without repeats. Anchors come first, then URLs pasted as text.
/// Links back to the page's own origin are skipped.
fn extract_links(html: &str, page: &Url) -> Vec<Url> {
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let hrefs = document
        .select(&anchors)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| page.join(href.trim()).ok())
        .collect::<Vec<_>>();
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");

    let mut seen = HashSet::new();
    hrefs
        .into_iter()
        .chain(urls_in_text(&text))
        .filter(|link| matches!(link.scheme(), "http" | "https"))
        .filter(|link| link.origin() != page.origin())
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct LinkPages {
    pages: Vec<String>,
    limits: Arc<HostLimits>,
    policy: RedirectPolicy,
    retry: RetryConfig,
}

impl LinkPages {
    #[must_use]
    pub fn new(pages: Vec<String>, max_concurrency_per_host: usize) -> Self {
        Self {
            pages,
            limits: Arc::new(HostLimits::new(max_concurrency_per_host)),
            policy: RedirectPolicy::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_links(&self, client: &Client, page: &str) -> Result<Vec<Url>, SourceError> {
        let page_url = Url::parse(page).map_err(|err| SourceError::Decode {
            url: page.to_string(),
            message: err.to_string(),
        })?;
        let response = send_with_retry(|| client.get(page_url.clone()), &self.retry)
            .await
            .into_result(page)?;
        let html = response.text().await.map_err(|source| SourceError::Http {
            url: page.to_string(),
            source,
        })?;
        Ok(extract_links(&html, &page_url))
    }

    async fn resolve(&self, client: &Client, link: Url) -> Option<String> {
        match classify(&link) {
            LinkKind::Blocked => {
                tracing::debug!(%link, "Skipping blocked link");
                None
            }
            LinkKind::Udemy => Some(link.into()),
            LinkKind::Other => follow_redirects(client, &link, &self.limits, &self.policy).await,
        }
    }

    /// Publish the resolved target of every link on every page.
    ///
    /// A page that cannot be fetched is logged and skipped.
    pub async fn run(&mut self, client: &Client, publisher: &Publisher) -> Result<(), SourceError> {
        for page in &self.pages {
            let links = match self.fetch_links(client, page).await {
                Ok(links) => links,
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping link page");
                    continue;
                }
            };
            tracing::info!("Got {} links from {page}", links.len());

            let resolved = join_all(links.into_iter().map(|link| self.resolve(client, link))).await;
            for url in resolved.into_iter().flatten() {
                publisher.publish(url)?;
            }
        }
        Ok(())
    }
}
