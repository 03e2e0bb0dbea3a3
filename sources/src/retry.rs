//! Retrying GET requests with exponential backoff.
//!
//! Retryable: HTTP 408, 409, 429, 5xx and transport failures (connect,
//! timeout). A valid `Retry-After` header takes precedence over backoff.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::SourceError;

/// Longest `Retry-After` a server may ask of us.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Down-jitter: delays are scaled by a factor in `[1 - jitter_factor, 1]`.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            jitter_factor: 0.25,
        }
    }
}

/// Seconds-valued `Retry-After`, if present and within `(0, 60s)`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    let delay = Duration::from_secs(secs);
    (delay > Duration::ZERO && delay < MAX_RETRY_AFTER).then_some(delay)
}

#[must_use]
pub fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 409 | 429 | 500..=599)
}

/// Backoff before retry number `backoff_step + 1`.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    config: &RetryConfig,
    headers: Option<&HeaderMap>,
) -> Duration {
    if let Some(headers) = headers
        && let Some(delay) = parse_retry_after(headers)
    {
        return delay;
    }

    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());
    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

/// How a retried request ended.
#[derive(Debug)]
pub enum RetryOutcome {
    Success(Response),
    /// Non-2xx after retries were exhausted or not allowed.
    HttpError(Response),
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
    /// Transport failure on the first attempt that retrying cannot fix.
    NonRetryable(reqwest::Error),
}

impl RetryOutcome {
    /// The successful response, or the failure tagged with `url`.
    pub fn into_result(self, url: &str) -> Result<Response, SourceError> {
        match self {
            Self::Success(response) => Ok(response),
            Self::HttpError(response) => Err(SourceError::Status {
                url: url.to_string(),
                status: response.status(),
            }),
            Self::ConnectionError { source, .. } | Self::NonRetryable(source) => {
                Err(SourceError::Http {
                    url: url.to_string(),
                    source,
                })
            }
        }
    }
}

/// Send the request built by `build_request`, rebuilding it for each attempt.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let exhausted = attempt >= config.max_retries;
        match build_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return RetryOutcome::Success(response);
                }
                if exhausted || !should_retry(status) {
                    return RetryOutcome::HttpError(response);
                }
                let delay = calculate_retry_delay(attempt, config, Some(response.headers()));
                tracing::debug!(
                    %status,
                    retry = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after error status"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if !is_retryable_error(&err) && attempt == 0 {
                    return RetryOutcome::NonRetryable(err);
                }
                if exhausted || !is_retryable_error(&err) {
                    return RetryOutcome::ConnectionError {
                        attempts: attempt + 1,
                        source: err,
                    };
                }
                let delay = calculate_retry_delay(attempt, config, None);
                tracing::debug!(
                    error = %err,
                    retry = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after connection error"
                );
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

#[cfg(test)]
pub(crate) fn fast_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        jitter_factor: 0.0,
    }
}
