//! Line source that polls a remote `rtl_433` log over HTTP.
//!
//! Each poll fetches the whole resource and yields only its last non-empty
//! line, the most recent record the endpoint has. Polls are spaced by a
//! fixed interval. Transport failures are retried per [`RetryPolicy`]; a reply
//! with an error status is logged and skipped until the next cycle.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::source::backoff::{Backoff, RetryPolicy};
use crate::source::{LineSource, SourceError};

/// Default delay between polls (60 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default request timeout (10 seconds).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

fn default_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_POLL_TIMEOUT
}

/// Configuration for HTTP poll mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpPollConfig {
    /// Resource to poll. Usually supplied on the command line.
    #[serde(default)]
    pub url: Option<String>,
    /// Delay between polls (default: 60s).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Per-request timeout (default: 10s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Retry behaviour for failed polls.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for HttpPollConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl HttpPollConfig {
    /// Create a poll configuration for `url` with default timing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parse and check the configured URL.
    ///
    /// # Errors
    /// Returns `SourceError::Config` if the URL is missing, malformed, or not
    /// http(s).
    pub fn parsed_url(&self) -> Result<Url, SourceError> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| SourceError::Config("poll url is not set".to_string()))?;
        let url = Url::parse(raw)
            .map_err(|e| SourceError::Config(format!("invalid poll url '{}': {}", raw, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SourceError::Config(format!(
                "unsupported poll url scheme '{}'",
                other
            ))),
        }
    }
}

/// Polls a URL and yields the last line of each response.
pub struct HttpPollSource {
    url: Url,
    config: HttpPollConfig,
    client: Client,
    backoff: Backoff,
    polled: bool,
}

impl HttpPollSource {
    /// Create a poll source from its configuration.
    ///
    /// # Errors
    /// Returns `SourceError::Config` if the URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: HttpPollConfig) -> Result<Self, SourceError> {
        let url = config.parsed_url()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            backoff: Backoff::new(config.retry.clone()),
            config,
            client,
            polled: false,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// One GET. A reply with a non-success status yields `Ok(None)`.
    async fn fetch(&self) -> Result<Option<String>, reqwest::Error> {
        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                url = %self.url,
                status = %status,
                "Poll returned error status, waiting for next cycle"
            );
            return Ok(None);
        }
        response.text().await.map(Some)
    }

    /// Fetch once, retrying transport failures with backoff.
    ///
    /// The failure count spans polls and resets whenever the endpoint answers.
    async fn fetch_with_retry(&mut self) -> Result<Option<String>, SourceError> {
        loop {
            let result = self.fetch().await;
            match result {
                Ok(body) => {
                    self.backoff.mark_success();
                    return Ok(body);
                }
                Err(e) => match self.backoff.mark_failure() {
                    Some(delay) => {
                        tracing::warn!(
                            url = %self.url,
                            attempt = self.backoff.failures(),
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Poll failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(SourceError::Transport {
                            attempts: self.backoff.failures(),
                            source: e,
                        });
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for HttpPollSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPollSource")
            .field("url", &self.url.as_str())
            .field("interval", &self.config.interval)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl LineSource for HttpPollSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        loop {
            if self.polled {
                tokio::time::sleep(self.config.interval).await;
            }
            self.polled = true;

            let Some(body) = self.fetch_with_retry().await? else {
                continue;
            };
            match last_line(&body) {
                Some(line) => {
                    tracing::debug!(url = %self.url, bytes = body.len(), "Poll succeeded");
                    return Ok(Some(line.to_string()));
                }
                None => {
                    tracing::warn!(url = %self.url, "Poll returned no records");
                }
            }
        }
    }
}

/// Last non-empty `\n`-separated line of a response body.
pub fn last_line(body: &str) -> Option<&str> {
    body.split('\n').rfind(|line| !line.is_empty())
}
