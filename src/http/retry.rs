//! Retrying request execution with capped exponential backoff.

use std::time::Duration;

use reqwest::{Client, Request, RequestBuilder, Response};
use tracing::{debug, warn};

use super::HttpError;

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for every further retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Budget for one attempt, from connecting until the body is read. A
    /// timed-out attempt is dropped.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (zero-based).
    ///
    /// `min(base_delay * 2^attempt, max_delay)`, saturating instead of
    /// overflowing for large attempt numbers.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// What one attempt produced.
enum Attempt {
    Response(Response),
    Transport(reqwest::Error),
    Timeout,
}

/// HTTP client that applies a [`RetryPolicy`] to every request.
///
/// Responses with a status below 500 (including 4xx) are returned
/// immediately. 5xx responses, transport errors and timeouts are retried up to
/// `max_retries` times; when retries are exhausted the last 5xx response is
/// returned, or the last error raised.
///
/// # Examples
///
/// ```no_run
/// use canopy::http::{RetryPolicy, RetryingClient};
///
/// # async fn example() -> Result<(), canopy::http::HttpError> {
/// let client = RetryingClient::new(RetryPolicy::default())?;
/// let response = client.send(client.get("https://example.org/search?q=ficus")).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    /// Build a client with its own connection pool.
    pub fn new(policy: RetryPolicy) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(concat!("canopy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HttpError::Build)?;
        Ok(Self { client, policy })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Start a GET request on the underlying client.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Start a POST request on the underlying client.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Build and execute a request with retries.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, HttpError> {
        let request = builder.build().map_err(HttpError::InvalidRequest)?;
        self.execute(request).await
    }

    /// Execute a request with retries.
    pub async fn execute(&self, request: Request) -> Result<Response, HttpError> {
        let url = request.url().to_string();
        let mut attempt = 0u32;

        loop {
            let mut this_try = request
                .try_clone()
                .ok_or_else(|| HttpError::Unclonable { url: url.clone() })?;
            // reqwest keeps this deadline running while the body is read, so
            // a server that stalls after the headers cannot hold the caller.
            *this_try.timeout_mut() = Some(self.policy.attempt_timeout);

            let outcome =
                match tokio::time::timeout(self.policy.attempt_timeout, self.client.execute(this_try))
                    .await
                {
                    Ok(Ok(response)) => Attempt::Response(response),
                    Ok(Err(e)) if e.is_timeout() => Attempt::Timeout,
                    Ok(Err(e)) => Attempt::Transport(e),
                    Err(_) => Attempt::Timeout,
                };

            let exhausted = attempt >= self.policy.max_retries;

            let reason = match outcome {
                Attempt::Response(response) if !response.status().is_server_error() => {
                    debug!(url = %url, status = %response.status(), attempt, "HTTP response");
                    return Ok(response);
                }
                Attempt::Response(response) => {
                    if exhausted {
                        return Ok(response);
                    }
                    format!("status {}", response.status())
                }
                Attempt::Transport(source) => {
                    if exhausted {
                        return Err(HttpError::Transport { url, source });
                    }
                    source.to_string()
                }
                Attempt::Timeout => {
                    if exhausted {
                        return Err(HttpError::Timeout {
                            url,
                            timeout: self.policy.attempt_timeout,
                        });
                    }
                    "attempt timed out".to_string()
                }
            };

            let delay = self.policy.backoff_delay(attempt);
            warn!(
                url = %url,
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "Retrying HTTP request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
