//! Retry policies with exponential backoff
//!
//! Transient transport failures and gateway-style HTTP statuses are retried inside a
//! single backend call. Anything else is handed back to the caller untouched.

use crate::api::error::{ListError, ListResult};
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub base_delay: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Types of errors and their retry behavior
#[derive(Debug, Clone, PartialEq)]
pub enum RetryableError {
    /// Network-level errors (connection refused, DNS, reset)
    Network,
    /// HTTP 502/503/504 from a gateway or an overloaded farm
    Unavailable(u16),
    /// HTTP 429 Too Many Requests
    RateLimited,
    /// HTTP 408 or a client-side timeout
    Timeout,
    /// HTTP 500 and other 5xx; SOAP faults use 500
    ServerError(u16),
    /// Non-retryable client errors (4xx except 408, 429)
    ClientError(u16),
    Unknown,
}

impl RetryableError {
    pub fn should_retry(&self) -> bool {
        matches!(
            self,
            RetryableError::Network
                | RetryableError::Unavailable(_)
                | RetryableError::RateLimited
                | RetryableError::Timeout
        )
    }

    pub fn from_status_code(status: u16) -> Self {
        match status {
            408 => RetryableError::Timeout,
            429 => RetryableError::RateLimited,
            400..=499 => RetryableError::ClientError(status),
            502..=504 => RetryableError::Unavailable(status),
            500..=599 => RetryableError::ServerError(status),
            _ => RetryableError::Unknown,
        }
    }

    pub fn from_reqwest_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            RetryableError::Timeout
        } else if error.is_connect() || error.is_request() {
            RetryableError::Network
        } else if let Some(status) = error.status() {
            Self::from_status_code(status.as_u16())
        } else {
            RetryableError::Unknown
        }
    }
}

/// Retry policy that implements exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Send a request, retrying transport failures and retryable statuses.
    ///
    /// A response with a retryable status that survives the last attempt is returned as-is
    /// so the caller can classify it.
    pub async fn execute<F, Fut>(&self, operation: F) -> ListResult<reqwest::Response>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            debug!("Sending request (attempt {}/{})", attempt, max_attempts);
            let last = attempt == max_attempts;

            match operation().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let class = RetryableError::from_status_code(status);
                    if !class.should_retry() || last {
                        return Ok(response);
                    }
                    warn!("Request returned {} on attempt {} (retryable)", status, attempt);
                }
                Err(error) => {
                    let should_retry = RetryableError::from_reqwest_error(&error).should_retry();
                    if !should_retry || last {
                        warn!(
                            "Request failed permanently on attempt {} (should_retry: {}): {}",
                            attempt, should_retry, error
                        );
                        return Err(ListError::from(error));
                    }
                    warn!("Request failed on attempt {} (retryable): {}", attempt, error);
                }
            }

            let delay = self.calculate_delay(attempt);
            debug!("Waiting {:?} before retry", delay);
            tokio::time::sleep(delay).await;
        }

        Err(ListError::BackendUnavailable("retry budget exhausted".to_string()))
    }

    /// Calculate exponential backoff delay with optional jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.config.base_delay.as_millis() as f64)
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let mut delay = Duration::from_millis(delay_ms as u64).min(self.config.max_delay);

        if self.config.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            delay = Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64);
        }

        delay
    }
}
