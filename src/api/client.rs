use super::constants::USER_AGENT;
use super::error::{ListError, ListResult};
use super::resilience::{RetryConfig, RetryPolicy};
use log::debug;
use std::time::Duration;

/// Whether a request may be sent again after a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Retried,
    /// Non-idempotent writes; a repeat after a lost response could apply twice
    AtMostOnce,
}

/// Pooled HTTP client shared by one backend, with its retry policy attached
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    retry_policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(timeout: Duration, retry: RetryConfig) -> ListResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            // SharePoint Online session cookies (FedAuth, rtFa) live in this jar
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ListError::BackendUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            retry_policy: RetryPolicy::new(retry),
        })
    }

    /// Build and send a request through the retry policy.
    ///
    /// `build` is invoked once per attempt so every retry carries a fresh body.
    pub async fn send<F>(&self, build: F) -> ListResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        self.send_as(Delivery::Retried, build).await
    }

    pub async fn send_as<F>(&self, delivery: Delivery, build: F) -> ListResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        match delivery {
            Delivery::Retried => self.retry_policy.execute(|| build(&self.http).send()).await,
            Delivery::AtMostOnce => {
                debug!("Sending request once (no retry)");
                Ok(build(&self.http).send().await?)
            }
        }
    }
}

/// Status and body of a response, read fully
pub async fn read_response(response: reqwest::Response) -> ListResult<(u16, String)> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ListError::BackendUnavailable(format!("failed to read response body: {}", e)))?;
    Ok((status, body))
}
