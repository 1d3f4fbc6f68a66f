//! REST access to the player's wallet.
//!
//! Only the balance query is needed here; it seeds the session's balance
//! before the first websocket update arrives.

use crate::{
    backoff::{exponential_backoff, jittered_backoff},
    Error, Result,
};
use casino_types::wallet::BalanceResponse;
use reqwest::{header::COOKIE, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Retry behavior for idempotent requests.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[derive(Clone, Debug)]
pub struct WalletClient {
    http: reqwest::Client,
    base_url: Url,
    cookie: Option<String>,
    retry_policy: RetryPolicy,
}

impl WalletClient {
    /// `api_base` is the REST root, e.g. `http://localhost:8000/api/`.
    pub fn new(api_base: &str, cookie: Option<String>) -> Result<Self> {
        let mut base_url = Url::parse(api_base)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(Error::InvalidScheme {
                    scheme: scheme.to_string(),
                    expected: "http or https",
                })
            }
        }
        // `join` replaces the last segment unless the base ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        if let Some(cookie) = &cookie {
            reqwest::header::HeaderValue::from_str(cookie)
                .map_err(|e| Error::InvalidHeader(e.to_string()))?;
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url,
            cookie,
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Current balance from `GET balance/`.
    pub async fn balance(&self) -> Result<i64> {
        let url = self.base_url.join("balance/")?;
        let response = self.get_with_retry(url).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::FailedWithBody { status, body });
        }
        let bytes = response.bytes().await?;
        let parsed: BalanceResponse = serde_json::from_slice(&bytes)?;
        Ok(parsed.balance)
    }

    pub(crate) async fn get_with_retry(&self, url: Url) -> Result<Response> {
        let attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let mut request = self.http.get(url.clone());
            if let Some(cookie) = &self.cookie {
                request = request.header(COOKIE, cookie);
            }
            let last = attempt + 1 >= attempts;
            match request.send().await {
                Ok(response) if !last && is_retryable(response.status()) => {
                    warn!(%url, status = %response.status(), attempt, "retrying request");
                }
                Ok(response) => {
                    debug!(%url, status = %response.status(), "request complete");
                    return Ok(response);
                }
                Err(e) if !last => {
                    warn!(%url, error = %e, attempt, "retrying request");
                }
                Err(e) => return Err(e.into()),
            }

            let backoff = exponential_backoff(
                self.retry_policy.initial_backoff,
                self.retry_policy.max_backoff,
                u32::try_from(attempt).unwrap_or(u32::MAX),
            );
            let delay = {
                let mut rng = rand::thread_rng();
                jittered_backoff(&mut rng, backoff)
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
