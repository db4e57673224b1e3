use crate::app::ports::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport};
use crate::config::TransportConfig;
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use metrics::counter;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for RetryPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff_ms: config.base_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms))
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or attempts run out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, url: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(url, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Transient fetch failure, retrying");
                counter!("park_scraper_http_retries_total").increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// reqwest-backed transport presenting Chromium-like headers in the order adapters supply.
pub struct ReqwestTransport {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ScraperError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            policy: RetryPolicy::from(config),
        })
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            Some(RequestBody::Json(value)) => builder.json(value),
            None => builder,
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| classify_error(&request.url, e))?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(ScraperError::Status {
                url: request.url.clone(),
                status,
            });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| classify_error(&request.url, e))?
            .to_vec();
        debug!(url = %request.url, status, bytes = body.len(), "Fetched");
        Ok(HttpResponse {
            url: request.url.clone(),
            status,
            body,
        })
    }
}

/// Only connection-level failures count as network errors; a bad request or an
/// undecodable body will not improve on retry.
fn classify_error(url: &str, e: reqwest::Error) -> ScraperError {
    if e.is_builder() {
        ScraperError::Config(format!("invalid request to {url}: {e}"))
    } else if e.is_decode() {
        ScraperError::parse(url, e)
    } else {
        ScraperError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        counter!("park_scraper_http_requests_total").increment(1);
        with_retry(&self.policy, &request.url, || self.send_once(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn request_build_errors_are_not_retried() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let classified = classify_error("not a url", err);
        assert!(matches!(classified, ScraperError::Config(_)));
        assert!(!classified.is_transient());
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff_ms: 500,
            max_backoff_ms: 1_500,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "u", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(ScraperError::Status { url: "u".into(), status: 503 })
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_is_retried_then_surfaced_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(3), "u", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ScraperError::Status { url: "u".into(), status: 429 })
        })
        .await;
        assert!(matches!(result, Err(ScraperError::Status { status: 429, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(3), "u", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ScraperError::Status { url: "u".into(), status: 404 })
        })
        .await;
        assert!(matches!(result, Err(ScraperError::Status { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
