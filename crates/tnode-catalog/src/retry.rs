//! Retry policy for catalog HTTP calls.
//!
//! A call is retried when the catalog could not be reached or answered with
//! an overload or gateway status (429, 502, 503, 504). Every other answer,
//! 404 included, is final: a missing entity is not a failure.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

/// How often and how patiently a catalog call is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1 << retry.min(16))
    }

    /// Run `send` until it yields a final answer or the budget is spent.
    /// The last outcome is returned as is, transient status included.
    pub(crate) async fn send<F, Fut>(&self, endpoint: &str, send: F) -> Result<Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut retry = 0;
        loop {
            let outcome = send().await;
            let transient = match &outcome {
                Ok(resp) => is_transient(resp.status()).then(|| format!("status {}", resp.status())),
                Err(e) if e.is_builder() => None,
                Err(e) => Some(e.to_string()),
            };
            let Some(reason) = transient else {
                return outcome;
            };
            if retry >= self.max_retries {
                return outcome;
            }
            let delay = self.delay(retry);
            retry += 1;
            tracing::warn!(
                endpoint,
                retry,
                max_retries = self.max_retries,
                ?delay,
                %reason,
                "catalog call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    async fn get(policy: RetryPolicy, server: &MockServer) -> Result<Response, reqwest::Error> {
        let client = reqwest::Client::new();
        let url = server.uri();
        policy.send("GET /", || client.get(url.as_str()).send()).await
    }

    async fn hits(server: &MockServer) -> usize {
        server.received_requests().await.map_or(0, |r| r.len())
    }

    #[tokio::test]
    async fn overloaded_catalog_is_retried_until_it_answers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let resp = get(quick(3), &server).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(hits(&server).await, 3);
    }

    #[tokio::test]
    async fn not_found_is_final() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resp = get(quick(3), &server).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(hits(&server).await, 1);
    }

    #[tokio::test]
    async fn budget_is_respected_and_last_answer_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let resp = get(quick(2), &server).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(hits(&server).await, 3);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        get(RetryPolicy::none(), &server).await.unwrap();
        assert_eq!(hits(&server).await, 1);
    }

    #[tokio::test]
    async fn unreachable_catalog_fails_after_retries() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let calls = std::sync::atomic::AtomicU32::new(0);
        let result = quick(1)
            .send("GET /", || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                // Closed port: connection refused.
                client.get("http://127.0.0.1:1/").send()
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }
}
