//! The retry-execution state machine (§4.6) — the core of this crate.
//!
//! Grounded on `requests_fortified/requests_fortified.py`'s `request()` /
//! `_request_retry()` / `try_send_request()` trio, re-expressed as a
//! `tokio`-async loop in the style of the teacher crate's
//! `backend::with_backoff` (cancellation-checked sleep between attempts,
//! `Retry-After` honored ahead of the computed backoff).

use std::time::{Duration, Instant};

use reqwest::Response;
use tracing::{debug, error, warn};

use crate::curl::reconstruct_curl;
use crate::error::{classify_reqwest_error, ErrorCode, ErrorDetails, FortifiedError, Result};
use crate::metrics::Metrics;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::{RequestSpec, Session};

/// Owns the session transport and the metrics sink for its lifetime. One
/// `Engine` is meant to be constructed once and reused across calls (the
/// session and metrics are shared state per §5).
pub struct Engine {
    session: Session,
    metrics: Metrics,
}

impl Engine {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Execute `spec` under `retry_cfg`/`retry_policy`, returning the
    /// accepted response or raising a [`FortifiedError`] on fatal failure or
    /// exhaustion.
    pub async fn request(
        &self,
        spec: RequestSpec,
        retry_cfg: &RetryConfig,
        retry_policy: &RetryPolicy,
    ) -> Result<Response> {
        retry_cfg.validate()?;

        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if let Some(max_elapsed) = retry_cfg.max_elapsed {
                if started.elapsed() > max_elapsed {
                    return Err(self.exhausted(&spec, attempt));
                }
            }

            debug!(label = %spec.label, attempt, "attempt start");
            let attempt_started = Instant::now();
            let outcome = self.session.do_request(&spec, retry_cfg.timeout).await;
            self.metrics.inc("api_request.count", 1);
            self.metrics
                .add_sample("api_request.latency", attempt_started.elapsed().as_secs_f64());

            match outcome {
                Ok(response) => {
                    let should_retry = retry_policy
                        .should_retry_on_response
                        .as_ref()
                        .map(|pred| pred(response.status().as_u16()))
                        .unwrap_or(false)
                        || retry_policy
                            .retry_statuses
                            .contains(&response.status().as_u16());

                    if should_retry && attempt < retry_cfg.tries {
                        let retry_after = retry_policy
                            .respect_retry_after
                            .then(|| parse_retry_after_header(&response))
                            .flatten();
                        warn!(label = %spec.label, attempt, status = %response.status(), "retrying on response");
                        self.sleep_before_retry(retry_cfg, attempt, retry_after).await;
                        continue;
                    }

                    if response.status().is_success() || response.status().is_redirection() {
                        self.metrics.inc("api_request.success", 1);
                        return Ok(response);
                    }

                    self.metrics.inc("api_request.failure", 1);
                    return Err(self.response_error(response).await);
                }
                Err(reqwest_err) => {
                    let code = classify_reqwest_error(&reqwest_err);
                    let fortified = FortifiedError::Transport {
                        code,
                        message: reqwest_err.to_string(),
                        source: Some(reqwest_err),
                    };

                    let retryable = is_transport_retryable(&fortified)
                        || retry_policy
                            .should_retry_on_exception
                            .as_ref()
                            .map(|pred| pred(&fortified))
                            .unwrap_or(false);

                    if retryable && attempt < retry_cfg.tries {
                        warn!(label = %spec.label, attempt, error = %fortified, "retrying on transport error");
                        self.sleep_before_retry(retry_cfg, attempt, None).await;
                        continue;
                    }

                    self.metrics.inc("api_request.failure", 1);
                    error!(label = %spec.label, attempt, error = %fortified, "fatal transport error");
                    return Err(fortified);
                }
            }
        }
    }

    async fn sleep_before_retry(
        &self,
        retry_cfg: &RetryConfig,
        attempt: u32,
        retry_after: Option<Duration>,
    ) {
        let delay = retry_after.unwrap_or_else(|| retry_cfg.delay_for_attempt(attempt));
        tokio::time::sleep(delay).await;
    }

    fn exhausted(&self, spec: &RequestSpec, attempts: u32) -> FortifiedError {
        self.metrics.inc("api_request.failure", 1);
        FortifiedError::retry_exhausted(
            format!("{}: retry budget exhausted", spec.label),
            attempts,
            Some(reconstruct_curl(spec)),
        )
    }

    /// Build the detailed error envelope for a non-2xx/3xx accepted response
    /// (§4.6 "After ACCEPT").
    async fn response_error(&self, response: Response) -> FortifiedError {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let transfer_encoding = response
            .headers()
            .get(reqwest::header::TRANSFER_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let reason = response.status().canonical_reason().map(str::to_string);

        let body_excerpt = response.text().await.ok().map(|text| {
            serde_json::from_str::<serde_json::Value>(&text).unwrap_or_else(|_| {
                if text.trim_start().starts_with("<html") {
                    serde_json::Value::Array(
                        crate::validate::clean_html(&text)
                            .into_iter()
                            .map(serde_json::Value::String)
                            .collect(),
                    )
                } else if text.trim_start().starts_with("<?xml") {
                    crate::validate::xml_to_json(&text)
                } else {
                    serde_json::Value::String(text)
                }
            })
        });

        let details = ErrorDetails {
            status: Some(status),
            reason,
            content_type,
            content_length,
            transfer_encoding,
            body: body_excerpt,
        };

        FortifiedError::http_status(status, format!("HTTP {status}"), details)
    }
}

/// `is_retryable` restricted to transport-level (connection/timeout) faults
/// from the fixed rule table in §4.6 — distinct from the policy-supplied
/// predicate, which layers on top.
fn is_transport_retryable(err: &FortifiedError) -> bool {
    matches!(
        err.code(),
        ErrorCode::REQUEST_CONNECT | ErrorCode::CONNECT
    ) || err.code().0 == 504
        || crate::error::default_retry_predicate(err)
}

fn parse_retry_after_header(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(crate::error::parse_retry_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::backoff::JitterStrategy;
    use reqwest::Method;

    fn engine() -> Engine {
        Engine::new(Session::new(reqwest::Client::new()))
    }

    #[tokio::test]
    async fn accepts_first_successful_response() {
        let server = httpmock_server().await;
        let e = engine();
        let spec = RequestSpec::new(Method::GET, format!("{server}/ok"));
        let cfg = RetryConfig {
            jitter_strategy: JitterStrategy::None,
            ..RetryConfig::default()
        };
        let resp = e.request(spec, &cfg, &RetryPolicy::default()).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(e.metrics().snapshot().counters["api_request.success"], 1);
    }

    #[tokio::test]
    async fn exhausts_after_fixed_number_of_attempts() {
        let server = httpmock_server().await;
        let e = engine();
        let spec = RequestSpec::new(Method::GET, format!("{server}/always-500"));
        let cfg = RetryConfig {
            tries: 3,
            delay: Duration::from_millis(1),
            jitter_strategy: JitterStrategy::None,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy {
            retry_statuses: vec![500],
            ..RetryPolicy::default()
        };
        let err = e.request(spec, &cfg, &policy).await.unwrap_err();
        assert_eq!(err.code().0, 500);
        assert_eq!(
            err.response_class(),
            Some(crate::error::ResponseErrorClass::Service)
        );
        assert_eq!(e.metrics().snapshot().counters["api_request.count"], 3);
    }

    // Minimal raw-socket HTTP/1.1 fixture server: every accepted connection
    // gets one fixed-status JSON response, keyed off the request path.
    // Avoids pulling in an HTTP mocking crate not present elsewhere in the
    // dependency graph.
    async fn httpmock_server() -> String {
        use std::net::SocketAddr;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(v) => v,
                    Err(_) => break,
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    let request_line = String::from_utf8_lossy(&buf[..n]);
                    let status_line = if request_line.contains("/always-500") {
                        "HTTP/1.1 500 Internal Server Error"
                    } else {
                        "HTTP/1.1 200 OK"
                    };
                    let body = "{}";
                    let response = format!(
                        "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }
}
