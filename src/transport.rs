//! Session transport adapter (§4.1).
//!
//! Owns the pooled `reqwest::Client` and exposes a single `do_request` call.
//! Performs no retry policy of its own beyond what the pool is configured
//! with; any error escapes verbatim for the engine to classify.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;

/// Authentication material attached to a request.
#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer(String),
    Cookie(HashMap<String, String>),
}

/// Body payload for a request.
#[derive(Debug, Clone)]
pub enum Body {
    Json(Value),
    Form(HashMap<String, String>),
    Raw(Vec<u8>),
}

/// An immutable per-call request description (§3 `RequestSpec`).
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub query: HashMap<String, String>,
    pub body: Option<Body>,
    pub headers: HashMap<String, String>,
    pub auth: Option<Auth>,
    pub allow_redirects: bool,
    pub verify_tls: bool,
    pub stream: bool,
    pub label: String,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: HashMap::new(),
            body: None,
            headers: HashMap::new(),
            auth: None,
            allow_redirects: true,
            verify_tls: true,
            stream: false,
            label: "Request".into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_json_body(mut self, value: Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Wraps a pooled `reqwest::Client`. Pure transport: no policy, no retry.
#[derive(Clone)]
pub struct Session {
    client: Client,
    user_agent: String,
}

/// `"(<crate-name>/<crate-version>, rust)"` — the two-element structure from
/// the original `(<module>/<version>, Python/<runtime-version>)` preserved,
/// with the runtime slot filled by a fixed literal since there is no
/// meaningful interpreter version to report (§6).
pub fn default_user_agent() -> String {
    format!(
        "({}/{}, rust)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

impl Session {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            user_agent: default_user_agent(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Assemble and send one attempt. Any error escapes verbatim (§4.1).
    pub async fn do_request(
        &self,
        spec: &RequestSpec,
        timeout: Duration,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder: RequestBuilder = self.client.request(spec.method.clone(), &spec.url);
        builder = builder.timeout(timeout);

        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }

        if !spec.headers.contains_key("User-Agent") {
            builder = builder.header("User-Agent", &self.user_agent);
        }
        for (k, v) in &spec.headers {
            builder = builder.header(k, v);
        }

        builder = match &spec.body {
            Some(Body::Json(value)) => builder.json(value),
            Some(Body::Form(form)) => builder.form(form),
            Some(Body::Raw(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };

        builder = match &spec.auth {
            Some(Auth::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            Some(Auth::Cookie(cookies)) => {
                let cookie_header = cookies
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                builder.header("Cookie", cookie_header)
            }
            None => builder,
        };

        builder.send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_user_agent_has_two_element_structure() {
        let ua = default_user_agent();
        assert!(ua.starts_with('('));
        assert!(ua.ends_with(')'));
        assert!(ua.contains(", rust"));
    }

    #[test]
    fn spec_builder_sets_fields() {
        let spec = RequestSpec::new(Method::POST, "http://example.test/x")
            .with_label("Create Thing")
            .with_json_body(serde_json::json!({"a": 1}))
            .with_header("X-Trace", "abc")
            .streaming();
        assert_eq!(spec.label, "Create Thing");
        assert!(spec.stream);
        assert_eq!(spec.headers["X-Trace"], "abc");
        assert!(matches!(spec.body, Some(Body::Json(_))));
    }
}
