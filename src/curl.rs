//! Curl command-line reconstruction for diagnostics (§4.13).
//!
//! Purely advisory: never influences control flow, and any internal failure
//! is swallowed, yielding an empty string rather than propagating (§9).
//! Adapted from `requests_fortified/support/curl.py`'s `command_line_request_curl`.

use base64::Engine as _;

use crate::transport::{Auth, Body, RequestSpec};

/// Reconstruct a single-line curl command approximating `spec`. Best-effort:
/// never panics, never returns an error.
pub fn reconstruct_curl(spec: &RequestSpec) -> String {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| reconstruct_curl_inner(spec)))
        .unwrap_or_default()
}

fn reconstruct_curl_inner(spec: &RequestSpec) -> String {
    let mut parts = vec!["curl".to_string(), "-X".to_string(), spec.method.to_string()];

    let mut has_user_agent = false;
    for (k, v) in &spec.headers {
        if k.eq_ignore_ascii_case("user-agent") {
            has_user_agent = true;
        }
        parts.push("-H".to_string());
        parts.push(shell_quote(&format!("{k}: {v}")));
    }
    if !has_user_agent {
        parts.push("-H".to_string());
        parts.push(shell_quote(&format!(
            "User-Agent: {}",
            crate::transport::default_user_agent()
        )));
    }

    if let Some(auth) = &spec.auth {
        match auth {
            Auth::Basic { username, password } => {
                if !spec.headers.keys().any(|k| k.eq_ignore_ascii_case("authorization")) {
                    let encoded = base64::engine::general_purpose::STANDARD
                        .encode(format!("{username}:{password}"));
                    parts.push("-H".to_string());
                    parts.push(shell_quote(&format!("Authorization: Basic {encoded}")));
                }
            }
            Auth::Bearer(token) => {
                parts.push("-H".to_string());
                parts.push(shell_quote(&format!("Authorization: Bearer {token}")));
            }
            Auth::Cookie(cookies) => {
                let joined = cookies
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                parts.push("--cookie".to_string());
                parts.push(shell_quote(&joined));
            }
        }
    }

    let is_get = spec.method == reqwest::Method::GET;
    if is_get && !spec.query.is_empty() {
        parts.push("-G".to_string());
        for (k, v) in &spec.query {
            parts.push("--data".to_string());
            parts.push(shell_quote(&format!("{k}={v}")));
        }
    } else if let Some(body) = &spec.body {
        let raw = match body {
            Body::Json(value) => value.to_string(),
            Body::Form(form) => form
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&"),
            Body::Raw(bytes) => String::from_utf8_lossy(bytes).to_string(),
        };
        parts.push("--data".to_string());
        parts.push(shell_quote(&raw));
    }

    if spec.allow_redirects {
        parts.push("-L".to_string());
    }

    parts.push(shell_quote(&spec.url));
    parts.join(" ")
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    #[test]
    fn get_with_params_uses_dash_g() {
        let mut spec = RequestSpec::new(Method::GET, "http://example.test/items");
        spec.query.insert("page".into(), "2".into());
        let cmd = reconstruct_curl(&spec);
        assert!(cmd.contains("-G"));
        assert!(cmd.contains("page=2"));
    }

    #[test]
    fn post_with_json_body_uses_data() {
        let spec = RequestSpec::new(Method::POST, "http://example.test/items")
            .with_json_body(serde_json::json!({"a": 1}));
        let cmd = reconstruct_curl(&spec);
        assert!(cmd.contains("--data"));
        assert!(cmd.contains("-X POST"));
    }

    #[test]
    fn basic_auth_injects_authorization_header() {
        let mut spec = RequestSpec::new(Method::GET, "http://example.test");
        spec.auth = Some(Auth::Basic {
            username: "u".into(),
            password: "p".into(),
        });
        let cmd = reconstruct_curl(&spec);
        assert!(cmd.contains("Authorization: Basic"));
    }

    #[test]
    fn never_panics_on_minimal_spec() {
        let spec = RequestSpec::new(Method::GET, "");
        let cmd = reconstruct_curl(&spec);
        assert!(!cmd.is_empty());
    }

    #[test]
    fn redirects_flag_appends_dash_l() {
        let spec = RequestSpec::new(Method::GET, "http://example.test");
        assert!(reconstruct_curl(&spec).contains("-L"));
    }
}
