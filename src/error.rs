//! Stable error taxonomy for the fortified HTTP client.
//!
//! Every failure that escapes the engine carries a numeric [`ErrorCode`] from
//! this module's table. Codes are wire-stable: once published, a code's
//! meaning never changes, only new ones are appended.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Numeric error codes, stable across releases.
///
/// HTTP status codes (4xx/5xx) pass through unchanged as `error_code` and are
/// not duplicated here; see [`FortifiedError::http_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    pub const OK: ErrorCode = ErrorCode(0);
    pub const MODULE: ErrorCode = ErrorCode(600);
    pub const ARGUMENT: ErrorCode = ErrorCode(601);
    pub const REQUEST: ErrorCode = ErrorCode(602);
    pub const SOFTWARE: ErrorCode = ErrorCode(603);
    pub const UNEXPECTED_VALUE: ErrorCode = ErrorCode(604);
    pub const REQUEST_HTTP: ErrorCode = ErrorCode(605);
    pub const REQUEST_CONNECT: ErrorCode = ErrorCode(606);
    pub const REQUEST_REDIRECTS: ErrorCode = ErrorCode(607);
    pub const RETRY_EXHAUSTED: ErrorCode = ErrorCode(608);
    pub const UNEXPECTED_CONTENT_TYPE: ErrorCode = ErrorCode(609);
    pub const UPLOAD_DATA: ErrorCode = ErrorCode(610);
    pub const AUTH: ErrorCode = ErrorCode(611);
    pub const JSON_DECODING: ErrorCode = ErrorCode(614);
    pub const CONNECT: ErrorCode = ErrorCode(615);
    pub const UNEXPECTED: ErrorCode = ErrorCode(699);

    /// Human-readable name, used in the canonical message format.
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "OK",
            600 => "MODULE",
            601 => "ARGUMENT",
            602 => "REQUEST",
            603 => "SOFTWARE",
            604 => "UNEXPECTED_VALUE",
            605 => "REQUEST_HTTP",
            606 => "REQUEST_CONNECT",
            607 => "REQUEST_REDIRECTS",
            608 => "RETRY_EXHAUSTED",
            609 => "UNEXPECTED_CONTENT_TYPE",
            610 => "UPLOAD_DATA",
            611 => "AUTH",
            614 => "JSON_DECODING",
            615 => "CONNECT",
            699 => "UNEXPECTED",
            100..=599 => "HTTP",
            _ => "UNKNOWN",
        }
    }

    /// Short description, used in the canonical message format.
    pub fn desc(self) -> &'static str {
        match self.0 {
            0 => "Success",
            600 => "Generic module error",
            601 => "Invalid/missing argument",
            602 => "Underlying transport failure",
            603 => "Internal defect / unexpected state",
            604 => "Expected value missing/wrong",
            605 => "Transport HTTP error",
            606 => "Connection/proxy/TLS/protocol error",
            607 => "Too many redirects",
            608 => "Retry budget consumed",
            609 => "Content-type mismatch",
            610 => "Upload failure",
            611 => "Authentication failure",
            614 => "Body not valid JSON",
            615 => "Lower-level connection error",
            699 => "Default/unknown",
            100..=599 => "HTTP status",
            _ => "Unrecognized error code",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The original's three exception classes for a non-2xx accepted response
/// (§4.6 "After ACCEPT"). Distinct from [`ErrorCode`], which carries the
/// numeric status/code; this is the coarser client/service/module split the
/// original raises as three separate exception types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseErrorClass {
    /// 400, 401, 403, 404, 405, 406, 408, 409, 410, 422, 429.
    Client,
    /// 500, 501, 502, 503, 511.
    Service,
    /// Any other non-2xx/3xx status, or a response-validation failure
    /// (content-type mismatch, JSON decode failure) not tied to a status
    /// in either of the tables above.
    Module,
}

impl ResponseErrorClass {
    pub fn for_status(status: u16) -> Self {
        match status {
            400 | 401 | 403 | 404 | 405 | 406 | 408 | 409 | 410 | 422 | 429 => Self::Client,
            500 | 501 | 502 | 503 | 511 => Self::Service,
            _ => Self::Module,
        }
    }

    /// Matches the original's exception type name, for log/diagnostic parity.
    pub fn name(self) -> &'static str {
        match self {
            Self::Client => "RequestsFortifiedClientError",
            Self::Service => "RequestsFortifiedServiceError",
            Self::Module => "RequestsFortifiedModuleError",
        }
    }
}

/// A structured diagnostic envelope attached to a non-2xx or decode failure.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetails {
    pub status: Option<u16>,
    pub reason: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub transfer_encoding: Option<String>,
    /// Decoded body excerpt: JSON-preferred, else HTML-cleaned lines, else raw text.
    pub body: Option<Value>,
}

/// The top-level error type raised by every public operation in this crate.
#[derive(Error, Debug)]
pub enum FortifiedError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.)
    /// that escaped retry untranslated.
    #[error("{code}: {desc}: '{message}'", code = .code.0, desc = .code.desc())]
    Transport {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A response was returned but failed validation (status, content-type,
    /// or decode failure), carrying the diagnostic envelope from §4.4 and the
    /// class (client/service/module) the original would have raised as a
    /// distinct exception type.
    #[error("{code}: {desc}: '{message}'", code = .code.0, desc = .code.desc())]
    Response {
        code: ErrorCode,
        class: ResponseErrorClass,
        message: String,
        details: Box<ErrorDetails>,
    },

    /// The retry budget was exhausted without an ACCEPT.
    #[error("{code}: {desc}: '{message}'", code = ErrorCode::RETRY_EXHAUSTED.0, desc = ErrorCode::RETRY_EXHAUSTED.desc())]
    RetryExhausted {
        message: String,
        attempts: u32,
        curl: Option<String>,
    },

    /// Invalid configuration detected at build time.
    #[error("{code}: {desc}: '{0}'", code = ErrorCode::ARGUMENT.0, desc = ErrorCode::ARGUMENT.desc())]
    InvalidConfig(String),

    /// Generic internal/software defect.
    #[error("{code}: {desc}: '{message}'", code = .code.0, desc = .code.desc())]
    Software { code: ErrorCode, message: String },
}

impl FortifiedError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FortifiedError::Transport { code, .. } => *code,
            FortifiedError::Response { code, .. } => *code,
            FortifiedError::RetryExhausted { .. } => ErrorCode::RETRY_EXHAUSTED,
            FortifiedError::InvalidConfig(_) => ErrorCode::ARGUMENT,
            FortifiedError::Software { code, .. } => *code,
        }
    }

    pub fn software(message: impl Into<String>) -> Self {
        FortifiedError::Software {
            code: ErrorCode::SOFTWARE,
            message: message.into(),
        }
    }

    pub fn unexpected_value(message: impl Into<String>) -> Self {
        FortifiedError::Software {
            code: ErrorCode::UNEXPECTED_VALUE,
            message: message.into(),
        }
    }

    pub fn unexpected_content_type(message: impl Into<String>, details: ErrorDetails) -> Self {
        FortifiedError::Response {
            code: ErrorCode::UNEXPECTED_CONTENT_TYPE,
            class: ResponseErrorClass::Module,
            message: message.into(),
            details: Box::new(details),
        }
    }

    pub fn json_decoding(message: impl Into<String>, details: ErrorDetails) -> Self {
        FortifiedError::Response {
            code: ErrorCode::JSON_DECODING,
            class: ResponseErrorClass::Module,
            message: message.into(),
            details: Box::new(details),
        }
    }

    /// Build the error for a non-2xx/3xx accepted response, classifying it
    /// into the original's client/service/module exception split (§4.6
    /// "After ACCEPT").
    pub fn http_status(status: u16, message: impl Into<String>, details: ErrorDetails) -> Self {
        FortifiedError::Response {
            code: ErrorCode(status as u32),
            class: ResponseErrorClass::for_status(status),
            message: message.into(),
            details: Box::new(details),
        }
    }

    /// The client/service/module classification, present only for
    /// [`FortifiedError::Response`].
    pub fn response_class(&self) -> Option<ResponseErrorClass> {
        match self {
            FortifiedError::Response { class, .. } => Some(*class),
            _ => None,
        }
    }

    pub fn retry_exhausted(message: impl Into<String>, attempts: u32, curl: Option<String>) -> Self {
        FortifiedError::RetryExhausted {
            message: message.into(),
            attempts,
            curl,
        }
    }

    /// Flat mapping suitable for structured log emission, mirroring the
    /// original's dict serialization: origin, exit_code, exit_desc, exit_name,
    /// plus optional fields that are omitted when absent.
    pub fn as_log_fields(&self) -> BTreeMap<String, Value> {
        let mut fields = BTreeMap::new();
        let code = self.code();
        fields.insert("origin".into(), Value::String("fortified-requests".into()));
        fields.insert("exit_code".into(), Value::from(code.0));
        fields.insert("exit_name".into(), Value::String(code.name().into()));
        fields.insert("exit_desc".into(), Value::String(code.desc().into()));
        fields.insert("message".into(), Value::String(self.to_string()));

        if let FortifiedError::Response { details, class, .. } = self {
            fields.insert("error_class".into(), Value::String(class.name().into()));
            if let Some(status) = details.status {
                fields.insert("status".into(), Value::from(status));
            }
            if let Some(reason) = &details.reason {
                fields.insert("reason".into(), Value::String(reason.clone()));
            }
            if let Some(details_val) = &details.body {
                fields.insert("errors".into(), details_val.clone());
            }
        }
        if let FortifiedError::RetryExhausted { curl: Some(c), .. } = self {
            fields.insert("curl".into(), Value::String(c.clone()));
        }
        fields
    }
}

impl From<reqwest::Error> for FortifiedError {
    fn from(err: reqwest::Error) -> Self {
        let code = classify_reqwest_error(&err);
        FortifiedError::Transport {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<anyhow::Error> for FortifiedError {
    fn from(err: anyhow::Error) -> Self {
        FortifiedError::software(err.to_string())
    }
}

/// Exception-to-code translation at the outer boundary (§4.6).
pub fn classify_reqwest_error(err: &reqwest::Error) -> ErrorCode {
    if err.is_timeout() {
        ErrorCode(504)
    } else if err.is_redirect() {
        ErrorCode::REQUEST_REDIRECTS
    } else if err.is_connect() {
        ErrorCode::REQUEST_CONNECT
    } else if err.is_status() {
        ErrorCode::REQUEST_HTTP
    } else if err.is_request() {
        ErrorCode::REQUEST
    } else {
        ErrorCode::SOFTWARE
    }
}

/// Default recommended retry predicate for arbitrary transport errors
/// (`mv_request_retry_excps_func` in the original): true for a connection
/// error whose message mentions a disconnect/reset, independent of any
/// retry-policy predicate the caller supplied.
pub fn default_retry_predicate(err: &FortifiedError) -> bool {
    match err {
        FortifiedError::Transport { code, message, .. } => {
            *code == ErrorCode::REQUEST_CONNECT
                && (message.contains("RemoteDisconnected") || message.contains("ConnectionResetError")
                    || message.contains("connection reset") || message.contains("connection closed"))
        }
        _ => false,
    }
}

/// Parsed `Retry-After` header value: either a delay in seconds or an
/// HTTP-date (not modeled here; callers needing HTTP-date support should
/// extend this). Absent/unparseable headers yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

pub type Result<T> = std::result::Result<T, FortifiedError>;
