//! # fortified-requests
//!
//! The core of a fortified HTTP client: a request-execution engine with a
//! disciplined retry protocol, a streaming download engine with encoding
//! detection and chunked-transfer recovery, and a structured error taxonomy.
//!
//! ## Core Concepts
//!
//! - **[`retry::Engine`]** — the retry-execution state machine. Classifies
//!   each attempt into accept/retry/fatal, honors caller predicates, applies
//!   bounded exponential backoff with jitter, and translates transport
//!   faults into the [`error::FortifiedError`] taxonomy.
//! - **[`download::DownloadEngine`]** — file-backed chunked persistence with
//!   mid-stream retry, BOM detection/stripping, gzip rehydration, and two
//!   output shapes (CSV row iteration, whole-file JSON decode).
//! - **[`bom`]** — byte-order-mark sniffing independent of the streaming
//!   download path, usable standalone.
//! - **[`validate`]** — response/content-type gating and JSON decode with
//!   HTML/XML diagnostic fallback.
//! - **[`facades`]** — thin upload/download wrappers over the engine.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fortified_requests::config::EngineConfig;
//! use fortified_requests::retry::{RetryConfig, RetryPolicy};
//! use fortified_requests::facades::upload_json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = EngineConfig::builder().build()?;
//!     let body = serde_json::json!({"hello": "world"});
//!     let response = upload_json(
//!         &cfg.engine,
//!         "https://example.test/items",
//!         body,
//!         &RetryConfig::default(),
//!         &RetryPolicy::default(),
//!     ).await?;
//!     println!("{response}");
//!     Ok(())
//! }
//! ```

pub mod bom;
pub mod config;
pub mod curl;
pub mod download;
pub mod error;
pub mod facades;
pub mod metrics;
pub mod retry;
pub mod transport;
pub mod validate;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{ErrorCode, FortifiedError, ResponseErrorClass, Result};
pub use metrics::Metrics;
pub use retry::{Engine, RetryConfig, RetryPolicy};
pub use transport::{Auth, Body, RequestSpec, Session};

/// Default content-type header value for JSON bodies (§6 defaults).
pub const HEADER_CONTENT_TYPE_APP_JSON: &str = "application/json";
/// Default content-type header value for urlencoded form bodies (§6 defaults).
pub const HEADER_CONTENT_TYPE_APP_URLENCODED: &str = "application/x-www-form-urlencoded";
