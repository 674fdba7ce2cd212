//! Thin higher-level wrappers over the engine (§4.9).
//!
//! These own no state beyond what they construct per call; they exist
//! purely to pre-configure common request shapes over the shared engine.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::Value;

use crate::download::{CsvOptions, CsvRow, DownloadEngine, JsonDownloadOptions};
use crate::error::Result;
use crate::retry::{Engine, RetryConfig, RetryPolicy};
use crate::transport::{Body, RequestSpec};
use crate::validate::validate_json_response;

/// POST a JSON body and validate the JSON response.
pub async fn upload_json(
    engine: &Engine,
    url: impl Into<String>,
    body: Value,
    retry_cfg: &RetryConfig,
    retry_policy: &RetryPolicy,
) -> Result<Value> {
    let spec = RequestSpec::new(Method::POST, url)
        .with_label("Upload JSON")
        .with_header("Content-Type", "application/json")
        .with_json_body(body);
    let response = engine.request(spec, retry_cfg, retry_policy).await?;
    validate_json_response(response, "application/json").await
}

/// POST a urlencoded form body and validate the JSON response.
pub async fn upload_form(
    engine: &Engine,
    url: impl Into<String>,
    form: HashMap<String, String>,
    retry_cfg: &RetryConfig,
    retry_policy: &RetryPolicy,
) -> Result<Value> {
    let mut spec = RequestSpec::new(Method::POST, url)
        .with_label("Upload Form")
        .with_header("Content-Type", "application/x-www-form-urlencoded");
    spec.body = Some(Body::Form(form));
    let response = engine.request(spec, retry_cfg, retry_policy).await?;
    validate_json_response(response, "application/json").await
}

/// GET a CSV body and return its fully materialized rows.
pub async fn download_csv(
    engine: &Engine,
    temp_dir: impl Into<std::path::PathBuf>,
    url: impl Into<String>,
    retry_cfg: &RetryConfig,
    retry_policy: &RetryPolicy,
    csv_opts: &CsvOptions,
) -> Result<Vec<CsvRow>> {
    let spec = RequestSpec::new(Method::GET, url).with_label("Download CSV");
    let downloader = DownloadEngine::new(engine, temp_dir);
    downloader
        .download_csv(spec, retry_cfg, retry_policy, csv_opts)
        .await
}

/// GET a JSON body and return the decoded value.
pub async fn download_json(
    engine: &Engine,
    temp_dir: impl Into<std::path::PathBuf>,
    url: impl Into<String>,
    retry_cfg: &RetryConfig,
    retry_policy: &RetryPolicy,
) -> Result<Value> {
    let spec = RequestSpec::new(Method::GET, url).with_label("Download JSON");
    let downloader = DownloadEngine::new(engine, temp_dir);
    downloader
        .download_json(spec, retry_cfg, retry_policy, &JsonDownloadOptions::default())
        .await
}
