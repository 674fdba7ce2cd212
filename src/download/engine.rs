//! Chunked file persistence, mid-stream retry, gzip rehydration, and the
//! two whole-download output modes (§4.7).
//!
//! Two retry loops are deliberately kept separate here (§9): [`crate::retry::Engine::request`]
//! handles per-request transport retry before the body starts streaming;
//! [`DownloadEngine`]'s 60x10s envelope handles corruption discovered only
//! after the response was already accepted, mid-stream.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tracing::warn;

use crate::bom::detect_bom;
use crate::download::csv_file::{read_csv_rows, strip_bom_sibling, CsvRow};
use crate::download::CsvOptions;
use crate::error::{FortifiedError, Result};
use crate::metrics::Metrics;
use crate::retry::{Engine, RetryConfig, RetryPolicy};
use crate::transport::RequestSpec;

const CHUNK_SIZE: usize = 8192;
const DOWNLOADER_RETRY_TRIES: u32 = 60;
const DOWNLOADER_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Options for the whole-file JSON download path.
#[derive(Debug, Clone, Default)]
pub struct JsonDownloadOptions {
    pub gunzip_if_detected: bool,
}

/// Outcome of one body-write attempt: either it wrote the whole body, or it
/// hit mid-stream corruption the downloader-level envelope should retry.
enum WriteOutcome {
    Done { bytes_written: u64, chunk_total_sum: u64 },
    RetryableCorruption,
}

/// The streaming download engine. Borrows the retry [`Engine`] (and its
/// metrics sink) rather than owning a second copy — one transport, one
/// metrics instance, per §5.
pub struct DownloadEngine<'a> {
    engine: &'a Engine,
    temp_dir: PathBuf,
}

impl<'a> DownloadEngine<'a> {
    pub fn new(engine: &'a Engine, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            temp_dir: temp_dir.into(),
        }
    }

    fn metrics(&self) -> &Metrics {
        self.engine.metrics()
    }

    /// Download the body to `name` under the temp directory, retrying
    /// mid-stream corruption per the 60x10s envelope, then post-process
    /// (BOM detect + gzip rehydrate). Returns the final readable path.
    async fn fetch_to_file(
        &self,
        spec: RequestSpec,
        retry_cfg: &RetryConfig,
        retry_policy: &RetryPolicy,
        name: &str,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.temp_dir)
            .map_err(|e| FortifiedError::software(format!("create temp dir failed: {e}")))?;
        let temp_path = self.temp_dir.join(name);
        if temp_path.exists() {
            std::fs::remove_file(&temp_path)
                .map_err(|e| FortifiedError::software(format!("remove stale temp file failed: {e}")))?;
        }

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let streaming_spec = RequestSpec {
                stream: true,
                ..spec.clone()
            };
            let response = self
                .engine
                .request(streaming_spec, retry_cfg, retry_policy)
                .await?;

            match self.write_response_to_file(response, &temp_path).await? {
                WriteOutcome::Done {
                    bytes_written,
                    chunk_total_sum,
                } => {
                    self.metrics().inc("download.bytes_written", bytes_written);
                    // chunk_total_sum over-reports trailing partial chunks by
                    // design (§9); preserved rather than corrected.
                    self.metrics().inc("download.chunk_total_sum", chunk_total_sum);
                    break;
                }
                WriteOutcome::RetryableCorruption => {
                    if attempts >= DOWNLOADER_RETRY_TRIES {
                        return Err(FortifiedError::retry_exhausted(
                            format!("{}: download retry budget exhausted", spec.label),
                            attempts,
                            None,
                        ));
                    }
                    warn!(label = %spec.label, attempts, "mid-stream corruption, retrying download");
                    tokio::time::sleep(DOWNLOADER_RETRY_DELAY).await;
                    continue;
                }
            }
        }

        self.rehydrate_if_gzip(&temp_path)
    }

    /// Write the response body in fixed-size chunks with flush+fsync after
    /// each write (§4.7 step 3). `chunk_total_sum` is incremented by
    /// `CHUNK_SIZE`-aligned request size, not actual bytes read — preserved
    /// from the original (§9 open question, resolved: keep as-is).
    async fn write_response_to_file(
        &self,
        response: reqwest::Response,
        temp_path: &Path,
    ) -> Result<WriteOutcome> {
        let mut file = std::fs::File::create(temp_path)
            .map_err(|e| FortifiedError::software(format!("create temp file failed: {e}")))?;

        let mut stream = response.bytes_stream();
        let mut bytes_written = 0u64;
        let mut chunk_total_sum = 0u64;

        while let Some(next) = stream.next().await {
            match next {
                Ok(bytes) => {
                    chunk_total_sum += CHUNK_SIZE as u64;
                    file.write_all(&bytes)
                        .map_err(|e| FortifiedError::software(format!("chunk write failed: {e}")))?;
                    file.flush()
                        .map_err(|e| FortifiedError::software(format!("chunk flush failed: {e}")))?;
                    file.sync_all()
                        .map_err(|e| FortifiedError::software(format!("fsync failed: {e}")))?;
                    bytes_written += bytes.len() as u64;
                }
                Err(err) => {
                    // Mid-stream corruption (chunked-encoding error /
                    // incomplete read): warn and signal the downloader-level
                    // retry envelope. Anything else propagates immediately.
                    if err.is_body() || err.is_decode() {
                        warn!(error = %err, "chunked-encoding or incomplete-read error mid-stream");
                        return Ok(WriteOutcome::RetryableCorruption);
                    }
                    return Err(err.into());
                }
            }
        }

        Ok(WriteOutcome::Done {
            bytes_written,
            chunk_total_sum,
        })
    }

    /// §4.7 step 5: if the written file turns out to be gzip, rename it and
    /// decompress into the original path.
    fn rehydrate_if_gzip(&self, path: &Path) -> Result<PathBuf> {
        let info = detect_bom(path)?;
        if info.encoding != "gzip" {
            return Ok(path.to_path_buf());
        }

        let gz_path = path.with_extension("gz");
        std::fs::rename(path, &gz_path)
            .map_err(|e| FortifiedError::software(format!("rename to .gz failed: {e}")))?;

        let gz_file = std::fs::File::open(&gz_path)
            .map_err(|e| FortifiedError::software(format!("open gz file failed: {e}")))?;
        let mut decoder = flate2::read::GzDecoder::new(gz_file);
        let mut out = std::fs::File::create(path)
            .map_err(|e| FortifiedError::software(format!("create rehydrated file failed: {e}")))?;
        std::io::copy(&mut decoder, &mut out)
            .map_err(|e| FortifiedError::software(format!("gzip decompression failed: {e}")))?;

        Ok(path.to_path_buf())
    }

    /// JSON whole-file download (§4.7 step 6).
    pub async fn download_json(
        &self,
        spec: RequestSpec,
        retry_cfg: &RetryConfig,
        retry_policy: &RetryPolicy,
        _opts: &JsonDownloadOptions,
    ) -> Result<serde_json::Value> {
        let name = format!("{}.json", sanitize_name(&spec.label));
        let path = self.fetch_to_file(spec, retry_cfg, retry_policy, &name).await?;

        let text = std::fs::read_to_string(&path)
            .map_err(|e| FortifiedError::software(format!("read downloaded json failed: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|_| crate::validate::handle_json_decode_error(&text, 0, "application/json"))
    }

    /// CSV download (§4.7 step 7).
    pub async fn download_csv(
        &self,
        spec: RequestSpec,
        retry_cfg: &RetryConfig,
        retry_policy: &RetryPolicy,
        csv_opts: &CsvOptions,
    ) -> Result<Vec<CsvRow>> {
        let name = format!("{}.csv", sanitize_name(&spec.label));
        let path = self.fetch_to_file(spec, retry_cfg, retry_policy, &name).await?;
        let read_path = strip_bom_sibling(&path)?;
        read_csv_rows(&read_path, csv_opts)
    }
}

fn sanitize_name(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_name_replaces_non_alphanumeric() {
        assert_eq!(sanitize_name("Get Items/2"), "Get_Items_2");
    }

    #[test]
    fn constants_match_spec() {
        assert_eq!(CHUNK_SIZE, 8192);
        assert_eq!(DOWNLOADER_RETRY_TRIES, 60);
        assert_eq!(DOWNLOADER_RETRY_DELAY, Duration::from_secs(10));
    }
}
