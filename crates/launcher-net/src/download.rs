//! Streaming downloads.
//!
//! Downloads spool into `dl-*-<basename>` temp files inside the given
//! directory and are removed on any failure. A 404 answer is an *empty
//! success* (the publisher signals "no patch for this version" that way);
//! every other non-200 status is an error.
//!
//! Reads proceed in 64 KiB chunks. Speed is estimated over a sliding
//! window: a 20-sample ring of bytes-per-250ms, reported as
//! `(sum / len) * 4` bytes per second. Progress callbacks are throttled
//! through a [`ProgressGate`] and cancellation is observed between
//! chunks.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use launcher_bus::ProgressGate;

use crate::error::FetchError;
use crate::fetch::Fetcher;

/// Fixed read granularity. Cancellation checks and speed-ring samples
/// land on these boundaries.
const CHUNK_SIZE: usize = 64 * 1024;

/// Number of samples in the speed ring.
const SPEED_WINDOW: usize = 20;

/// Time between speed samples.
const SPEED_SAMPLE_PERIOD: Duration = Duration::from_millis(250);

/// A snapshot of an in-flight download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes written so far.
    pub bytes_downloaded: u64,
    /// Total expected bytes from `Content-Length`, zero when unknown.
    pub bytes_total: u64,
    /// Smoothed speed in bytes per second.
    pub speed: u64,
}

/// Progress callback for downloads.
pub type ProgressFn = dyn Fn(DownloadProgress) + Send + Sync;

struct SpeedRing {
    samples: VecDeque<u64>,
    sample_bytes: u64,
    last_sample: Instant,
    current: u64,
}

impl SpeedRing {
    fn new() -> SpeedRing {
        SpeedRing {
            samples: VecDeque::with_capacity(SPEED_WINDOW),
            sample_bytes: 0,
            last_sample: Instant::now(),
            current: 0,
        }
    }

    /// Feed bytes; `true` when a sample period elapsed and the speed was
    /// recomputed.
    fn feed(&mut self, bytes: u64) -> bool {
        self.sample_bytes += bytes;
        if self.last_sample.elapsed() < SPEED_SAMPLE_PERIOD {
            return false;
        }

        self.last_sample = Instant::now();
        if self.samples.len() >= SPEED_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(self.sample_bytes);
        self.sample_bytes = 0;

        let sum: u64 = self.samples.iter().sum();
        self.current = sum / self.samples.len() as u64 * 4;
        true
    }
}

/// Filename component of a URL with any query string stripped.
fn url_basename(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    let base = without_query.rsplit('/').next().unwrap_or(without_query);
    if base.is_empty() {
        "file".to_string()
    } else {
        base.to_string()
    }
}

/// Lowercase hex SHA-256 of a file.
pub fn file_sha256(path: &Path) -> Result<String, std::io::Error> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

impl Fetcher {
    /// Download `url` into a fresh temp file under `dir`.
    ///
    /// Returns the temp file path. On 404 the file is a zero-byte success.
    /// When `expected_sha256` is given the finished file is verified and
    /// removed on mismatch. Cancellation checks run between chunks; a
    /// cancelled download leaves nothing behind.
    pub async fn download_temp(
        &self,
        cancel: &CancellationToken,
        dir: &Path,
        url: &str,
        expected_sha256: Option<&str>,
        progress: Option<&ProgressFn>,
    ) -> Result<PathBuf, FetchError> {
        self.mode().offline_error()?;
        std::fs::create_dir_all(dir)?;

        let basename = url_basename(url);
        let temp = tempfile::Builder::new()
            .prefix("dl-")
            .suffix(&format!("-{basename}"))
            .tempfile_in(dir)?;

        debug!(url, dest = %temp.path().display(), "downloading file");

        let resp = self.client().get(url).send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            // Empty success: upstream has no payload for this request.
            let (_, path) = temp.keep().map_err(|e| e.error)?;
            return Ok(path);
        }
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes_total = resp.content_length().unwrap_or(0);
        let mut resp = resp;
        let mut file = temp;
        let mut ring = SpeedRing::new();
        let mut gate = ProgressGate::new();
        let mut bytes_downloaded: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!(url, "download cancelled");
                return Err(FetchError::Cancelled);
            }

            match resp.chunk().await? {
                Some(chunk) => {
                    // The transport hands back buffers of arbitrary size;
                    // re-split them so every write, cancellation check and
                    // speed sample happens on a 64 KiB boundary.
                    for part in chunk.chunks(CHUNK_SIZE) {
                        if cancel.is_cancelled() {
                            debug!(url, "download cancelled");
                            return Err(FetchError::Cancelled);
                        }

                        file.write_all(part)?;
                        bytes_downloaded += part.len() as u64;

                        if ring.feed(part.len() as u64) {
                            report(
                                progress,
                                &mut gate,
                                bytes_downloaded,
                                bytes_total,
                                ring.current,
                            );
                        }
                    }
                }
                None => {
                    report(
                        progress,
                        &mut gate,
                        bytes_downloaded,
                        bytes_total,
                        ring.current,
                    );
                    break;
                }
            }
        }

        file.flush()?;

        if let Some(expected) = expected_sha256 {
            let actual = file_sha256(file.path())?;
            if !actual.eq_ignore_ascii_case(expected) {
                // Dropping the temp file removes it.
                return Err(FetchError::HashMismatch {
                    path: file.path().to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }
}

fn report(
    progress: Option<&ProgressFn>,
    gate: &mut ProgressGate,
    bytes_downloaded: u64,
    bytes_total: u64,
    speed: u64,
) {
    let Some(progress) = progress else {
        return;
    };

    let fraction = if bytes_total > 0 {
        bytes_downloaded.min(bytes_total) as f64 / bytes_total as f64
    } else {
        0.0
    };

    // Unknown totals cannot be gated on a fraction; pass every sample.
    if bytes_total > 0 && !gate.allow(fraction) {
        return;
    }

    progress(DownloadProgress {
        bytes_downloaded,
        bytes_total,
        speed,
    });
}
