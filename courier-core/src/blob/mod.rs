//! Blob Transfer
//!
//! Upload and download of opaque, already encrypted blobs over HTTPS.
//! Blobs are addressed by a 16-byte id:
//!
//! - `GET  <download_url>/<hex id>` downloads
//! - `POST <download_url>/<hex id>/done` marks a downloaded blob consumed
//! - `POST <upload_url>` (multipart field `blob`) uploads and returns the hex id

use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::message::BlobId;

/// Largest blob accepted by default.
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 100 * 1024 * 1024;

/// Upper bound for the download buffer reserved up front.
const MAX_PREALLOC: u64 = 1024 * 1024;

fn default_max_blob_size() -> u64 {
    DEFAULT_MAX_BLOB_SIZE
}

/// Progress callback, called with a percentage in `0..=100`.
pub type ProgressFn = dyn Fn(u8) + Send + Sync;

/// Blob transfer error types.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transfer cancelled")]
    Cancelled,
}

/// Blob server endpoints and HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Prefix of download URLs; the hex blob id is appended.
    pub download_url: String,
    pub upload_url: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub user_agent: String,
    /// Downloads announcing or delivering more bytes are rejected.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        BlobConfig {
            download_url: "https://blob.courier.chat/blob".to_string(),
            upload_url: "https://blob.courier.chat/upload".to_string(),
            connect_timeout_ms: 15_000,
            read_timeout_ms: 60_000,
            user_agent: format!(
                "Courier/{}",
                option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
            ),
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

impl BlobConfig {
    pub fn with_urls(download_url: &str, upload_url: &str) -> Self {
        BlobConfig {
            download_url: download_url.to_string(),
            upload_url: upload_url.to_string(),
            ..Default::default()
        }
    }

    pub fn blob_url(&self, blob_id: &BlobId) -> String {
        format!("{}/{}", self.download_url.trim_end_matches('/'), blob_id.to_hex())
    }

    fn client(&self) -> Result<Client, BlobError> {
        Ok(Client::builder()
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .timeout(Duration::from_millis(self.read_timeout_ms))
            .user_agent(self.user_agent.clone())
            .build()?)
    }
}

/// Reader wrapper reporting progress and honoring cancellation.
struct ProgressReader<R> {
    inner: R,
    total: Option<u64>,
    done: u64,
    last_percent: Option<u8>,
    cancel: Arc<AtomicBool>,
    progress: Option<Arc<ProgressFn>>,
}

impl<R: Read> ProgressReader<R> {
    fn new(
        inner: R,
        total: Option<u64>,
        cancel: Arc<AtomicBool>,
        progress: Option<Arc<ProgressFn>>,
    ) -> Self {
        ProgressReader {
            inner,
            total,
            done: 0,
            last_percent: None,
            cancel,
            progress,
        }
    }

    fn report(&mut self) {
        let (Some(progress), Some(total)) = (&self.progress, self.total) else {
            return;
        };
        let percent = if total == 0 {
            100
        } else {
            (self.done.min(total) * 100 / total) as u8
        };
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            progress(percent);
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(io::Error::other("transfer cancelled"));
        }
        let n = self.inner.read(buf)?;
        self.done += n as u64;
        self.report();
        Ok(n)
    }
}

/// Downloads one blob.
pub struct BlobLoader {
    client: Client,
    config: BlobConfig,
    blob_id: BlobId,
    cancel: Arc<AtomicBool>,
    progress: Option<Arc<ProgressFn>>,
}

impl BlobLoader {
    pub fn new(config: &BlobConfig, blob_id: BlobId) -> Result<Self, BlobError> {
        Ok(BlobLoader {
            client: config.client()?,
            config: config.clone(),
            blob_id,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Flag that cancels the transfer when set; shareable across threads.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Downloads the blob. Returns `Ok(None)` if cancelled.
    pub fn load(&self) -> Result<Option<Vec<u8>>, BlobError> {
        let url = self.config.blob_url(&self.blob_id);
        debug!(%url, "Downloading blob");
        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(BlobError::Status(response.status().as_u16()));
        }

        let max = self.config.max_blob_size;
        let total = response.content_length();
        if let Some(len) = total.filter(|len| *len > max) {
            return Err(BlobError::InvalidResponse(format!(
                "blob of {len} bytes exceeds limit of {max}"
            )));
        }

        let reader =
            ProgressReader::new(response, total, self.cancel.clone(), self.progress.clone());
        let mut data = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
        match reader.take(max.saturating_add(1)).read_to_end(&mut data) {
            Ok(_) => {}
            Err(_) if self.cancel.load(Ordering::SeqCst) => {
                info!(blob_id = %self.blob_id, "Blob download cancelled");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        if data.len() as u64 > max {
            return Err(BlobError::InvalidResponse(format!(
                "blob exceeds limit of {max} bytes"
            )));
        }

        info!(blob_id = %self.blob_id, len = data.len(), "Blob downloaded");
        Ok(Some(data))
    }

    /// Tells the server the blob may be deleted.
    ///
    /// Must not be used for group content. Failures are only logged.
    pub fn mark_as_done(&self) {
        let url = format!("{}/done", self.config.blob_url(&self.blob_id));
        match self.client.post(&url).send() {
            Ok(response) if response.status().is_success() => {
                debug!(blob_id = %self.blob_id, "Blob marked as done");
            }
            Ok(response) => {
                warn!(
                    blob_id = %self.blob_id,
                    status = response.status().as_u16(),
                    "Marking blob as done failed"
                );
            }
            Err(e) => warn!(blob_id = %self.blob_id, error = %e, "Marking blob as done failed"),
        }
    }
}

/// Uploads one blob.
pub struct BlobUploader {
    client: Client,
    config: BlobConfig,
    data: Vec<u8>,
    cancel: Arc<AtomicBool>,
    progress: Option<Arc<ProgressFn>>,
}

impl BlobUploader {
    pub fn new(config: &BlobConfig, data: Vec<u8>) -> Result<Self, BlobError> {
        Ok(BlobUploader {
            client: config.client()?,
            config: config.clone(),
            data,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Uploads the blob and returns the id assigned by the server.
    pub fn upload(self) -> Result<BlobId, BlobError> {
        let len = self.data.len() as u64;
        debug!(url = %self.config.upload_url, len, "Uploading blob");
        let reader = ProgressReader::new(
            Cursor::new(self.data),
            Some(len),
            self.cancel.clone(),
            self.progress.clone(),
        );
        let part = Part::reader_with_length(reader, len)
            .file_name("blob.bin")
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("blob", part);

        let response = match self.client.post(&self.config.upload_url).multipart(form).send() {
            Ok(response) => response,
            Err(_) if self.cancel.load(Ordering::SeqCst) => return Err(BlobError::Cancelled),
            Err(e) => return Err(e.into()),
        };
        if !response.status().is_success() {
            return Err(BlobError::Status(response.status().as_u16()));
        }

        let body = response.text()?;
        let blob_id = BlobId::from_hex(body.trim())
            .ok_or_else(|| BlobError::InvalidResponse(body.trim().to_string()))?;
        info!(%blob_id, len, "Blob uploaded");
        Ok(blob_id)
    }
}
