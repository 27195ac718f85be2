//! Input resolution: turn a user-supplied path or URL into sniffed bytes.
//!
//! URL inputs are downloaded straight into memory; no temporary files are
//! created for any input.
//!
//! Content type is decided by magic bytes (`infer`), never by file name.
//! PDFs and raster images are accepted; everything else is rejected before
//! pdfium or the image decoder sees it.

use crate::error::Pdf2FormError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// What the bytes turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Pdf,
    /// PNG, JPEG, BMP or TIFF; treated as a one-page document.
    Image,
}

const IMAGE_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/bmp", "image/tiff"];

/// Classify `bytes` by signature.
pub fn sniff(bytes: &[u8], source_name: &str) -> Result<SourceKind, Pdf2FormError> {
    match infer::get(bytes) {
        Some(t) if t.mime_type() == "application/pdf" => Ok(SourceKind::Pdf),
        Some(t) if IMAGE_MIME_TYPES.contains(&t.mime_type()) => Ok(SourceKind::Image),
        Some(t) => Err(Pdf2FormError::UnsupportedContent {
            source_name: source_name.to_string(),
            detected: t.mime_type().to_string(),
        }),
        None => Err(Pdf2FormError::UnsupportedContent {
            source_name: source_name.to_string(),
            detected: "unknown content".to_string(),
        }),
    }
}

/// Document bytes ready for loading.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    pub bytes: Vec<u8>,
    pub kind: SourceKind,
    /// File name or URL, used in error messages.
    pub source_name: String,
}

impl LoadedInput {
    pub fn from_bytes(bytes: Vec<u8>, source_name: impl Into<String>) -> Result<Self, Pdf2FormError> {
        let source_name = source_name.into();
        let kind = sniff(&bytes, &source_name)?;
        debug!("{}: sniffed as {:?} ({} bytes)", source_name, kind, bytes.len());
        Ok(Self {
            bytes,
            kind,
            source_name,
        })
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read or download `input`, then sniff it.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedInput, Pdf2FormError> {
    if input.trim().is_empty() {
        return Err(Pdf2FormError::InvalidInput {
            input: input.to_string(),
        });
    }
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    LoadedInput::from_bytes(bytes, input)
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, Pdf2FormError> {
    let path = PathBuf::from(path_str);

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2FormError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2FormError::FileNotFound { path }),
    };
    if !metadata.is_file() {
        return Err(Pdf2FormError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2FormError::PermissionDenied { path: path.clone() },
        std::io::ErrorKind::NotFound => Pdf2FormError::FileNotFound { path: path.clone() },
        _ => Pdf2FormError::Internal(format!("reading {}: {}", path.display(), e)),
    })?;
    debug!("Read local input: {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Fetch `url` into memory. Nothing touches the disk.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Pdf2FormError> {
    let parsed = reqwest::Url::parse(url)
        .ok()
        .filter(|u| u.host_str().is_some_and(|h| !h.is_empty()))
        .ok_or_else(|| Pdf2FormError::InvalidInput {
            input: url.to_string(),
        })?;

    info!("Downloading document from: {}", parsed);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2FormError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let failed = |e: reqwest::Error| {
        if e.is_timeout() {
            Pdf2FormError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2FormError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(parsed).send().await.map_err(failed)?;
    if !response.status().is_success() {
        return Err(Pdf2FormError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(failed)?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
