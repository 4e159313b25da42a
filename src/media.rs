//! Media payload helpers: data URIs, result-field lookup and the blob store.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::GenerationError;

/// MIME type assumed when a reference image arrives as bare base64.
const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parse `data:<mime>;base64,<payload>`.
    ///
    /// Bare base64 without the `data:` prefix is accepted as a PNG.
    pub fn parse(input: &str) -> Result<Self, GenerationError> {
        let input = input.trim();
        let (mime, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    GenerationError::InvalidInput("Malformed data URI: missing ','".to_string())
                })?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or_else(|| {
                        GenerationError::InvalidInput(
                            "Only base64 data URIs are supported".to_string(),
                        )
                    })?;
                let mime = if mime.is_empty() {
                    DEFAULT_IMAGE_MIME
                } else {
                    mime
                };
                (mime.to_string(), payload)
            }
            None => (DEFAULT_IMAGE_MIME.to_string(), input),
        };

        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| GenerationError::InvalidInput(format!("Invalid base64 image: {}", e)))?;
        if bytes.is_empty() {
            return Err(GenerationError::InvalidInput("Reference image is empty".to_string()));
        }

        Ok(Self { mime, bytes })
    }

    /// Encode raw bytes as a `data:` URI.
    pub fn encode(mime: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime, BASE64.encode(bytes))
    }

    /// Base64 payload without the `data:` header.
    pub fn base64_payload(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Guess an image MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => DEFAULT_IMAGE_MIME,
    }
}

/// Return the first non-empty string found at any of `pointers`, in order.
///
/// Pointers use JSON Pointer syntax (`/response/video/url`).
pub fn first_present(body: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| {
        body.pointer(pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Like [`first_present`], but a miss is an explicit failure.
pub fn require_first_present(
    body: &Value,
    pointers: &[&str],
    what: &str,
) -> Result<String, GenerationError> {
    first_present(body, pointers).ok_or_else(|| {
        GenerationError::Unknown(format!(
            "{} missing from provider response (looked at {})",
            what,
            pointers.join(", ")
        ))
    })
}

/// Local directory of downloaded media, addressed by content key.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic 32-character hex name for a key.
    pub fn hash_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }

    /// Write `bytes` under the key and return a `file://` URL to them.
    pub async fn store(&self, key: &str, extension: &str, bytes: &[u8]) -> Result<String, GenerationError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(format!("{}.{}", Self::hash_key(key), extension));
        tokio::fs::write(&path, bytes).await?;
        log::info!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(file_url(&path))
    }
}

/// `file://` URL for an absolute or relative path.
pub fn file_url(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    format!("file://{}", absolute.display())
}

/// Path behind a `file://` URL.
pub fn path_from_file_url(url: &str) -> Option<PathBuf> {
    url.strip_prefix("file://").map(PathBuf::from)
}
