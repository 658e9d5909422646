//! Blob storage boundary for note images.
//!
//! # Responsibility
//! - Define the opaque handle, upload target and store contracts.
//! - Enforce the upload policy (image type and size) before any store call.
//!
//! # Invariants
//! - A handle is never a usable URL; read URLs are derived per request and
//!   expire.
//! - Detaching a handle from a note never deletes the blob.

use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

mod fs;
mod memory;

pub use fs::{verify_read_url, FsBlobStore};
pub use memory::MemoryBlobStore;

/// Default upload size cap: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Result type used by blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Opaque reference to stored image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobHandle(String);

impl BlobHandle {
    /// Accepts handle text issued by a store.
    ///
    /// Handles are restricted to `[A-Za-z0-9_-]` so they can be embedded in
    /// paths and URLs without escaping.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(ValidationError::InvalidBlobHandle(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for BlobHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BlobHandle {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BlobHandle> for String {
    fn from(value: BlobHandle) -> Self {
        value.0
    }
}

/// Single-use destination a client writes image bytes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// Token identifying the pending upload.
    pub token: String,
    /// Location the client posts bytes to.
    pub url: String,
    /// Unix seconds after which the token is rejected.
    pub expires_at: u64,
}

/// Errors from blob store operations.
#[derive(Debug)]
pub enum BlobError {
    /// Upload token was never issued or was already consumed.
    UnknownUploadTarget(String),
    /// Upload token outlived its ttl.
    UploadTargetExpired(String),
    /// Handle text is not one this store could have issued.
    InvalidHandle(String),
    /// Filesystem failure.
    Io(std::io::Error),
    /// Store cannot serve requests right now.
    Unavailable(String),
}

impl Display for BlobError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownUploadTarget(token) => write!(f, "unknown upload target: {token}"),
            Self::UploadTargetExpired(token) => write!(f, "upload target expired: {token}"),
            Self::InvalidHandle(value) => write!(f, "invalid blob handle: {value}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "blob store unavailable: {message}"),
        }
    }
}

impl Error for BlobError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BlobError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Blob store contract consumed by the board.
pub trait BlobStore: Send + Sync {
    /// Issues a fresh single-use upload target.
    fn create_upload_target(&self) -> BlobResult<UploadTarget>;
    /// Consumes `token` and stores `bytes`, returning the content handle.
    fn upload(&self, token: &str, content_type: &str, bytes: &[u8]) -> BlobResult<BlobHandle>;
    /// Returns a temporary read URL, or `None` when the blob is gone.
    fn resolve_read_url(&self, handle: &BlobHandle) -> BlobResult<Option<String>>;
    /// Returns whether bytes for `handle` are still stored.
    fn contains(&self, handle: &BlobHandle) -> BlobResult<bool>;
}

/// Client-side upload constraints checked before attaching an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_content_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
        }
    }
}

impl UploadPolicy {
    /// Checks one upload request.
    ///
    /// Content type parameters (`; charset=...`) and case are ignored.
    pub fn validate(&self, content_type: &str, size: u64) -> Result<(), ValidationError> {
        let essence = normalize_content_type(content_type);
        if !self
            .allowed_content_types
            .iter()
            .any(|allowed| normalize_content_type(allowed) == essence)
        {
            return Err(ValidationError::UnsupportedContentType(
                content_type.trim().to_string(),
            ));
        }
        if size > self.max_bytes {
            return Err(ValidationError::PayloadTooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Content handle for `bytes`: lowercase hex blake3 digest.
pub fn content_handle(bytes: &[u8]) -> BlobHandle {
    BlobHandle(blake3::hash(bytes).to_hex().to_string())
}

pub(crate) fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{content_handle, BlobHandle, UploadPolicy, DEFAULT_MAX_UPLOAD_BYTES};
    use crate::model::validation::ValidationError;

    #[test]
    fn policy_accepts_jpeg_and_png_up_to_limit() {
        let policy = UploadPolicy::default();
        policy.validate("image/jpeg", 10).expect("jpeg allowed");
        policy
            .validate("IMAGE/PNG; charset=binary", DEFAULT_MAX_UPLOAD_BYTES)
            .expect("png at the cap allowed");
    }

    #[test]
    fn policy_rejects_other_types_and_oversized_payloads() {
        let policy = UploadPolicy::default();
        assert!(matches!(
            policy.validate("image/gif", 1),
            Err(ValidationError::UnsupportedContentType(value)) if value == "image/gif"
        ));
        assert_eq!(
            policy.validate("image/png", DEFAULT_MAX_UPLOAD_BYTES + 1),
            Err(ValidationError::PayloadTooLarge {
                size: DEFAULT_MAX_UPLOAD_BYTES + 1,
                max: DEFAULT_MAX_UPLOAD_BYTES,
            })
        );
    }

    #[test]
    fn handle_rejects_path_characters() {
        assert!(BlobHandle::new("../etc/passwd").is_err());
        assert!(BlobHandle::new("").is_err());
        assert!(BlobHandle::new("abc_DEF-123").is_ok());
    }

    #[test]
    fn content_handle_is_stable_hex() {
        let first = content_handle(b"png bytes");
        let second = content_handle(b"png bytes");
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert_ne!(first, content_handle(b"other bytes"));
    }
}
