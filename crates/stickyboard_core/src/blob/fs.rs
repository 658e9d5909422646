//! Filesystem-backed blob store with signed, expiring read URLs.
//!
//! # Invariants
//! - Blobs live at `<root>/<first two hex chars>/<handle>`; writes go through
//!   a temp file and rename so readers never see partial content.
//! - Read URLs carry `expires` and a keyed blake3 MAC over
//!   `"{handle}:{expires}"`.

use super::{
    content_handle, now_unix_secs, BlobError, BlobHandle, BlobResult, BlobStore, UploadTarget,
};
use crate::config::BlobConfig;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

const SIGNING_CONTEXT: &str = "stickyboard 2024 blob read url signing";

static READ_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(?P<handle>[0-9a-f]{64})\?expires=(?P<expires>\d+)&sig=(?P<sig>[0-9a-f]{64})$")
        .expect("valid read url regex")
});

/// Blob store keeping content-addressed files under one root directory.
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
    key: [u8; 32],
    url_ttl_secs: u64,
    upload_ttl_secs: u64,
    pending: Mutex<HashMap<String, u64>>,
}

impl FsBlobStore {
    /// Opens (and creates when missing) the blob root from config.
    pub fn open(config: &BlobConfig) -> BlobResult<Self> {
        fs::create_dir_all(&config.root)?;
        info!(
            "event=blob_open module=blob status=ok root={}",
            config.root.display()
        );
        Ok(Self {
            root: config.root.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key: signing_key(&config.signing_key),
            url_ttl_secs: config.url_ttl_secs,
            upload_ttl_secs: config.upload_ttl_secs,
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deletes stored bytes. Notes still referencing the handle resolve to no
    /// URL afterwards.
    pub fn delete(&self, handle: &BlobHandle) -> BlobResult<bool> {
        let path = self.blob_path(handle)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn blob_path(&self, handle: &BlobHandle) -> BlobResult<PathBuf> {
        let value = handle.as_str();
        if !is_content_hex(value) {
            return Err(BlobError::InvalidHandle(value.to_string()));
        }
        Ok(self.root.join(&value[..2]).join(value))
    }

    fn sign(&self, handle: &BlobHandle, expires: u64) -> blake3::Hash {
        blake3::keyed_hash(&self.key, format!("{handle}:{expires}").as_bytes())
    }

    fn take_pending(&self, token: &str) -> BlobResult<u64> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| BlobError::Unavailable("upload registry lock poisoned".to_string()))?;
        pending
            .remove(token)
            .ok_or_else(|| BlobError::UnknownUploadTarget(token.to_string()))
    }
}

impl BlobStore for FsBlobStore {
    fn create_upload_target(&self) -> BlobResult<UploadTarget> {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = now_unix_secs().saturating_add(self.upload_ttl_secs);
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| BlobError::Unavailable("upload registry lock poisoned".to_string()))?;
        let now = now_unix_secs();
        pending.retain(|_, expiry| *expiry > now);
        pending.insert(token.clone(), expires_at);

        Ok(UploadTarget {
            url: format!("{}/upload/{token}", self.base_url),
            token,
            expires_at,
        })
    }

    fn upload(&self, token: &str, content_type: &str, bytes: &[u8]) -> BlobResult<BlobHandle> {
        let expires_at = self.take_pending(token)?;
        if now_unix_secs() >= expires_at {
            return Err(BlobError::UploadTargetExpired(token.to_string()));
        }

        let handle = content_handle(bytes);
        let path = self.blob_path(&handle)?;
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let staging = path.with_extension(format!("tmp-{token}"));
            fs::write(&staging, bytes)?;
            fs::rename(&staging, &path)?;
        }

        debug!(
            "event=blob_upload module=blob status=ok handle={handle} content_type={content_type} size={}",
            bytes.len()
        );
        Ok(handle)
    }

    fn resolve_read_url(&self, handle: &BlobHandle) -> BlobResult<Option<String>> {
        if !self.contains(handle)? {
            return Ok(None);
        }
        let expires = now_unix_secs().saturating_add(self.url_ttl_secs);
        let sig = self.sign(handle, expires);
        Ok(Some(format!(
            "{}/{handle}?expires={expires}&sig={}",
            self.base_url,
            sig.to_hex()
        )))
    }

    fn contains(&self, handle: &BlobHandle) -> BlobResult<bool> {
        Ok(self.blob_path(handle)?.is_file())
    }
}

/// Checks a read URL issued by an [`FsBlobStore`] using the same signing key.
///
/// Returns the handle when the signature matches and `expires` is still in
/// the future at `now_unix_secs`.
pub fn verify_read_url(secret: &str, url: &str, now_unix_secs: u64) -> Option<BlobHandle> {
    let captures = READ_URL_RE.captures(url)?;
    let handle = BlobHandle::new(captures.name("handle")?.as_str()).ok()?;
    let expires: u64 = captures.name("expires")?.as_str().parse().ok()?;
    let presented = blake3::Hash::from_hex(captures.name("sig")?.as_str()).ok()?;

    if now_unix_secs >= expires {
        return None;
    }
    let expected = blake3::keyed_hash(
        &signing_key(secret),
        format!("{handle}:{expires}").as_bytes(),
    );
    // blake3::Hash equality is constant time.
    (expected == presented).then_some(handle)
}

fn signing_key(secret: &str) -> [u8; 32] {
    blake3::derive_key(SIGNING_CONTEXT, secret.as_bytes())
}

fn is_content_hex(value: &str) -> bool {
    value.len() == 64
        && value
            .chars()
            .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch))
}

#[cfg(test)]
mod tests {
    use super::{verify_read_url, FsBlobStore};
    use crate::blob::{now_unix_secs, BlobError, BlobHandle, BlobStore};
    use crate::config::BlobConfig;

    fn store(dir: &tempfile::TempDir, upload_ttl_secs: u64) -> FsBlobStore {
        FsBlobStore::open(&BlobConfig {
            root: dir.path().join("blobs"),
            base_url: "http://localhost:8080/blobs/".to_string(),
            signing_key: "test-secret".to_string(),
            url_ttl_secs: 60,
            upload_ttl_secs,
        })
        .expect("store should open")
    }

    #[test]
    fn upload_then_resolve_produces_verifiable_url() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store(&dir, 60);

        let target = store.create_upload_target().expect("target");
        assert!(target.url.starts_with("http://localhost:8080/blobs/upload/"));
        let handle = store
            .upload(&target.token, "image/png", b"\x89PNG fake")
            .expect("upload");
        assert!(store.contains(&handle).expect("contains"));

        let url = store
            .resolve_read_url(&handle)
            .expect("resolve")
            .expect("url for stored blob");
        assert_eq!(
            verify_read_url("test-secret", &url, now_unix_secs()),
            Some(handle.clone())
        );
        assert_eq!(verify_read_url("other-secret", &url, now_unix_secs()), None);
        assert_eq!(verify_read_url("test-secret", &url, u64::MAX), None);
    }

    #[test]
    fn upload_tokens_are_single_use() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store(&dir, 60);

        let target = store.create_upload_target().expect("target");
        store.upload(&target.token, "image/png", b"one").expect("first upload");
        let err = store
            .upload(&target.token, "image/png", b"two")
            .expect_err("token reuse must fail");
        assert!(matches!(err, BlobError::UnknownUploadTarget(_)));
    }

    #[test]
    fn zero_ttl_upload_target_is_expired() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store(&dir, 0);

        let target = store.create_upload_target().expect("target");
        let err = store
            .upload(&target.token, "image/png", b"late")
            .expect_err("expired token must fail");
        assert!(matches!(err, BlobError::UploadTargetExpired(_)));
    }

    #[test]
    fn deleted_blob_resolves_to_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store(&dir, 60);

        let target = store.create_upload_target().expect("target");
        let handle = store.upload(&target.token, "image/jpeg", b"jpeg").expect("upload");
        assert!(store.delete(&handle).expect("delete"));
        assert_eq!(store.resolve_read_url(&handle).expect("resolve"), None);
    }

    #[test]
    fn foreign_handle_shape_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store(&dir, 60);
        let handle = BlobHandle::new("not-a-digest").expect("syntactically valid");
        assert!(matches!(
            store.resolve_read_url(&handle),
            Err(BlobError::InvalidHandle(_))
        ));
    }
}
