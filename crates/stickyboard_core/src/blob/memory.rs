//! In-process blob store for tests and ephemeral boards.

use super::{content_handle, BlobError, BlobHandle, BlobResult, BlobStore, UploadTarget};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    blobs: HashMap<BlobHandle, Vec<u8>>,
    pending: HashSet<String>,
}

/// Blob store holding bytes in memory. Upload targets never expire.
#[derive(Default)]
pub struct MemoryBlobStore {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops stored bytes, simulating an expired or purged blob.
    pub fn purge(&self, handle: &BlobHandle) -> bool {
        self.lock()
            .map(|mut state| state.blobs.remove(handle).is_some())
            .unwrap_or(false)
    }

    /// Makes every subsequent call fail with `BlobError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> BlobResult<std::sync::MutexGuard<'_, MemoryState>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("memory store offline".to_string()));
        }
        self.state
            .lock()
            .map_err(|_| BlobError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl BlobStore for MemoryBlobStore {
    fn create_upload_target(&self) -> BlobResult<UploadTarget> {
        let token = Uuid::new_v4().simple().to_string();
        self.lock()?.pending.insert(token.clone());
        Ok(UploadTarget {
            url: format!("memory://upload/{token}"),
            token,
            expires_at: u64::MAX,
        })
    }

    fn upload(&self, token: &str, _content_type: &str, bytes: &[u8]) -> BlobResult<BlobHandle> {
        let mut state = self.lock()?;
        if !state.pending.remove(token) {
            return Err(BlobError::UnknownUploadTarget(token.to_string()));
        }
        let handle = content_handle(bytes);
        state.blobs.insert(handle.clone(), bytes.to_vec());
        Ok(handle)
    }

    fn resolve_read_url(&self, handle: &BlobHandle) -> BlobResult<Option<String>> {
        let state = self.lock()?;
        Ok(state
            .blobs
            .contains_key(handle)
            .then(|| format!("memory://blobs/{handle}")))
    }

    fn contains(&self, handle: &BlobHandle) -> BlobResult<bool> {
        Ok(self.lock()?.blobs.contains_key(handle))
    }
}
