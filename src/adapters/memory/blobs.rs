//! In-memory blob store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::PortError;
use crate::ports::{BlobStore, PortFuture};

/// Blob store backed by a shared map.
#[derive(Clone, Default)]
pub struct MemoryBlobs {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fetches: Arc<Mutex<Vec<String>>>,
}

impl MemoryBlobs {
    /// Stores `content` under `key`.
    pub fn put(&self, key: &str, content: impl Into<Vec<u8>>) {
        self.blobs.lock().expect("blob lock poisoned").insert(key.to_string(), content.into());
    }

    /// Keys fetched so far, in order.
    #[must_use]
    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().expect("blob lock poisoned").clone()
    }
}

impl BlobStore for MemoryBlobs {
    fn fetch<'a>(&'a self, key: &'a str) -> PortFuture<'a, Vec<u8>> {
        self.fetches.lock().expect("blob lock poisoned").push(key.to_string());
        let result = self
            .blobs
            .lock()
            .expect("blob lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("blob {key}")));
        Box::pin(std::future::ready(result))
    }
}
