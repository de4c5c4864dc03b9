//! Blobs as files under `<data>/blobs`.

use std::path::{Path, PathBuf};

use super::contained;
use crate::error::PortError;
use crate::ports::{BlobStore, PortFuture};

/// Serves blob keys as relative file paths.
pub struct LocalBlobs {
    root: PathBuf,
}

impl LocalBlobs {
    /// Uses `<data_dir>/blobs`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self { root: data_dir.join("blobs") }
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, PortError> {
        let path = contained(&self.root, key)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PortError::NotFound(format!("blob {key}")),
            _ => PortError::Io(e),
        })
    }
}

impl BlobStore for LocalBlobs {
    fn fetch<'a>(&'a self, key: &'a str) -> PortFuture<'a, Vec<u8>> {
        Box::pin(std::future::ready(self.read(key)))
    }
}
