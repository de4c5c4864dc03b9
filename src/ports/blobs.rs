//! Blob store port for fetching uploaded document content.

use super::PortFuture;

/// Fetches document bytes by opaque content key.
///
/// Keys are independent of the display filename a document is placed under.
pub trait BlobStore: Send + Sync {
    /// Returns the full content stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PortError::NotFound`] when no blob has that key,
    /// or another variant if the transfer fails.
    fn fetch<'a>(&'a self, key: &'a str) -> PortFuture<'a, Vec<u8>>;
}
