//! In-process adapters holding all state in memory.
//!
//! Used by the test suites to drive full passes without touching disk or
//! network. Handles are cheap to clone and share their state, so a test can
//! keep one handle for assertions while the context owns another.

use chrono::{DateTime, Utc};

use crate::context::ServiceContext;

pub mod blobs;
pub mod clock;
pub mod directory;
pub mod id_gen;
pub mod notifier;
pub mod records;
pub mod site;

pub use blobs::MemoryBlobs;
pub use clock::FixedClock;
pub use directory::MemoryDirectory;
pub use id_gen::SequentialIds;
pub use notifier::MemoryOutbox;
pub use records::MemoryStore;
pub use site::{MemoryConnector, MemorySite};

/// Handles onto one shared set of in-memory adapters.
///
/// [`MemoryServices::context`] boxes clones into a [`ServiceContext`]; the
/// handles kept here observe everything the passes do.
#[derive(Clone)]
pub struct MemoryServices {
    /// Pinned clock.
    pub clock: FixedClock,
    /// Stores and sites by URL.
    pub connector: MemoryConnector,
    /// Users and groups.
    pub directory: MemoryDirectory,
    /// Document contents.
    pub blobs: MemoryBlobs,
    /// Sent mail.
    pub outbox: MemoryOutbox,
}

impl MemoryServices {
    /// Creates empty adapters with the clock pinned at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            clock: FixedClock::new(now),
            connector: MemoryConnector::default(),
            directory: MemoryDirectory::default(),
            blobs: MemoryBlobs::default(),
            outbox: MemoryOutbox::default(),
        }
    }

    /// Registers a fresh store at `site_url` and returns a handle to it.
    #[must_use]
    pub fn store(&self, site_url: &str) -> MemoryStore {
        let store = MemoryStore::default();
        self.connector.add_store(site_url, store.clone());
        store
    }

    /// Builds a context over these adapters.
    #[must_use]
    pub fn context(&self) -> ServiceContext {
        ServiceContext {
            clock: Box::new(self.clock.clone()),
            ids: Box::new(SequentialIds::default()),
            connector: Box::new(self.connector.clone()),
            directory: Box::new(self.directory.clone()),
            blobs: Box::new(self.blobs.clone()),
            notifier: Box::new(self.outbox.clone()),
        }
    }
}
