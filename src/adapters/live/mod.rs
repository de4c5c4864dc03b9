//! Adapters for the real external services.

pub mod blobs;
pub mod clock;
pub mod directory;
pub mod graph;
pub mod id_gen;
pub mod mail;

pub use blobs::HttpBlobStore;
pub use clock::LiveClock;
pub use directory::GraphDirectory;
pub use graph::GraphClient;
pub use id_gen::UuidRunIds;
pub use mail::GraphMailer;
