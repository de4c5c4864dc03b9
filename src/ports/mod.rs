//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the reconciliation core and an
//! external system (time, ids, record stores, case sites, the directory,
//! blob storage, mail). Implementations live in `src/adapters/`.

use std::future::Future;
use std::pin::Pin;

use crate::error::PortError;

pub mod blobs;
pub mod clock;
pub mod directory;
pub mod id_gen;
pub mod notifier;
pub mod records;
pub mod site;

pub use blobs::BlobStore;
pub use clock::Clock;
pub use directory::DirectoryGroups;
pub use id_gen::IdGenerator;
pub use notifier::{Email, Notifier};
pub use records::{FieldMap, Filter, Record, RecordStore};
pub use site::{CaseSite, NavNode, NavPosition, Role, SiteConnector};

/// Boxed future returned by async port methods, keeping the traits dyn-compatible.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PortError>> + Send + 'a>>;
