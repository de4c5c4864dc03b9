//! Filesystem-backed adapters used by the binary for local runs.
//!
//! Everything lives under one data directory:
//!
//! ```text
//! <data>/sites/<slug>/lists/<list>.json   record lists
//! <data>/sites/<slug>/files/...           site document folders
//! <data>/sites/<slug>/site.json           permissions and navigation
//! <data>/directory.json                   users and groups
//! <data>/blobs/<key>                      blob contents
//! <data>/outbox/<n>.json                  sent mail
//! ```

use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PortError;

pub mod blobs;
pub mod directory;
pub mod outbox;
pub mod site;

pub use blobs::LocalBlobs;
pub use directory::LocalDirectory;
pub use outbox::LocalOutbox;
pub use site::{LocalConnector, LocalSite, LocalStore};

/// Reads a JSON document, or the default value when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, PortError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Writes a JSON document, creating parent directories.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PortError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Joins a `/`-separated relative path under `root`, refusing parent or absolute components.
pub(crate) fn contained(root: &Path, relative: &str) -> Result<PathBuf, PortError> {
    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => {
                return Err(PortError::Rejected {
                    status: 400,
                    body: format!("path {relative} escapes {}", root.display()),
                })
            }
        }
    }
    Ok(path)
}
