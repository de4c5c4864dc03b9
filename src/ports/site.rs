//! Case site port: document folders, folder permissions and navigation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::records::RecordStore;
use super::PortFuture;

/// Permission level granted to a principal on a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Reader,
    /// Read and write access.
    Contributor,
    /// Full control.
    Owner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reader => "reader",
            Self::Contributor => "contributor",
            Self::Owner => "owner",
        };
        f.write_str(name)
    }
}

/// A quick-navigation entry of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavNode {
    /// Site-assigned node id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Link target.
    pub url: String,
}

/// Where a new navigation node is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavPosition {
    /// Directly after the node with this id.
    After(String),
    /// At the end of the navigation.
    Last,
}

/// One provisioned case site.
///
/// Folder paths are `/`-separated and relative to the site root, e.g.
/// `Shared Documents/PA Submission/Call in`.
pub trait CaseSite: Send + Sync {
    /// The site URL this session is bound to.
    fn url(&self) -> &str;

    /// Creates every missing folder along `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if a folder cannot be created.
    fn ensure_folder<'a>(&'a self, path: &'a str) -> PortFuture<'a, ()>;

    /// Writes a file into an existing folder, replacing any file of that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder is missing or the write fails.
    fn upload_file<'a>(
        &'a self,
        folder: &'a str,
        filename: &'a str,
        content: Vec<u8>,
    ) -> PortFuture<'a, ()>;

    /// Drops folder-specific permissions so the folder inherits from its parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder does not exist or the change fails.
    fn reset_role_inheritance<'a>(&'a self, folder: &'a str) -> PortFuture<'a, ()>;

    /// Gives the folder its own permissions, copying the inherited assignments.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder does not exist or the change fails.
    fn break_role_inheritance<'a>(&'a self, folder: &'a str) -> PortFuture<'a, ()>;

    /// Lists principals holding any role on the folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the assignments cannot be read.
    fn role_principals<'a>(&'a self, folder: &'a str) -> PortFuture<'a, Vec<String>>;

    /// Sets `role` as the principal's only role on the folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder has inherited permissions or the change fails.
    fn set_role<'a>(&'a self, folder: &'a str, principal: &'a str, role: Role)
        -> PortFuture<'a, ()>;

    /// Returns the quick-navigation nodes in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the navigation cannot be read.
    fn navigation(&self) -> PortFuture<'_, Vec<NavNode>>;

    /// Inserts a navigation node and returns it with its assigned id.
    ///
    /// Not idempotent: calling twice creates two nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be added.
    fn add_navigation<'a>(
        &'a self,
        title: &'a str,
        url: &'a str,
        position: NavPosition,
    ) -> PortFuture<'a, NavNode>;
}

/// Opens per-pass connections to record stores and case sites.
///
/// Connections are released when the returned box is dropped, so every exit
/// path of a pass (including `?` and early returns) closes them.
pub trait SiteConnector: Send + Sync {
    /// Opens the record store hosted at `site_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn open_store<'a>(&'a self, site_url: &'a str) -> PortFuture<'a, Box<dyn RecordStore>>;

    /// Opens the case site at `site_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the site cannot be reached.
    fn open_site<'a>(&'a self, site_url: &'a str) -> PortFuture<'a, Box<dyn CaseSite>>;
}
