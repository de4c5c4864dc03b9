//! Directory read from and written back to `directory.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{read_json, write_json};
use crate::error::PortError;
use crate::ports::{DirectoryGroups, PortFuture};

/// On-disk layout of the directory file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryFile {
    /// User id to email address.
    pub users: BTreeMap<String, String>,
    /// Groups by id.
    pub groups: BTreeMap<String, GroupEntry>,
}

/// One group: owner addresses and member user ids.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupEntry {
    /// Owner email addresses.
    pub owners: Vec<String>,
    /// Member user ids.
    pub members: Vec<String>,
}

/// Directory adapter over a JSON file, re-read on every call.
pub struct LocalDirectory {
    path: PathBuf,
}

impl LocalDirectory {
    /// Uses `<data_dir>/directory.json`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("directory.json") }
    }

    fn load(&self) -> Result<DirectoryFile, PortError> {
        read_json(&self.path)
    }

    fn group<'f>(file: &'f DirectoryFile, group_id: &str) -> Result<&'f GroupEntry, PortError> {
        file.groups.get(group_id).ok_or_else(|| PortError::NotFound(format!("group {group_id}")))
    }

    fn member_addresses(&self, group_id: &str) -> Result<Vec<String>, PortError> {
        let file = self.load()?;
        let group = Self::group(&file, group_id)?;
        Ok(group
            .members
            .iter()
            .map(|id| file.users.get(id).cloned().unwrap_or_else(|| id.clone()).to_lowercase())
            .collect())
    }

    fn change_membership(&self, group_id: &str, user_id: &str, add: bool) -> Result<(), PortError> {
        let mut file = self.load()?;
        let group = file
            .groups
            .get_mut(group_id)
            .ok_or_else(|| PortError::NotFound(format!("group {group_id}")))?;
        let present = group.members.iter().any(|m| m == user_id);
        match (add, present) {
            (true, true) => {
                return Err(PortError::Conflict(format!("{user_id} already in {group_id}")));
            }
            (false, false) => {
                return Err(PortError::NotFound(format!("{user_id} not in {group_id}")));
            }
            (true, false) => group.members.push(user_id.to_string()),
            (false, true) => group.members.retain(|m| m != user_id),
        }
        write_json(&self.path, &file)
    }

    fn invite_now(&self, email: &str) -> Result<String, PortError> {
        let mut file = self.load()?;
        if let Some((id, _)) = file.users.iter().find(|(_, a)| a.eq_ignore_ascii_case(email)) {
            return Ok(id.clone());
        }
        let guests = file.users.keys().filter(|id| id.starts_with("guest-")).count();
        let id = format!("guest-{}", guests + 1);
        file.users.insert(id.clone(), email.to_lowercase());
        write_json(&self.path, &file)?;
        info!(user = %id, email, "guest user added to directory file");
        Ok(id)
    }
}

impl DirectoryGroups for LocalDirectory {
    fn members<'a>(&'a self, group_id: &'a str) -> PortFuture<'a, Vec<String>> {
        Box::pin(std::future::ready(self.member_addresses(group_id)))
    }

    fn owners<'a>(&'a self, group_id: &'a str) -> PortFuture<'a, Vec<String>> {
        let result = self.load().and_then(|file| {
            Self::group(&file, group_id)
                .map(|g| g.owners.iter().map(|o| o.to_lowercase()).collect())
        });
        Box::pin(std::future::ready(result))
    }

    fn add_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, ()> {
        Box::pin(std::future::ready(self.change_membership(group_id, user_id, true)))
    }

    fn remove_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, ()> {
        Box::pin(std::future::ready(self.change_membership(group_id, user_id, false)))
    }

    fn is_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, bool> {
        let result = self.load().and_then(|file| {
            Self::group(&file, group_id).map(|g| g.members.iter().any(|m| m == user_id))
        });
        Box::pin(std::future::ready(result))
    }

    fn user_id_for_email<'a>(&'a self, email: &'a str) -> PortFuture<'a, Option<String>> {
        let result = self.load().map(|file| {
            file.users
                .iter()
                .find(|(_, address)| address.eq_ignore_ascii_case(email))
                .map(|(id, _)| id.clone())
        });
        Box::pin(std::future::ready(result))
    }

    fn user_principal_name<'a>(&'a self, user_id: &'a str) -> PortFuture<'a, Option<String>> {
        let result = self.load().map(|file| file.users.get(user_id).cloned());
        Box::pin(std::future::ready(result))
    }

    fn invite_guest<'a>(
        &'a self,
        email: &'a str,
        _redirect_url: &'a str,
    ) -> PortFuture<'a, String> {
        Box::pin(std::future::ready(self.invite_now(email)))
    }
}
