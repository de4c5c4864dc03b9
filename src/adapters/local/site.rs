//! Record lists and case sites stored as plain files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{contained, read_json, write_json};
use crate::error::PortError;
use crate::ports::{
    CaseSite, FieldMap, Filter, NavNode, NavPosition, PortFuture, Record, RecordStore, Role,
    SiteConnector,
};

/// Maps a site URL to a directory name: scheme dropped, other punctuation folded to `_`.
#[must_use]
pub fn site_slug(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .trim_end_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// Opens stores and sites under `<data>/sites/<slug>`.
pub struct LocalConnector {
    root: PathBuf,
}

impl LocalConnector {
    /// Creates a connector rooted at the data directory.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self { root: data_dir.join("sites") }
    }

    fn site_dir(&self, url: &str) -> PathBuf {
        self.root.join(site_slug(url))
    }
}

impl SiteConnector for LocalConnector {
    fn open_store<'a>(&'a self, site_url: &'a str) -> PortFuture<'a, Box<dyn RecordStore>> {
        let store = LocalStore::new(&self.site_dir(site_url));
        Box::pin(std::future::ready(Ok(Box::new(store) as Box<dyn RecordStore>)))
    }

    fn open_site<'a>(&'a self, site_url: &'a str) -> PortFuture<'a, Box<dyn CaseSite>> {
        let site = LocalSite::new(site_url, &self.site_dir(site_url));
        Box::pin(std::future::ready(Ok(Box::new(site) as Box<dyn CaseSite>)))
    }
}

/// Lists kept as JSON arrays of records in `lists/<list>.json`.
pub struct LocalStore {
    lists: PathBuf,
}

impl LocalStore {
    /// Creates a store over `<site_dir>/lists`.
    #[must_use]
    pub fn new(site_dir: &Path) -> Self {
        Self { lists: site_dir.join("lists") }
    }

    fn list_path(&self, list: &str) -> Result<PathBuf, PortError> {
        contained(&self.lists, &format!("{list}.json"))
    }

    fn load(&self, list: &str) -> Result<Vec<Record>, PortError> {
        read_json(&self.list_path(list)?)
    }

    fn save(&self, list: &str, records: &[Record]) -> Result<(), PortError> {
        write_json(&self.list_path(list)?, &records)
    }

    fn create_now(&self, list: &str, fields: FieldMap) -> Result<String, PortError> {
        let mut records = self.load(list)?;
        let next = records.iter().filter_map(|r| r.id.parse::<u64>().ok()).max().unwrap_or(0) + 1;
        let id = next.to_string();
        records.push(Record { id: id.clone(), created: Utc::now(), fields });
        self.save(list, &records)?;
        Ok(id)
    }

    fn update_now(&self, list: &str, id: &str, changes: FieldMap) -> Result<(), PortError> {
        let mut records = self.load(list)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PortError::NotFound(format!("{list}/{id}")))?;
        record.fields.extend(changes);
        self.save(list, &records)
    }
}

impl RecordStore for LocalStore {
    fn query<'a>(&'a self, list: &'a str, filter: &'a Filter) -> PortFuture<'a, Vec<Record>> {
        let result = self
            .load(list)
            .map(|records| records.into_iter().filter(|r| filter.matches(r)).collect());
        Box::pin(std::future::ready(result))
    }

    fn get<'a>(&'a self, list: &'a str, id: &'a str) -> PortFuture<'a, Option<Record>> {
        let result = self.load(list).map(|records| records.into_iter().find(|r| r.id == id));
        Box::pin(std::future::ready(result))
    }

    fn create<'a>(&'a self, list: &'a str, fields: FieldMap) -> PortFuture<'a, String> {
        Box::pin(std::future::ready(self.create_now(list, fields)))
    }

    fn update<'a>(&'a self, list: &'a str, id: &'a str, changes: FieldMap) -> PortFuture<'a, ()> {
        Box::pin(std::future::ready(self.update_now(list, id, changes)))
    }
}

/// Permission and navigation state of a local site.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SiteState {
    site_roles: BTreeMap<String, Role>,
    folder_roles: BTreeMap<String, BTreeMap<String, Role>>,
    navigation: Vec<NavNode>,
    next_node: u64,
}

/// A case site whose documents live under `files/` and whose metadata is `site.json`.
pub struct LocalSite {
    url: String,
    files: PathBuf,
    state_path: PathBuf,
}

impl LocalSite {
    /// Creates a site rooted at `site_dir`.
    #[must_use]
    pub fn new(url: &str, site_dir: &Path) -> Self {
        Self {
            url: url.to_string(),
            files: site_dir.join("files"),
            state_path: site_dir.join("site.json"),
        }
    }

    fn folder(&self, folder: &str) -> Result<PathBuf, PortError> {
        let path = contained(&self.files, folder)?;
        if path.is_dir() {
            Ok(path)
        } else {
            Err(PortError::NotFound(format!("folder {folder}")))
        }
    }

    fn with_state<T>(
        &self,
        change: impl FnOnce(&mut SiteState) -> Result<T, PortError>,
    ) -> Result<T, PortError> {
        let mut state: SiteState = read_json(&self.state_path)?;
        let value = change(&mut state)?;
        write_json(&self.state_path, &state)?;
        Ok(value)
    }

    fn upload_now(&self, folder: &str, filename: &str, content: &[u8]) -> Result<(), PortError> {
        let path = contained(&self.folder(folder)?, filename)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn break_now(&self, folder: &str) -> Result<(), PortError> {
        self.folder(folder)?;
        self.with_state(|state| {
            if !state.folder_roles.contains_key(folder) {
                let copied = state.site_roles.clone();
                state.folder_roles.insert(folder.to_string(), copied);
            }
            Ok(())
        })
    }

    fn add_navigation_now(
        &self,
        title: &str,
        url: &str,
        position: NavPosition,
    ) -> Result<NavNode, PortError> {
        self.with_state(|state| {
            state.next_node += 1;
            let node =
                NavNode { id: state.next_node.to_string(), title: title.into(), url: url.into() };
            let index = match position {
                NavPosition::After(id) => state
                    .navigation
                    .iter()
                    .position(|n| n.id == id)
                    .map_or(state.navigation.len(), |i| i + 1),
                NavPosition::Last => state.navigation.len(),
            };
            state.navigation.insert(index, node.clone());
            Ok(node)
        })
    }
}

impl CaseSite for LocalSite {
    fn url(&self) -> &str {
        &self.url
    }

    fn ensure_folder<'a>(&'a self, path: &'a str) -> PortFuture<'a, ()> {
        let result = contained(&self.files, path)
            .and_then(|dir| std::fs::create_dir_all(dir).map_err(PortError::from));
        Box::pin(std::future::ready(result))
    }

    fn upload_file<'a>(
        &'a self,
        folder: &'a str,
        filename: &'a str,
        content: Vec<u8>,
    ) -> PortFuture<'a, ()> {
        Box::pin(std::future::ready(self.upload_now(folder, filename, &content)))
    }

    fn reset_role_inheritance<'a>(&'a self, folder: &'a str) -> PortFuture<'a, ()> {
        let result = self.folder(folder).and_then(|_| {
            self.with_state(|state| {
                state.folder_roles.remove(folder);
                Ok(())
            })
        });
        Box::pin(std::future::ready(result))
    }

    fn break_role_inheritance<'a>(&'a self, folder: &'a str) -> PortFuture<'a, ()> {
        Box::pin(std::future::ready(self.break_now(folder)))
    }

    fn role_principals<'a>(&'a self, folder: &'a str) -> PortFuture<'a, Vec<String>> {
        let result = read_json::<SiteState>(&self.state_path).map(|state| {
            let roles = state.folder_roles.get(folder).unwrap_or(&state.site_roles);
            roles.keys().cloned().collect()
        });
        Box::pin(std::future::ready(result))
    }

    fn set_role<'a>(
        &'a self,
        folder: &'a str,
        principal: &'a str,
        role: Role,
    ) -> PortFuture<'a, ()> {
        let result = self.with_state(|state| match state.folder_roles.get_mut(folder) {
            Some(roles) => {
                roles.insert(principal.to_string(), role);
                Ok(())
            }
            None => Err(PortError::Conflict(format!("folder {folder} inherits permissions"))),
        });
        Box::pin(std::future::ready(result))
    }

    fn navigation(&self) -> PortFuture<'_, Vec<NavNode>> {
        let result = read_json::<SiteState>(&self.state_path).map(|state| state.navigation);
        Box::pin(std::future::ready(result))
    }

    fn add_navigation<'a>(
        &'a self,
        title: &'a str,
        url: &'a str,
        position: NavPosition,
    ) -> PortFuture<'a, NavNode> {
        Box::pin(std::future::ready(self.add_navigation_now(title, url, position)))
    }
}
