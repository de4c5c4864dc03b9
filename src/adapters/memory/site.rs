//! In-memory case sites and the connector that hands out sessions.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::PortError;
use crate::ports::{
    CaseSite, FieldMap, Filter, NavNode, NavPosition, PortFuture, Record, RecordStore, Role,
    SiteConnector,
};

use super::records::MemoryStore;

#[derive(Default)]
struct SiteState {
    folders: BTreeSet<String>,
    files: BTreeMap<(String, String), Vec<u8>>,
    site_roles: BTreeMap<String, Role>,
    folder_roles: BTreeMap<String, BTreeMap<String, Role>>,
    navigation: Vec<NavNode>,
    next_node: u64,
    failing_files: HashSet<String>,
    failing_permissions: bool,
}

/// A case site whose folders, permissions and navigation live in memory.
#[derive(Clone)]
pub struct MemorySite {
    url: String,
    state: Arc<Mutex<SiteState>>,
}

impl MemorySite {
    /// Creates an empty site at `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self { url: url.to_string(), state: Arc::new(Mutex::new(SiteState::default())) }
    }

    /// Grants a site-level role; folders inherit these until inheritance is broken.
    pub fn grant_site_role(&self, principal: &str, role: Role) {
        self.lock().site_roles.insert(principal.to_string(), role);
    }

    /// Appends an existing navigation node.
    pub fn push_navigation(&self, title: &str, url: &str) {
        let mut state = self.lock();
        state.next_node += 1;
        let node =
            NavNode { id: state.next_node.to_string(), title: title.into(), url: url.into() };
        state.navigation.push(node);
    }

    /// Makes uploads of `filename` fail.
    pub fn fail_uploads_of(&self, filename: &str) {
        self.lock().failing_files.insert(filename.to_string());
    }

    /// Makes permission changes fail.
    pub fn fail_permissions(&self) {
        self.lock().failing_permissions = true;
    }

    /// Names of files in `folder`, sorted.
    #[must_use]
    pub fn files_in(&self, folder: &str) -> Vec<String> {
        self.lock()
            .files
            .keys()
            .filter(|(f, _)| f == folder)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Content of one file.
    #[must_use]
    pub fn file(&self, folder: &str, name: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&(folder.to_string(), name.to_string())).cloned()
    }

    /// Every folder created so far.
    #[must_use]
    pub fn folders(&self) -> Vec<String> {
        self.lock().folders.iter().cloned().collect()
    }

    /// Unique role assignments on a folder; `None` while it inherits.
    #[must_use]
    pub fn folder_roles(&self, folder: &str) -> Option<BTreeMap<String, Role>> {
        self.lock().folder_roles.get(folder).cloned()
    }

    /// Current navigation, in order.
    #[must_use]
    pub fn navigation_nodes(&self) -> Vec<NavNode> {
        self.lock().navigation.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SiteState> {
        self.state.lock().expect("site lock poisoned")
    }

    fn require_folder(state: &SiteState, folder: &str) -> Result<(), PortError> {
        if state.folders.contains(folder) {
            Ok(())
        } else {
            Err(PortError::NotFound(format!("folder {folder}")))
        }
    }

    fn permissions_available(state: &SiteState) -> Result<(), PortError> {
        if state.failing_permissions {
            Err(PortError::Rejected { status: 403, body: "access denied".into() })
        } else {
            Ok(())
        }
    }
}

impl CaseSite for MemorySite {
    fn url(&self) -> &str {
        &self.url
    }

    fn ensure_folder<'a>(&'a self, path: &'a str) -> PortFuture<'a, ()> {
        let mut state = self.lock();
        let mut prefix = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            state.folders.insert(prefix.clone());
        }
        Box::pin(std::future::ready(Ok(())))
    }

    fn upload_file<'a>(
        &'a self,
        folder: &'a str,
        filename: &'a str,
        content: Vec<u8>,
    ) -> PortFuture<'a, ()> {
        let mut state = self.lock();
        let result = Self::require_folder(&state, folder).and_then(|()| {
            if state.failing_files.contains(filename) {
                return Err(PortError::Transient(format!("upload of {filename} timed out")));
            }
            state.files.insert((folder.to_string(), filename.to_string()), content);
            Ok(())
        });
        Box::pin(std::future::ready(result))
    }

    fn reset_role_inheritance<'a>(&'a self, folder: &'a str) -> PortFuture<'a, ()> {
        let mut state = self.lock();
        let result = Self::permissions_available(&state)
            .and_then(|()| Self::require_folder(&state, folder))
            .map(|()| {
                state.folder_roles.remove(folder);
            });
        Box::pin(std::future::ready(result))
    }

    fn break_role_inheritance<'a>(&'a self, folder: &'a str) -> PortFuture<'a, ()> {
        let mut state = self.lock();
        let result = Self::permissions_available(&state)
            .and_then(|()| Self::require_folder(&state, folder))
            .map(|()| {
                if !state.folder_roles.contains_key(folder) {
                    let copied = state.site_roles.clone();
                    state.folder_roles.insert(folder.to_string(), copied);
                }
            });
        Box::pin(std::future::ready(result))
    }

    fn role_principals<'a>(&'a self, folder: &'a str) -> PortFuture<'a, Vec<String>> {
        let state = self.lock();
        let roles = state.folder_roles.get(folder).unwrap_or(&state.site_roles);
        let principals = roles.keys().cloned().collect();
        Box::pin(std::future::ready(Ok(principals)))
    }

    fn set_role<'a>(
        &'a self,
        folder: &'a str,
        principal: &'a str,
        role: Role,
    ) -> PortFuture<'a, ()> {
        let mut state = self.lock();
        let result = Self::permissions_available(&state).and_then(|()| {
            match state.folder_roles.get_mut(folder) {
                Some(roles) => {
                    roles.insert(principal.to_string(), role);
                    Ok(())
                }
                None => Err(PortError::Conflict(format!("folder {folder} inherits permissions"))),
            }
        });
        Box::pin(std::future::ready(result))
    }

    fn navigation(&self) -> PortFuture<'_, Vec<NavNode>> {
        Box::pin(std::future::ready(Ok(self.navigation_nodes())))
    }

    fn add_navigation<'a>(
        &'a self,
        title: &'a str,
        url: &'a str,
        position: NavPosition,
    ) -> PortFuture<'a, NavNode> {
        let mut state = self.lock();
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
        Box::pin(std::future::ready(Ok(node)))
    }
}

/// Session wrapper that counts itself as open until dropped.
struct Session<T> {
    inner: T,
    open: Arc<AtomicUsize>,
}

impl<T> Session<T> {
    fn new(inner: T, open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { inner, open: Arc::clone(open) }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordStore for Session<MemoryStore> {
    fn query<'a>(&'a self, list: &'a str, filter: &'a Filter) -> PortFuture<'a, Vec<Record>> {
        self.inner.query(list, filter)
    }
    fn get<'a>(&'a self, list: &'a str, id: &'a str) -> PortFuture<'a, Option<Record>> {
        self.inner.get(list, id)
    }
    fn create<'a>(&'a self, list: &'a str, fields: FieldMap) -> PortFuture<'a, String> {
        self.inner.create(list, fields)
    }
    fn update<'a>(&'a self, list: &'a str, id: &'a str, changes: FieldMap) -> PortFuture<'a, ()> {
        self.inner.update(list, id, changes)
    }
}

impl CaseSite for Session<MemorySite> {
    fn url(&self) -> &str {
        self.inner.url()
    }
    fn ensure_folder<'a>(&'a self, path: &'a str) -> PortFuture<'a, ()> {
        self.inner.ensure_folder(path)
    }
    fn upload_file<'a>(
        &'a self,
        folder: &'a str,
        filename: &'a str,
        content: Vec<u8>,
    ) -> PortFuture<'a, ()> {
        self.inner.upload_file(folder, filename, content)
    }
    fn reset_role_inheritance<'a>(&'a self, folder: &'a str) -> PortFuture<'a, ()> {
        self.inner.reset_role_inheritance(folder)
    }
    fn break_role_inheritance<'a>(&'a self, folder: &'a str) -> PortFuture<'a, ()> {
        self.inner.break_role_inheritance(folder)
    }
    fn role_principals<'a>(&'a self, folder: &'a str) -> PortFuture<'a, Vec<String>> {
        self.inner.role_principals(folder)
    }
    fn set_role<'a>(
        &'a self,
        folder: &'a str,
        principal: &'a str,
        role: Role,
    ) -> PortFuture<'a, ()> {
        self.inner.set_role(folder, principal, role)
    }
    fn navigation(&self) -> PortFuture<'_, Vec<NavNode>> {
        self.inner.navigation()
    }
    fn add_navigation<'a>(
        &'a self,
        title: &'a str,
        url: &'a str,
        position: NavPosition,
    ) -> PortFuture<'a, NavNode> {
        self.inner.add_navigation(title, url, position)
    }
}

/// Connector resolving site URLs to registered in-memory stores and sites.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    stores: Arc<Mutex<HashMap<String, MemoryStore>>>,
    sites: Arc<Mutex<HashMap<String, MemorySite>>>,
    open: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Registers the store served for `site_url`.
    pub fn add_store(&self, site_url: &str, store: MemoryStore) {
        self.stores.lock().expect("connector lock poisoned").insert(site_url.into(), store);
    }

    /// Registers (or returns the already registered) site at `url`.
    pub fn add_site(&self, url: &str) -> MemorySite {
        self.sites
            .lock()
            .expect("connector lock poisoned")
            .entry(url.to_string())
            .or_insert_with(|| MemorySite::new(url))
            .clone()
    }

    /// Number of sessions currently open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl SiteConnector for MemoryConnector {
    fn open_store<'a>(&'a self, site_url: &'a str) -> PortFuture<'a, Box<dyn RecordStore>> {
        let found = self.stores.lock().expect("connector lock poisoned").get(site_url).cloned();
        let result = match found {
            Some(store) => Ok(Box::new(Session::new(store, &self.open)) as Box<dyn RecordStore>),
            None => Err(PortError::NotFound(format!("store at {site_url}"))),
        };
        Box::pin(std::future::ready(result))
    }

    fn open_site<'a>(&'a self, site_url: &'a str) -> PortFuture<'a, Box<dyn CaseSite>> {
        let found = self.sites.lock().expect("connector lock poisoned").get(site_url).cloned();
        let result = match found {
            Some(site) => Ok(Box::new(Session::new(site, &self.open)) as Box<dyn CaseSite>),
            None => Err(PortError::NotFound(format!("site {site_url}"))),
        };
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn breaking_inheritance_copies_site_roles() {
        let site = MemorySite::new("https://s");
        site.grant_site_role("Case Owners", Role::Owner);
        site.ensure_folder("Docs/Sub").await.unwrap();

        assert!(site.set_role("Docs/Sub", "Case Owners", Role::Reader).await.is_err());
        site.break_role_inheritance("Docs/Sub").await.unwrap();
        site.set_role("Docs/Sub", "Case Owners", Role::Reader).await.unwrap();

        let roles = site.folder_roles("Docs/Sub").unwrap();
        assert_eq!(roles.get("Case Owners"), Some(&Role::Reader));
        assert_eq!(site.folders(), vec!["Docs", "Docs/Sub"]);
    }

    #[tokio::test]
    async fn navigation_inserts_after_anchor() {
        let site = MemorySite::new("https://s");
        site.push_navigation("Home", "/");
        site.push_navigation("Documents", "/docs");
        site.push_navigation("Recycle bin", "/bin");

        site.add_navigation("New", "/new", NavPosition::After("2".into())).await.unwrap();
        let titles: Vec<_> = site.navigation_nodes().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Home", "Documents", "New", "Recycle bin"]);
    }

    #[tokio::test]
    async fn sessions_are_counted_until_dropped() {
        let connector = MemoryConnector::default();
        connector.add_site("https://s");
        {
            let _a = connector.open_site("https://s").await.unwrap();
            let _b = connector.open_site("https://s").await.unwrap();
            assert_eq!(connector.open_sessions(), 2);
        }
        assert_eq!(connector.open_sessions(), 0);
        assert!(connector.open_site("https://other").await.is_err());
    }
}
