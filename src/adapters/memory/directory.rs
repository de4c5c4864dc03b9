//! In-memory directory with optional read lag.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::PortError;
use crate::ports::{DirectoryGroups, PortFuture};

#[derive(Default)]
struct DirectoryState {
    users: BTreeMap<String, String>,
    members: BTreeMap<String, BTreeSet<String>>,
    owners: BTreeMap<String, Vec<String>>,
    pending: Vec<(String, String)>,
    lagging: bool,
    failing_groups: HashSet<String>,
    invited: Vec<String>,
    refuse_invitations: bool,
}

impl DirectoryState {
    fn check_group(&self, group_id: &str) -> Result<(), PortError> {
        if self.failing_groups.contains(group_id) {
            Err(PortError::Transient(format!("group {group_id} unavailable")))
        } else {
            Ok(())
        }
    }

    fn email_of(&self, user_id: &str) -> String {
        self.users.get(user_id).cloned().unwrap_or_else(|| user_id.to_string())
    }
}

/// Directory of users and groups held in memory.
///
/// With lag enabled, added members stay invisible to reads until
/// [`MemoryDirectory::settle`] is called, mimicking an eventually consistent
/// directory.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl MemoryDirectory {
    /// Registers a user; the email is stored lowercased.
    pub fn add_user(&self, user_id: &str, email: &str) {
        self.lock().users.insert(user_id.to_string(), email.to_lowercase());
    }

    /// Makes `user_id` a member of the group immediately.
    pub fn seed_member(&self, group_id: &str, user_id: &str) {
        self.lock().members.entry(group_id.to_string()).or_default().insert(user_id.to_string());
    }

    /// Sets the owner addresses of a group.
    pub fn set_owners(&self, group_id: &str, owners: &[&str]) {
        let owners = owners.iter().map(|o| o.to_lowercase()).collect();
        self.lock().owners.insert(group_id.to_string(), owners);
    }

    /// Holds future additions back from reads until [`Self::settle`].
    pub fn set_lagging(&self, lagging: bool) {
        self.lock().lagging = lagging;
    }

    /// Makes every call touching `group_id` fail.
    pub fn fail_group(&self, group_id: &str) {
        self.lock().failing_groups.insert(group_id.to_string());
    }

    /// Makes guest invitations fail as if the address were rejected.
    pub fn refuse_invitations(&self) {
        self.lock().refuse_invitations = true;
    }

    /// Addresses invited as guests, in order.
    #[must_use]
    pub fn invited(&self) -> Vec<String> {
        self.lock().invited.clone()
    }

    /// Applies pending additions.
    pub fn settle(&self) {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        for (group, user) in pending {
            state.members.entry(group).or_default().insert(user);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DirectoryState> {
        self.state.lock().expect("directory lock poisoned")
    }
}

impl DirectoryGroups for MemoryDirectory {
    fn members<'a>(&'a self, group_id: &'a str) -> PortFuture<'a, Vec<String>> {
        let state = self.lock();
        let result = state.check_group(group_id).map(|()| {
            state
                .members
                .get(group_id)
                .map(|ids| ids.iter().map(|id| state.email_of(id)).collect())
                .unwrap_or_default()
        });
        Box::pin(std::future::ready(result))
    }

    fn owners<'a>(&'a self, group_id: &'a str) -> PortFuture<'a, Vec<String>> {
        let state = self.lock();
        let result = state
            .check_group(group_id)
            .map(|()| state.owners.get(group_id).cloned().unwrap_or_default());
        Box::pin(std::future::ready(result))
    }

    fn add_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, ()> {
        let mut state = self.lock();
        let result = state.check_group(group_id).and_then(|()| {
            let visible = state.members.get(group_id).is_some_and(|m| m.contains(user_id));
            let pending = state.pending.iter().any(|(g, u)| g == group_id && u == user_id);
            if visible || pending {
                return Err(PortError::Conflict(format!("{user_id} already in {group_id}")));
            }
            if state.lagging {
                state.pending.push((group_id.to_string(), user_id.to_string()));
            } else {
                state.members.entry(group_id.to_string()).or_default().insert(user_id.to_string());
            }
            Ok(())
        });
        Box::pin(std::future::ready(result))
    }

    fn remove_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, ()> {
        let mut state = self.lock();
        let result = state.check_group(group_id).and_then(|()| {
            let removed = state.members.get_mut(group_id).is_some_and(|m| m.remove(user_id));
            if removed {
                Ok(())
            } else {
                Err(PortError::NotFound(format!("{user_id} not in {group_id}")))
            }
        });
        Box::pin(std::future::ready(result))
    }

    fn is_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, bool> {
        let state = self.lock();
        let result = state
            .check_group(group_id)
            .map(|()| state.members.get(group_id).is_some_and(|m| m.contains(user_id)));
        Box::pin(std::future::ready(result))
    }

    fn user_id_for_email<'a>(&'a self, email: &'a str) -> PortFuture<'a, Option<String>> {
        let wanted = email.to_lowercase();
        let found = self
            .lock()
            .users
            .iter()
            .find(|(_, address)| **address == wanted)
            .map(|(id, _)| id.clone());
        Box::pin(std::future::ready(Ok(found)))
    }

    fn user_principal_name<'a>(&'a self, user_id: &'a str) -> PortFuture<'a, Option<String>> {
        let found = self.lock().users.get(user_id).cloned();
        Box::pin(std::future::ready(Ok(found)))
    }

    fn invite_guest<'a>(
        &'a self,
        email: &'a str,
        _redirect_url: &'a str,
    ) -> PortFuture<'a, String> {
        let mut state = self.lock();
        let result = if state.refuse_invitations {
            Err(PortError::NotFound(format!("cannot invite {email}")))
        } else {
            let id = format!("guest-{}", state.invited.len() + 1);
            state.users.insert(id.clone(), email.to_lowercase());
            state.invited.push(email.to_lowercase());
            Ok(id)
        };
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lagging_additions_appear_after_settle() {
        let directory = MemoryDirectory::default();
        directory.add_user("u1", "Ann@Example.com");
        directory.set_lagging(true);

        directory.add_member("g1", "u1").await.unwrap();
        assert!(!directory.is_member("g1", "u1").await.unwrap());
        assert!(matches!(
            directory.add_member("g1", "u1").await,
            Err(PortError::Conflict(_))
        ));

        directory.settle();
        assert_eq!(directory.members("g1").await.unwrap(), vec!["ann@example.com"]);
    }

    #[tokio::test]
    async fn removing_a_non_member_is_not_found() {
        let directory = MemoryDirectory::default();
        let err = directory.remove_member("g1", "u9").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn invited_guests_become_resolvable() {
        let directory = MemoryDirectory::default();
        let id = directory.invite_guest("Eve@Partner.org", "https://portal").await.unwrap();
        assert_eq!(directory.invited(), vec!["eve@partner.org"]);
        assert_eq!(
            directory.user_id_for_email("eve@partner.org").await.unwrap().as_deref(),
            Some(id.as_str())
        );
        assert_eq!(
            directory.user_principal_name(&id).await.unwrap().as_deref(),
            Some("eve@partner.org")
        );

        directory.refuse_invitations();
        let err = directory.invite_guest("mal@x.org", "https://portal").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }
}
