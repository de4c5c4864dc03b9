//! In-memory record store.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::PortError;
use crate::ports::{FieldMap, Filter, PortFuture, Record, RecordStore};

#[derive(Default)]
struct StoreState {
    lists: BTreeMap<String, Vec<Record>>,
    next_id: u64,
    failing_queries: HashSet<String>,
    failing_updates: HashSet<String>,
}

/// Record store whose lists live in a shared map, in insertion order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    /// Appends a record with explicit id, creation time and fields.
    pub fn insert(&self, list: &str, id: &str, created: DateTime<Utc>, fields: Value) {
        let record = Record {
            id: id.to_string(),
            created,
            fields: fields.as_object().cloned().unwrap_or_default(),
        };
        let mut state = self.state.lock().expect("store lock poisoned");
        state.lists.entry(list.to_string()).or_default().push(record);
    }

    /// Returns a copy of the record, if present.
    #[must_use]
    pub fn record(&self, list: &str, id: &str) -> Option<Record> {
        let state = self.state.lock().expect("store lock poisoned");
        state.lists.get(list).and_then(|records| records.iter().find(|r| r.id == id)).cloned()
    }

    /// Returns a copy of every record in the list.
    #[must_use]
    pub fn records(&self, list: &str) -> Vec<Record> {
        let state = self.state.lock().expect("store lock poisoned");
        state.lists.get(list).cloned().unwrap_or_default()
    }

    /// Makes queries against `list` fail.
    pub fn fail_queries(&self, list: &str) {
        self.state.lock().expect("store lock poisoned").failing_queries.insert(list.to_string());
    }

    /// Makes updates of record `id` fail.
    pub fn fail_updates_of(&self, id: &str) {
        self.state.lock().expect("store lock poisoned").failing_updates.insert(id.to_string());
    }
}

impl RecordStore for MemoryStore {
    fn query<'a>(&'a self, list: &'a str, filter: &'a Filter) -> PortFuture<'a, Vec<Record>> {
        let state = self.state.lock().expect("store lock poisoned");
        let result = if state.failing_queries.contains(list) {
            Err(PortError::Transient(format!("list {list} unavailable")))
        } else {
            Ok(state
                .lists
                .get(list)
                .map(|records| records.iter().filter(|r| filter.matches(r)).cloned().collect())
                .unwrap_or_default())
        };
        Box::pin(std::future::ready(result))
    }

    fn get<'a>(&'a self, list: &'a str, id: &'a str) -> PortFuture<'a, Option<Record>> {
        Box::pin(std::future::ready(Ok(self.record(list, id))))
    }

    fn create<'a>(&'a self, list: &'a str, fields: FieldMap) -> PortFuture<'a, String> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.next_id += 1;
        let id = format!("new-{}", state.next_id);
        let record = Record { id: id.clone(), created: Utc::now(), fields };
        state.lists.entry(list.to_string()).or_default().push(record);
        Box::pin(std::future::ready(Ok(id)))
    }

    fn update<'a>(&'a self, list: &'a str, id: &'a str, changes: FieldMap) -> PortFuture<'a, ()> {
        let mut state = self.state.lock().expect("store lock poisoned");
        let result = if state.failing_updates.contains(id) {
            Err(PortError::Transient(format!("commit of {id} throttled")))
        } else {
            match state.lists.get_mut(list).and_then(|rs| rs.iter_mut().find(|r| r.id == id)) {
                Some(record) => {
                    record.fields.extend(changes);
                    Ok(())
                }
                None => Err(PortError::NotFound(format!("{list}/{id}"))),
            }
        };
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn update_merges_fields() {
        let store = MemoryStore::default();
        store.insert("L", "1", Utc::now(), json!({"a": 1, "b": 2}));

        let mut changes = FieldMap::new();
        changes.insert("b".into(), json!(3));
        store.update("L", "1", changes).await.unwrap();

        let record = store.record("L", "1").unwrap();
        assert_eq!(record.fields["a"], json!(1));
        assert_eq!(record.fields["b"], json!(3));
    }

    #[tokio::test]
    async fn update_of_unknown_record_is_not_found() {
        let store = MemoryStore::default();
        let err = store.update("L", "missing", FieldMap::new()).await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }
}
