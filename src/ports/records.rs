//! Record store port: list-oriented records addressed by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PortFuture;

/// Field values of a record keyed by field name.
pub type FieldMap = serde_json::Map<String, Value>;

/// One row of a list as returned by the store.
///
/// Fields are untyped here; [`crate::model`] decodes them into typed records
/// before any side effect depends on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned id, unique within its list.
    pub id: String,
    /// When the store created the record.
    pub created: DateTime<Utc>,
    /// Named field values.
    #[serde(default)]
    pub fields: FieldMap,
}

impl Record {
    /// Returns the named field, treating JSON `null` as absent.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }
}

/// Selection criteria for [`RecordStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every record in the list.
    All,
    /// The field is absent, null or blank text.
    IsNull(String),
    /// The field equals the value. Numbers and strings compare by text so
    /// lookup ids match whichever way they were stored.
    Eq(String, Value),
    /// The record was created at or after the instant.
    CreatedOnOrAfter(DateTime<Utc>),
    /// Every inner filter matches.
    And(Vec<Filter>),
}

impl Filter {
    /// Shorthand for [`Filter::IsNull`].
    #[must_use]
    pub fn is_null(field: &str) -> Self {
        Self::IsNull(field.to_string())
    }

    /// Shorthand for [`Filter::Eq`].
    #[must_use]
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    /// Evaluates the filter against a record.
    ///
    /// Stores that cannot push a filter down to their backend use this to
    /// filter client-side.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::IsNull(field) => match record.field(field) {
                None => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            },
            Self::Eq(field, expected) => {
                record.field(field).is_some_and(|actual| loosely_equal(actual, expected))
            }
            Self::CreatedOnOrAfter(since) => record.created >= *since,
            Self::And(filters) => filters.iter().all(|f| f.matches(record)),
        }
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (scalar_text(actual), scalar_text(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Query, create and update access to the lists of one store.
///
/// Commits are expected to retry transient throttling internally; the core
/// never retries a store call itself.
pub trait RecordStore: Send + Sync {
    /// Returns records in `list` matching `filter`, in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be read.
    fn query<'a>(&'a self, list: &'a str, filter: &'a Filter) -> PortFuture<'a, Vec<Record>>;

    /// Loads one record by id; `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get<'a>(&'a self, list: &'a str, id: &'a str) -> PortFuture<'a, Option<Record>>;

    /// Creates a record and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn create<'a>(&'a self, list: &'a str, fields: FieldMap) -> PortFuture<'a, String>;

    /// Merges `changes` into an existing record and commits.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PortError::NotFound`] for an unknown id, or
    /// another variant if the commit fails.
    fn update<'a>(&'a self, list: &'a str, id: &'a str, changes: FieldMap) -> PortFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(fields: Value) -> Record {
        Record {
            id: "1".into(),
            created: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn is_null_matches_missing_null_and_blank() {
        let filter = Filter::is_null("SiteUrl");
        assert!(filter.matches(&record(json!({}))));
        assert!(filter.matches(&record(json!({"SiteUrl": null}))));
        assert!(filter.matches(&record(json!({"SiteUrl": ""}))));
        assert!(filter.matches(&record(json!({"SiteUrl": "  \t"}))));
        assert!(!filter.matches(&record(json!({"SiteUrl": "https://x"}))));
    }

    #[test]
    fn eq_compares_numbers_and_strings_by_text() {
        let filter = Filter::eq("ProjectType", "4");
        assert!(filter.matches(&record(json!({"ProjectType": 4}))));
        assert!(!filter.matches(&record(json!({"ProjectType": 5}))));
    }

    #[test]
    fn eq_false_does_not_match_missing_flag() {
        let filter = Filter::eq("Completed", false);
        assert!(filter.matches(&record(json!({"Completed": false}))));
        assert!(!filter.matches(&record(json!({"Completed": true}))));
        assert!(!filter.matches(&record(json!({}))));
    }

    #[test]
    fn and_requires_every_clause() {
        let since = Utc.with_ymd_and_hms(2024, 4, 20, 0, 0, 0).unwrap();
        let filter =
            Filter::And(vec![Filter::eq("ProjectType", 4), Filter::CreatedOnOrAfter(since)]);
        assert!(filter.matches(&record(json!({"ProjectType": 4}))));

        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let filter =
            Filter::And(vec![Filter::eq("ProjectType", 4), Filter::CreatedOnOrAfter(later)]);
        assert!(!filter.matches(&record(json!({"ProjectType": 4}))));
    }
}
