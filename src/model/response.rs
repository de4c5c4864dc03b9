//! Inbound responses filed against a linked submission.

use serde_json::Value;

use super::decode::{flag, malformed, opt_json_payload, opt_text, text};
use super::documents::{parse_descriptors, DocumentDescriptor};
use super::fields;
use crate::error::DecodeError;
use crate::ports::{FieldMap, Record};

/// What an inbound response is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    /// Answer to a request for information.
    #[default]
    Information,
    /// Withdrawal of the request.
    Withdrawal,
}

impl ResponseKind {
    /// Stored field value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Information => "information",
            Self::Withdrawal => "withdrawal",
        }
    }

    /// Parent folder under the submission root, and the per-response folder prefix.
    #[must_use]
    pub fn folders(self) -> (&'static str, &'static str) {
        match self {
            Self::Information => ("Information request responses", "Response"),
            Self::Withdrawal => ("Withdraw request", "Withdrawal"),
        }
    }
}

/// A response bundle waiting to be placed on its case site.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationResponse {
    /// Store record id.
    pub id: String,
    /// Unique id of the submission this answers.
    pub unique_id: String,
    /// Documents to place.
    pub documents: Vec<DocumentDescriptor>,
    /// Set once the documents have been placed.
    pub completed: bool,
    /// Response kind.
    pub kind: ResponseKind,
    /// Folder fixed by an earlier placement attempt, reused on retry.
    pub folder: Option<String>,
}

impl InformationResponse {
    /// Decodes a responses list record.
    ///
    /// # Errors
    ///
    /// Returns an error if the unique id is missing, the kind is unknown or the
    /// document payload is malformed.
    pub fn decode(record: &Record) -> Result<Self, DecodeError> {
        let documents = match opt_json_payload(record, fields::DOCUMENTS)? {
            None => Vec::new(),
            Some(value) => parse_descriptors(&value)
                .map_err(|e| malformed(record, fields::DOCUMENTS, e.to_string()))?,
        };
        let kind = match opt_text(record, fields::RESPONSE_KIND)?.as_deref() {
            None | Some("information") => ResponseKind::Information,
            Some("withdrawal") => ResponseKind::Withdrawal,
            Some(_) => {
                return Err(DecodeError::WrongType {
                    record: record.id.clone(),
                    field: fields::RESPONSE_KIND,
                    expected: "information or withdrawal",
                })
            }
        };

        Ok(Self {
            id: record.id.clone(),
            unique_id: text(record, fields::UNIQUE_ID)?,
            documents,
            completed: flag(record, fields::COMPLETED)?,
            kind,
            folder: opt_text(record, fields::RESPONSE_FOLDER)?,
        })
    }

    /// Field change recording the folder chosen for this response.
    #[must_use]
    pub fn folder_changes(folder: &str) -> FieldMap {
        let mut changes = FieldMap::new();
        changes.insert(fields::RESPONSE_FOLDER.into(), Value::String(folder.to_string()));
        changes
    }

    /// Field change marking the response completed.
    #[must_use]
    pub fn completion_changes() -> FieldMap {
        let mut changes = FieldMap::new();
        changes.insert(fields::COMPLETED.into(), Value::Bool(true));
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(fields: Value) -> Record {
        Record {
            id: "r1".into(),
            created: Utc::now(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn decodes_pending_withdrawal() {
        let resp = InformationResponse::decode(&record(json!({
            "RequestUniqueID": "u-1",
            "DocumentsJSON": "[{\"key\":\"k\",\"filename\":\"w.pdf\"}]",
            "Completed": false,
            "ResponseKind": "withdrawal"
        })))
        .unwrap();

        assert_eq!(resp.kind, ResponseKind::Withdrawal);
        assert!(!resp.completed);
        assert_eq!(resp.documents.len(), 1);
        assert_eq!(resp.folder, None);
    }

    #[test]
    fn decodes_recorded_folder() {
        let resp = InformationResponse::decode(&record(json!({
            "RequestUniqueID": "u-1",
            "ResponseFolder": "Shared Documents/Response_2024_05_11_09_30"
        })))
        .unwrap();
        assert_eq!(resp.folder.as_deref(), Some("Shared Documents/Response_2024_05_11_09_30"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = InformationResponse::decode(&record(json!({
            "RequestUniqueID": "u-1", "ResponseKind": "appeal"
        })))
        .unwrap_err();
        assert!(matches!(err, DecodeError::WrongType { .. }));
    }
}
