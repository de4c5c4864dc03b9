//! Submissions: applicant cases waiting for, or already linked to, a site.

use serde_json::{json, Value};

use super::decode::{flag, malformed, opt_json_payload, opt_text, opt_whole_number, text};
use super::documents::CaseDocuments;
use super::fields;
use super::hub_request::HubRequest;
use crate::error::DecodeError;
use crate::ports::{FieldMap, Record};

/// An applicant case in the submissions list.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Store record id.
    pub id: String,
    /// Portal-issued unique id.
    pub unique_id: String,
    /// Case reference without its prefix.
    pub reference: String,
    /// Hub request provisioning this case; zero or absent means none yet.
    pub case_request_id: Option<u64>,
    /// Documents to place on linking.
    pub documents: CaseDocuments,
    /// Original request payload, kept opaque.
    pub request: Option<Value>,
    /// Directory group of the linked site.
    pub case_group_id: Option<String>,
    /// URL of the linked site. `Some` iff the submission is linked.
    pub case_site_url: Option<String>,
    /// Internal mailbox id of the linked site.
    pub internal_mailbox_id: Option<String>,
    /// External mailbox id of the linked site.
    pub external_mailbox_id: Option<String>,
    /// Project name of the linked site.
    pub project_name: Option<String>,
    /// Whether the navigation node has already been inserted.
    pub navigation_linked: bool,
}

impl Submission {
    /// Decodes a submissions list record, validating its JSON payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or a payload is malformed.
    pub fn decode(record: &Record) -> Result<Self, DecodeError> {
        let documents = match opt_json_payload(record, fields::DOCUMENTS)? {
            None => CaseDocuments::default(),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| malformed(record, fields::DOCUMENTS, e.to_string()))?,
        };

        Ok(Self {
            id: record.id.clone(),
            unique_id: text(record, fields::UNIQUE_ID)?,
            reference: text(record, fields::TITLE)?,
            case_request_id: opt_whole_number(record, fields::CASE_REQUEST_ID)?,
            documents,
            request: opt_json_payload(record, fields::REQUEST)?,
            case_group_id: opt_text(record, fields::CASE_GROUP_ID)?,
            case_site_url: opt_text(record, fields::CASE_SITE_URL)?,
            internal_mailbox_id: opt_text(record, fields::CASE_INTERNAL_MAILBOX_ID)?,
            external_mailbox_id: opt_text(record, fields::CASE_EXTERNAL_MAILBOX_ID)?,
            project_name: opt_text(record, fields::CASE_PROJECT_NAME)?,
            navigation_linked: flag(record, fields::NAVIGATION_LINKED)?,
        })
    }

    /// True once the case site URL has been copied across.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.case_site_url.is_some()
    }

    /// The hub request id to link against, ignoring the zero placeholder.
    #[must_use]
    pub fn hub_request_id(&self) -> Option<u64> {
        self.case_request_id.filter(|id| *id != 0)
    }

    /// Field changes that link this submission to the provisioned request.
    ///
    /// Writing these is the unlinked to linked transition.
    #[must_use]
    pub fn link_changes(hub: &HubRequest) -> FieldMap {
        let mut changes = FieldMap::new();
        changes.insert(fields::CASE_GROUP_ID.into(), json!(hub.group_id));
        changes.insert(fields::CASE_SITE_URL.into(), json!(hub.site_url));
        changes.insert(fields::CASE_EXTERNAL_MAILBOX_ID.into(), json!(hub.external_mailbox_id));
        changes.insert(fields::CASE_INTERNAL_MAILBOX_ID.into(), json!(hub.internal_mailbox_id));
        changes.insert(fields::CASE_PROJECT_NAME.into(), json!(hub.project_name));
        changes
    }

    /// Field change recording that the navigation node exists.
    #[must_use]
    pub fn navigation_marker() -> FieldMap {
        let mut changes = FieldMap::new();
        changes.insert(fields::NAVIGATION_LINKED.into(), Value::Bool(true));
        changes
    }
}
