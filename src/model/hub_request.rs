//! Hub requests: provisioning jobs tracked by the central hub list.

use chrono::{DateTime, Utc};

use super::decode::{opt_text, opt_whole_number, user_emails};
use super::fields;
use crate::error::DecodeError;
use crate::ports::Record;

/// A provisioning job as recorded in the hub requests list.
///
/// Read-only to this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct HubRequest {
    /// Numeric list id.
    pub id: u64,
    /// Case reference shown to staff.
    pub title: Option<String>,
    /// Free-text provisioning status.
    pub status: Option<String>,
    /// URL of the provisioned site, once created.
    pub site_url: Option<String>,
    /// Directory group backing the site, once created.
    pub group_id: Option<String>,
    /// Internal mailbox id.
    pub internal_mailbox_id: Option<String>,
    /// External mailbox id.
    pub external_mailbox_id: Option<String>,
    /// Project display name.
    pub project_name: Option<String>,
    /// Project number.
    pub project_id: Option<String>,
    /// Owners captured when the request was raised.
    pub owners: Vec<String>,
    /// Members captured when the request was raised.
    pub members: Vec<String>,
    /// When the request was created.
    pub created: DateTime<Utc>,
}

impl HubRequest {
    /// Decodes a hub list record.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not numeric or a field has the wrong shape.
    pub fn decode(record: &Record) -> Result<Self, DecodeError> {
        let id = record.id.trim().parse::<u64>().map_err(|_| DecodeError::WrongType {
            record: record.id.clone(),
            field: "id",
            expected: "a numeric id",
        })?;

        Ok(Self {
            id,
            title: opt_text(record, fields::TITLE)?,
            status: opt_text(record, fields::STATUS)?,
            site_url: opt_text(record, fields::SITE_URL)?,
            group_id: opt_text(record, fields::GROUP_ID)?,
            internal_mailbox_id: opt_text(record, fields::INTERNAL_MAILBOX_ID)?,
            external_mailbox_id: opt_text(record, fields::EXTERNAL_MAILBOX_ID)?,
            project_name: opt_text(record, fields::PROJECT_NAME)?,
            project_id: opt_whole_number(record, fields::PROJECT_ID)
                .map(|n| n.map(|n| n.to_string()))
                .or_else(|_| opt_text(record, fields::PROJECT_ID))?,
            owners: user_emails(record, fields::OWNERS)?,
            members: user_emails(record, fields::MEMBERS)?,
            created: record.created,
        })
    }

    /// True once the provisioning status reports success.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.status.as_deref().is_some_and(|s| s.to_lowercase().contains("success"))
    }
}
