//! Typed records decoded from raw store rows.
//!
//! Every pass decodes what it reads before acting on it, so a malformed row
//! is rejected up front instead of failing halfway through its side effects.

pub mod decode;
pub mod documents;
pub mod hub_request;
pub mod response;
pub mod submission;

pub use documents::{CaseDocuments, DocumentCategory, DocumentDescriptor};
pub use hub_request::HubRequest;
pub use response::{InformationResponse, ResponseKind};
pub use submission::Submission;

/// Field names used in the hub and case lists.
pub mod fields {
    /// Record title; the case reference on submissions.
    pub const TITLE: &str = "Title";
    /// Provisioning status text on hub requests.
    pub const STATUS: &str = "Status";
    /// Provisioned site URL on hub requests.
    pub const SITE_URL: &str = "SiteURL";
    /// Directory group id on hub requests.
    pub const GROUP_ID: &str = "GroupID";
    /// Internal mailbox id on hub requests.
    pub const INTERNAL_MAILBOX_ID: &str = "InternalMailboxID";
    /// External mailbox id on hub requests.
    pub const EXTERNAL_MAILBOX_ID: &str = "ExternalMailboxID";
    /// Project display name on hub requests.
    pub const PROJECT_NAME: &str = "ProjectName";
    /// Project number on hub requests.
    pub const PROJECT_ID: &str = "ProjectID";
    /// Project type lookup id on hub requests.
    pub const PROJECT_TYPE: &str = "ProjectType";
    /// Owners captured when the request was raised.
    pub const OWNERS: &str = "Owners";
    /// Members captured when the request was raised.
    pub const MEMBERS: &str = "Members";

    /// Portal-issued unique id shared by a submission and its responses.
    pub const UNIQUE_ID: &str = "RequestUniqueID";
    /// Serialized document descriptors.
    pub const DOCUMENTS: &str = "DocumentsJSON";
    /// Serialized original request payload.
    pub const REQUEST: &str = "RequestJSON";
    /// Numeric id of the hub request provisioning the case.
    pub const CASE_REQUEST_ID: &str = "CaseRequestId";
    /// Group id copied onto a linked submission.
    pub const CASE_GROUP_ID: &str = "CaseGroupID";
    /// Site URL copied onto a linked submission; its presence means linked.
    pub const CASE_SITE_URL: &str = "CaseSiteUrl";
    /// Internal mailbox id copied onto a linked submission.
    pub const CASE_INTERNAL_MAILBOX_ID: &str = "CaseInternalMailboxID";
    /// External mailbox id copied onto a linked submission.
    pub const CASE_EXTERNAL_MAILBOX_ID: &str = "CaseExternalMailboxID";
    /// Project name copied onto a linked submission.
    pub const CASE_PROJECT_NAME: &str = "CaseProjectName";
    /// Set once the navigation node for the submission exists.
    pub const NAVIGATION_LINKED: &str = "NavigationLinked";

    /// Completion flag on responses.
    pub const COMPLETED: &str = "Completed";
    /// `information` or `withdrawal`.
    pub const RESPONSE_KIND: &str = "ResponseKind";
    /// Folder chosen for a response on its first placement attempt.
    pub const RESPONSE_FOLDER: &str = "ResponseFolder";
}
