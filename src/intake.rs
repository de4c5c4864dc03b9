//! Intake of portal submissions and responses into the case store.
//!
//! Payloads are validated before anything is written, so the reconcilers
//! only ever see records they can decode.

use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::RequestError;
use crate::model::documents::parse_descriptors;
use crate::model::{fields, CaseDocuments, ResponseKind};
use crate::ports::{FieldMap, Filter};

/// Strips the display prefix from a case reference (`SAU1042` becomes `1042`).
#[must_use]
pub fn bare_reference<'a>(reference: &'a str, prefix: &str) -> &'a str {
    let reference = reference.trim();
    reference.strip_prefix(prefix).unwrap_or(reference).trim()
}

/// Records a new submission and returns its store id.
///
/// # Errors
///
/// Returns [`RequestError::InvalidPayload`] if the reference or unique id is
/// empty or the document payload is not a descriptor map, or a port error if
/// the write fails.
pub async fn file_submission(
    ctx: &ServiceContext,
    config: &Config,
    reference: &str,
    unique_id: &str,
    documents: &Value,
    request: Option<&Value>,
) -> Result<String, RequestError> {
    let reference = bare_reference(reference, &config.cases.reference_prefix);
    if reference.is_empty() || unique_id.trim().is_empty() {
        return Err(RequestError::InvalidPayload("reference and unique id are required".into()));
    }
    let parsed: CaseDocuments = serde_json::from_value(documents.clone())
        .map_err(|e| RequestError::InvalidPayload(format!("documents: {e}")))?;

    let mut record = FieldMap::new();
    record.insert(fields::TITLE.into(), json!(reference));
    record.insert(fields::UNIQUE_ID.into(), json!(unique_id.trim()));
    record.insert(fields::DOCUMENTS.into(), json!(documents.to_string()));
    record.insert(fields::REQUEST.into(), json!(request.map(Value::to_string)));

    let cases = ctx.connector.open_store(&config.cases.site_url).await?;
    let id = cases.create(&config.cases.submissions_list, record).await?;
    info!(submission = %id, reference, documents = parsed.len(), "submission filed");
    Ok(id)
}

/// Records a pending response against the submission with `unique_id`.
///
/// # Errors
///
/// Returns [`RequestError::UnknownCase`] unless exactly one submission has
/// that unique id, [`RequestError::InvalidPayload`] for a malformed document
/// list, or a port error if the store fails.
pub async fn file_response(
    ctx: &ServiceContext,
    config: &Config,
    unique_id: &str,
    documents: &Value,
    kind: ResponseKind,
) -> Result<String, RequestError> {
    let descriptors = parse_descriptors(documents)
        .map_err(|e| RequestError::InvalidPayload(format!("documents: {e}")))?;

    let cases = ctx.connector.open_store(&config.cases.site_url).await?;
    let matches = cases
        .query(&config.cases.submissions_list, &Filter::eq(fields::UNIQUE_ID, unique_id))
        .await?;
    if matches.len() != 1 {
        return Err(RequestError::UnknownCase(unique_id.to_string()));
    }

    let mut record = FieldMap::new();
    record.insert(fields::TITLE.into(), json!(format!("Response for: {unique_id}")));
    record.insert(fields::UNIQUE_ID.into(), json!(unique_id));
    record.insert(fields::DOCUMENTS.into(), json!(documents.to_string()));
    record.insert(fields::COMPLETED.into(), json!(false));
    record.insert(fields::RESPONSE_KIND.into(), json!(kind.as_str()));
    let id = cases.create(&config.cases.responses_list, record).await?;
    info!(
        response = %id,
        unique_id,
        kind = kind.as_str(),
        documents = descriptors.len(),
        "response filed"
    );
    Ok(id)
}
