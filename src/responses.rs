//! Response filing: place inbound response documents on the case site.
//!
//! A response stays pending until every one of its documents has been
//! written; only then is it marked completed, after which it is never polled
//! again. The folder is chosen on the first attempt and recorded on the
//! response, so retries land in the same place. Responses whose submission
//! cannot be resolved to exactly one linked case wait for a later pass.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::ReconcileError;
use crate::model::{fields, InformationResponse, ResponseKind, Submission};
use crate::notify;
use crate::placement;
use crate::ports::{Filter, RecordStore};

/// Outcome of one [`reconcile_responses`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseReport {
    /// Pending responses examined.
    pub candidates: usize,
    /// Response ids marked completed by this pass.
    pub completed: Vec<String>,
    /// Responses left pending.
    pub deferred: usize,
    /// Responses that could not be decoded or written.
    pub failed: usize,
    /// Owner notifications sent.
    pub notified: usize,
}

impl ResponseReport {
    /// Number of responses processed, whatever their outcome.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.candidates
    }
}

enum Outcome {
    Completed { notified: bool },
    Deferred,
    Failed,
}

/// Folder, below the submission root, receiving one response's documents.
#[must_use]
pub fn response_folder(config: &Config, kind: ResponseKind, at: DateTime<Utc>) -> String {
    let (parent, prefix) = kind.folders();
    format!(
        "{}/{parent}/{prefix}_{}",
        config.cases.submission_root,
        at.format("%Y_%m_%d_%H_%M")
    )
}

/// Runs one pass over every pending response.
///
/// # Errors
///
/// Returns an error if the case store cannot be opened or the pending
/// query fails; per-response failures are logged and counted instead.
pub async fn reconcile_responses(
    ctx: &ServiceContext,
    config: &Config,
) -> Result<ResponseReport, ReconcileError> {
    let span = info_span!("reconcile_responses", run_id = %ctx.ids.generate_id());
    run_pass(ctx, config).instrument(span).await
}

async fn run_pass(ctx: &ServiceContext, config: &Config) -> Result<ResponseReport, ReconcileError> {
    let site_url = &config.cases.site_url;
    let cases = ctx
        .connector
        .open_store(site_url)
        .await
        .map_err(|source| ReconcileError::Connect { target: site_url.clone(), source })?;
    let list = &config.cases.responses_list;
    let pending = cases
        .query(list, &Filter::eq(fields::COMPLETED, false))
        .await
        .map_err(|source| ReconcileError::Query { list: list.clone(), source })?;

    let mut report = ResponseReport { candidates: pending.len(), ..ResponseReport::default() };
    info!(count = pending.len(), "processing pending responses");
    let pass_time = ctx.clock.now();

    for record in &pending {
        let response = match InformationResponse::decode(record) {
            Ok(response) => response,
            Err(e) => {
                error!(response = %record.id, error = %e, "rejecting malformed response");
                report.failed += 1;
                continue;
            }
        };
        match process(ctx, config, cases.as_ref(), &response, pass_time).await {
            Outcome::Completed { notified } => {
                report.completed.push(response.id.clone());
                report.notified += usize::from(notified);
            }
            Outcome::Deferred => report.deferred += 1,
            Outcome::Failed => report.failed += 1,
        }
    }

    info!(
        completed = report.completed.len(),
        deferred = report.deferred,
        failed = report.failed,
        "response pass complete"
    );
    Ok(report)
}

/// Finds the single linked submission a response refers to.
async fn linked_submission(
    config: &Config,
    cases: &dyn RecordStore,
    response: &InformationResponse,
) -> Option<Submission> {
    let filter = Filter::eq(fields::UNIQUE_ID, response.unique_id.as_str());
    let matches = match cases.query(&config.cases.submissions_list, &filter).await {
        Ok(matches) => matches,
        Err(e) => {
            warn!(response = %response.id, error = %e, "failed to look up submission");
            return None;
        }
    };
    let [record] = matches.as_slice() else {
        info!(
            response = %response.id,
            unique_id = %response.unique_id,
            matches = matches.len(),
            "no unique submission for response yet"
        );
        return None;
    };
    match Submission::decode(record) {
        Ok(submission) if submission.is_linked() => Some(submission),
        Ok(_) => {
            info!(response = %response.id, "submission not linked to a case site yet");
            None
        }
        Err(e) => {
            error!(response = %response.id, error = %e, "submission for response is malformed");
            None
        }
    }
}

async fn process(
    ctx: &ServiceContext,
    config: &Config,
    cases: &dyn RecordStore,
    response: &InformationResponse,
    pass_time: DateTime<Utc>,
) -> Outcome {
    let Some(submission) = linked_submission(config, cases, response).await else {
        return Outcome::Deferred;
    };
    let site_url = submission.case_site_url.as_deref().unwrap_or_default();
    debug!(response = %response.id, site = site_url, "found case site");

    let site = match ctx.connector.open_site(site_url).await {
        Ok(site) => site,
        Err(e) => {
            warn!(
                response = %response.id,
                site = site_url,
                error = %e,
                "failed to open case site"
            );
            return Outcome::Deferred;
        }
    };
    let Some(folder) = fixed_folder(config, cases, response, pass_time).await else {
        return Outcome::Failed;
    };
    let placed =
        placement::place(ctx.blobs.as_ref(), site.as_ref(), &folder, &response.documents).await;
    drop(site);
    if !placed.is_complete() {
        warn!(
            response = %response.id,
            failed = placed.failed.len(),
            "response documents not all placed; leaving pending"
        );
        return Outcome::Deferred;
    }

    let list = &config.cases.responses_list;
    let changes = InformationResponse::completion_changes();
    if let Err(e) = cases.update(list, &response.id, changes).await {
        error!(response = %response.id, error = %e, "failed to mark response completed");
        return Outcome::Failed;
    }

    let notified = notify_owners(ctx, config, &submission, response, &folder).await;
    Outcome::Completed { notified }
}

/// The response's recorded folder, or a new one recorded before any upload.
async fn fixed_folder(
    config: &Config,
    cases: &dyn RecordStore,
    response: &InformationResponse,
    pass_time: DateTime<Utc>,
) -> Option<String> {
    if let Some(folder) = &response.folder {
        debug!(response = %response.id, folder, "reusing response folder");
        return Some(folder.clone());
    }
    let folder = response_folder(config, response.kind, pass_time);
    let list = &config.cases.responses_list;
    match cases.update(list, &response.id, InformationResponse::folder_changes(&folder)).await {
        Ok(()) => Some(folder),
        Err(e) => {
            error!(response = %response.id, error = %e, "failed to record response folder");
            None
        }
    }
}

async fn notify_owners(
    ctx: &ServiceContext,
    config: &Config,
    submission: &Submission,
    response: &InformationResponse,
    folder: &str,
) -> bool {
    let Some(group_id) = submission.case_group_id.as_deref() else {
        info!(response = %response.id, "no case group; skipping response email");
        return false;
    };
    let owners = match ctx.directory.owners(group_id).await {
        Ok(owners) if owners.is_empty() => {
            info!(group = group_id, "case group has no owners; skipping response email");
            return false;
        }
        Ok(owners) => owners,
        Err(e) => {
            error!(group = group_id, error = %e, "failed to read case group owners");
            return false;
        }
    };

    let template = match response.kind {
        ResponseKind::Information => &config.templates.response_subject,
        ResponseKind::Withdrawal => &config.templates.withdrawal_subject,
    };
    let case_id = format!("{}{}", config.cases.reference_prefix, submission.reference);
    let site_url = submission.case_site_url.as_deref().unwrap_or_default();
    let email = notify::response_email(owners, template, &case_id, site_url, folder);

    info!(
        recipients = %email.to.join("; "),
        kind = response.kind.as_str(),
        "sending response email"
    );
    match ctx.notifier.send(&email).await {
        Ok(()) => true,
        Err(e) => {
            error!(response = %response.id, error = %e, "error sending response email");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn folders_are_named_by_kind_and_pass_time() {
        let config = Config::default();
        let at = Utc.with_ymd_and_hms(2024, 5, 3, 9, 5, 0).unwrap();
        assert_eq!(
            response_folder(&config, ResponseKind::Information, at),
            "Shared Documents/PA Submission/Information request responses/Response_2024_05_03_09_05"
        );
        assert_eq!(
            response_folder(&config, ResponseKind::Withdrawal, at),
            "Shared Documents/PA Submission/Withdraw request/Withdrawal_2024_05_03_09_05"
        );
    }
}
