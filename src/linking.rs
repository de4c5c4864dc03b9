//! Case linking: connect submissions to their provisioned case sites.
//!
//! A submission is a candidate while its case site URL is unset. Once the hub
//! request reports a successful provisioning the pass places the documents,
//! locks down the submission folder, adds a navigation link back to the
//! portal, copies the site details across (the link transition) and tells the
//! case team. Linked submissions are never selected again.

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::{PortError, ReconcileError};
use crate::model::{fields, DocumentCategory, HubRequest, Submission};
use crate::notify;
use crate::placement::{self, PlacementReport};
use crate::ports::{CaseSite, Filter, NavPosition, RecordStore, Role};

/// Title of the navigation node new case links are inserted after.
pub const DOCUMENTS_NODE: &str = "Documents";

/// Outcome of one [`reconcile_links`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Unlinked submissions examined.
    pub candidates: usize,
    /// Submission ids linked by this pass.
    pub linked: Vec<String>,
    /// Candidates left for a later pass.
    pub deferred: usize,
    /// Candidates that could not be decoded or written.
    pub failed: usize,
    /// New case notifications sent.
    pub notified: usize,
}

impl LinkReport {
    /// Number of candidates processed, whatever their outcome.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.candidates
    }
}

enum Outcome {
    Linked { notified: bool },
    Deferred,
    Failed,
}

enum Readiness {
    Ready(HubRequest),
    NotYet,
    Malformed,
}

/// Runs one linking pass over every unlinked submission.
///
/// # Errors
///
/// Returns an error if a store cannot be opened or the candidate query
/// fails; per-record failures are logged and counted instead.
pub async fn reconcile_links(
    ctx: &ServiceContext,
    config: &Config,
) -> Result<LinkReport, ReconcileError> {
    let span = info_span!("reconcile_links", run_id = %ctx.ids.generate_id());
    run_pass(ctx, config).instrument(span).await
}

async fn run_pass(ctx: &ServiceContext, config: &Config) -> Result<LinkReport, ReconcileError> {
    let cases = open_store(ctx, &config.cases.site_url).await?;
    let list = &config.cases.submissions_list;
    let candidates = cases
        .query(list, &Filter::is_null(fields::CASE_SITE_URL))
        .await
        .map_err(|source| ReconcileError::Query { list: list.clone(), source })?;

    let mut report = LinkReport { candidates: candidates.len(), ..LinkReport::default() };
    info!(count = candidates.len(), "processing unlinked submissions");
    if candidates.is_empty() {
        return Ok(report);
    }

    let hub = open_store(ctx, &config.hub.site_url).await?;
    for record in &candidates {
        let submission = match Submission::decode(record) {
            Ok(submission) => submission,
            Err(e) => {
                error!(submission = %record.id, error = %e, "rejecting malformed submission");
                report.failed += 1;
                continue;
            }
        };
        match process(ctx, config, cases.as_ref(), hub.as_ref(), &submission).await {
            Outcome::Linked { notified } => {
                report.linked.push(submission.id.clone());
                report.notified += usize::from(notified);
            }
            Outcome::Deferred => report.deferred += 1,
            Outcome::Failed => report.failed += 1,
        }
    }

    info!(
        linked = report.linked.len(),
        deferred = report.deferred,
        failed = report.failed,
        "link pass complete"
    );
    Ok(report)
}

async fn open_store(
    ctx: &ServiceContext,
    site_url: &str,
) -> Result<Box<dyn RecordStore>, ReconcileError> {
    ctx.connector
        .open_store(site_url)
        .await
        .map_err(|source| ReconcileError::Connect { target: site_url.to_string(), source })
}

/// Loads the hub request and checks that its site has been provisioned.
async fn ready_request(
    config: &Config,
    hub: &dyn RecordStore,
    submission: &Submission,
) -> Readiness {
    let Some(request_id) = submission.hub_request_id() else {
        debug!(submission = %submission.id, "no hub request assigned yet");
        return Readiness::NotYet;
    };

    let record = match hub.get(&config.hub.requests_list, &request_id.to_string()).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            info!(submission = %submission.id, request_id, "hub request not found yet");
            return Readiness::NotYet;
        }
        Err(e) => {
            warn!(
                submission = %submission.id,
                request_id,
                error = %e,
                "failed to load hub request"
            );
            return Readiness::NotYet;
        }
    };

    let request = match HubRequest::decode(&record) {
        Ok(request) => request,
        Err(e) => {
            error!(
                submission = %submission.id,
                request_id,
                error = %e,
                "rejecting malformed hub request"
            );
            return Readiness::Malformed;
        }
    };

    match request.status.as_deref() {
        None => {
            info!(submission = %submission.id, request_id, "hub request has no status yet");
            return Readiness::NotYet;
        }
        Some(status) if !request.is_provisioned() => {
            warn!(submission = %submission.id, request_id, status, "case site not created yet");
            return Readiness::NotYet;
        }
        Some(_) => {}
    }
    if request.site_url.is_none() {
        error!(submission = %submission.id, request_id, "provisioned request has no site url");
        return Readiness::NotYet;
    }
    Readiness::Ready(request)
}

async fn process(
    ctx: &ServiceContext,
    config: &Config,
    cases: &dyn RecordStore,
    hub: &dyn RecordStore,
    submission: &Submission,
) -> Outcome {
    let request = match ready_request(config, hub, submission).await {
        Readiness::Ready(request) => request,
        Readiness::NotYet => return Outcome::Deferred,
        Readiness::Malformed => return Outcome::Failed,
    };
    let site_url = request.site_url.as_deref().unwrap_or_default();
    info!(submission = %submission.id, site = site_url, "linking submission to case site");

    match ctx.connector.open_site(site_url).await {
        Ok(site) => prepare_site(ctx, config, cases, site.as_ref(), submission).await,
        Err(e) => {
            warn!(site = site_url, error = %e, "failed to open case site; skipping site setup");
        }
    }

    let list = &config.cases.submissions_list;
    if let Err(e) = cases.update(list, &submission.id, Submission::link_changes(&request)).await {
        error!(submission = %submission.id, error = %e, "failed to record case link");
        return Outcome::Failed;
    }

    let notified = notify_team(ctx, config, submission, &request).await;
    Outcome::Linked { notified }
}

/// Steps run against the case site. Failures are logged and do not stop the link.
async fn prepare_site(
    ctx: &ServiceContext,
    config: &Config,
    cases: &dyn RecordStore,
    site: &dyn CaseSite,
    submission: &Submission,
) {
    let placed = place_documents(ctx, config, site, submission).await;
    if !placed.is_complete() {
        warn!(
            submission = %submission.id,
            failed = placed.failed.len(),
            "some submission documents were not placed"
        );
    }

    if let Err(e) = restrict_submission_folder(site, &config.cases.submission_root).await {
        error!(submission = %submission.id, error = %e, "failed during folder permissions");
    }

    if submission.navigation_linked {
        debug!(submission = %submission.id, "navigation link already present");
    } else if let Err(e) = add_navigation_link(config, cases, site, submission).await {
        error!(submission = %submission.id, error = %e, "failed adding navigation link");
    }
}

async fn place_documents(
    ctx: &ServiceContext,
    config: &Config,
    site: &dyn CaseSite,
    submission: &Submission,
) -> PlacementReport {
    let mut report = PlacementReport::default();
    for category in DocumentCategory::ALL {
        let documents = submission.documents.category(category);
        if documents.is_empty() {
            continue;
        }
        let folder = format!("{}/{}", config.cases.submission_root, category.folder());
        debug!(folder = %folder, count = documents.len(), "adding documents");
        report.absorb(placement::place(ctx.blobs.as_ref(), site, &folder, documents).await);
    }
    report
}

/// Gives the submission folder its own permissions and downgrades every
/// principal on it to reader.
pub async fn restrict_submission_folder(
    site: &dyn CaseSite,
    folder: &str,
) -> Result<(), PortError> {
    site.ensure_folder(folder).await?;
    site.reset_role_inheritance(folder).await?;
    site.break_role_inheritance(folder).await?;
    for principal in site.role_principals(folder).await? {
        site.set_role(folder, &principal, Role::Reader).await?;
    }
    Ok(())
}

/// Portal page for a submission.
#[must_use]
pub fn portal_link(config: &Config, unique_id: &str) -> String {
    format!("{}/sau_requests/{unique_id}", config.cases.portal_url.trim_end_matches('/'))
}

async fn add_navigation_link(
    config: &Config,
    cases: &dyn RecordStore,
    site: &dyn CaseSite,
    submission: &Submission,
) -> Result<(), PortError> {
    let url = portal_link(config, &submission.unique_id);
    let nodes = site.navigation().await?;
    if nodes.iter().any(|node| node.url == url) {
        debug!(submission = %submission.id, "navigation node already exists");
    } else {
        let title = format!("{}{}", config.cases.reference_prefix, submission.reference);
        let position = nodes
            .iter()
            .find(|node| node.title == DOCUMENTS_NODE)
            .map_or(NavPosition::Last, |node| NavPosition::After(node.id.clone()));
        site.add_navigation(&title, &url, position).await?;
    }
    cases
        .update(&config.cases.submissions_list, &submission.id, Submission::navigation_marker())
        .await
}

/// Emails the case group's members; returns whether a message went out.
async fn notify_team(
    ctx: &ServiceContext,
    config: &Config,
    submission: &Submission,
    request: &HubRequest,
) -> bool {
    let (Some(group_id), Some(site_url)) =
        (request.group_id.as_deref(), request.site_url.as_deref())
    else {
        info!(submission = %submission.id, "no case group; skipping new case email");
        return false;
    };

    let members = match ctx.directory.members(group_id).await {
        Ok(members) if members.is_empty() => {
            info!(group = group_id, "case group has no members; skipping new case email");
            return false;
        }
        Ok(members) => members,
        Err(e) => {
            error!(group = group_id, error = %e, "failed to read case group members");
            return false;
        }
    };

    let project_id = request.project_id.as_deref().unwrap_or(&submission.reference);
    let case_id = format!("{}{project_id}", config.cases.reference_prefix);
    let site_name = format!("{} {project_id}", request.project_name.as_deref().unwrap_or_default());
    let email = notify::new_case_email(
        members,
        &config.templates.new_case_subject,
        &case_id,
        site_url,
        site_name.trim(),
    );

    info!(recipients = %email.to.join("; "), "sending new case email");
    match ctx.notifier.send(&email).await {
        Ok(()) => true,
        Err(e) => {
            error!(submission = %submission.id, error = %e, "error sending new case email");
            false
        }
    }
}
