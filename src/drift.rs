//! Team assignment drift: spot recent cases whose team was never changed
//! from the one captured at request time.
//!
//! A request counts as changed when its live group owners differ from the
//! captured owners, or its live members differ from the captured owners and
//! members combined. Unchanged requests are the ones still waiting for a team
//! and are escalated in a digest.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::ReconcileError;
use crate::model::{fields, HubRequest};
use crate::notify;
use crate::ports::Filter;

/// Message attached to requests whose site group is unknown.
pub const NO_GROUP_MESSAGE: &str = "Unable to determine site group, this could be due to an \
    error during site creation or the request has just been submitted.";

/// Drift verdict for one hub request. Lives for a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamAssignedInfo {
    /// Case reference.
    pub reference: String,
    /// Site URL, when provisioned.
    pub url: Option<String>,
    /// When the request was raised.
    pub created: DateTime<Utc>,
    /// Whether the team differs from the captured one.
    pub changed: bool,
    /// Diagnostic shown instead of a verdict.
    pub message: Option<String>,
}

/// Verdicts for every request in the window, in query order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// One entry per checked request.
    pub entries: Vec<TeamAssignedInfo>,
    /// Requests skipped because they could not be read or checked.
    pub skipped: usize,
}

impl DriftReport {
    /// Entries still waiting for a team, in query order.
    #[must_use]
    pub fn unchanged(&self) -> Vec<&TeamAssignedInfo> {
        self.entries.iter().filter(|e| !e.changed).collect()
    }
}

fn normalized(users: &[String]) -> BTreeSet<String> {
    users.iter().map(|u| u.trim().to_lowercase()).collect()
}

/// True when the two address lists do not hold the same users.
#[must_use]
pub fn users_differ(initial: &[String], live: &[String]) -> bool {
    normalized(initial) != normalized(live)
}

/// Compares the captured team with the live group.
#[must_use]
pub fn team_changed(
    owners: &[String],
    members: &[String],
    live_owners: &[String],
    live_members: &[String],
) -> bool {
    let everyone: Vec<String> = owners.iter().chain(members).cloned().collect();
    users_differ(owners, live_owners) || users_differ(&everyone, live_members)
}

/// Start of the drift window: midnight UTC, `window_days` before today.
///
/// `None` when the window reaches past the earliest representable date.
#[must_use]
pub fn window_start(now: DateTime<Utc>, window_days: u32) -> Option<DateTime<Utc>> {
    let day = now.date_naive().checked_sub_days(Days::new(u64::from(window_days)))?;
    Some(day.and_time(NaiveTime::MIN).and_utc())
}

/// Checks every recent case-work request against its live group.
///
/// # Errors
///
/// Returns an error if the window is out of range or the hub store cannot be
/// opened or queried; requests that cannot be read or whose group lookup
/// fails are skipped.
pub async fn detect_drift(
    ctx: &ServiceContext,
    config: &Config,
    window_days: u32,
) -> Result<DriftReport, ReconcileError> {
    let span = info_span!("detect_drift", run_id = %ctx.ids.generate_id(), window_days);
    check_window(ctx, config, window_days).instrument(span).await
}

async fn check_window(
    ctx: &ServiceContext,
    config: &Config,
    window_days: u32,
) -> Result<DriftReport, ReconcileError> {
    let since = window_start(ctx.clock.now(), window_days)
        .ok_or(ReconcileError::Window(window_days))?;
    let site_url = &config.hub.site_url;
    let hub = ctx
        .connector
        .open_store(site_url)
        .await
        .map_err(|source| ReconcileError::Connect { target: site_url.clone(), source })?;

    let mut clauses = vec![Filter::CreatedOnOrAfter(since)];
    if let Some(project_type) = &config.drift.project_type_id {
        clauses.push(Filter::eq(fields::PROJECT_TYPE, project_type.as_str()));
    }
    let list = &config.hub.requests_list;
    let records = hub
        .query(list, &Filter::And(clauses))
        .await
        .map_err(|source| ReconcileError::Query { list: list.clone(), source })?;
    info!(count = records.len(), "checking team assignment");

    let mut report = DriftReport::default();
    for record in &records {
        let request = match HubRequest::decode(record) {
            Ok(request) => request,
            Err(e) => {
                error!(request = %record.id, error = %e, "skipping malformed hub request");
                report.skipped += 1;
                continue;
            }
        };
        let mut info = TeamAssignedInfo {
            reference: request.title.clone().unwrap_or_else(|| request.id.to_string()),
            url: request.site_url.clone(),
            created: request.created,
            changed: false,
            message: None,
        };

        match request.group_id.as_deref() {
            Some(group_id) => {
                let live = async {
                    let members = ctx.directory.members(group_id).await?;
                    let owners = ctx.directory.owners(group_id).await?;
                    Ok::<_, crate::error::PortError>((owners, members))
                };
                match live.await {
                    Ok((owners, members)) => {
                        info.changed =
                            team_changed(&request.owners, &request.members, &owners, &members);
                    }
                    Err(e) => {
                        warn!(
                            request = request.id,
                            group = group_id,
                            error = %e,
                            "failed to read site group"
                        );
                        report.skipped += 1;
                        continue;
                    }
                }
            }
            None => info.message = Some(NO_GROUP_MESSAGE.to_string()),
        }
        report.entries.push(info);
    }
    Ok(report)
}

/// Emails the unchanged entries to the digest recipients.
///
/// Returns whether a digest was sent; nothing is sent when every team has
/// changed or no recipients are configured.
///
/// # Errors
///
/// Returns an error if the notifier fails.
pub async fn send_digest(
    ctx: &ServiceContext,
    config: &Config,
    report: &DriftReport,
) -> Result<bool, ReconcileError> {
    let unchanged = report.unchanged();
    let recipients = &config.drift.digest_recipients;
    if unchanged.is_empty() || recipients.is_empty() {
        info!(unchanged = unchanged.len(), "no team assignment digest to send");
        return Ok(false);
    }
    let email =
        notify::digest_email(recipients.clone(), &config.templates.digest_subject, &unchanged);
    info!(
        recipients = %recipients.join("; "),
        entries = unchanged.len(),
        "sending team assignment digest"
    );
    ctx.notifier.send(&email).await.map_err(ReconcileError::Notify)?;
    Ok(true)
}

/// Detects drift over the configured window and sends the digest.
///
/// # Errors
///
/// Returns an error if detection fails at the pass level or the digest
/// cannot be sent.
pub async fn run_drift_pass(
    ctx: &ServiceContext,
    config: &Config,
    window_days: u32,
) -> Result<DriftReport, ReconcileError> {
    let report = detect_drift(ctx, config, window_days).await?;
    send_digest(ctx, config, &report).await?;
    Ok(report)
}
