//! `caselink link`, `responses`, `drift`, `run-once` and `schedule` commands.

use crate::config::Config;
use crate::context::ServiceContext;
use crate::{drift, linking, responses, scheduler};

/// Execute the `link` command.
///
/// # Errors
///
/// Returns an error string if the pass cannot open or query its stores.
pub async fn link(ctx: &ServiceContext, config: &Config) -> Result<(), String> {
    let report = linking::reconcile_links(ctx, config).await.map_err(|e| e.to_string())?;
    println!(
        "Linked {} of {} submission(s): {} deferred, {} failed, {} notified",
        report.linked.len(),
        report.candidates,
        report.deferred,
        report.failed,
        report.notified
    );
    for reference in &report.linked {
        println!("  {reference}");
    }
    Ok(())
}

/// Execute the `responses` command.
///
/// # Errors
///
/// Returns an error string if the pass cannot open or query its stores.
pub async fn responses(ctx: &ServiceContext, config: &Config) -> Result<(), String> {
    let report = responses::reconcile_responses(ctx, config).await.map_err(|e| e.to_string())?;
    println!(
        "Filed {} of {} response(s): {} deferred, {} failed, {} notified",
        report.completed.len(),
        report.candidates,
        report.deferred,
        report.failed,
        report.notified
    );
    Ok(())
}

/// Execute the `drift` command.
///
/// Prints one row per request in the window; the digest is only sent when
/// `send` is set.
///
/// # Errors
///
/// Returns an error string if the hub cannot be queried or the digest
/// cannot be sent.
pub async fn drift(
    ctx: &ServiceContext,
    config: &Config,
    window_days: u32,
    send: bool,
) -> Result<(), String> {
    let report = drift::detect_drift(ctx, config, window_days).await.map_err(|e| e.to_string())?;
    if report.entries.is_empty() {
        println!("No requests created in the last {window_days} day(s).");
    }
    let width = report.entries.iter().map(|e| e.reference.len()).max().unwrap_or(9).max(9);
    for entry in &report.entries {
        let state = if entry.changed { "assigned" } else { "unchanged" };
        let note = entry.message.as_deref().unwrap_or("");
        println!("{:<width$}  {:<9}  {note}", entry.reference, state);
    }
    if report.skipped > 0 {
        println!("{} request(s) skipped", report.skipped);
    }
    if send {
        let sent = drift::send_digest(ctx, config, &report).await.map_err(|e| e.to_string())?;
        if sent {
            println!("Digest sent for {} request(s).", report.unchanged().len());
        }
    }
    Ok(())
}

/// Execute the `run-once` command.
///
/// # Errors
///
/// Never fails; pass errors are logged.
pub async fn run_once(ctx: &ServiceContext, config: &Config) -> Result<(), String> {
    scheduler::run_once(ctx, config).await;
    Ok(())
}

/// Execute the `schedule` command until Ctrl-C.
///
/// # Errors
///
/// Never fails; pass errors are logged.
pub async fn schedule(ctx: &ServiceContext, config: &Config) -> Result<(), String> {
    scheduler::run(ctx, config).await;
    Ok(())
}
