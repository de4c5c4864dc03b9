//! Command dispatch and handlers.

pub mod access;
pub mod intake;
pub mod plan_files;
pub mod reconcile;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::context::ServiceContext;
use crate::model::ResponseKind;

/// Dispatch a parsed command to its handler.
///
/// `plan-files` runs without configuration; every other command loads the
/// config, builds a live [`ServiceContext`] and runs on a current-thread
/// runtime.
///
/// # Errors
///
/// Returns an error string if configuration fails or the selected command
/// handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    if let Command::PlanFiles { names } = &cli.command {
        return plan_files::run(names);
    }

    let config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    let ctx = ServiceContext::from_config(&config).map_err(|e| e.to_string())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {e}"))?;

    runtime.block_on(dispatch_with_context(&cli.command, &ctx, &config))
}

/// Dispatch a command with the given service context.
async fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    config: &Config,
) -> Result<(), String> {
    match command {
        Command::Link => reconcile::link(ctx, config).await,
        Command::Responses => reconcile::responses(ctx, config).await,
        Command::Drift { days, no_digest } => {
            reconcile::drift(ctx, config, days.unwrap_or(config.drift.window_days), !no_digest)
                .await
        }
        Command::Schedule => reconcile::schedule(ctx, config).await,
        Command::RunOnce => reconcile::run_once(ctx, config).await,
        Command::Submit { reference, unique_id, documents, request } => {
            intake::submit(ctx, config, reference, unique_id, documents, request.as_deref()).await
        }
        Command::Respond { unique_id, documents, withdrawal } => {
            let kind = if *withdrawal {
                ResponseKind::Withdrawal
            } else {
                ResponseKind::Information
            };
            intake::respond(ctx, config, unique_id, documents, kind).await
        }
        Command::Access { action } => access::run(ctx, config, action).await,
        Command::PlanFiles { names } => plan_files::run(names),
    }
}
