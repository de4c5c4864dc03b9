//! `caselink submit` and `caselink respond` commands.

use serde_json::Value;
use tracing::warn;

use crate::access;
use crate::config::Config;
use crate::context::ServiceContext;
use crate::intake;
use crate::model::ResponseKind;

fn parse_json(flag: &str, raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("--{flag} is not valid JSON: {e}"))
}

/// Execute the `submit` command.
///
/// # Errors
///
/// Returns an error string if a payload is not JSON or the submission is
/// rejected.
pub async fn submit(
    ctx: &ServiceContext,
    config: &Config,
    reference: &str,
    unique_id: &str,
    documents: &str,
    request: Option<&str>,
) -> Result<(), String> {
    let documents = parse_json("documents", documents)?;
    let request = request.map(|raw| parse_json("request", raw)).transpose()?;
    let id =
        intake::file_submission(ctx, config, reference, unique_id, &documents, request.as_ref())
            .await
            .map_err(|e| e.to_string())?;
    println!("Filed submission {id}");
    Ok(())
}

/// Execute the `respond` command, then print the case mailbox when one is
/// recorded.
///
/// # Errors
///
/// Returns an error string if the payload is not JSON or no single
/// submission matches `unique_id`.
pub async fn respond(
    ctx: &ServiceContext,
    config: &Config,
    unique_id: &str,
    documents: &str,
    kind: ResponseKind,
) -> Result<(), String> {
    let documents = parse_json("documents", documents)?;
    let id = intake::file_response(ctx, config, unique_id, &documents, kind)
        .await
        .map_err(|e| e.to_string())?;
    println!("Filed response {id}");
    match access::case_mailbox(ctx, config, unique_id).await {
        Ok(Some(mailbox)) => println!("Case mailbox: {mailbox}"),
        Ok(None) => {}
        Err(e) => warn!(unique_id, error = %e, "failed to resolve case mailbox"),
    }
    Ok(())
}
