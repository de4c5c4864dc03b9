//! `caselink access` command.

use crate::access;
use crate::cli::AccessCommand;
use crate::config::Config;
use crate::context::ServiceContext;

/// Execute an `access` subcommand.
///
/// # Errors
///
/// Returns an error string if the role has no group, the user is unknown or
/// the directory call fails.
pub async fn run(
    ctx: &ServiceContext,
    config: &Config,
    action: &AccessCommand,
) -> Result<(), String> {
    match action {
        AccessCommand::Grant { role, email } => {
            let user_id =
                access::grant_role(ctx, config, *role, email).await.map_err(|e| e.to_string())?;
            println!("{email} ({user_id}) is in the {role} group");
        }
        AccessCommand::Revoke { role, user_id } => {
            access::revoke_role(ctx, config, *role, user_id).await.map_err(|e| e.to_string())?;
            println!("{user_id} is not in the {role} group");
        }
        AccessCommand::List { role } => {
            let members =
                access::list_role(ctx, config, *role).await.map_err(|e| e.to_string())?;
            if members.is_empty() {
                println!("No members in the {role} group.");
            }
            for member in members {
                println!("{member}");
            }
        }
        AccessCommand::Check { user_id, unique_id } => {
            let allowed = access::has_case_access(ctx, config, user_id, unique_id)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", if allowed { "allowed" } else { "denied" });
        }
        AccessCommand::Mailbox { unique_id } => {
            match access::case_mailbox(ctx, config, unique_id).await.map_err(|e| e.to_string())? {
                Some(mailbox) => println!("{mailbox}"),
                None => return Err(format!("no mailbox recorded for request {unique_id}")),
            }
        }
    }
    Ok(())
}
