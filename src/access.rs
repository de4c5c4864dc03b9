//! Staff role membership and per-case access checks.
//!
//! Membership reads are advisory: the directory may not yet show a user who
//! was just added, so a duplicate add reported as a conflict is treated as
//! success, as is removing a user who is already gone.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::{PortError, RequestError};
use crate::model::{fields, Submission};
use crate::ports::Filter;

/// Staff roles, each backed by one directory group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffRole {
    /// Administrators.
    Admin,
    /// Team leads.
    Lead,
    /// Case team members.
    Team,
}

impl StaffRole {
    /// The configured group for this role.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::UnmappedRole`] when no group is configured.
    pub fn group_id(self, config: &Config) -> Result<&str, RequestError> {
        let group = match self {
            Self::Admin => &config.roles.admin,
            Self::Lead => &config.roles.lead,
            Self::Team => &config.roles.team,
        };
        group.as_deref().ok_or_else(|| RequestError::UnmappedRole(self.to_string()))
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::Lead => "lead",
            Self::Team => "team",
        })
    }
}

impl FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "lead" => Ok(Self::Lead),
            "team" => Ok(Self::Team),
            other => Err(format!("unknown role {other}; expected admin, lead or team")),
        }
    }
}

/// Adds the user with this address to the role's group and returns their id.
///
/// An address the directory does not know is invited as a guest first, landing
/// on the portal once the invitation is accepted.
///
/// # Errors
///
/// Returns an error if the role has no group, the address can be neither
/// resolved nor invited, or the directory call fails.
pub async fn grant_role(
    ctx: &ServiceContext,
    config: &Config,
    role: StaffRole,
    email: &str,
) -> Result<String, RequestError> {
    let group_id = role.group_id(config)?;
    let user_id = match ctx.directory.user_id_for_email(email).await? {
        Some(id) => id,
        None => invite(ctx, config, email).await?,
    };

    if ctx.directory.is_member(group_id, &user_id).await? {
        debug!(user = %user_id, %role, "already a member");
        return Ok(user_id);
    }
    match ctx.directory.add_member(group_id, &user_id).await {
        Ok(()) => info!(user = %user_id, %role, "added to role group"),
        Err(PortError::Conflict(_)) => debug!(user = %user_id, %role, "membership already pending"),
        Err(e) => return Err(e.into()),
    }
    Ok(user_id)
}

async fn invite(
    ctx: &ServiceContext,
    config: &Config,
    email: &str,
) -> Result<String, RequestError> {
    match ctx.directory.invite_guest(email, &config.cases.portal_url).await {
        Ok(id) => {
            info!(user = %id, email, "invited guest user");
            Ok(id)
        }
        Err(PortError::NotFound(_)) => Err(RequestError::UnknownUser(email.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Removes the user from the role's group.
///
/// # Errors
///
/// Returns an error if the role has no group or the directory call fails.
pub async fn revoke_role(
    ctx: &ServiceContext,
    config: &Config,
    role: StaffRole,
    user_id: &str,
) -> Result<(), RequestError> {
    let group_id = role.group_id(config)?;
    match ctx.directory.remove_member(group_id, user_id).await {
        Ok(()) => info!(user = user_id, %role, "removed from role group"),
        Err(PortError::NotFound(_)) => debug!(user = user_id, %role, "was not a member"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Current member addresses of the role's group.
///
/// # Errors
///
/// Returns an error if the role has no group or the directory call fails.
pub async fn list_role(
    ctx: &ServiceContext,
    config: &Config,
    role: StaffRole,
) -> Result<Vec<String>, RequestError> {
    let group_id = role.group_id(config)?;
    Ok(ctx.directory.members(group_id).await?)
}

/// Whether the user belongs to the case group of the submission with `unique_id`.
///
/// False when no single submission matches or it has no case group yet.
///
/// # Errors
///
/// Returns an error if the store or directory cannot be read.
pub async fn has_case_access(
    ctx: &ServiceContext,
    config: &Config,
    user_id: &str,
    unique_id: &str,
) -> Result<bool, RequestError> {
    let Some(submission) = sole_submission(ctx, config, unique_id).await? else {
        return Ok(false);
    };
    match submission.case_group_id {
        Some(group_id) => Ok(ctx.directory.is_member(&group_id, user_id).await?),
        None => {
            info!(unique_id, "unable to find case group for request");
            Ok(false)
        }
    }
}

/// Principal name of the external mailbox captured for the case of `unique_id`.
///
/// `Ok(None)` when the case has no mailbox recorded or the directory no longer
/// knows the mailbox user.
///
/// # Errors
///
/// Returns [`RequestError::UnknownCase`] unless exactly one submission matches,
/// or an error if the store or directory cannot be read.
pub async fn case_mailbox(
    ctx: &ServiceContext,
    config: &Config,
    unique_id: &str,
) -> Result<Option<String>, RequestError> {
    let submission = sole_submission(ctx, config, unique_id)
        .await?
        .ok_or_else(|| RequestError::UnknownCase(unique_id.to_string()))?;
    let Some(mailbox_id) = submission.external_mailbox_id else {
        error!(unique_id, "case has no external mailbox recorded");
        return Ok(None);
    };
    Ok(ctx.directory.user_principal_name(&mailbox_id).await?)
}

async fn sole_submission(
    ctx: &ServiceContext,
    config: &Config,
    unique_id: &str,
) -> Result<Option<Submission>, RequestError> {
    let cases = ctx.connector.open_store(&config.cases.site_url).await?;
    let matches = cases
        .query(&config.cases.submissions_list, &Filter::eq(fields::UNIQUE_ID, unique_id))
        .await?;
    let [record] = matches.as_slice() else {
        info!(unique_id, matches = matches.len(), "no unique case for request");
        return Ok(None);
    };
    Submission::decode(record)
        .map(Some)
        .map_err(|e| RequestError::InvalidPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryServices;
    use crate::ports::DirectoryGroups;
    use chrono::Utc;
    use serde_json::json;

    fn config() -> Config {
        let mut config = Config::default();
        config.roles.team = Some("team-group".into());
        config
    }

    fn services() -> MemoryServices {
        let services = MemoryServices::new(Utc::now());
        services.directory.add_user("u1", "ann@x.org");
        services
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Lead".parse::<StaffRole>(), Ok(StaffRole::Lead));
        assert!("owner".parse::<StaffRole>().is_err());
    }

    #[tokio::test]
    async fn grant_tolerates_lagging_membership() {
        let services = services();
        services.directory.set_lagging(true);
        let ctx = services.context();

        let id = grant_role(&ctx, &config(), StaffRole::Team, "Ann@X.org").await.unwrap();
        assert_eq!(id, "u1");
        // The first add is not visible yet; granting again must still succeed.
        grant_role(&ctx, &config(), StaffRole::Team, "ann@x.org").await.unwrap();

        services.directory.settle();
        assert_eq!(list_role(&ctx, &config(), StaffRole::Team).await.unwrap(), vec!["ann@x.org"]);
    }

    #[tokio::test]
    async fn unknown_addresses_are_invited_as_guests() {
        let services = services();
        let ctx = services.context();

        let id = grant_role(&ctx, &config(), StaffRole::Team, "Eve@Partner.org").await.unwrap();
        assert_eq!(services.directory.invited(), vec!["eve@partner.org"]);
        assert!(services.directory.is_member("team-group", &id).await.unwrap());

        // A second grant resolves the guest instead of inviting again.
        grant_role(&ctx, &config(), StaffRole::Team, "eve@partner.org").await.unwrap();
        assert_eq!(services.directory.invited().len(), 1);
    }

    #[tokio::test]
    async fn refused_invitations_and_unmapped_roles_are_errors() {
        let services = services();
        services.directory.refuse_invitations();
        let ctx = services.context();
        let err = grant_role(&ctx, &config(), StaffRole::Team, "nobody@x.org").await.unwrap_err();
        assert!(matches!(err, RequestError::UnknownUser(_)));
        let err = list_role(&ctx, &config(), StaffRole::Admin).await.unwrap_err();
        assert!(matches!(err, RequestError::UnmappedRole(_)));
    }

    #[tokio::test]
    async fn revoking_a_non_member_succeeds() {
        let ctx = services().context();
        revoke_role(&ctx, &config(), StaffRole::Team, "u1").await.unwrap();
    }

    #[tokio::test]
    async fn case_access_follows_the_case_group() {
        let services = services();
        let config = config();
        let cases = services.store(&config.cases.site_url);
        let list = &config.cases.submissions_list;
        cases.insert(
            list,
            "1",
            Utc::now(),
            json!({"Title": "17", "RequestUniqueID": "U-17", "CaseGroupID": "g17"}),
        );
        cases.insert(list, "2", Utc::now(), json!({"Title": "18", "RequestUniqueID": "U-18"}));
        services.directory.seed_member("g17", "u1");
        let ctx = services.context();

        assert!(has_case_access(&ctx, &config, "u1", "U-17").await.unwrap());
        assert!(!has_case_access(&ctx, &config, "u2", "U-17").await.unwrap());
        assert!(!has_case_access(&ctx, &config, "u1", "U-18").await.unwrap());
        assert!(!has_case_access(&ctx, &config, "u1", "U-99").await.unwrap());
    }

    #[tokio::test]
    async fn case_mailbox_resolves_the_external_mailbox_user() {
        let services = services();
        let config = config();
        services.directory.add_user("mbx-17", "SAU17@cases.example.org");
        let cases = services.store(&config.cases.site_url);
        let list = &config.cases.submissions_list;
        let fields = json!({
            "Title": "17",
            "RequestUniqueID": "U-17",
            "CaseExternalMailboxID": "mbx-17"
        });
        cases.insert(list, "1", Utc::now(), fields);
        cases.insert(list, "2", Utc::now(), json!({"Title": "18", "RequestUniqueID": "U-18"}));
        cases.insert(list, "3", Utc::now(), json!({"Title": "19", "RequestUniqueID": "U-19"}));
        cases.insert(list, "4", Utc::now(), json!({"Title": "19", "RequestUniqueID": "U-19"}));
        let ctx = services.context();

        assert_eq!(
            case_mailbox(&ctx, &config, "U-17").await.unwrap().as_deref(),
            Some("sau17@cases.example.org")
        );
        assert_eq!(case_mailbox(&ctx, &config, "U-18").await.unwrap(), None);
        let err = case_mailbox(&ctx, &config, "U-19").await.unwrap_err();
        assert!(matches!(err, RequestError::UnknownCase(_)));
        let err = case_mailbox(&ctx, &config, "U-99").await.unwrap_err();
        assert!(matches!(err, RequestError::UnknownCase(_)));
    }
}
