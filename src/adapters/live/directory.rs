//! Group membership through Microsoft Graph.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::graph::{GraphClient, Page};
use crate::error::PortError;
use crate::ports::{DirectoryGroups, PortFuture};

/// Directory adapter backed by the Graph `groups` and `users` endpoints.
pub struct GraphDirectory {
    graph: GraphClient,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryObject {
    mail: Option<String>,
    user_principal_name: Option<String>,
}

impl DirectoryObject {
    fn address(self) -> Option<String> {
        self.mail.or(self.user_principal_name).map(|a| a.to_lowercase())
    }
}

#[derive(Deserialize)]
struct UserId {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrincipalName {
    user_principal_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Invitation {
    invited_user: UserId,
}

/// OData filter matching users by mail address; quotes are doubled.
fn mail_filter(email: &str) -> String {
    format!("mail eq '{}'", email.replace('\'', "''"))
}

/// The id of the only user in a filter result; none when ambiguous.
fn sole_id(page: Page<UserId>) -> Option<String> {
    let mut users = page.value.into_iter();
    match (users.next(), users.next()) {
        (Some(user), None) => Some(user.id),
        _ => None,
    }
}

impl GraphDirectory {
    /// Creates the adapter over a shared Graph client.
    #[must_use]
    pub fn new(graph: GraphClient) -> Self {
        Self { graph }
    }

    async fn addresses(&self, group_id: &str, relation: &str) -> Result<Vec<String>, PortError> {
        let path = format!("groups/{group_id}/{relation}?$select=mail,userPrincipalName&$top=999");
        let page: Page<DirectoryObject> = GraphClient::json(self.graph.get(&path)).await?;
        Ok(page.value.into_iter().filter_map(DirectoryObject::address).collect())
    }

    /// Treats the address as a user principal name.
    async fn id_by_principal_name(&self, email: &str) -> Result<Option<String>, PortError> {
        let request = self.graph.get(&format!("users/{email}?$select=id"));
        match GraphClient::json::<UserId>(request).await {
            Ok(user) => Ok(Some(user.id)),
            Err(PortError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Searches users by mail address, for accounts whose UPN differs.
    async fn id_by_mail(&self, email: &str) -> Result<Option<String>, PortError> {
        let filter = mail_filter(email);
        let request =
            self.graph.get("users").query(&[("$filter", filter.as_str()), ("$select", "id")]);
        let page: Page<UserId> = GraphClient::json(request).await?;
        Ok(sole_id(page))
    }
}

impl DirectoryGroups for GraphDirectory {
    fn members<'a>(&'a self, group_id: &'a str) -> PortFuture<'a, Vec<String>> {
        Box::pin(self.addresses(group_id, "members"))
    }

    fn owners<'a>(&'a self, group_id: &'a str) -> PortFuture<'a, Vec<String>> {
        Box::pin(self.addresses(group_id, "owners"))
    }

    fn add_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            let body =
                json!({ "@odata.id": self.graph.url(&format!("directoryObjects/{user_id}")) });
            let request = self.graph.post(&format!("groups/{group_id}/members/$ref")).json(&body);
            match GraphClient::send(request).await {
                Ok(_) => Ok(()),
                // Graph reports an existing membership as a 400 rather than a 409.
                Err(PortError::Rejected { status: 400, body })
                    if body.contains("already exist") =>
                {
                    Err(PortError::Conflict(body))
                }
                Err(e) => Err(e),
            }
        })
    }

    fn remove_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, ()> {
        Box::pin(async move {
            let request = self.graph.delete(&format!("groups/{group_id}/members/{user_id}/$ref"));
            GraphClient::send(request).await.map(|_| ())
        })
    }

    fn is_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, bool> {
        Box::pin(async move {
            let request = self
                .graph
                .post(&format!("users/{user_id}/checkMemberGroups"))
                .json(&json!({ "groupIds": [group_id] }));
            let page: Page<String> = GraphClient::json(request).await?;
            Ok(page.value.iter().any(|id| id == group_id))
        })
    }

    fn user_id_for_email<'a>(&'a self, email: &'a str) -> PortFuture<'a, Option<String>> {
        Box::pin(async move {
            match self.id_by_principal_name(email).await? {
                Some(id) => Ok(Some(id)),
                None => {
                    debug!(email, "no user with that principal name; searching by mail");
                    self.id_by_mail(email).await
                }
            }
        })
    }

    fn user_principal_name<'a>(&'a self, user_id: &'a str) -> PortFuture<'a, Option<String>> {
        Box::pin(async move {
            let request = self.graph.get(&format!("users/{user_id}?$select=userPrincipalName"));
            match GraphClient::json::<PrincipalName>(request).await {
                Ok(user) => Ok(user.user_principal_name),
                Err(PortError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn invite_guest<'a>(
        &'a self,
        email: &'a str,
        redirect_url: &'a str,
    ) -> PortFuture<'a, String> {
        Box::pin(async move {
            let body = json!({
                "invitedUserEmailAddress": email,
                "inviteRedirectUrl": redirect_url,
                "sendInvitationMessage": true,
            });
            let request = self.graph.post("invitations").json(&body);
            match GraphClient::json::<Invitation>(request).await {
                Ok(invitation) => Ok(invitation.invited_user.id),
                // Addresses in a verified domain of the tenant cannot be invited.
                Err(PortError::Rejected { status, body }) => {
                    debug!(email, status, "invitation refused; resolving as a member");
                    self.id_by_principal_name(email)
                        .await?
                        .ok_or_else(|| PortError::NotFound(format!("user {email}: {body}")))
                }
                Err(e) => Err(e),
            }
        })
    }
}
