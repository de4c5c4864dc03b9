//! Directory port for group membership.

use super::PortFuture;

/// Queries and mutates directory group membership.
///
/// Reads are eventually consistent: a member added a moment ago may not yet
/// appear in [`DirectoryGroups::members`] or [`DirectoryGroups::is_member`].
/// Callers treat membership checks as advisory.
pub trait DirectoryGroups: Send + Sync {
    /// Returns the email addresses of the group's members.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be read.
    fn members<'a>(&'a self, group_id: &'a str) -> PortFuture<'a, Vec<String>>;

    /// Returns the email addresses of the group's owners.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be read.
    fn owners<'a>(&'a self, group_id: &'a str) -> PortFuture<'a, Vec<String>>;

    /// Adds the user to the group.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PortError::Conflict`] if the user is already a
    /// member, or another variant on failure.
    fn add_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, ()>;

    /// Removes the user from the group.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PortError::NotFound`] if the user is not a
    /// member, or another variant on failure.
    fn remove_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, ()>;

    /// Reports whether the user currently appears as a group member.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be read.
    fn is_member<'a>(&'a self, group_id: &'a str, user_id: &'a str) -> PortFuture<'a, bool>;

    /// Resolves a directory user id from an email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails; an unknown address is `Ok(None)`.
    fn user_id_for_email<'a>(&'a self, email: &'a str) -> PortFuture<'a, Option<String>>;

    /// Returns the user principal name of a directory user.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails; an unknown id is `Ok(None)`.
    fn user_principal_name<'a>(&'a self, user_id: &'a str) -> PortFuture<'a, Option<String>>;

    /// Invites an external address as a guest and returns the guest's user id.
    ///
    /// Invited users land on `redirect_url` after accepting.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PortError::NotFound`] if the address can be
    /// neither invited nor resolved, or another variant on failure.
    fn invite_guest<'a>(
        &'a self,
        email: &'a str,
        redirect_url: &'a str,
    ) -> PortFuture<'a, String>;
}
