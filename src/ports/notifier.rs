//! Notification port for outbound mail.

use serde::{Deserialize, Serialize};

use super::PortFuture;

/// A composed HTML email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

/// Dispatches composed emails.
pub trait Notifier: Send + Sync {
    /// Sends `email` to every address in `email.to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport refuses or fails to deliver.
    fn send<'a>(&'a self, email: &'a Email) -> PortFuture<'a, ()>;
}
