//! Mail written as numbered JSON files instead of being sent.

use std::path::{Path, PathBuf};

use tracing::info;

use super::write_json;
use crate::error::PortError;
use crate::ports::{Email, Notifier, PortFuture};

/// Notifier that drops each email into `<data>/outbox/<n>.json`.
pub struct LocalOutbox {
    dir: PathBuf,
}

impl LocalOutbox {
    /// Uses `<data_dir>/outbox`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self { dir: data_dir.join("outbox") }
    }

    fn deliver(&self, email: &Email) -> Result<(), PortError> {
        let existing = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries.count(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        let path = self.dir.join(format!("{:06}.json", existing + 1));
        write_json(&path, email)?;
        info!(path = %path.display(), recipients = email.to.len(), "mail written to outbox");
        Ok(())
    }
}

impl Notifier for LocalOutbox {
    fn send<'a>(&'a self, email: &'a Email) -> PortFuture<'a, ()> {
        Box::pin(std::future::ready(self.deliver(email)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emails_are_numbered_in_send_order() {
        let dir = std::env::temp_dir().join("caselink_local_outbox");
        let _ = std::fs::remove_dir_all(&dir);
        let outbox = LocalOutbox::new(&dir);
        let email =
            Email { to: vec!["a@x.org".into()], subject: "s".into(), html_body: "<p>b</p>".into() };

        outbox.send(&email).await.unwrap();
        outbox.send(&email).await.unwrap();

        let second: Email =
            serde_json::from_str(&std::fs::read_to_string(dir.join("outbox/000002.json")).unwrap())
                .unwrap();
        assert_eq!(second, email);
    }
}
