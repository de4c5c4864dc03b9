//! Service context bundling all port trait objects.

use crate::adapters::live::{
    GraphClient, GraphDirectory, GraphMailer, HttpBlobStore, LiveClock, UuidRunIds,
};
use crate::adapters::local::{LocalBlobs, LocalConnector, LocalDirectory, LocalOutbox};
use crate::config::{BlobBackend, Config, DirectoryBackend, MailBackend};
use crate::error::ConfigError;
use crate::ports::{BlobStore, Clock, DirectoryGroups, IdGenerator, Notifier, SiteConnector};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Passes borrow the
/// context; nothing in it carries state between passes.
pub struct ServiceContext {
    /// Clock for pass timestamps and drift windows.
    pub clock: Box<dyn Clock>,
    /// Run id source for pass spans.
    pub ids: Box<dyn IdGenerator>,
    /// Opens record stores and case sites.
    pub connector: Box<dyn SiteConnector>,
    /// Directory group membership.
    pub directory: Box<dyn DirectoryGroups>,
    /// Document blob retrieval.
    pub blobs: Box<dyn BlobStore>,
    /// Outgoing mail.
    pub notifier: Box<dyn Notifier>,
}

impl ServiceContext {
    /// Wires adapters as selected by the configuration.
    ///
    /// Stores and sites always come from the local data directory; the
    /// directory, blob and mail ports switch between local files and the
    /// remote services.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote backend is selected without the settings it needs.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let backends = &config.backends;
        let data_dir = backends.data_dir.as_path();
        let graph = || -> Result<GraphClient, ConfigError> {
            let token =
                backends.graph_token.as_deref().ok_or_else(|| missing("backends.graph_token"))?;
            Ok(GraphClient::new(&backends.graph_url, token))
        };

        let directory: Box<dyn DirectoryGroups> = match backends.directory {
            DirectoryBackend::Local => Box::new(LocalDirectory::new(data_dir)),
            DirectoryBackend::Graph => Box::new(GraphDirectory::new(graph()?)),
        };
        let blobs: Box<dyn BlobStore> = match backends.blobs {
            BlobBackend::Local => Box::new(LocalBlobs::new(data_dir)),
            BlobBackend::Http => {
                let url = backends
                    .blob_container_url
                    .as_deref()
                    .ok_or_else(|| missing("backends.blob_container_url"))?;
                Box::new(HttpBlobStore::new(url, backends.blob_query.as_deref()))
            }
        };
        let notifier: Box<dyn Notifier> = match backends.mail {
            MailBackend::Local => Box::new(LocalOutbox::new(data_dir)),
            MailBackend::Graph => {
                let sender =
                    backends.mail_sender.as_deref().ok_or_else(|| missing("backends.mail_sender"))?;
                Box::new(GraphMailer::new(graph()?, sender))
            }
        };

        Ok(Self {
            clock: Box::new(LiveClock),
            ids: Box::new(UuidRunIds),
            connector: Box::new(LocalConnector::new(data_dir)),
            directory,
            blobs,
            notifier,
        })
    }
}

fn missing(key: &str) -> ConfigError {
    ConfigError::Invalid { key: key.to_string(), reason: "required by the selected backend".into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_backends_need_no_credentials() {
        assert!(ServiceContext::from_config(&Config::default()).is_ok());
    }

    #[test]
    fn graph_mail_without_sender_is_rejected() {
        let mut config = Config::default();
        config.backends.mail = MailBackend::Graph;
        config.backends.graph_token = Some("t".into());
        let Err(err) = ServiceContext::from_config(&config) else {
            panic!("expected a configuration error");
        };
        assert!(err.to_string().contains("mail_sender"));
    }
}
