//! Runtime configuration, built once at start-up and passed by reference.
//!
//! Sources, lowest precedence first: built-in defaults, an optional YAML
//! file, then `CASELINK_*` environment variables (a `.env` file is loaded
//! into the environment first if present).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Placeholder substituted with the case reference in subject templates.
pub const ID_TOKEN: &str = "{ID}";

/// Longest accepted drift window, in days.
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Complete configuration for every pass and adapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The hub store holding provisioning requests.
    pub hub: HubConfig,
    /// The case store holding submissions and responses.
    pub cases: CasesConfig,
    /// Email subject templates.
    pub templates: Templates,
    /// Team assignment drift detection.
    pub drift: DriftConfig,
    /// Directory groups backing each staff role.
    pub roles: RoleGroups,
    /// Timer periods for `schedule`.
    pub schedule: ScheduleConfig,
    /// Adapter selection and endpoints.
    pub backends: BackendConfig,
}

/// Hub store location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Site hosting the requests list.
    pub site_url: String,
    /// Provisioning requests list.
    pub requests_list: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { site_url: "https://hub.local".into(), requests_list: "Casework Requests".into() }
    }
}

/// Case store location and site layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasesConfig {
    /// Site hosting the submissions and responses lists.
    pub site_url: String,
    /// Submissions list.
    pub submissions_list: String,
    /// Inbound responses list.
    pub responses_list: String,
    /// Folder on each case site that receives submission documents.
    pub submission_root: String,
    /// Applicant portal base URL, target of navigation links.
    pub portal_url: String,
    /// Prefix shown before case references, e.g. `SAU` in `SAU1042`.
    pub reference_prefix: String,
}

impl Default for CasesConfig {
    fn default() -> Self {
        Self {
            site_url: "https://cases.local".into(),
            submissions_list: "Submissions".into(),
            responses_list: "Information Responses".into(),
            submission_root: "Shared Documents/PA Submission".into(),
            portal_url: "https://portal.local".into(),
            reference_prefix: "SAU".into(),
        }
    }
}

/// Subject templates. All but the digest must contain [`ID_TOKEN`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    /// Sent to the case group when a submission is linked.
    pub new_case_subject: String,
    /// Sent to case owners when an information response arrives.
    pub response_subject: String,
    /// Sent to case owners when a withdrawal arrives.
    pub withdrawal_subject: String,
    /// Subject of the team assignment digest.
    pub digest_subject: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            new_case_subject: "New request {ID} submitted".into(),
            response_subject: "Information response received for {ID}".into(),
            withdrawal_subject: "Request {ID} has been withdrawn".into(),
            digest_subject: "Requests awaiting team assignment".into(),
        }
    }
}

/// Drift detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Trailing window, in days, of requests to check.
    pub window_days: u32,
    /// Project type id selecting case-work requests; `None` checks every request.
    pub project_type_id: Option<String>,
    /// Digest recipients.
    pub digest_recipients: Vec<String>,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self { window_days: 10, project_type_id: None, digest_recipients: Vec::new() }
    }
}

/// Directory group ids per staff role.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleGroups {
    /// Administrators.
    pub admin: Option<String>,
    /// Team leads.
    pub lead: Option<String>,
    /// Case team.
    pub team: Option<String>,
}

/// Timer periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between link and response passes.
    pub link_interval_secs: u64,
    /// Seconds between drift passes.
    pub drift_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { link_interval_secs: 300, drift_interval_secs: 86_400 }
    }
}

/// Which directory implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    /// `directory.json` in the data directory.
    #[default]
    Local,
    /// Microsoft Graph.
    Graph,
}

/// Which blob store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    /// `blobs/` in the data directory.
    #[default]
    Local,
    /// HTTP GET against a blob container URL.
    Http,
}

/// Which mail implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// JSON files in `outbox/` in the data directory.
    #[default]
    Local,
    /// Microsoft Graph `sendMail`.
    Graph,
}

/// Adapter selection and endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Directory implementation.
    pub directory: DirectoryBackend,
    /// Blob store implementation.
    pub blobs: BlobBackend,
    /// Mail implementation.
    pub mail: MailBackend,
    /// Root of the local stores, sites, blobs and outbox.
    pub data_dir: PathBuf,
    /// Graph API base URL.
    pub graph_url: String,
    /// Bearer token for Graph; acquired outside this process.
    pub graph_token: Option<String>,
    /// Mailbox that Graph mail is sent from.
    pub mail_sender: Option<String>,
    /// Blob container URL for the HTTP blob store.
    pub blob_container_url: Option<String>,
    /// Query string (e.g. a SAS token) appended to blob URLs.
    pub blob_query: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            directory: DirectoryBackend::Local,
            blobs: BlobBackend::Local,
            mail: MailBackend::Local,
            data_dir: PathBuf::from(".caselink"),
            graph_url: "https://graph.microsoft.com/v1.0".into(),
            graph_token: None,
            mail_sender: None,
            blob_container_url: None,
            blob_query: None,
        }
    }
}

impl Config {
    /// Loads `.env`, the optional YAML file and `CASELINK_*` overrides, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, an override has
    /// an invalid value, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML config file; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        serde_yaml::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }

    /// Applies `CASELINK_*` overrides. Unrelated variables are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or enumerated value does not parse.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix("CASELINK_") else {
                continue;
            };
            match name {
                "HUB_SITE" => self.hub.site_url = value,
                "REQUESTS_LIST" => self.hub.requests_list = value,
                "CASES_SITE" => self.cases.site_url = value,
                "SUBMISSIONS_LIST" => self.cases.submissions_list = value,
                "RESPONSES_LIST" => self.cases.responses_list = value,
                "SUBMISSION_ROOT" => self.cases.submission_root = value,
                "PORTAL_URL" => self.cases.portal_url = value,
                "REFERENCE_PREFIX" => self.cases.reference_prefix = value,
                "NEW_CASE_SUBJECT" => self.templates.new_case_subject = value,
                "RESPONSE_SUBJECT" => self.templates.response_subject = value,
                "WITHDRAWAL_SUBJECT" => self.templates.withdrawal_subject = value,
                "DIGEST_SUBJECT" => self.templates.digest_subject = value,
                "DIGEST_RECIPIENTS" => self.drift.digest_recipients = split_recipients(&value),
                "DRIFT_DAYS" => self.drift.window_days = parse_day_offset(&key, &value)?,
                "PROJECT_TYPE_ID" => self.drift.project_type_id = non_empty(value),
                "ADMIN_GROUP_ID" => self.roles.admin = non_empty(value),
                "LEAD_GROUP_ID" => self.roles.lead = non_empty(value),
                "TEAM_GROUP_ID" => self.roles.team = non_empty(value),
                "LINK_INTERVAL_SECS" => {
                    self.schedule.link_interval_secs = parse_number(&key, &value)?;
                }
                "DRIFT_INTERVAL_SECS" => {
                    self.schedule.drift_interval_secs = parse_number(&key, &value)?;
                }
                "DIRECTORY" => self.backends.directory = parse_choice(&key, &value)?,
                "BLOBS" => self.backends.blobs = parse_choice(&key, &value)?,
                "MAIL" => self.backends.mail = parse_choice(&key, &value)?,
                "DATA_DIR" => self.backends.data_dir = PathBuf::from(value),
                "GRAPH_URL" => self.backends.graph_url = value,
                "GRAPH_TOKEN" => self.backends.graph_token = non_empty(value),
                "MAIL_SENDER" => self.backends.mail_sender = non_empty(value),
                "BLOB_CONTAINER_URL" => self.backends.blob_container_url = non_empty(value),
                "BLOB_QUERY" => self.backends.blob_query = non_empty(value),
                _ => {}
            }
        }
        Ok(())
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, template) in [
            ("templates.new_case_subject", &self.templates.new_case_subject),
            ("templates.response_subject", &self.templates.response_subject),
            ("templates.withdrawal_subject", &self.templates.withdrawal_subject),
        ] {
            if !template.contains(ID_TOKEN) {
                return Err(invalid(key, format!("must contain {ID_TOKEN}")));
            }
        }
        for (key, list) in [
            ("hub.requests_list", &self.hub.requests_list),
            ("cases.submissions_list", &self.cases.submissions_list),
            ("cases.responses_list", &self.cases.responses_list),
            ("cases.submission_root", &self.cases.submission_root),
        ] {
            if list.trim().is_empty() {
                return Err(invalid(key, "must not be empty".into()));
            }
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.drift.window_days) {
            let reason = format!("must be between 1 and {MAX_WINDOW_DAYS}");
            return Err(invalid("drift.window_days", reason));
        }
        if self.schedule.link_interval_secs == 0 || self.schedule.drift_interval_secs == 0 {
            return Err(invalid("schedule", "intervals must be at least one second".into()));
        }
        let uses_graph = self.backends.directory == DirectoryBackend::Graph
            || self.backends.mail == MailBackend::Graph;
        if uses_graph && self.backends.graph_token.is_none() {
            return Err(invalid("backends.graph_token", "required by the graph backends".into()));
        }
        if self.backends.mail == MailBackend::Graph && self.backends.mail_sender.is_none() {
            return Err(invalid("backends.mail_sender", "required by graph mail".into()));
        }
        if self.backends.blobs == BlobBackend::Http && self.backends.blob_container_url.is_none() {
            return Err(invalid("backends.blob_container_url", "required by http blobs".into()));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: String) -> ConfigError {
    ConfigError::Invalid { key: key.to_string(), reason }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn split_recipients(value: &str) -> Vec<String> {
    value.split([';', ',']).map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, format!("expected a number, got {value:?}")))
}

/// Accepts both a window (`10`) and a day offset (`-10`).
fn parse_day_offset(key: &str, value: &str) -> Result<u32, ConfigError> {
    let offset: i64 = parse_number(key, value)?;
    u32::try_from(offset.unsigned_abs()).map_err(|_| invalid(key, "window too large".into()))
}

fn parse_choice<T: serde::de::DeserializeOwned>(key: &str, value: &str) -> Result<T, ConfigError> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_lowercase()))
        .map_err(|_| invalid(key, format!("unknown backend {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config
            .apply_env(vars(&[
                ("CASELINK_SUBMISSIONS_LIST", "Cases"),
                ("CASELINK_DRIFT_DAYS", "-14"),
                ("CASELINK_DIGEST_RECIPIENTS", "a@x.org; b@x.org;"),
                ("CASELINK_DIRECTORY", "Graph"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert_eq!(config.cases.submissions_list, "Cases");
        assert_eq!(config.drift.window_days, 14);
        assert_eq!(config.drift.digest_recipients, vec!["a@x.org", "b@x.org"]);
        assert_eq!(config.backends.directory, DirectoryBackend::Graph);
    }

    #[test]
    fn bad_numbers_and_backends_are_rejected() {
        let mut config = Config::default();
        assert!(config.apply_env(vars(&[("CASELINK_DRIFT_DAYS", "ten")])).is_err());
        assert!(config.apply_env(vars(&[("CASELINK_MAIL", "pigeon")])).is_err());
    }

    #[test]
    fn template_without_token_fails_validation() {
        let mut config = Config::default();
        config.templates.new_case_subject = "New request".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("new_case_subject"));
    }

    #[test]
    fn drift_window_is_bounded() {
        let mut config = Config::default();
        config.drift.window_days = 0;
        assert!(config.validate().is_err());
        config.drift.window_days = u32::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("drift.window_days"));
        config.drift.window_days = MAX_WINDOW_DAYS;
        config.validate().unwrap();
    }

    #[test]
    fn graph_backends_need_a_token() {
        let mut config = Config::default();
        config.backends.directory = DirectoryBackend::Graph;
        assert!(config.validate().is_err());
        config.backends.graph_token = Some("t".into());
        config.validate().unwrap();
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = std::env::temp_dir().join("caselink_config_yaml");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("caselink.yaml");
        std::fs::write(&path, "drift:\n  window_days: 3\ncases:\n  reference_prefix: REF\n")
            .unwrap();

        let config = Config::from_yaml_file(&path).unwrap();
        assert_eq!(config.drift.window_days, 3);
        assert_eq!(config.cases.reference_prefix, "REF");
        assert_eq!(config.cases.submissions_list, "Submissions");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
