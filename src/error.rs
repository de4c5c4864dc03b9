//! Error types shared across ports, decoding, configuration and passes.

use thiserror::Error;

/// Failure reported by an adapter behind one of the port traits.
#[derive(Debug, Error)]
pub enum PortError {
    /// The addressed record, group, blob or user does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The mutation conflicts with current state (e.g. already a member).
    #[error("conflict: {0}")]
    Conflict(String),
    /// A failure the caller may see succeed on a later pass.
    #[error("transient failure: {0}")]
    Transient(String),
    /// The remote side refused the request.
    #[error("rejected ({status}): {body}")]
    Rejected {
        /// HTTP-style status code.
        status: u16,
        /// Response body or reason.
        body: String,
    },
    /// Local I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP transport failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// A payload could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure decoding a raw store record into a typed model.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    /// A required field is absent or null.
    #[error("record {record}: missing field {field}")]
    MissingField {
        /// Record id.
        record: String,
        /// Field name.
        field: &'static str,
    },
    /// A field holds a value of the wrong shape.
    #[error("record {record}: field {field} expected {expected}")]
    WrongType {
        /// Record id.
        record: String,
        /// Field name.
        field: &'static str,
        /// Human description of the expected shape.
        expected: &'static str,
    },
    /// A serialized JSON payload stored in a field is malformed.
    #[error("record {record}: field {field} holds malformed json: {reason}")]
    MalformedPayload {
        /// Record id.
        record: String,
        /// Field name.
        field: &'static str,
        /// Parser message.
        reason: String,
    },
}

/// Failure building or validating the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The config file is not valid YAML for [`crate::config::Config`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: String,
        /// Underlying error.
        source: serde_yaml::Error,
    },
    /// A value failed validation.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Config key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Failure that ends a reconciliation pass early.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Opening a store or site connection failed.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        /// Site URL.
        target: String,
        /// Underlying error.
        source: PortError,
    },
    /// The candidate query for the pass failed.
    #[error("failed to query {list}: {source}")]
    Query {
        /// List name.
        list: String,
        /// Underlying error.
        source: PortError,
    },
    /// The pass notification could not be sent.
    #[error("failed to send notification: {0}")]
    Notify(PortError),
    /// The drift window reaches past the earliest representable date.
    #[error("drift window of {0} days is out of range")]
    Window(u32),
}

/// Failure in an intake or access operation.
#[derive(Debug, Error)]
pub enum RequestError {
    /// An adapter call failed.
    #[error(transparent)]
    Port(#[from] PortError),
    /// The submitted payload is malformed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    /// No single case matches the given unique id.
    #[error("no unique case for request {0}")]
    UnknownCase(String),
    /// The directory has no user for the given address.
    #[error("unknown user {0}")]
    UnknownUser(String),
    /// The role has no group configured.
    #[error("no group configured for role {0}")]
    UnmappedRole(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_record_and_field() {
        let err = DecodeError::MissingField { record: "7".into(), field: "Status" };
        assert_eq!(err.to_string(), "record 7: missing field Status");
    }

    #[test]
    fn request_error_is_transparent_over_port_errors() {
        let err = RequestError::from(PortError::NotFound("group g1".into()));
        assert_eq!(err.to_string(), "not found: group g1");
    }
}
