//! Error taxonomy shared by every component of the library.
//!
//! Components never retry or swallow failures; each variant carries enough
//! context (service and method, SQL text, node type and source id) to
//! diagnose a failure without re-running the operation.

use crate::db::DbTableIds;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// How a remote call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFailure {
    /// The server answered with a SOAP fault; the fault string is kept verbatim.
    Fault(String),
    /// The request left but no usable answer came back.
    Transport(String),
    /// Non-success HTTP status without a fault body.
    Status(u16, String),
    /// The answer could not be parsed as a SOAP envelope.
    Malformed(String),
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteFailure::Fault(msg) => write!(f, "server fault: {}", msg),
            RemoteFailure::Transport(msg) => write!(f, "transport failure: {}", msg),
            RemoteFailure::Status(code, body) => write!(f, "HTTP {}: {}", code, body),
            RemoteFailure::Malformed(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    #[error("remote call {service}.{method} failed: {failure}")]
    RemoteCall {
        service: String,
        method: String,
        failure: RemoteFailure,
    },

    #[error("query failed: {message} (sql: {sql})")]
    Query { sql: String, message: String },

    #[error("server rejected change to {table}: {message}")]
    Validation { table: String, message: String },

    #[error("duplication of {object_type} '{source_id}' aborted: {source}")]
    Duplication {
        object_type: String,
        source_id: String,
        /// Records already created on the target; they are not rolled back.
        created: DbTableIds,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid duplication plan: {0}")]
    Plan(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("report error: {0}")]
    Report(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn remote(service: &str, method: &str, failure: RemoteFailure) -> Self {
        Error::RemoteCall {
            service: service.to_string(),
            method: method.to_string(),
            failure,
        }
    }

    pub fn query(sql: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Query {
            sql: sql.into(),
            message: message.to_string(),
        }
    }

    /// Plan-level problems (bad overrides, missing source rows) are reported
    /// through the same duplication variant as failures during the walk.
    pub fn duplication(object_type: &str, source_id: &str, cause: Error) -> Self {
        Error::Duplication {
            object_type: object_type.to_string(),
            source_id: source_id.to_string(),
            created: DbTableIds::new(),
            source: Box::new(cause),
        }
    }

    /// Server-reported fault text, if this error carries one.
    pub fn fault_text(&self) -> Option<&str> {
        match self {
            Error::RemoteCall {
                failure: RemoteFailure::Fault(msg),
                ..
            } => Some(msg),
            Error::Validation { message, .. } => Some(message),
            Error::Duplication { source, .. } => source.fault_text(),
            _ => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Snapshot(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_text_reaches_through_duplication() {
        let inner = Error::Validation {
            table: "ARTIKEL".to_string(),
            message: "Feld ARTIKEL ist Pflicht".to_string(),
        };
        let err = Error::duplication("Artikel", "A100", inner);

        assert_eq!(err.fault_text(), Some("Feld ARTIKEL ist Pflicht"));
        assert!(err.to_string().contains("Artikel 'A100'"));
    }

    #[test]
    fn remote_error_display_names_the_call() {
        let err = Error::remote(
            "p2core/Table",
            "getCompleteSQL",
            RemoteFailure::Fault("syntax error".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "remote call p2core/Table.getCompleteSQL failed: server fault: syntax error"
        );
    }
}
