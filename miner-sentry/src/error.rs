//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Device {endpoint} unreachable: {reason}")]
    DeviceUnreachable { endpoint: String, reason: String },

    #[error("Device {endpoint} returned a malformed response: {reason}")]
    DeviceMalformed { endpoint: String, reason: String },

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} {path}: {source}")]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the error originates from the storage backend.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::DatabaseSqlx(_) | Self::Migration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Miner", 42);
        assert_eq!(err.to_string(), "Entity not found: Miner with id 42");
    }

    #[test]
    fn test_device_errors_embed_endpoint() {
        let err = Error::DeviceUnreachable {
            endpoint: "http://10.0.0.5".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("http://10.0.0.5"));
        assert!(!err.is_storage());
    }

    #[test]
    fn test_io_path_context() {
        let err = Error::io_path(
            "writing",
            Path::new("/tmp/config.json"),
            std::io::Error::other("disk full"),
        );
        let msg = err.to_string();
        assert!(msg.contains("writing"));
        assert!(msg.contains("/tmp/config.json"));
    }
}
