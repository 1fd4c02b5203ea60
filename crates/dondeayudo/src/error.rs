//! Error types for dondeayudo.
//!
//! The crate-wide [`Error`] wraps three domain errors that callers can
//! match on directly:
//!
//! - [`TransformError`]: one source record could not become a [`Point`](crate::Point).
//!   The record is skipped, the batch continues.
//! - [`NetworkError`]: the backend could not be reached or answered badly.
//!   The repository degrades to cache or the fallback bundle.
//! - [`StorageError`]: the local cache is corrupted or over quota.
//!   The cache is cleared or the write is dropped.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dondeayudo operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Domain Errors ===
    /// A source record could not be transformed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// The backend call failed.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The local cache failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    // === Storage Errors ===
    /// Failed to open or create the cache database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Admin Errors ===
    /// An admin operation was attempted without a token.
    #[error("admin token is not configured (set api.admin_token or DONDEAYUDO_API__ADMIN_TOKEN)")]
    MissingAdminToken,

    /// A point submitted by an administrator failed client-side validation.
    #[error("invalid point: {message}")]
    InvalidPoint {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for dondeayudo operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid point error.
    #[must_use]
    pub fn invalid_point(message: impl Into<String>) -> Self {
        Self::InvalidPoint {
            message: message.into(),
        }
    }

    /// Check if this error came from the network layer.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// A malformed source record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Latitude or longitude is missing, not a number, zero, or out of range.
    #[error("record {id}: invalid coordinates (lat={lat:?}, lng={lng:?})")]
    InvalidCoordinates {
        /// Identifier of the offending record.
        id: String,
        /// Latitude as received, if it could be read as a number.
        lat: Option<f64>,
        /// Longitude as received, if it could be read as a number.
        lng: Option<f64>,
    },

    /// A required field is absent or blank.
    #[error("record {id}: missing required field '{field}'")]
    MissingField {
        /// Identifier of the offending record.
        id: String,
        /// Source-schema name of the field.
        field: &'static str,
    },

    /// The category is not one of the known values.
    #[error("record {id}: unknown category '{value}'")]
    UnknownCategory {
        /// Identifier of the offending record.
        id: String,
        /// The value received.
        value: String,
    },

    /// The publication state is not one of the known values.
    #[error("record {id}: unknown publication state '{value}'")]
    UnknownState {
        /// Identifier of the offending record.
        id: String,
        /// The value received.
        value: String,
    },

    /// The record is not a JSON object of the expected shape.
    #[error("record {index}: malformed record: {message}")]
    Malformed {
        /// Position of the record in its batch.
        index: usize,
        /// Deserializer message.
        message: String,
    },
}

/// A failed call to the backend.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The base URL could not be joined with an endpoint path.
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The URL that was rejected.
        url: String,
        /// Parser message.
        message: String,
    },

    /// The request never produced a response (refused, reset, timed out).
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Request URL.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Request URL.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },
}

impl NetworkError {
    /// Check if the failure was a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// The HTTP status, when the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A local cache failure.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The stored blob is not valid JSON or does not match its digest.
    #[error("cached snapshot under '{key}' is corrupted: {message}")]
    Corrupted {
        /// Storage key.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// Writing the blob would exceed the configured quota.
    #[error("snapshot of {size} bytes exceeds cache quota of {quota} bytes")]
    QuotaExceeded {
        /// Serialized size of the snapshot.
        size: usize,
        /// Configured quota.
        quota: usize,
    },

    /// The underlying database failed.
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The snapshot could not be serialized.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_display() {
        let err = TransformError::InvalidCoordinates {
            id: "abc".to_string(),
            lat: Some(0.0),
            lng: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("invalid coordinates"));
    }

    #[test]
    fn test_missing_field_display() {
        let err = TransformError::MissingField {
            id: "p1".to_string(),
            field: "nombre",
        };
        assert_eq!(err.to_string(), "record p1: missing required field 'nombre'");
    }

    #[test]
    fn test_from_transform_error_is_transparent() {
        let inner = TransformError::UnknownCategory {
            id: "x".to_string(),
            value: "otro".to_string(),
        };
        let expected = inner.to_string();
        let err: Error = inner.into();
        assert!(matches!(err, Error::Transform(_)));
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_status_error_display() {
        let err = NetworkError::Status {
            url: "http://localhost/api/puntos".to_string(),
            status: 503,
            body: "down".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("/api/puntos"));
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_network_error_is_network() {
        let err: Error = NetworkError::InvalidUrl {
            url: "nope".to_string(),
            message: "relative URL without a base".to_string(),
        }
        .into();
        assert!(err.is_network());
        assert!(!Error::MissingAdminToken.is_network());
    }

    #[test]
    fn test_quota_error_display() {
        let err = StorageError::QuotaExceeded {
            size: 10,
            quota: 5,
        };
        assert_eq!(
            err.to_string(),
            "snapshot of 10 bytes exceeds cache quota of 5 bytes"
        );
    }

    #[test]
    fn test_corrupted_error_display() {
        let err = StorageError::Corrupted {
            key: "donde-ayudo-data".to_string(),
            message: "expected value".to_string(),
        };
        assert!(err.to_string().contains("donde-ayudo-data"));
    }

    #[test]
    fn test_invalid_point_error() {
        let err = Error::invalid_point("name is required");
        assert_eq!(err.to_string(), "invalid point: name is required");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_open_error_display() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/cache.db",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err = Error::DatabaseOpen {
                path: PathBuf::from("/nonexistent/path/cache.db"),
                source: sqlite_err,
            };
            assert!(err.to_string().contains("/nonexistent/path/cache.db"));
        }
    }
}
