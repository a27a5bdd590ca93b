//! Error types for remote I/O and local files

use shared::ObjectId;

/// Remote store failures
#[derive(Debug)]
pub enum StoreError {
    /// Transport-level failure (connection refused, timeout, bad body)
    Http(reqwest::Error),
    /// Server answered with a non-success status
    Status { status: u16, body: String },
    /// Record does not exist remotely
    NotFound(ObjectId),
    /// Store refused the request
    Rejected(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Http(e) => write!(f, "HTTP error: {}", e),
            StoreError::Status { status, body } => write!(f, "Server returned {}: {}", status, body),
            StoreError::NotFound(id) => write!(f, "Record {} not found", id),
            StoreError::Rejected(msg) => write!(f, "Request rejected: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Http(e)
    }
}

/// Config / undo file failures
#[derive(Debug)]
pub enum FileError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Document written by an incompatible version
    UnsupportedVersion(u32),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileError::Io(e) => write!(f, "I/O error: {}", e),
            FileError::Json(e) => write!(f, "JSON error: {}", e),
            FileError::UnsupportedVersion(v) => write!(f, "Unsupported file version {}", v),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Io(e) => Some(e),
            FileError::Json(e) => Some(e),
            FileError::UnsupportedVersion(_) => None,
        }
    }
}

impl From<std::io::Error> for FileError {
    fn from(e: std::io::Error) -> Self {
        FileError::Io(e)
    }
}

impl From<serde_json::Error> for FileError {
    fn from(e: serde_json::Error) -> Self {
        FileError::Json(e)
    }
}
