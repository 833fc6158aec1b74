use std::path::PathBuf;

use thiserror::Error;

/// Every failure the toolkit can report.
///
/// Transport and response errors carry the URL (or a short description of
/// what was being read) so that a logged error points at the failing call.
#[derive(Error, Debug)]
pub enum XnatError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Error {status} while calling {method} {url}")]
    Status {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Unexpected response from {context}: {message}")]
    Response { context: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to read DICOM file {path}: {message}")]
    Dicom { path: PathBuf, message: String },

    #[error("{0}")]
    Precondition(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an [XnatError], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Status,
    Response,
    Parse,
    Io,
    Precondition,
    Config,
}

impl XnatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            XnatError::Transport { .. } => ErrorKind::Transport,
            XnatError::Status { .. } => ErrorKind::Status,
            XnatError::Response { .. } => ErrorKind::Response,
            XnatError::Json(_) | XnatError::Dicom { .. } => ErrorKind::Parse,
            XnatError::Io { .. } => ErrorKind::Io,
            XnatError::Precondition(_) => ErrorKind::Precondition,
            XnatError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn response(context: impl Into<String>, message: impl Into<String>) -> Self {
        XnatError::Response {
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        XnatError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, XnatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = XnatError::Precondition("Project has not been defined.".to_string());
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(err.to_string(), "Project has not been defined.");

        let err = XnatError::response("/xapi/dicomscp", "empty list");
        assert_eq!(err.kind(), ErrorKind::Response);
        assert_eq!(
            err.to_string(),
            "Unexpected response from /xapi/dicomscp: empty list"
        );
    }

    #[test]
    fn test_json_error_is_parse() {
        let err: XnatError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
