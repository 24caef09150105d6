//! Error types for the client layer.
//!
//! # Design
//! None of these reach a caller as a failed `Result` from a plain call.
//! `TransportError` is what a transport hands back when it produced no
//! successful response; the classifier folds every variant into an
//! `Outcome`. `RefreshError` stays inside the crate and only decides whether
//! a retry happens. `ValidationError` is raised before anything is sent, and
//! `ClientError` only at construction time.

use thiserror::Error;

/// Transport-level failure of a single HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connect, send or receive phase exceeded its timeout.
    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    /// The server could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    BadResponse { status: u16, body: String },

    #[error("{0}")]
    Unknown(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Unknown(err.to_string())
    }
}

/// Local rejection of an operation before any request is dispatched.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported file type '.{extension}': expected one of .jpg, .jpeg, .png, .gif")]
    UnsupportedFileType { extension: String },

    #[error("file '{0}' has no extension: expected one of .jpg, .jpeg, .png, .gif")]
    MissingExtension(String),

    #[error("cannot read file '{path}': {source}")]
    UnreadableFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to construct an `ApiClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Why a refresh attempt did not produce new credentials.
#[derive(Debug, Error)]
pub(crate) enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh endpoint answered {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh response carried no access token")]
    MissingAccessToken,
}
