// connect-client/src/error.rs
use common::ApiError;
use std::fmt;
use thiserror::Error;

/// Connect server endpoints used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    SessionInit,
    SessionConfirm,
    SessionEnd,
    TransactionSign,
}

impl Endpoint {
    /// Path relative to the server base URL
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::SessionInit => "session/init",
            Endpoint::SessionConfirm => "session/confirm",
            Endpoint::SessionEnd => "session/end",
            Endpoint::TransactionSign => "transaction/sign",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            Endpoint::SessionInit => "session initialization",
            Endpoint::SessionConfirm => "session confirmation",
            Endpoint::SessionEnd => "ending session",
            Endpoint::TransactionSign => "transaction signing",
        };
        f.write_str(action)
    }
}

/// Failure to reach the connect server or to read its response
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("failed to read response: {0}")]
    Body(String),
}

/// Failure of request or response authentication
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("server response is missing the Server-Authorization header")]
    ServerAuthMissing,
    #[error("server response failed authentication: {0}")]
    ServerAuthInvalid(String),
    #[error("malformed authorization header: {0}")]
    MalformedHeader(String),
    #[error("unable to derive credentials: {0}")]
    InvalidCredentials(String),
}

/// Failure of the local persistent store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("{endpoint} failed with status {status}: {error}")]
    ServerRejected {
        endpoint: Endpoint,
        status: u16,
        error: ApiError,
    },

    #[error("authentication failure: {0}")]
    Authentication(#[from] AuthError),

    #[error("no active session")]
    NoActiveSession,

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid response from connect server: {0}")]
    InvalidResponse(String),

    #[error("transaction codec error: {0}")]
    Codec(String),

    #[error("not supported: {0}")]
    Unsupported(String),
}

impl ConnectError {
    /// Whether retrying the same operation could succeed. Authentication
    /// failures are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::Transport(_))
    }

    /// The endpoint that rejected the request, if the server rejected it
    pub fn rejected_by(&self) -> Option<Endpoint> {
        match self {
            ConnectError::ServerRejected { endpoint, .. } => Some(*endpoint),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectError>;
