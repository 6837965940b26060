//! Error taxonomy for the session core
//!
//! None of these reach the display layer: the session turns them into an
//! assistant error message (send) or a log line (feedback).

use thiserror::Error;

/// Failure reported by the identity collaborator itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("login cancelled by user")]
    Cancelled,
    #[error("interaction required: {0}")]
    InteractionRequired(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("identity client is not initialized")]
    NotInitialized,
    #[error("interactive login failed: {0}")]
    LoginFailed(#[source] IdentityError),
    #[error("silent token acquisition failed: {0}")]
    TokenAcquisitionFailed(#[source] IdentityError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Any failure on the send or feedback path
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ChatError {
    /// Short label for logs
    pub fn stage(&self) -> &'static str {
        match self {
            ChatError::Auth(_) => "credentials",
            ChatError::Transport(_) => "transport",
        }
    }
}
