//! Error taxonomy for the orchestration pipeline.
//!
//! Only [`AuthenticationError`] changes the synchronous HTTP response. The
//! others are folded into a `failed` task result or logged.

use thiserror::Error;

/// Bad or missing request signature
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("missing task signature header")]
    MissingSignature,

    #[error("task signature does not match workspace {workspace_id}")]
    SignatureMismatch { workspace_id: String },
}

/// Failure minting or revoking an AWX token
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("token request failed: {0}")]
    Transport(String),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("could not decode token response: {0}")]
    Decode(String),

    #[error("token response did not contain a token")]
    EmptyToken,
}

/// Failure launching a template or creating an inventory.
///
/// The display text becomes the `message` of the failed task result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Transport(String),

    #[error("AWX returned {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("could not decode AWX response: {0}")]
    Decode(String),

    /// AWX accepted the request but answered with a validation error list
    #[error("{0}")]
    Validation(String),
}

/// Failure delivering the task result to the callback URL
#[derive(Debug, Error)]
pub enum ReportDeliveryError {
    #[error("could not serialize task result: {0}")]
    Serialize(String),

    #[error("callback request failed: {0}")]
    Transport(String),

    #[error("callback returned {status}")]
    Status { status: u16 },
}

impl From<reqwest::Error> for CredentialError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CredentialError::Decode(err.to_string())
        } else {
            CredentialError::Transport(err.to_string())
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DispatchError::Decode(err.to_string())
        } else {
            DispatchError::Transport(err.to_string())
        }
    }
}

impl From<reqwest::Error> for ReportDeliveryError {
    fn from(err: reqwest::Error) -> Self {
        ReportDeliveryError::Transport(err.to_string())
    }
}
