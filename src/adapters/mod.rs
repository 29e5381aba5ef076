//! Adapter interfaces for external systems.
//!
//! The orchestrator only talks to AWX and Terraform Cloud through these
//! traits, so tests can swap in fakes and count calls.

pub mod awx;
pub mod callback;
pub mod credentials;

use std::time::Duration;

use async_trait::async_trait;

use crate::core::errors::{CredentialError, ReportDeliveryError};
use crate::domain::{Action, ActionResult, DownstreamCredential, TaskInvocation, TaskStatusReport};

// Re-export the HTTP implementations
pub use awx::AwxDispatcher;
pub use callback::CallbackClient;
pub use credentials::AwxTokenManager;

/// Mints and revokes per-attempt AWX credentials
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn mint(&self) -> Result<DownstreamCredential, CredentialError>;

    /// Revoke a credential. Consumes it so it cannot be revoked twice.
    async fn revoke(&self, credential: DownstreamCredential) -> Result<(), CredentialError>;
}

/// Executes one downstream action and normalizes the outcome
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Never errors: transport and decode failures come back as
    /// [`ActionResult::Failed`].
    async fn dispatch(
        &self,
        action: &Action,
        invocation: &TaskInvocation,
        credential: &DownstreamCredential,
    ) -> ActionResult;
}

/// Delivers a task result document to the control plane
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn deliver(
        &self,
        report: &TaskStatusReport,
        callback_url: &str,
        access_token: &str,
    ) -> Result<(), ReportDeliveryError>;
}

/// Build an HTTP client with the per-call timeout shared by every adapter
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("arts/", env!("CARGO_PKG_VERSION")))
        .build()
}
