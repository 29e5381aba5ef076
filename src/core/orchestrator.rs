//! Main orchestrator for run task invocations.
//!
//! Authenticates the invocation, acknowledges it, then on a detached task
//! mints an AWX token, dispatches the action, reports the outcome to the
//! callback URL and revokes the token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument, warn, Instrument};

use crate::adapters::{
    http_client, ActionExecutor, AwxDispatcher, AwxTokenManager, CallbackClient,
    CredentialIssuer,
};
use crate::config::ResolvedConfig;
use crate::domain::{Action, ActionResult, Attempt, Stage, TaskInvocation, TaskStatus};

use super::delivery::ResultReporter;
use super::errors::AuthenticationError;
use super::signature::SignatureVerifier;

/// Run task orchestrator
pub struct Orchestrator {
    verifier: SignatureVerifier,
    credentials: Arc<dyn CredentialIssuer>,
    dispatcher: Arc<dyn ActionExecutor>,
    reporter: ResultReporter,
    in_flight: TaskTracker,
}

impl Orchestrator {
    pub fn new(
        verifier: SignatureVerifier,
        credentials: Arc<dyn CredentialIssuer>,
        dispatcher: Arc<dyn ActionExecutor>,
        reporter: ResultReporter,
    ) -> Self {
        Self {
            verifier,
            credentials,
            dispatcher,
            reporter,
            in_flight: TaskTracker::new(),
        }
    }

    /// Wire the HTTP adapters from resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let verifier = SignatureVerifier::new(config.hmac_key.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid HMAC key: {}", e))?;

        let client = http_client(config.platform.request_timeout)
            .context("Failed to build HTTP client")?;

        Ok(Self::new(
            verifier,
            Arc::new(AwxTokenManager::new(&config.platform, client.clone())),
            Arc::new(AwxDispatcher::new(&config.platform, client.clone())),
            ResultReporter::new(
                Arc::new(CallbackClient::new(client)),
                config.callback_delivery.clone(),
            ),
        ))
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Check the invocation's signature.
    ///
    /// Returns the attempt in the `Authenticated` stage, or the reason it was
    /// rejected.
    pub fn authenticate(
        &self,
        action: Action,
        invocation: &TaskInvocation,
        signature: Option<&str>,
    ) -> Result<Attempt, AuthenticationError> {
        let mut attempt = Attempt::new(action);

        match self
            .verifier
            .authenticate(&invocation.workspace_id, signature)
        {
            Ok(()) => {
                self.step(&mut attempt, Stage::Authenticated);
                Ok(attempt)
            }
            Err(e) => {
                self.step(&mut attempt, Stage::Rejected);
                warn!(
                    attempt_id = %attempt.id,
                    action = %attempt.action,
                    error = %e,
                    "Rejected run task invocation"
                );
                Err(e)
            }
        }
    }

    /// Authenticate, acknowledge, and start the downstream work.
    ///
    /// On success the caller answers 200 straight away; the returned handle
    /// resolves once the attempt has finished. Dropping the handle does not
    /// cancel the work, and [`drain`](Self::drain) waits for it.
    pub fn accept(
        self: &Arc<Self>,
        action: Action,
        invocation: TaskInvocation,
        signature: Option<&str>,
    ) -> Result<JoinHandle<Attempt>, AuthenticationError> {
        let mut attempt = self.authenticate(action, &invocation, signature)?;
        self.step(&mut attempt, Stage::Acknowledged);

        info!(
            attempt_id = %attempt.id,
            action = %attempt.action,
            run_id = %invocation.run_id,
            workspace = %invocation.workspace_name,
            "Run task event acknowledged"
        );

        let orchestrator = Arc::clone(self);
        Ok(self.in_flight.spawn(
            async move { orchestrator.execute(attempt, invocation).await }.in_current_span(),
        ))
    }

    /// Wait for acknowledged attempts to finish, up to `grace`.
    ///
    /// Called on shutdown so minted tokens are revoked and callbacks sent
    /// before the runtime goes away. Returns false if attempts were still
    /// running when the grace period ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.in_flight.close();

        let running = self.in_flight.len();
        if running > 0 {
            info!(running, grace_secs = grace.as_secs(), "Waiting for in-flight attempts");
        }

        match tokio::time::timeout(grace, self.in_flight.wait()).await {
            Ok(()) => true,
            Err(_) => {
                error!(
                    running = self.in_flight.len(),
                    "Shutdown grace period elapsed with attempts still running"
                );
                false
            }
        }
    }

    /// Drive an acknowledged attempt to completion.
    ///
    /// Mint, dispatch, report and revoke run in sequence. A minted token is
    /// revoked exactly once whatever happened in between.
    #[instrument(
        skip_all,
        fields(attempt_id = %attempt.id, action = %attempt.action, run_id = %invocation.run_id)
    )]
    pub async fn execute(&self, mut attempt: Attempt, invocation: TaskInvocation) -> Attempt {
        let started = Instant::now();

        if invocation.is_test() {
            info!("Test delivery, skipping AWX and callback");
            self.step(&mut attempt, Stage::Bypassed);
            return attempt;
        }

        let credential = match self.credentials.mint().await {
            Ok(credential) => {
                self.step(&mut attempt, Stage::CredentialMinted);
                Some(credential)
            }
            Err(e) => {
                error!(error = %e, "Failed to mint AWX token");
                attempt.outcome = Some(ActionResult::failed(e.to_string()));
                self.step(&mut attempt, Stage::Dispatched { success: false });
                None
            }
        };

        if let Some(ref credential) = credential {
            let result = self
                .dispatcher
                .dispatch(&attempt.action, &invocation, credential)
                .await;
            self.step(
                &mut attempt,
                Stage::Dispatched {
                    success: result.is_success(),
                },
            );
            attempt.outcome = Some(result);
        }

        self.report(&mut attempt, &invocation).await;

        if let Some(credential) = credential {
            let token_id = credential.id();
            if let Err(e) = self.credentials.revoke(credential).await {
                warn!(token_id, error = %e, "Failed to revoke AWX token");
                attempt.revoke_error = Some(e.to_string());
            }
            self.step(&mut attempt, Stage::CredentialRevoked);
        }

        info!(
            stage = %attempt.stage,
            duration_ms = started.elapsed().as_millis() as u64,
            "Run task attempt finished"
        );
        attempt
    }

    /// Send the single terminal status for this attempt
    async fn report(&self, attempt: &mut Attempt, invocation: &TaskInvocation) {
        let (status, message, url) = match attempt.outcome {
            Some(ActionResult::Succeeded {
                ref entity_name,
                ref details_url,
            }) => (
                TaskStatus::Passed,
                attempt.action.success_message(entity_name),
                Some(details_url.clone()),
            ),
            Some(ActionResult::Failed { ref reason }) => {
                (TaskStatus::Failed, reason.clone(), None)
            }
            None => (
                TaskStatus::Failed,
                "run task ended without an outcome".to_string(),
                None,
            ),
        };

        if let Err(e) = self
            .reporter
            .report(
                status,
                Some(message),
                url,
                &invocation.task_result_callback_url,
                &invocation.access_token,
            )
            .await
        {
            error!(%status, error = %e, "Failed to deliver task result");
        } else {
            info!(%status, "Task result delivered");
        }

        self.step(attempt, Stage::Reported);
    }

    /// Advance the attempt; an illegal transition is logged and ignored so
    /// that a minted token is still revoked.
    fn step(&self, attempt: &mut Attempt, stage: Stage) {
        if let Err(e) = attempt.advance(stage) {
            error!(attempt_id = %attempt.id, error = %e, "Attempt state machine violation");
        }
    }
}
