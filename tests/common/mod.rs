//! Fake adapters shared by the integration tests.
//!
//! Every fake records its calls so tests can assert exactly how many times
//! AWX and the callback were touched.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use arts::adapters::{ActionExecutor, CredentialIssuer, StatusSink};
use arts::core::{
    CredentialError, DeliveryPolicy, Orchestrator, ReportDeliveryError, ResultReporter,
    SignatureVerifier,
};
use arts::domain::{
    Action, ActionResult, DownstreamCredential, LaunchOverrides, TaskInvocation,
    TaskStatusReport,
};

pub const SECRET: &[u8] = b"integration-secret";
pub const CALLBACK_URL: &str = "https://app.terraform.io/api/v2/task-results/tr-1/callback";

#[derive(Default)]
pub struct Calls {
    pub mints: AtomicUsize,
    pub revokes: AtomicUsize,
    pub revoked_ids: Mutex<Vec<u64>>,
    pub dispatches: AtomicUsize,
    pub deliveries: AtomicUsize,
    pub reports: Mutex<Vec<(TaskStatusReport, String, String)>>,
}

impl Calls {
    pub fn mints(&self) -> usize {
        self.mints.load(Ordering::SeqCst)
    }

    pub fn revokes(&self) -> usize {
        self.revokes.load(Ordering::SeqCst)
    }

    pub fn dispatches(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    pub fn deliveries(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> Vec<(TaskStatusReport, String, String)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn downstream_calls(&self) -> usize {
        self.mints() + self.revokes() + self.dispatches()
    }
}

pub struct FakeIssuer {
    calls: Arc<Calls>,
    fail_mint: bool,
    fail_revoke: bool,
}

#[async_trait]
impl CredentialIssuer for FakeIssuer {
    async fn mint(&self) -> Result<DownstreamCredential, CredentialError> {
        let n = self.calls.mints.fetch_add(1, Ordering::SeqCst);
        if self.fail_mint {
            return Err(CredentialError::Rejected {
                status: 401,
                body: "Authentication credentials were not provided.".to_string(),
            });
        }
        Ok(DownstreamCredential::new(100 + n as u64, "fake-token"))
    }

    async fn revoke(&self, credential: DownstreamCredential) -> Result<(), CredentialError> {
        self.calls.revokes.fetch_add(1, Ordering::SeqCst);
        self.calls.revoked_ids.lock().unwrap().push(credential.id());
        if self.fail_revoke {
            return Err(CredentialError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}

pub struct FakeExecutor {
    calls: Arc<Calls>,
    result: ActionResult,
    delay: Duration,
}

#[async_trait]
impl ActionExecutor for FakeExecutor {
    async fn dispatch(
        &self,
        _action: &Action,
        _invocation: &TaskInvocation,
        credential: &DownstreamCredential,
    ) -> ActionResult {
        assert_eq!(credential.token(), "fake-token");
        self.calls.dispatches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

pub struct FakeSink {
    calls: Arc<Calls>,
    failures_left: AtomicUsize,
    tx: mpsc::UnboundedSender<TaskStatusReport>,
}

#[async_trait]
impl StatusSink for FakeSink {
    async fn deliver(
        &self,
        report: &TaskStatusReport,
        callback_url: &str,
        access_token: &str,
    ) -> Result<(), ReportDeliveryError> {
        self.calls.deliveries.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ReportDeliveryError::Status { status: 503 });
        }

        self.calls.reports.lock().unwrap().push((
            report.clone(),
            callback_url.to_string(),
            access_token.to_string(),
        ));
        let _ = self.tx.send(report.clone());
        Ok(())
    }
}

/// Knobs for building a fake-backed orchestrator
pub struct Setup {
    pub fail_mint: bool,
    pub fail_revoke: bool,
    pub result: ActionResult,
    /// How long each dispatch takes
    pub dispatch_delay: Duration,
    pub sink_failures: usize,
    pub policy: DeliveryPolicy,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            fail_mint: false,
            fail_revoke: false,
            result: ActionResult::Succeeded {
                entity_name: "demo".to_string(),
                details_url: "https://awx.example.com/#/jobs/playbook/42/output".to_string(),
            },
            dispatch_delay: Duration::ZERO,
            sink_failures: 0,
            policy: DeliveryPolicy::LogAndDrop,
        }
    }
}

pub struct Harness {
    pub calls: Arc<Calls>,
    pub orchestrator: Arc<Orchestrator>,
    pub verifier: SignatureVerifier,
    pub delivered: mpsc::UnboundedReceiver<TaskStatusReport>,
}

impl Harness {
    pub fn new(setup: Setup) -> Self {
        let calls = Arc::new(Calls::default());
        let (tx, delivered) = mpsc::unbounded_channel();
        let verifier = SignatureVerifier::new(SECRET).unwrap();

        let orchestrator = Orchestrator::new(
            verifier.clone(),
            Arc::new(FakeIssuer {
                calls: Arc::clone(&calls),
                fail_mint: setup.fail_mint,
                fail_revoke: setup.fail_revoke,
            }),
            Arc::new(FakeExecutor {
                calls: Arc::clone(&calls),
                result: setup.result,
                delay: setup.dispatch_delay,
            }),
            ResultReporter::new(
                Arc::new(FakeSink {
                    calls: Arc::clone(&calls),
                    failures_left: AtomicUsize::new(setup.sink_failures),
                    tx,
                }),
                setup.policy,
            ),
        );

        Self {
            calls,
            orchestrator: Arc::new(orchestrator),
            verifier,
            delivered,
        }
    }
}

pub fn invocation(access_token: &str) -> TaskInvocation {
    TaskInvocation {
        payload_version: 1,
        access_token: access_token.to_string(),
        stage: "post_plan".to_string(),
        task_result_callback_url: CALLBACK_URL.to_string(),
        run_id: "run-xyz".to_string(),
        workspace_id: "ws-123".to_string(),
        workspace_name: "network".to_string(),
        organization_name: "acme".to_string(),
        ..Default::default()
    }
}

pub fn all_actions() -> Vec<Action> {
    vec![
        Action::LaunchJobTemplate {
            template_id: "42".to_string(),
            overrides: LaunchOverrides::default(),
        },
        Action::LaunchWorkflowTemplate {
            template_id: "7".to_string(),
            overrides: LaunchOverrides::default(),
        },
        Action::CreateInventory { organization_id: 3 },
    ]
}

/// Poll until `condition` holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
