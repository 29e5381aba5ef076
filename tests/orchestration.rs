//! Orchestration Integration Tests
//!
//! Drives the attempt lifecycle against fake AWX and callback adapters and
//! checks the mint/dispatch/report/revoke pairing.

mod common;

use std::time::Duration;

use arts::core::{DeliveryPolicy, RetryPolicy};
use arts::domain::{Action, ActionResult, LaunchOverrides, Stage, TaskStatus, TEST_TOKEN};
use common::{all_actions, invocation, wait_until, Harness, Setup, CALLBACK_URL};

fn job_42() -> Action {
    Action::LaunchJobTemplate {
        template_id: "42".to_string(),
        overrides: LaunchOverrides::default(),
    }
}

#[tokio::test]
async fn test_successful_job_launch_reports_passed() {
    let harness = Harness::new(Setup::default());
    let invocation = invocation("tfc-token");
    let signature = harness.verifier.sign(&invocation.workspace_id);

    let mut attempt = harness
        .orchestrator
        .authenticate(job_42(), &invocation, Some(&signature))
        .unwrap();
    attempt.advance(Stage::Acknowledged).unwrap();

    let attempt = harness.orchestrator.execute(attempt, invocation).await;

    assert_eq!(
        attempt.stages(),
        vec![
            Stage::Received,
            Stage::Authenticated,
            Stage::Acknowledged,
            Stage::CredentialMinted,
            Stage::Dispatched { success: true },
            Stage::Reported,
            Stage::CredentialRevoked,
        ]
    );

    let reports = harness.calls.reports();
    assert_eq!(reports.len(), 1);
    let (report, callback_url, access_token) = &reports[0];
    assert_eq!(report.status(), TaskStatus::Passed);
    assert!(report.message().unwrap().contains("demo"));
    assert!(report.url().unwrap().ends_with("/#/jobs/playbook/42/output"));
    assert_eq!(callback_url, CALLBACK_URL);
    assert_eq!(access_token, "tfc-token");

    assert_eq!(harness.calls.mints(), 1);
    assert_eq!(harness.calls.dispatches(), 1);
    assert_eq!(harness.calls.revokes(), 1);
}

#[tokio::test]
async fn test_sentinel_token_skips_everything() {
    for action in all_actions() {
        let harness = Harness::new(Setup::default());
        let invocation = invocation(TEST_TOKEN);
        let signature = harness.verifier.sign(&invocation.workspace_id);

        let handle = harness
            .orchestrator
            .accept(action.clone(), invocation, Some(&signature))
            .unwrap();
        let attempt = handle.await.unwrap();

        assert_eq!(attempt.stage, Stage::Bypassed, "action {}", action);
        assert_eq!(harness.calls.downstream_calls(), 0, "action {}", action);
        assert_eq!(harness.calls.deliveries(), 0, "action {}", action);
    }
}

#[tokio::test]
async fn test_mint_failure_reports_once_without_dispatch() {
    let harness = Harness::new(Setup {
        fail_mint: true,
        ..Default::default()
    });
    let invocation = invocation("tfc-token");
    let signature = harness.verifier.sign(&invocation.workspace_id);

    let attempt = harness
        .orchestrator
        .accept(job_42(), invocation, Some(&signature))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(harness.calls.mints(), 1);
    assert_eq!(harness.calls.dispatches(), 0);
    assert_eq!(harness.calls.revokes(), 0);

    let reports = harness.calls.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0.status(), TaskStatus::Failed);
    assert!(reports[0].0.message().unwrap().contains("401"));
    assert!(reports[0].0.url().is_none());

    assert!(!attempt.visited(Stage::CredentialMinted));
    assert_eq!(attempt.stage, Stage::Reported);
}

#[tokio::test]
async fn test_dispatch_failure_still_revokes_once() {
    for action in all_actions() {
        let harness = Harness::new(Setup {
            result: ActionResult::failed("name already exists"),
            ..Default::default()
        });
        let invocation = invocation("tfc-token");
        let signature = harness.verifier.sign(&invocation.workspace_id);

        let attempt = harness
            .orchestrator
            .accept(action.clone(), invocation, Some(&signature))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(harness.calls.revokes(), 1, "action {}", action);
        assert_eq!(*harness.calls.revoked_ids.lock().unwrap(), vec![100]);
        assert!(attempt.visited(Stage::Dispatched { success: false }));
        assert_eq!(attempt.stage, Stage::CredentialRevoked);

        let reports = harness.calls.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0.status(), TaskStatus::Failed);
        assert_eq!(reports[0].0.message(), Some("name already exists"));
    }
}

#[tokio::test]
async fn test_revoke_failure_is_recorded_not_reported() {
    let harness = Harness::new(Setup {
        fail_revoke: true,
        ..Default::default()
    });
    let invocation = invocation("tfc-token");
    let signature = harness.verifier.sign(&invocation.workspace_id);

    let attempt = harness
        .orchestrator
        .accept(job_42(), invocation, Some(&signature))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(harness.calls.revokes(), 1);
    assert!(attempt.revoke_error.is_some());
    assert_eq!(harness.calls.reports().len(), 1);
    assert_eq!(harness.calls.reports()[0].0.status(), TaskStatus::Passed);
}

#[tokio::test]
async fn test_bad_signature_is_rejected_before_any_work() {
    let harness = Harness::new(Setup::default());
    let invocation = invocation("tfc-token");
    let wrong = harness.verifier.sign("ws-someone-else");

    assert!(harness
        .orchestrator
        .accept(job_42(), invocation.clone(), Some(&wrong))
        .is_err());
    assert!(harness
        .orchestrator
        .accept(job_42(), invocation, None)
        .is_err());

    tokio::task::yield_now().await;
    assert_eq!(harness.calls.downstream_calls(), 0);
    assert_eq!(harness.calls.deliveries(), 0);
}

#[tokio::test]
async fn test_log_and_drop_makes_one_delivery_attempt() {
    let harness = Harness::new(Setup {
        sink_failures: 1,
        ..Default::default()
    });
    let invocation = invocation("tfc-token");
    let signature = harness.verifier.sign(&invocation.workspace_id);

    let attempt = harness
        .orchestrator
        .accept(job_42(), invocation, Some(&signature))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(harness.calls.deliveries(), 1);
    assert!(harness.calls.reports().is_empty());
    // Undelivered callback does not stop revocation
    assert_eq!(harness.calls.revokes(), 1);
    assert_eq!(attempt.stage, Stage::CredentialRevoked);
}

#[tokio::test]
async fn test_bounded_retry_delivers_after_transient_failures() {
    let harness = Harness::new(Setup {
        sink_failures: 2,
        policy: DeliveryPolicy::BoundedRetry(RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: true,
        }),
        ..Default::default()
    });
    let invocation = invocation("tfc-token");
    let signature = harness.verifier.sign(&invocation.workspace_id);

    harness
        .orchestrator
        .accept(job_42(), invocation, Some(&signature))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(harness.calls.deliveries(), 3);
    assert_eq!(harness.calls.reports().len(), 1);
}

#[tokio::test]
async fn test_bounded_retry_gives_up() {
    let harness = Harness::new(Setup {
        sink_failures: 10,
        policy: DeliveryPolicy::BoundedRetry(RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
            jitter: false,
        }),
        ..Default::default()
    });
    let invocation = invocation("tfc-token");
    let signature = harness.verifier.sign(&invocation.workspace_id);

    harness
        .orchestrator
        .accept(job_42(), invocation, Some(&signature))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(harness.calls.deliveries(), 3);
    assert!(harness.calls.reports().is_empty());
    assert_eq!(harness.calls.revokes(), 1);
}

#[tokio::test]
async fn test_concurrent_invocations_pair_mint_and_revoke() {
    let harness = Harness::new(Setup::default());
    let mut handles = Vec::new();

    for i in 0..8 {
        let mut invocation = invocation("tfc-token");
        invocation.workspace_id = format!("ws-{}", i);
        let signature = harness.verifier.sign(&invocation.workspace_id);
        handles.push(
            harness
                .orchestrator
                .accept(job_42(), invocation, Some(&signature))
                .unwrap(),
        );
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().stage, Stage::CredentialRevoked);
    }

    assert_eq!(harness.calls.mints(), 8);
    assert_eq!(harness.calls.revokes(), 8);
    assert_eq!(harness.calls.reports().len(), 8);

    let mut revoked = harness.calls.revoked_ids.lock().unwrap().clone();
    revoked.sort_unstable();
    revoked.dedup();
    assert_eq!(revoked.len(), 8);
}

#[tokio::test]
async fn test_drain_waits_for_in_flight_attempt() {
    let harness = Harness::new(Setup {
        dispatch_delay: Duration::from_millis(200),
        ..Default::default()
    });
    let invocation = invocation("tfc-token");
    let signature = harness.verifier.sign(&invocation.workspace_id);

    // Handle dropped: only the orchestrator tracks the attempt now
    drop(
        harness
            .orchestrator
            .accept(job_42(), invocation, Some(&signature))
            .unwrap(),
    );
    wait_until(|| harness.calls.dispatches() == 1).await;
    assert_eq!(harness.calls.revokes(), 0);

    assert!(harness.orchestrator.drain(Duration::from_secs(5)).await);

    assert_eq!(harness.calls.revokes(), 1);
    assert_eq!(harness.calls.reports().len(), 1);
}

#[tokio::test]
async fn test_drain_gives_up_after_grace_period() {
    let harness = Harness::new(Setup {
        dispatch_delay: Duration::from_millis(500),
        ..Default::default()
    });
    let invocation = invocation("tfc-token");
    let signature = harness.verifier.sign(&invocation.workspace_id);

    let handle = harness
        .orchestrator
        .accept(job_42(), invocation, Some(&signature))
        .unwrap();
    wait_until(|| harness.calls.dispatches() == 1).await;

    assert!(!harness.orchestrator.drain(Duration::from_millis(20)).await);

    // The attempt itself is not cancelled
    assert_eq!(handle.await.unwrap().stage, Stage::CredentialRevoked);
    assert_eq!(harness.calls.revokes(), 1);
}
