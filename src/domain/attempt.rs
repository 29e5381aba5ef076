//! Orchestration attempt state.
//!
//! An Attempt tracks one invocation from receipt to credential revocation.
//! It lives only as long as the request that created it; nothing is
//! persisted.
//!
//! ```text
//! Received ─┬─> Rejected
//!           └─> Authenticated ─> Acknowledged ─┬─> Bypassed
//!                                              ├─> CredentialMinted ─> Dispatched ─> Reported ─> CredentialRevoked
//!                                              └─> Dispatched(failure) ─> Reported
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::action::{Action, ActionResult};

/// Lifecycle stage of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    /// Signature check failed; terminal
    Rejected,
    Authenticated,
    /// 200 returned to the control plane
    Acknowledged,
    /// Test delivery; no downstream work and no callback. Terminal.
    Bypassed,
    CredentialMinted,
    Dispatched { success: bool },
    Reported,
    /// Revocation was attempted for the minted credential. Terminal.
    CredentialRevoked,
}

impl Stage {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// A mint failure moves straight from `Acknowledged` to a failed
    /// `Dispatched` without passing `CredentialMinted`.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;

        matches!(
            (self, next),
            (Received, Authenticated)
                | (Received, Rejected)
                | (Authenticated, Acknowledged)
                | (Acknowledged, Bypassed)
                | (Acknowledged, CredentialMinted)
                | (Acknowledged, Dispatched { success: false })
                | (CredentialMinted, Dispatched { .. })
                | (Dispatched { .. }, Reported)
                | (Reported, CredentialRevoked)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Received => write!(f, "received"),
            Stage::Rejected => write!(f, "rejected"),
            Stage::Authenticated => write!(f, "authenticated"),
            Stage::Acknowledged => write!(f, "acknowledged"),
            Stage::Bypassed => write!(f, "bypassed"),
            Stage::CredentialMinted => write!(f, "credential_minted"),
            Stage::Dispatched { success: true } => write!(f, "dispatched_success"),
            Stage::Dispatched { success: false } => write!(f, "dispatched_failure"),
            Stage::Reported => write!(f, "reported"),
            Stage::CredentialRevoked => write!(f, "credential_revoked"),
        }
    }
}

/// Raised when code tries to skip or reorder lifecycle stages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal stage transition {from} -> {to}")]
pub struct TransitionError {
    pub from: Stage,
    pub to: Stage,
}

/// A stage together with when it was entered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub at: DateTime<Utc>,
}

/// One orchestration attempt
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Correlation id for logs
    pub id: Uuid,

    pub action: Action,

    pub stage: Stage,

    pub started_at: DateTime<Utc>,

    /// Every stage entered so far, in order (starts with `Received`)
    pub history: Vec<StageRecord>,

    /// Dispatch outcome, once known
    pub outcome: Option<ActionResult>,

    /// Error text if revoking the credential failed
    pub revoke_error: Option<String>,
}

impl Attempt {
    /// Start a new attempt in the `Received` stage
    pub fn new(action: Action) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            action,
            stage: Stage::Received,
            started_at: now,
            history: vec![StageRecord {
                stage: Stage::Received,
                at: now,
            }],
            outcome: None,
            revoke_error: None,
        }
    }

    /// Move to the next stage, rejecting illegal transitions
    pub fn advance(&mut self, next: Stage) -> Result<(), TransitionError> {
        if !self.stage.can_advance_to(next) {
            return Err(TransitionError {
                from: self.stage,
                to: next,
            });
        }

        self.stage = next;
        self.history.push(StageRecord {
            stage: next,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Whether the attempt passed through the given stage
    pub fn visited(&self, stage: Stage) -> bool {
        self.history.iter().any(|r| r.stage == stage)
    }

    /// Stages in the order they were entered
    pub fn stages(&self) -> Vec<Stage> {
        self.history.iter().map(|r| r.stage).collect()
    }
}
