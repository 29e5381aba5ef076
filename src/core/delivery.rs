//! Task result delivery.
//!
//! Builds the task result document and hands it to a [`StatusSink`] according
//! to the configured [`DeliveryPolicy`]. The default policy makes one attempt
//! and logs the failure; Terraform Cloud's own task timeout eventually fails
//! the run if no callback arrives.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapters::StatusSink;
use crate::domain::{TaskStatus, TaskStatusReport};

use super::errors::ReportDeliveryError;

/// How many times, and how patiently, to deliver a callback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Single attempt; failures are logged and dropped
    #[default]
    LogAndDrop,

    /// Exponential backoff with optional full jitter
    BoundedRetry(RetryPolicy),
}

impl DeliveryPolicy {
    /// Total number of delivery attempts allowed
    pub fn max_attempts(&self) -> u32 {
        match self {
            DeliveryPolicy::LogAndDrop => 1,
            DeliveryPolicy::BoundedRetry(retry) => retry.max_attempts.max(1),
        }
    }
}

/// Retry policy for callback delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, first one included (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 500)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay (default: 5000)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Draw each delay uniformly from [0, backoff] (default: true)
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    5000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Backoff ceiling for a given attempt (1-indexed), before jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Delay actually slept after a failed attempt
    pub fn sleep_for_attempt(&self, attempt: u32) -> Duration {
        let ceiling = self.delay_for_attempt(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }

        let millis = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
        Duration::from_millis(millis)
    }

    /// Check if another attempt is allowed after `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Builds task results and delivers them to the control plane
pub struct ResultReporter {
    sink: Arc<dyn StatusSink>,
    policy: DeliveryPolicy,
}

impl ResultReporter {
    pub fn new(sink: Arc<dyn StatusSink>, policy: DeliveryPolicy) -> Self {
        Self { sink, policy }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    /// Deliver a task result to `callback_url`.
    ///
    /// Returns the last delivery error once the policy gives up. Callers log
    /// it; there is no other channel to escalate to.
    pub async fn report(
        &self,
        status: TaskStatus,
        message: Option<String>,
        details_url: Option<String>,
        callback_url: &str,
        access_token: &str,
    ) -> Result<(), ReportDeliveryError> {
        let report = TaskStatusReport::new(status, message, details_url);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.sink.deliver(&report, callback_url, access_token).await {
                Ok(()) => {
                    debug!(%status, attempt, "Task result delivered");
                    return Ok(());
                }
                Err(e) => {
                    let DeliveryPolicy::BoundedRetry(retry) = &self.policy else {
                        return Err(e);
                    };

                    if !retry.should_retry(attempt) {
                        return Err(e);
                    }

                    let delay = retry.sleep_for_attempt(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Task result delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
