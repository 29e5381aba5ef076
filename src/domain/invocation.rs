//! Inbound run task payload.
//!
//! Terraform Cloud posts this body to every run task endpoint. Only a handful
//! of fields drive the bridge; the rest are carried so that they can be
//! forwarded or logged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Access token Terraform Cloud sends when an operator presses "test" on the
/// run task configuration page.
pub const TEST_TOKEN: &str = "test-token";

/// A single run task invocation.
///
/// Every field is optional on the wire; missing and `null` values
/// deserialize to their defaults. Non-VCS workspaces send `null` for every
/// `vcs_*` field.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskInvocation {
    #[serde(deserialize_with = "null_as_default")]
    pub payload_version: u32,

    /// Bearer token for the callback URL. Also identifies test deliveries.
    #[serde(deserialize_with = "null_as_default")]
    pub access_token: String,

    #[serde(deserialize_with = "null_as_default")]
    pub stage: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_speculative: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub task_result_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub task_result_enforcement_level: String,

    /// Where the terminal status is PATCHed
    #[serde(deserialize_with = "null_as_default")]
    pub task_result_callback_url: String,

    #[serde(deserialize_with = "null_as_default")]
    pub run_app_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub run_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub run_message: String,
    pub run_created_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub run_created_by: String,

    #[serde(deserialize_with = "null_as_default")]
    pub workspace_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub workspace_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub workspace_app_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub organization_name: String,

    #[serde(deserialize_with = "null_as_default")]
    pub plan_json_api_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub vcs_repo_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub vcs_branch: String,
    #[serde(deserialize_with = "null_as_default")]
    pub vcs_pull_request_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub vcs_commit_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub configuration_version_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub configuration_version_download_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub workspace_working_directory: String,
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl TaskInvocation {
    /// Whether this is a connectivity test from the control plane
    pub fn is_test(&self) -> bool {
        self.access_token == TEST_TOKEN
    }
}

// The access token grants write access to the run's task result, so it must
// never end up in logs.
impl fmt::Debug for TaskInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInvocation")
            .field("access_token", &"<redacted>")
            .field("stage", &self.stage)
            .field("run_id", &self.run_id)
            .field("workspace_id", &self.workspace_id)
            .field("workspace_name", &self.workspace_name)
            .field("organization_name", &self.organization_name)
            .field("task_result_callback_url", &self.task_result_callback_url)
            .finish_non_exhaustive()
    }
}
