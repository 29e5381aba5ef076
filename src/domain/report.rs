//! Outbound task result payload.
//!
//! Shape follows the JSON:API document Terraform Cloud expects on the
//! callback URL:
//!
//! ```json
//! {"data": {"type": "task-results", "attributes": {"status": "passed", "message": "...", "url": "..."}}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource type discriminator for task results
pub const TASK_RESULTS: &str = "task-results";

/// Terminal (or in-progress) state of a run task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Passed,
    Failed,
    Running,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Passed => write!(f, "passed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Running => write!(f, "running"),
        }
    }
}

/// Body PATCHed to the task result callback URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub data: ReportData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: ReportAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAttributes {
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Link into the AWX UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TaskStatusReport {
    /// Build a report. Empty message or URL strings are treated as absent.
    pub fn new(status: TaskStatus, message: Option<String>, url: Option<String>) -> Self {
        Self {
            data: ReportData {
                kind: TASK_RESULTS.to_string(),
                attributes: ReportAttributes {
                    status,
                    message: message.filter(|m| !m.is_empty()),
                    url: url.filter(|u| !u.is_empty()),
                },
            },
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.data.attributes.status
    }

    pub fn message(&self) -> Option<&str> {
        self.data.attributes.message.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.data.attributes.url.as_deref()
    }
}
