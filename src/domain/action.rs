//! Downstream actions and their normalized outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Optional launch-time overrides for job and workflow templates.
///
/// Populated from the query string of the inbound request. Anything left as
/// `None` is omitted from the launch body so AWX falls back to the template
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm_branch: Option<String>,
}

/// The downstream action selected by the route that received the invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    LaunchJobTemplate {
        template_id: String,
        overrides: LaunchOverrides,
    },
    LaunchWorkflowTemplate {
        template_id: String,
        overrides: LaunchOverrides,
    },
    CreateInventory {
        organization_id: u64,
    },
}

impl Action {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Action::LaunchJobTemplate { .. } => "job_template",
            Action::LaunchWorkflowTemplate { .. } => "workflow_job_template",
            Action::CreateInventory { .. } => "inventory",
        }
    }

    /// The id the action targets (template id or organization id)
    pub fn target(&self) -> String {
        match self {
            Action::LaunchJobTemplate { template_id, .. }
            | Action::LaunchWorkflowTemplate { template_id, .. } => template_id.clone(),
            Action::CreateInventory { organization_id } => organization_id.to_string(),
        }
    }

    /// Message reported to the control plane when the action succeeds
    pub fn success_message(&self, entity_name: &str) -> String {
        match self {
            Action::LaunchJobTemplate { .. } => {
                format!("Successfully triggered Ansible Job Template, {}", entity_name)
            }
            Action::LaunchWorkflowTemplate { .. } => format!(
                "Successfully triggered Ansible Workflow Job Template, {}",
                entity_name
            ),
            Action::CreateInventory { .. } => {
                format!("Successfully created Ansible Inventory {}", entity_name)
            }
        }
    }
}

/// Whether a route parameter is usable as an AWX template reference.
///
/// Accepts numeric ids and AWX named URLs (`name++organization`), nothing
/// that could change the shape of the request path.
pub fn is_valid_template_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.target())
    }
}

/// Uniform outcome of a dispatched action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    Succeeded {
        /// Human-readable message naming the created/launched entity
        entity_name: String,
        details_url: String,
    },
    Failed {
        reason: String,
    },
}

impl ActionResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        ActionResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Succeeded { .. })
    }
}
