//! AWX action dispatcher.
//!
//! Launches job templates and workflow job templates, and creates
//! inventories, through the AWX v2 REST API. Every outcome is normalized
//! into an [`ActionResult`].
//!
//! AWX reports the same failure in two shapes: a typed descriptor with
//! field errors, or a generic `{"__all__": [...]}` list. Responses are
//! classified by probing for a nonzero `id` before decoding, so a body that
//! is neither shape surfaces as a decode error instead of a silent success.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::PlatformConfig;
use crate::core::errors::DispatchError;
use crate::domain::{Action, ActionResult, DownstreamCredential, LaunchOverrides, TaskInvocation};

use super::ActionExecutor;

/// Body for `.../launch/`. Empty overrides serialize to `{}`.
#[derive(Debug, Serialize)]
struct LaunchRequest<'a> {
    #[serde(flatten)]
    overrides: &'a LaunchOverrides,

    #[serde(skip_serializing_if = "Map::is_empty")]
    extra_vars: Map<String, Value>,
}

/// Body for `inventories/`
#[derive(Debug, Serialize)]
struct InventoryRequest<'a> {
    name: &'a str,
    organization: u64,
    host_filter: &'a str,
    kind: &'a str,
}

/// Job or workflow job returned by a launch
#[derive(Debug, Deserialize)]
struct LaunchedJob {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
}

/// Inventory returned by a create
#[derive(Debug, Deserialize)]
struct CreatedInventory {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    name: String,
}

/// HTTP dispatcher against one AWX host
pub struct AwxDispatcher {
    host: String,
    forward_run_context: bool,
    client: reqwest::Client,
}

impl AwxDispatcher {
    pub fn new(config: &PlatformConfig, client: reqwest::Client) -> Self {
        Self {
            host: config.host.clone(),
            forward_run_context: config.forward_run_context,
            client,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.host, path)
    }

    /// Link to a launched job's output page
    fn job_url(&self, kind: &str, id: u64) -> String {
        format!("{}/#/jobs/{}/{}/output", self.host, kind, id)
    }

    fn inventory_url(&self, id: u64) -> String {
        format!("{}/#/inventories/inventory/{}/details", self.host, id)
    }

    /// Run identifiers passed to the playbook when forwarding is enabled
    fn run_context(&self, invocation: &TaskInvocation) -> Map<String, Value> {
        let mut vars = Map::new();
        if !self.forward_run_context {
            return vars;
        }

        for (key, value) in [
            ("tfc_run_id", &invocation.run_id),
            ("tfc_workspace_id", &invocation.workspace_id),
            ("tfc_workspace_name", &invocation.workspace_name),
            ("tfc_organization_name", &invocation.organization_name),
            ("tfc_stage", &invocation.stage),
        ] {
            if !value.is_empty() {
                vars.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        vars
    }

    async fn launch(
        &self,
        resource: &str,
        template_id: &str,
        overrides: &LaunchOverrides,
        invocation: &TaskInvocation,
        credential: &DownstreamCredential,
    ) -> Result<LaunchedJob, DispatchError> {
        let url = self.api_url(&format!("{}/{}/launch/", resource, template_id));
        let body = LaunchRequest {
            overrides,
            extra_vars: self.run_context(invocation),
        };

        let job: LaunchedJob = self.post(&url, &body, credential).await?;
        debug!(job_id = job.id, status = %job.status, "AWX accepted launch");
        Ok(job)
    }

    async fn create_inventory(
        &self,
        organization_id: u64,
        invocation: &TaskInvocation,
        credential: &DownstreamCredential,
    ) -> Result<CreatedInventory, DispatchError> {
        let body = InventoryRequest {
            name: &invocation.workspace_name,
            organization: organization_id,
            host_filter: "",
            kind: "",
        };

        self.post(&self.api_url("inventories/"), &body, credential)
            .await
    }

    async fn post<B, T>(
        &self,
        url: &str,
        body: &B,
        credential: &DownstreamCredential,
    ) -> Result<T, DispatchError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(credential.token())
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        interpret(status, &text)
    }
}

#[async_trait]
impl ActionExecutor for AwxDispatcher {
    async fn dispatch(
        &self,
        action: &Action,
        invocation: &TaskInvocation,
        credential: &DownstreamCredential,
    ) -> ActionResult {
        let outcome = match action {
            Action::LaunchJobTemplate {
                template_id,
                overrides,
            } => self
                .launch("job_templates", template_id, overrides, invocation, credential)
                .await
                .map(|job| (job.name, self.job_url("playbook", job.id))),

            Action::LaunchWorkflowTemplate {
                template_id,
                overrides,
            } => self
                .launch(
                    "workflow_job_templates",
                    template_id,
                    overrides,
                    invocation,
                    credential,
                )
                .await
                .map(|job| (job.name, self.job_url("workflow", job.id))),

            Action::CreateInventory { organization_id } => self
                .create_inventory(*organization_id, invocation, credential)
                .await
                .map(|inventory| (inventory.name, self.inventory_url(inventory.id))),
        };

        match outcome {
            Ok((entity_name, details_url)) => ActionResult::Succeeded {
                entity_name,
                details_url,
            },
            Err(e) => {
                warn!(action = %action, error = %e, "AWX action failed");
                ActionResult::failed(e.to_string())
            }
        }
    }
}

/// Classify an AWX response body.
///
/// 1. A zero/absent `id` with a populated `__all__` list is a validation
///    failure, whatever the status code.
/// 2. Any other non-2xx status is a failure; the reason comes from
///    `detail`, field errors, or the raw body.
/// 3. Otherwise the body is decoded as the expected descriptor.
fn interpret<T: DeserializeOwned>(status: u16, text: &str) -> Result<T, DispatchError> {
    let success = (200..300).contains(&status);

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) if !success => {
            return Err(DispatchError::Status {
                status,
                reason: fallback_reason(status, text),
            })
        }
        Err(e) => return Err(DispatchError::Decode(e.to_string())),
    };

    let id = value.get("id").and_then(Value::as_u64).unwrap_or(0);
    if id == 0 {
        if let Some(messages) = all_errors(&value) {
            return Err(DispatchError::Validation(messages));
        }
    }

    if !success {
        return Err(DispatchError::Status {
            status,
            reason: error_reason(&value).unwrap_or_else(|| fallback_reason(status, text)),
        });
    }

    if !value.is_object() {
        return Err(DispatchError::Decode(format!(
            "expected a JSON object, got: {}",
            text.trim()
        )));
    }

    serde_json::from_value(value).map_err(|e| DispatchError::Decode(e.to_string()))
}

/// Concatenated `__all__` messages, if the list is present and non-empty
fn all_errors(value: &Value) -> Option<String> {
    let list = value.get("__all__")?.as_array()?;
    let messages: Vec<&str> = list.iter().filter_map(Value::as_str).collect();
    if messages.is_empty() {
        return None;
    }
    Some(messages.concat())
}

/// Reason text from an AWX error body (`detail`, or `field: message` pairs)
fn error_reason(value: &Value) -> Option<String> {
    if let Some(detail) = value.get("detail").and_then(Value::as_str) {
        return Some(detail.to_string());
    }

    let object = value.as_object()?;
    let mut parts = Vec::new();
    for (field, errors) in object {
        match errors {
            Value::String(message) => parts.push(format!("{}: {}", field, message)),
            Value::Array(messages) => {
                let joined: Vec<&str> = messages.iter().filter_map(Value::as_str).collect();
                if !joined.is_empty() {
                    parts.push(format!("{}: {}", field, joined.join(" ")));
                }
            }
            _ => {}
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn fallback_reason(status: u16, text: &str) -> String {
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }

    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("empty response")
        .to_string()
}
