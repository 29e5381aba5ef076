//! Terraform Cloud task result callback client.
//!
//! Endpoint: PATCH {task_result_callback_url}
//! Auth: Bearer access token from the invocation payload

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::core::errors::ReportDeliveryError;
use crate::domain::TaskStatusReport;

use super::StatusSink;

/// JSON:API media type required by the callback endpoint
pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";

/// Sends task results back to Terraform Cloud
pub struct CallbackClient {
    client: reqwest::Client,
}

impl CallbackClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusSink for CallbackClient {
    async fn deliver(
        &self,
        report: &TaskStatusReport,
        callback_url: &str,
        access_token: &str,
    ) -> Result<(), ReportDeliveryError> {
        let body = serde_json::to_vec(report)
            .map_err(|e| ReportDeliveryError::Serialize(e.to_string()))?;

        let response = self
            .client
            .patch(callback_url)
            .bearer_auth(access_token)
            .header(CONTENT_TYPE, JSON_API_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportDeliveryError::Status {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
