//! AWX personal access token lifecycle.
//!
//! Endpoint: POST /api/v2/tokens/ (basic auth with the service account)
//! Revoke: DELETE /api/v2/tokens/{id}/ (bearer: the token itself)

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::PlatformConfig;
use crate::core::errors::CredentialError;
use crate::domain::DownstreamCredential;

use super::CredentialIssuer;

/// Mints one token per orchestration attempt
pub struct AwxTokenManager {
    host: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

/// The part of the token response we use
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id: u64,
    #[serde(default)]
    token: String,
}

impl AwxTokenManager {
    pub fn new(config: &PlatformConfig, client: reqwest::Client) -> Self {
        Self {
            host: config.host.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        }
    }

    fn tokens_url(&self) -> String {
        format!("{}/api/v2/tokens/", self.host)
    }

    fn token_url(&self, id: u64) -> String {
        format!("{}/api/v2/tokens/{}/", self.host, id)
    }
}

#[async_trait]
impl CredentialIssuer for AwxTokenManager {
    async fn mint(&self) -> Result<DownstreamCredential, CredentialError> {
        let response = self
            .client
            .post(self.tokens_url())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let parsed: TokenResponse = response.json().await?;
        if parsed.token.is_empty() {
            return Err(CredentialError::EmptyToken);
        }

        info!(token_id = parsed.id, "Minted AWX token");
        Ok(DownstreamCredential::new(parsed.id, parsed.token))
    }

    async fn revoke(&self, credential: DownstreamCredential) -> Result<(), CredentialError> {
        let response = self
            .client
            .delete(self.token_url(credential.id()))
            .bearer_auth(credential.token())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        debug!(token_id = credential.id(), "Revoked AWX token");
        Ok(())
    }
}
