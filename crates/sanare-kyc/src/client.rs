//! HTTP client for the identity verification provider.

use crate::error::{KycError, Result};
use crate::provider::IdentityProvider;
use crate::types::{CreateSessionRequest, CreatedSession, SessionSnapshot, SessionStatus};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sanare_core::config::KycConfig;
use serde::Serialize;
use std::time::Duration;

/// Provider client speaking the vendor's session API.
#[derive(Debug)]
pub struct KycClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl KycClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// `Config` when the API key is missing or the HTTP client cannot be
    /// constructed. A missing key is a deployment error and is caught
    /// here, before any session is attempted.
    pub fn new(config: &KycConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| KycError::Config("identity provider API key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KycError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn read_error(response: reqwest::Response) -> KycError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        KycError::Api { status, message }
    }
}

#[derive(Serialize)]
struct UpdateStatusBody<'a> {
    new_status: &'a str,
    comment: &'a str,
}

#[async_trait]
impl IdentityProvider for KycClient {
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<CreatedSession> {
        let response = self
            .client
            .post(format!("{}/session/", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let session: CreatedSession = response
            .json()
            .await
            .map_err(|e| KycError::Parse(e.to_string()))?;
        tracing::info!(session_id = %session.session_id, "identity session created");
        Ok(session)
    }

    async fn get_status(&self, session_id: &str) -> Result<SessionSnapshot> {
        let response = self
            .client
            .get(format!("{}/session/{session_id}/decision/", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(KycError::SessionNotFound(session_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| KycError::Parse(e.to_string()))
    }

    async fn update_status(
        &self,
        session_id: &str,
        new_status: SessionStatus,
        comment: &str,
    ) -> Result<()> {
        let response = self
            .client
            .patch(format!("{}/session/{session_id}/status/", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&UpdateStatusBody {
                new_status: new_status.as_str(),
                comment,
            })
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(KycError::SessionNotFound(session_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        tracing::info!(session_id, status = %new_status, "provider status updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: Option<&str>) -> KycConfig {
        KycConfig {
            api_key: key.map(String::from),
            ..KycConfig::default()
        }
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = KycClient::new(&config_with_key(None)).expect_err("must fail");
        assert!(matches!(err, KycError::Config(_)));

        let err = KycClient::new(&config_with_key(Some("  "))).expect_err("must fail");
        assert!(matches!(err, KycError::Config(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_is_stripped() {
        let mut config = config_with_key(Some("k"));
        config.base_url = "https://verification.example.com/v2/".to_string();
        let client = KycClient::new(&config).expect("client");
        assert_eq!(client.base_url, "https://verification.example.com/v2");
    }
}
