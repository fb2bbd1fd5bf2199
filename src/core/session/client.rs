//! HTTP session token client.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{SessionProvider, SessionRequest, SessionToken, SessionTokenError, classify_api_failure};
use crate::config::CallConfig;

/// Session provider that POSTs to the configured session endpoint.
pub struct HttpSessionClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpSessionClient {
    /// Create a client from call configuration.
    pub fn new(config: &CallConfig) -> Result<Self, SessionTokenError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| SessionTokenError::Configuration(e.to_string()))?;

        Ok(Self {
            endpoint: config.session_endpoint.clone(),
            api_key: config.session_api_key.clone(),
            client,
        })
    }

    /// Get the session endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SessionProvider for HttpSessionClient {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<SessionToken, SessionTokenError> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            voice = %request.voice,
            tools = request.tools.len(),
            "Requesting realtime session"
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SessionTokenError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_api_failure(status.as_u16(), &body);
            warn!(status = status.as_u16(), code = %err.code(), "Session creation failed");
            return Err(err);
        }

        let token: SessionToken = response
            .json()
            .await
            .map_err(|e| SessionTokenError::InvalidResponse(e.to_string()))?;

        if token.client_secret.is_empty() {
            return Err(SessionTokenError::InvalidResponse(
                "empty client secret".to_string(),
            ));
        }

        debug!(expires_at = token.expires_at, "Realtime session minted");
        Ok(token)
    }
}
