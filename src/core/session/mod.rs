//! Session token client.
//!
//! Exchanges server-side credentials for a short-lived client secret that
//! authorizes one peer connection to the realtime speech endpoint. The
//! [`SessionProvider`] trait is the seam the call controller talks to;
//! [`HttpSessionClient`] is the reqwest-backed implementation.

mod client;
mod error;

pub use client::HttpSessionClient;
pub use error::{SessionTokenError, classify_api_failure};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{CallConfig, TurnDetectionConfig};
use crate::core::protocol::ToolSchema;

/// Input audio transcription settings sent with the session request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSettings {
    pub model: String,
}

/// Body of the session creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub model: String,
    pub voice: String,
    pub instructions: String,
    pub tools: Vec<ToolSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionSettings>,
    pub turn_detection: TurnDetectionConfig,
}

impl SessionRequest {
    /// Build a request for the initial mode of a call.
    pub fn from_config(config: &CallConfig, instructions: String, tools: Vec<ToolSchema>) -> Self {
        Self {
            model: config.model.clone(),
            voice: config.voice.clone(),
            instructions,
            tools,
            input_audio_transcription: config
                .transcription_model
                .clone()
                .map(|model| TranscriptionSettings { model }),
            turn_detection: config.turn_detection.clone(),
        }
    }
}

/// Ephemeral credential returned by the session endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub client_secret: String,
    /// Expiry as Unix time in seconds
    pub expires_at: i64,
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("client_secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints ephemeral session tokens.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Perform exactly one session creation request.
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<SessionToken, SessionTokenError>;
}
