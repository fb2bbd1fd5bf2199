//! Control-channel message types.
//!
//! All events are JSON objects tagged by `type` and travel over the ordered
//! data channel that sits alongside the audio tracks.
//!
//! # Protocol Overview
//!
//! Client events (sent to the remote endpoint):
//! - session.update - Swap instructions and tools
//! - conversation.item.create - Add a message or a function call output
//! - response.create - Ask the model to respond
//!
//! Server events (received from the remote endpoint):
//! - session.created - Session created
//! - error - Error occurred
//! - response.created - Response generation started
//! - response.done - Response complete
//! - response.audio_transcript.done - Transcript of what the model said
//! - conversation.item.input_audio_transcription.completed - Transcript of what the user said
//! - response.function_call_arguments.done - Tool call ready to dispatch

use serde::{Deserialize, Serialize};

// =============================================================================
// Tool Schemas
// =============================================================================

/// Tool schema exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl ToolSchema {
    /// Create a function tool schema.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            name: name.into(),
            description: Some(description.into()),
            parameters: Some(parameters),
        }
    }
}

// =============================================================================
// Session Update
// =============================================================================

/// Partial session configuration carried by `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// System instructions for the active mode
    pub instructions: String,
    /// Tools available in the active mode
    pub tools: Vec<ToolSchema>,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    /// A message authored by the user or the system
    Message {
        /// Item role (user, system)
        role: String,
        /// Content parts
        content: Vec<ContentPart>,
    },
    /// Result of a tool call
    FunctionCallOutput {
        /// Call ID the output answers
        call_id: String,
        /// JSON-encoded output
        output: String,
    },
}

/// Content part within a message item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    InputText { text: String },
    /// Image content (URL or data URL)
    InputImage { image_url: String },
}

impl ConversationItem {
    pub fn system_text(text: impl Into<String>) -> Self {
        Self::Message {
            role: "system".to_string(),
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::Message {
            role: "user".to_string(),
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    pub fn user_image(image_url: impl Into<String>) -> Self {
        Self::Message {
            role: "user".to_string(),
            content: vec![ContentPart::InputImage {
                image_url: image_url.into(),
            }],
        }
    }

    pub fn user_text_and_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self::Message {
            role: "user".to_string(),
            content: vec![
                ContentPart::InputText { text: text.into() },
                ContentPart::InputImage {
                    image_url: image_url.into(),
                },
            ],
        }
    }

    pub fn function_output(call_id: impl Into<String>, output: &serde_json::Value) -> Self {
        Self::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.to_string(),
        }
    }
}

// =============================================================================
// Client Events (sent to remote)
// =============================================================================

/// Client events sent over the control channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionUpdate,
    },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
    },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    pub fn session_update(instructions: String, tools: Vec<ToolSchema>) -> Self {
        ClientEvent::SessionUpdate {
            session: SessionUpdate {
                instructions,
                tools,
            },
        }
    }

    pub fn item(item: ConversationItem) -> Self {
        ClientEvent::ConversationItemCreate { item }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Server Events (received from remote)
// =============================================================================

/// Error payload of a server `error` event.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    /// Error code
    pub code: Option<String>,
    /// Error message
    pub message: String,
}

impl ApiError {
    /// Code used for suppression and classification; falls back to the type.
    pub fn effective_code(&self) -> &str {
        self.code
            .as_deref()
            .or(self.error_type.as_deref())
            .unwrap_or("unknown_error")
    }
}

/// Server events received over the control channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated,

    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        #[serde(default)]
        error: ApiError,
    },

    /// Response generation started
    #[serde(rename = "response.created")]
    ResponseCreated,

    /// Response complete
    #[serde(rename = "response.done")]
    ResponseDone,

    /// Transcript of the model's speech
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: String,
    },

    /// Transcript of the user's speech
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    /// Tool call arguments complete
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        /// Function name
        #[serde(default)]
        name: String,
        /// Call ID
        call_id: String,
        /// JSON-encoded arguments (may be malformed)
        #[serde(default)]
        arguments: String,
    },

    /// Any event type this framework does not act on
    #[serde(other)]
    Unknown,
}

/// A parsed inbound event together with its raw JSON.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub event: ServerEvent,
    pub raw: serde_json::Value,
}

impl InboundEvent {
    /// Parse a data-channel text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        let event = ServerEvent::deserialize(&raw)?;
        Ok(Self { event, raw })
    }

    /// The `type` field of the raw event.
    pub fn event_type(&self) -> &str {
        self.raw
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown")
    }
}
