//! Consumer configuration for a voice call.
//!
//! [`VoiceCallOptions`] carries the code half of a call setup: the context
//! builder, the mode registry, the tool handler and the optional hooks.
//! Hooks run synchronously on the task that observed the event and must not
//! block.

use std::sync::Arc;

use serde_json::Value;

use super::{CallController, TransferHandle};
use crate::core::modes::ModeRegistry;
use crate::core::tools::{ToolCallResult, ToolHandler};

/// Builds a fresh consumer context. Called before every mode resolution and
/// tool dispatch, never cached.
pub type ContextBuilder<C> = Arc<dyn Fn() -> C + Send + Sync>;

/// Called with the controller when a model turn completes; may request a mode change.
pub type ResponseDoneHook<C> =
    Arc<dyn Fn(&CallController<C>) -> Option<ModeAction> + Send + Sync>;

/// Called with the raw `response.done` event.
pub type RawEventHook = Arc<dyn Fn(&Value) + Send + Sync>;

/// Called with a completed transcript.
pub type TranscriptHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Called with no arguments.
pub type NotifyHook = Arc<dyn Fn() + Send + Sync>;

/// Called with the controller.
pub type ControllerHook<C> = Arc<dyn Fn(&CallController<C>) + Send + Sync>;

/// Called with the controller and the whole seconds left.
pub type TimeWarningHook<C> = Arc<dyn Fn(&CallController<C>, u64) + Send + Sync>;

/// Called when a tool result requests a transfer.
pub type TransferHook<C> = Arc<dyn Fn(TransferHandle<C>, Value) + Send + Sync>;

fn no_tools<C>(_name: &str, _args: &Value, _ctx: &C) -> Option<ToolCallResult> {
    None
}

/// Mode change requested by the turn-completion hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeAction {
    /// Enter a mode, remembering the current one
    Enter(String),
    /// Return to the remembered mode (or the initial one)
    Exit,
    /// Re-send the active mode for a changed context
    Refresh,
}

/// Consumer configuration for a [`CallController`].
pub struct VoiceCallOptions<C> {
    pub build_context: ContextBuilder<C>,
    pub initial_mode: String,
    pub modes: Arc<ModeRegistry<C>>,
    pub tool_handler: ToolHandler<C>,

    pub on_response_done: Option<ResponseDoneHook<C>>,
    pub on_response_done_raw: Option<RawEventHook>,
    pub on_response_created: Option<NotifyHook>,
    /// Transcript of what the local user said
    pub on_user_speech: Option<TranscriptHook>,
    /// Transcript of what the model said
    pub on_model_speech: Option<TranscriptHook>,
    pub on_session_created: Option<NotifyHook>,
    pub on_session_established: Option<ControllerHook<C>>,
    pub on_time_warning: Option<TimeWarningHook<C>>,
    /// If absent, expiry forces a hang-up
    pub on_time_expired: Option<ControllerHook<C>>,
    pub on_transfer: Option<TransferHook<C>>,
}

impl<C: 'static> VoiceCallOptions<C> {
    /// Options with no tools handled and no hooks.
    pub fn new<F>(
        build_context: F,
        initial_mode: impl Into<String>,
        modes: ModeRegistry<C>,
    ) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self {
            build_context: Arc::new(build_context),
            initial_mode: initial_mode.into(),
            modes: Arc::new(modes),
            tool_handler: Arc::new(no_tools::<C>),
            on_response_done: None,
            on_response_done_raw: None,
            on_response_created: None,
            on_user_speech: None,
            on_model_speech: None,
            on_session_created: None,
            on_session_established: None,
            on_time_warning: None,
            on_time_expired: None,
            on_transfer: None,
        }
    }

    pub fn with_tool_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Value, &C) -> Option<ToolCallResult> + Send + Sync + 'static,
    {
        self.tool_handler = Arc::new(handler);
        self
    }

    pub fn on_response_done<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallController<C>) -> Option<ModeAction> + Send + Sync + 'static,
    {
        self.on_response_done = Some(Arc::new(hook));
        self
    }

    pub fn on_response_done_raw<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_response_done_raw = Some(Arc::new(hook));
        self
    }

    pub fn on_response_created<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_response_created = Some(Arc::new(hook));
        self
    }

    pub fn on_user_speech<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_user_speech = Some(Arc::new(hook));
        self
    }

    pub fn on_model_speech<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_model_speech = Some(Arc::new(hook));
        self
    }

    pub fn on_session_created<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_session_created = Some(Arc::new(hook));
        self
    }

    pub fn on_session_established<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallController<C>) + Send + Sync + 'static,
    {
        self.on_session_established = Some(Arc::new(hook));
        self
    }

    pub fn on_time_warning<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallController<C>, u64) + Send + Sync + 'static,
    {
        self.on_time_warning = Some(Arc::new(hook));
        self
    }

    pub fn on_time_expired<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallController<C>) + Send + Sync + 'static,
    {
        self.on_time_expired = Some(Arc::new(hook));
        self
    }

    pub fn on_transfer<F>(mut self, hook: F) -> Self
    where
        F: Fn(TransferHandle<C>, Value) + Send + Sync + 'static,
    {
        self.on_transfer = Some(Arc::new(hook));
        self
    }
}
