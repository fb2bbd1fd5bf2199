use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

/// Deferred computation whose text becomes a new system message.
pub struct FollowUp {
    pub future: BoxFuture<'static, Result<String, String>>,
    /// Exit the current mode once the follow-up has been sent
    pub exit_mode: bool,
}

impl fmt::Debug for FollowUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FollowUp")
            .field("exit_mode", &self.exit_mode)
            .finish_non_exhaustive()
    }
}

/// Special handling that replaces the normal result path.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecialAction {
    /// End the call once remote audio has drained
    HangUp,
    /// Hand the call to the consumer's transfer callback with this payload
    Transfer(Value),
}

/// What a tool handler returns for a handled call.
#[derive(Debug)]
pub struct ToolCallResult {
    /// JSON returned as the function call output
    pub output: Value,
    /// Ask the model to respond after the output is sent
    pub prompt_response: bool,
    /// Mode to enter after the output is sent
    pub enter_mode: Option<String>,
    /// Exit the current mode after the output is sent
    pub exit_mode: bool,
    pub follow_up: Option<FollowUp>,
    pub special: Option<SpecialAction>,
}

impl ToolCallResult {
    /// Plain result that prompts a response.
    pub fn new(output: Value) -> Self {
        Self {
            output,
            prompt_response: true,
            enter_mode: None,
            exit_mode: false,
            follow_up: None,
            special: None,
        }
    }

    /// End the call after the remote side finishes speaking.
    pub fn hang_up(output: Value) -> Self {
        Self {
            special: Some(SpecialAction::HangUp),
            ..Self::new(output)
        }
    }

    /// Transfer the call; `payload` is passed to the transfer callback.
    pub fn transfer(output: Value, payload: Value) -> Self {
        Self {
            special: Some(SpecialAction::Transfer(payload)),
            ..Self::new(output)
        }
    }

    pub fn without_response(mut self) -> Self {
        self.prompt_response = false;
        self
    }

    pub fn enter_mode(mut self, mode: impl Into<String>) -> Self {
        self.enter_mode = Some(mode.into());
        self
    }

    pub fn exit_mode(mut self) -> Self {
        self.exit_mode = true;
        self
    }

    /// Attach an async follow-up. Its text is sent as a system message that
    /// prompts a response; a rejection is reported the same way.
    pub fn with_follow_up<F>(mut self, future: F) -> Self
    where
        F: Future<Output = Result<String, String>> + Send + 'static,
    {
        self.follow_up = Some(FollowUp {
            future: future.boxed(),
            exit_mode: false,
        });
        self
    }

    /// Exit the current mode once the follow-up resolves.
    pub fn exit_mode_after_follow_up(mut self) -> Self {
        if let Some(follow_up) = self.follow_up.as_mut() {
            follow_up.exit_mode = true;
        }
        self
    }

    #[inline]
    pub fn is_hang_up(&self) -> bool {
        matches!(self.special, Some(SpecialAction::HangUp))
    }

    #[inline]
    pub fn is_transfer(&self) -> bool {
        matches!(self.special, Some(SpecialAction::Transfer(_)))
    }
}
