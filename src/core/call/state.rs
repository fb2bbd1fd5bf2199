use serde::Serialize;

use crate::core::modes::TransitionEntry;
use crate::errors::CallFailure;

/// Call lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,
    Ringing,
    Active,
    Ending,
    Error,
}

impl CallState {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ringing => "ringing",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Error => "error",
        }
    }

    /// States from which `dial()` may start a new call.
    #[inline]
    pub fn can_dial(&self) -> bool {
        matches!(self, Self::Idle | Self::Error)
    }

    /// States holding live call resources.
    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Ringing | Self::Active | Self::Ending)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a UI layer renders, read in one consistent pass.
#[derive(Debug, Clone, Serialize)]
pub struct CallSnapshot {
    pub state: CallState,
    pub failure: Option<CallFailure>,
    /// Whole seconds left on the countdown, `None` outside a timed call
    pub time_remaining: Option<u64>,
    pub remote_speaking: bool,
    pub active_mode: String,
    pub previous_mode: Option<String>,
    /// Active mode instructions resolved against a fresh context
    pub instructions: String,
    pub transitions: Vec<TransitionEntry>,
}
