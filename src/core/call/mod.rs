//! Call lifecycle.
//!
//! [`CallController`] drives a call from dialing to teardown: microphone,
//! session token, peer connection, signaling, the countdown timer, the echo
//! gate and dispatch of every inbound control event.

mod controller;
mod options;
mod state;
mod timer;

pub use controller::{CallController, CallSetupError, TransferHandle};
pub use options::{
    ContextBuilder, ControllerHook, ModeAction, NotifyHook, RawEventHook, ResponseDoneHook,
    TimeWarningHook, TranscriptHook, TransferHook, VoiceCallOptions,
};
pub use state::{CallSnapshot, CallState};
pub use timer::{TimerSignal, TimerState};
