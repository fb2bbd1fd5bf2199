//! Error types surfaced by the voice-call framework.
//!
//! Lower layers (session token client, transport, microphone access) each have
//! their own `thiserror` enum. Everything that reaches the UI is collapsed into a
//! [`CallFailure`]: a short, non-technical message plus a [`CallErrorCode`] the
//! UI can use to decide whether to offer a retry.

pub mod call_error;

pub use call_error::{
    CallErrorCode, CallFailure, mentions_quota, mentions_rate_limit, messages,
};
