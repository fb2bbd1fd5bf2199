//! Tool-call dispatch.
//!
//! The model requests a tool over the control channel; the consumer's
//! [`ToolHandler`] answers with a [`ToolCallResult`]; [`dispatch`] turns that
//! into a [`Dispatch`] plan the call controller executes in order.

mod dispatcher;
mod result;

pub use dispatcher::{
    Dispatch, ModeChange, ToolCall, ToolHandler, dispatch, follow_up_error_message,
    unhandled_output,
};
pub use result::{FollowUp, SpecialAction, ToolCallResult};
