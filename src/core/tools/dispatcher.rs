use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{FollowUp, SpecialAction, ToolCallResult};
use crate::core::protocol::{ClientEvent, ConversationItem};

/// Consumer tool handler: `(name, arguments, context)`; `None` means unhandled.
pub type ToolHandler<C> = Arc<dyn Fn(&str, &Value, &C) -> Option<ToolCallResult> + Send + Sync>;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub call_id: String,
    pub arguments: Value,
}

impl ToolCall {
    /// Build a call from its raw argument string. Malformed or non-object
    /// arguments become an empty object.
    pub fn parse(name: impl Into<String>, call_id: impl Into<String>, raw_arguments: &str) -> Self {
        let name = name.into();
        let arguments = match serde_json::from_str::<Value>(raw_arguments) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) | Err(_) => {
                if !raw_arguments.trim().is_empty() {
                    warn!(tool = %name, "Malformed tool arguments, using empty object");
                }
                json!({})
            }
        };
        Self {
            name,
            call_id: call_id.into(),
            arguments,
        }
    }
}

/// Mode change requested by a tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeChange {
    Enter(String),
    Exit,
}

/// What the controller has to do for one tool call.
#[derive(Debug)]
pub enum Dispatch {
    /// No handler claimed the call; send the failure output and nothing else
    Unhandled { output: ClientEvent },
    /// Send the output without a response, then hand over to the transfer callback
    Transfer { output: ClientEvent, payload: Value },
    /// Send the output without a response, then drain and hang up
    HangUp { output: ClientEvent },
    /// Send the output, apply the mode change, then respond or run the follow-up
    Normal {
        output: ClientEvent,
        mode_change: Option<ModeChange>,
        prompt_response: bool,
        follow_up: Option<FollowUp>,
    },
}

/// Failure payload for tools nobody handles.
pub fn unhandled_output(name: &str) -> Value {
    json!({
        "success": false,
        "error": format!("Tool '{name}' is not available"),
    })
}

/// Run the handler for `call` and decide what has to happen next.
pub fn dispatch<C>(call: &ToolCall, handler: &ToolHandler<C>, ctx: &C) -> Dispatch {
    let Some(result) = handler(&call.name, &call.arguments, ctx) else {
        warn!(tool = %call.name, call_id = %call.call_id, "Unhandled tool call");
        return Dispatch::Unhandled {
            output: output_event(&call.call_id, &unhandled_output(&call.name)),
        };
    };

    let ToolCallResult {
        output,
        prompt_response,
        enter_mode,
        exit_mode,
        follow_up,
        special,
    } = result;
    let output = output_event(&call.call_id, &output);

    match special {
        Some(SpecialAction::Transfer(payload)) => {
            debug!(tool = %call.name, "Tool requested transfer");
            Dispatch::Transfer { output, payload }
        }
        Some(SpecialAction::HangUp) => {
            debug!(tool = %call.name, "Tool requested hang-up");
            Dispatch::HangUp { output }
        }
        None => {
            let mode_change = match (enter_mode, exit_mode) {
                (Some(mode), _) => Some(ModeChange::Enter(mode)),
                (None, true) => Some(ModeChange::Exit),
                (None, false) => None,
            };
            Dispatch::Normal {
                output,
                mode_change,
                prompt_response: prompt_response && follow_up.is_none(),
                follow_up,
            }
        }
    }
}

/// System message sent when a follow-up rejects.
pub fn follow_up_error_message(tool: &str, error: &str) -> String {
    format!(
        "The follow-up for tool '{tool}' failed: {error}. Let the user know briefly and continue."
    )
}

fn output_event(call_id: &str, output: &Value) -> ClientEvent {
    ClientEvent::item(ConversationItem::function_output(call_id, output))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx;

    fn handler() -> ToolHandler<Ctx> {
        Arc::new(|name: &str, args: &Value, _ctx: &Ctx| match name {
            "echo" => Some(ToolCallResult::new(args.clone())),
            "quiz" => Some(ToolCallResult::new(json!({"ok": true})).enter_mode("quiz")),
            "done" => Some(ToolCallResult::new(json!({})).exit_mode().without_response()),
            "bye" => Some(ToolCallResult::hang_up(json!({"ending": true})).enter_mode("x")),
            "handoff" => Some(ToolCallResult::transfer(json!({}), json!({"to": "parent"}))),
            "slow" => Some(
                ToolCallResult::new(json!({"pending": true}))
                    .with_follow_up(async { Ok("ready".to_string()) }),
            ),
            _ => None,
        })
    }

    fn output_call_id(event: &ClientEvent) -> &str {
        match event {
            ClientEvent::ConversationItemCreate {
                item: ConversationItem::FunctionCallOutput { call_id, .. },
            } => call_id.as_str(),
            other => panic!("Expected function output, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_arguments_become_empty() {
        let call = ToolCall::parse("echo", "c1", "{not json");
        assert_eq!(call.arguments, json!({}));

        let call = ToolCall::parse("echo", "c1", "[1,2]");
        assert_eq!(call.arguments, json!({}));

        let call = ToolCall::parse("echo", "c1", r#"{"a":1}"#);
        assert_eq!(call.arguments, json!({"a": 1}));
    }

    #[test]
    fn test_unhandled_tool() {
        let call = ToolCall::parse("missing", "c9", "{}");
        match dispatch(&call, &handler(), &Ctx) {
            Dispatch::Unhandled { output } => {
                assert_eq!(output_call_id(&output), "c9");
                let json = output.to_json().unwrap();
                assert!(json.contains("not available"));
            }
            other => panic!("Expected Unhandled, got {other:?}"),
        }
    }

    #[test]
    fn test_normal_with_enter_mode() {
        let call = ToolCall::parse("quiz", "c2", "{}");
        match dispatch(&call, &handler(), &Ctx) {
            Dispatch::Normal {
                output,
                mode_change,
                prompt_response,
                follow_up,
            } => {
                assert_eq!(output_call_id(&output), "c2");
                assert_eq!(mode_change, Some(ModeChange::Enter("quiz".to_string())));
                assert!(prompt_response);
                assert!(follow_up.is_none());
            }
            other => panic!("Expected Normal, got {other:?}"),
        }
    }

    #[test]
    fn test_exit_without_response() {
        let call = ToolCall::parse("done", "c3", "");
        match dispatch(&call, &handler(), &Ctx) {
            Dispatch::Normal {
                mode_change,
                prompt_response,
                ..
            } => {
                assert_eq!(mode_change, Some(ModeChange::Exit));
                assert!(!prompt_response);
            }
            other => panic!("Expected Normal, got {other:?}"),
        }
    }

    #[test]
    fn test_hang_up_wins_over_mode_change() {
        let call = ToolCall::parse("bye", "c4", "{}");
        assert!(matches!(
            dispatch(&call, &handler(), &Ctx),
            Dispatch::HangUp { .. }
        ));
    }

    #[test]
    fn test_transfer_carries_payload() {
        let call = ToolCall::parse("handoff", "c5", "{}");
        match dispatch(&call, &handler(), &Ctx) {
            Dispatch::Transfer { payload, .. } => assert_eq!(payload, json!({"to": "parent"})),
            other => panic!("Expected Transfer, got {other:?}"),
        }
    }

    #[test]
    fn test_follow_up_suppresses_immediate_response() {
        let call = ToolCall::parse("slow", "c6", "{}");
        match dispatch(&call, &handler(), &Ctx) {
            Dispatch::Normal {
                prompt_response,
                follow_up,
                ..
            } => {
                assert!(!prompt_response);
                assert!(follow_up.is_some());
            }
            other => panic!("Expected Normal, got {other:?}"),
        }
    }
}
