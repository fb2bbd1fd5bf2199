//! Modes and the mode state machine.
//!
//! A mode is a named bundle of instructions and tools. The consumer declares
//! them once in a [`ModeRegistry`]; [`ModeMachine`] selects among them during
//! a call and records every transition in a bounded log.

mod machine;
mod registry;

pub use machine::{ModeMachine, TRANSITION_LOG_CAPACITY, TransitionEntry};
pub use registry::{InstructionsFn, Mode, ModeRegistry, ResolvedMode, ToolsFn};
