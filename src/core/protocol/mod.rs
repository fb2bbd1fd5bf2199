//! Realtime control-channel protocol.

mod messages;

pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, InboundEvent, ServerEvent,
    SessionUpdate, ToolSchema,
};
