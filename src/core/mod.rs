pub mod call;
pub mod echo;
pub mod modes;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transport;

// Re-export commonly used types for convenience
pub use call::{
    CallController, CallSetupError, CallSnapshot, CallState, ModeAction, TransferHandle,
    VoiceCallOptions,
};

pub use echo::{EchoGate, GainCommand, average_energy};

pub use modes::{Mode, ModeMachine, ModeRegistry, ResolvedMode, TransitionEntry};

pub use protocol::{ClientEvent, ConversationItem, InboundEvent, ServerEvent, ToolSchema};

pub use session::{
    HttpSessionClient, SessionProvider, SessionRequest, SessionToken, SessionTokenError,
};

pub use tools::{ToolCall, ToolCallResult, ToolHandler};

pub use transport::{
    AudioOutput, DataChannel, EnergyProbe, GainStage, HttpSdpNegotiator, LocalMedia,
    MediaPlatform, MicrophoneCapture, MicrophoneError, PeerConnection, PeerLink, PeerState,
    SdpNegotiator, TransportError, TransportEvent,
};
