//! Signaling and transport.
//!
//! The platform traits describe the peer connection, control channel and
//! audio path; [`SdpNegotiator`] performs the single offer/answer HTTP exchange.

mod negotiation;
mod traits;

pub use negotiation::{HttpSdpNegotiator, SdpNegotiator};
pub use traits::{
    AudioOutput, CONTROL_CHANNEL_LABEL, DataChannel, EnergyProbe, GainStage, LocalMedia,
    MediaPlatform, MicrophoneCapture, PeerConnection, PeerLink, PeerState, TransportEvent,
};

use thiserror::Error;

use crate::errors::{CallErrorCode, CallFailure};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("SDP negotiation failed ({status}): {message}")]
    Negotiation { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid negotiation URL: {0}")]
    InvalidUrl(String),

    #[error("Peer connection error: {0}")]
    Peer(String),

    #[error("Data channel error: {0}")]
    Channel(String),

    #[error("Data channel is not open")]
    ChannelNotOpen,
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

impl From<TransportError> for CallFailure {
    fn from(_: TransportError) -> Self {
        CallFailure::from_code(CallErrorCode::ConnectionError)
    }
}

/// Microphone acquisition errors.
#[derive(Debug, Error)]
pub enum MicrophoneError {
    #[error("Microphone permission denied")]
    Denied,

    #[error("Microphone unavailable: {0}")]
    Unavailable(String),
}

impl From<MicrophoneError> for CallFailure {
    fn from(err: MicrophoneError) -> Self {
        match err {
            MicrophoneError::Denied => CallFailure::from_code(CallErrorCode::MicDenied),
            MicrophoneError::Unavailable(_) => CallFailure::from_code(CallErrorCode::MicError),
        }
    }
}
