//! Platform media traits.
//!
//! A voice call needs a microphone, a peer connection carrying one outbound
//! and one inbound audio track, an ordered data channel for control events,
//! a gain stage on the outbound path and an energy probe on the inbound path.
//! None of these exist in a plain Rust process, so an embedding (native WebRTC
//! stack, WASM bridge, test fake) provides them through the traits below.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{MicrophoneError, TransportResult};

/// Label of the control data channel.
pub const CONTROL_CHANNEL_LABEL: &str = "oai-events";

/// Peer connection state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }

    /// States after which the connection will not carry the call any further.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

/// Events emitted by an open peer link, in arrival order.
pub enum TransportEvent {
    /// The control channel is open
    ChannelOpen,
    /// A text frame arrived on the control channel
    Message(String),
    /// The control channel closed
    ChannelClosed,
    /// The remote audio track arrived and is playing
    RemoteTrack {
        output: Arc<dyn AudioOutput>,
        probe: Arc<dyn EnergyProbe>,
    },
    /// A track-level failure (logged, never fatal)
    TrackError(String),
    /// Peer connection state changed
    ConnectionState(PeerState),
}

impl std::fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelOpen => write!(f, "ChannelOpen"),
            Self::Message(text) => f.debug_tuple("Message").field(text).finish(),
            Self::ChannelClosed => write!(f, "ChannelClosed"),
            Self::RemoteTrack { .. } => write!(f, "RemoteTrack"),
            Self::TrackError(e) => f.debug_tuple("TrackError").field(e).finish(),
            Self::ConnectionState(s) => f.debug_tuple("ConnectionState").field(s).finish(),
        }
    }
}

/// Captured local microphone audio.
pub trait LocalMedia: Send + Sync {
    /// Stop every local track. Must tolerate repeated calls.
    fn stop(&self);
}

/// Software gain inserted between the microphone and the outbound track.
pub trait GainStage: Send + Sync {
    /// Exponentially approach `gain` with the given time constant.
    fn ramp_to(&self, gain: f32, time_constant: Duration);
}

/// Playback sink for the remote audio stream.
pub trait AudioOutput: Send + Sync {
    /// Detach and release the playback element. Must tolerate repeated calls.
    fn release(&self);
}

/// Energy analysis over the remote audio stream.
pub trait EnergyProbe: Send + Sync {
    /// Average energy of the latest frequency frame (0-255 scale).
    fn average_energy(&self) -> f32;
}

/// Control data channel.
pub trait DataChannel: Send + Sync {
    /// Send one text frame.
    fn send(&self, text: &str) -> TransportResult<()>;

    /// Close the channel. Must tolerate repeated calls.
    fn close(&self);
}

/// Peer connection carrying the audio tracks and the control channel.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Create the local offer, apply it as the local description and return its SDP.
    async fn create_offer(&self) -> TransportResult<String>;

    /// Apply the remote answer SDP.
    async fn apply_answer(&self, sdp: &str) -> TransportResult<()>;

    /// Close the connection. Must tolerate repeated calls.
    fn close(&self);
}

/// Microphone plus the gain stage already wired into the outbound path.
#[derive(Clone)]
pub struct MicrophoneCapture {
    pub media: Arc<dyn LocalMedia>,
    pub gain: Arc<dyn GainStage>,
}

/// An open peer connection, its control channel, and its event stream.
pub struct PeerLink {
    pub peer: Arc<dyn PeerConnection>,
    pub channel: Arc<dyn DataChannel>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Factory for every platform resource a call acquires.
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Ask for microphone access and insert the outbound gain stage.
    async fn acquire_microphone(&self) -> Result<MicrophoneCapture, MicrophoneError>;

    /// Create a peer connection sending `capture` and receiving one audio
    /// track, with an ordered control channel labelled [`CONTROL_CHANNEL_LABEL`].
    async fn open_peer(&self, capture: &MicrophoneCapture) -> TransportResult<PeerLink>;

    /// Start the ringing tone.
    fn start_ring_tone(&self) {}

    /// Stop the ringing tone. Must tolerate repeated calls.
    fn stop_ring_tone(&self) {}
}
