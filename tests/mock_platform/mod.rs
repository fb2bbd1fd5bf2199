//! Fake media platform, session provider and negotiator
//!
//! Every platform resource records what the controller did to it (sends,
//! closes, gain ramps) so tests can assert on resource handling without a
//! real WebRTC stack. Remote audio energy is scripted through [`FakeProbe`].

// Not every test binary uses every helper
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use waav_call::config::CallConfig;
use waav_call::core::session::{
    SessionProvider, SessionRequest, SessionToken, SessionTokenError, classify_api_failure,
};
use waav_call::core::transport::{
    AudioOutput, DataChannel, EnergyProbe, GainStage, LocalMedia, MediaPlatform,
    MicrophoneCapture, MicrophoneError, PeerConnection, PeerLink, PeerState, SdpNegotiator,
    TransportError, TransportEvent, TransportResult,
};
use waav_call::core::{
    CallController, Mode, ModeRegistry, ToolCallResult, ToolSchema, VoiceCallOptions,
};

// =============================================================================
// Media resources
// =============================================================================

#[derive(Default)]
pub struct FakeMedia {
    pub stops: AtomicUsize,
}

impl LocalMedia for FakeMedia {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeGain {
    pub ramps: Mutex<Vec<(f32, Duration)>>,
}

impl GainStage for FakeGain {
    fn ramp_to(&self, gain: f32, time_constant: Duration) {
        self.ramps.lock().push((gain, time_constant));
    }
}

#[derive(Default)]
pub struct FakeOutput {
    pub releases: AtomicUsize,
}

impl AudioOutput for FakeOutput {
    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeProbe {
    energy: Mutex<f32>,
}

impl FakeProbe {
    pub fn set_energy(&self, energy: f32) {
        *self.energy.lock() = energy;
    }
}

impl EnergyProbe for FakeProbe {
    fn average_energy(&self) -> f32 {
        *self.energy.lock()
    }
}

#[derive(Default)]
pub struct FakeChannel {
    sent: Mutex<Vec<String>>,
    pub closes: AtomicUsize,
}

impl FakeChannel {
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|s| serde_json::from_str(s).expect("controller sends valid JSON"))
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Messages created in the conversation, with `role` (or `function_call_output`).
    pub fn items(&self) -> Vec<Value> {
        self.sent_json()
            .into_iter()
            .filter(|v| v["type"] == "conversation.item.create")
            .map(|v| v["item"].clone())
            .collect()
    }

    pub fn session_updates(&self) -> Vec<Value> {
        self.sent_json()
            .into_iter()
            .filter(|v| v["type"] == "session.update")
            .map(|v| v["session"].clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl DataChannel for FakeChannel {
    fn send(&self, text: &str) -> TransportResult<()> {
        if self.closes.load(Ordering::SeqCst) > 0 {
            return Err(TransportError::ChannelNotOpen);
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakePeer {
    pub closes: AtomicUsize,
    pub answers: Mutex<Vec<String>>,
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn create_offer(&self) -> TransportResult<String> {
        Ok("v=0 fake-offer".to_string())
    }

    async fn apply_answer(&self, sdp: &str) -> TransportResult<()> {
        self.answers.lock().push(sdp.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Platform
// =============================================================================

/// Media platform fake. Each `open_peer` creates a fresh peer and channel and
/// immediately queues `ChannelOpen` plus a remote track.
#[derive(Default)]
pub struct FakePlatform {
    deny_microphone: AtomicBool,
    pub media: Arc<FakeMedia>,
    pub gain: Arc<FakeGain>,
    pub output: Arc<FakeOutput>,
    pub probe: Arc<FakeProbe>,
    peers: Mutex<Vec<Arc<FakePeer>>>,
    channels: Mutex<Vec<Arc<FakeChannel>>>,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    pub microphone_requests: AtomicUsize,
    pub open_peer_calls: AtomicUsize,
    pub ring_starts: AtomicUsize,
    pub ring_stops: AtomicUsize,
    ringing: AtomicBool,
    before_ring: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deny_microphone(&self) {
        self.deny_microphone.store(true, Ordering::SeqCst);
    }

    pub fn allow_microphone(&self) {
        self.deny_microphone.store(false, Ordering::SeqCst);
    }

    /// Run `f` once, just before the next ring tone starts playing.
    pub fn before_ring(&self, f: impl FnOnce() + Send + 'static) {
        *self.before_ring.lock() = Some(Box::new(f));
    }

    /// Whether the ring tone is currently playing.
    pub fn is_ringing(&self) -> bool {
        self.ringing.load(Ordering::SeqCst)
    }

    /// Channel of the most recent peer.
    pub fn channel(&self) -> Arc<FakeChannel> {
        self.channels
            .lock()
            .last()
            .cloned()
            .expect("no peer has been opened")
    }

    /// Most recent peer.
    pub fn peer(&self) -> Arc<FakePeer> {
        self.peers
            .lock()
            .last()
            .cloned()
            .expect("no peer has been opened")
    }

    pub fn emit(&self, event: TransportEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Deliver a server event on the control channel.
    pub fn server_event(&self, event: Value) {
        self.emit(TransportEvent::Message(event.to_string()));
    }

    pub fn tool_call(&self, name: &str, call_id: &str, arguments: &str) {
        self.server_event(json!({
            "type": "response.function_call_arguments.done",
            "name": name,
            "call_id": call_id,
            "arguments": arguments,
        }));
    }

    pub fn connection_state(&self, state: PeerState) {
        self.emit(TransportEvent::ConnectionState(state));
    }
}

#[async_trait]
impl MediaPlatform for FakePlatform {
    async fn acquire_microphone(&self) -> Result<MicrophoneCapture, MicrophoneError> {
        self.microphone_requests.fetch_add(1, Ordering::SeqCst);
        if self.deny_microphone.load(Ordering::SeqCst) {
            return Err(MicrophoneError::Denied);
        }
        Ok(MicrophoneCapture {
            media: self.media.clone(),
            gain: self.gain.clone(),
        })
    }

    async fn open_peer(&self, _capture: &MicrophoneCapture) -> TransportResult<PeerLink> {
        self.open_peer_calls.fetch_add(1, Ordering::SeqCst);
        let peer = Arc::new(FakePeer::default());
        let channel = Arc::new(FakeChannel::default());
        self.peers.lock().push(peer.clone());
        self.channels.lock().push(channel.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(TransportEvent::ChannelOpen);
        let _ = tx.send(TransportEvent::RemoteTrack {
            output: self.output.clone(),
            probe: self.probe.clone(),
        });
        *self.events.lock() = Some(tx);

        Ok(PeerLink {
            peer,
            channel,
            events: rx,
        })
    }

    fn start_ring_tone(&self) {
        let before = self.before_ring.lock().take();
        if let Some(f) = before {
            f();
        }
        self.ring_starts.fetch_add(1, Ordering::SeqCst);
        self.ringing.store(true, Ordering::SeqCst);
    }

    fn stop_ring_tone(&self) {
        self.ring_stops.fetch_add(1, Ordering::SeqCst);
        self.ringing.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Session provider and negotiator
// =============================================================================

/// Scripted session outcome.
#[derive(Clone)]
pub enum SessionScript {
    Token,
    Api { status: u16, body: String },
    Network,
}

pub struct FakeSessions {
    script: Mutex<SessionScript>,
    held: AtomicBool,
    gate: Notify,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<SessionRequest>>,
}

impl FakeSessions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(SessionScript::Token),
            held: AtomicBool::new(false),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, script: SessionScript) {
        *self.script.lock() = script;
    }

    /// Block session requests until [`release`](Self::release).
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for FakeSessions {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<SessionToken, SessionTokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if self.held.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }

        let script = self.script.lock().clone();
        match script {
            SessionScript::Token => Ok(SessionToken {
                client_secret: "ek_test".to_string(),
                expires_at: 1_700_000_060,
            }),
            SessionScript::Api { status, body } => Err(classify_api_failure(status, &body)),
            SessionScript::Network => Err(SessionTokenError::Network("connection refused".into())),
        }
    }
}

#[derive(Default)]
pub struct FakeNegotiator {
    pub reject: AtomicBool,
    pub offers: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl SdpNegotiator for FakeNegotiator {
    async fn negotiate(
        &self,
        offer_sdp: &str,
        client_secret: &str,
        model: &str,
    ) -> TransportResult<String> {
        self.offers.lock().push((
            offer_sdp.to_string(),
            client_secret.to_string(),
            model.to_string(),
        ));
        if self.reject.load(Ordering::SeqCst) {
            return Err(TransportError::Negotiation {
                status: 401,
                message: "invalid client secret".to_string(),
            });
        }
        Ok("v=0 fake-answer".to_string())
    }
}

// =============================================================================
// Consumer side
// =============================================================================

/// Context handed to modes and tools.
#[derive(Debug, Clone)]
pub struct Lesson {
    pub learner: String,
    pub topic: String,
}

/// Modes: `main` (initial), `quiz`, `hint`.
pub fn lesson_modes() -> ModeRegistry<Lesson> {
    ModeRegistry::new()
        .with_mode(Mode::new(
            "main",
            |ctx: &Lesson| format!("You are tutoring {}.", ctx.learner),
            |_| {
                vec![
                    ToolSchema::function("start_quiz", "Start a quiz", json!({"type": "object"})),
                    ToolSchema::function("end_call", "End the call", json!({"type": "object"})),
                ]
            },
        ))
        .with_mode(Mode::new(
            "quiz",
            |ctx: &Lesson| format!("Quiz {} on {}.", ctx.learner, ctx.topic),
            |_| {
                vec![ToolSchema::function(
                    "finish_quiz",
                    "Finish the quiz",
                    json!({"type": "object"}),
                )]
            },
        ))
        .with_mode(Mode::fixed("hint", "Give one hint.", vec![]))
}

/// Tool handler used by most tests.
pub fn lesson_tools(name: &str, args: &Value, _ctx: &Lesson) -> Option<ToolCallResult> {
    match name {
        "start_quiz" => Some(ToolCallResult::new(json!({"started": true})).enter_mode("quiz")),
        "finish_quiz" => Some(ToolCallResult::new(json!({"finished": true})).exit_mode()),
        "note" => Some(ToolCallResult::new(args.clone()).without_response()),
        "end_call" => Some(ToolCallResult::hang_up(json!({"ok": true}))),
        "transfer_to_parent" => Some(ToolCallResult::transfer(
            json!({"ok": true}),
            json!({"to": "parent"}),
        )),
        "lookup_slow" => Some(
            ToolCallResult::new(json!({"pending": true})).with_follow_up(async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok("The answer is 42.".to_string())
            }),
        ),
        "lookup_then_exit" => Some(
            ToolCallResult::new(json!({"pending": true}))
                .with_follow_up(async { Ok("Done looking.".to_string()) })
                .exit_mode_after_follow_up(),
        ),
        "lookup_broken" => Some(
            ToolCallResult::new(json!({"pending": true}))
                .with_follow_up(async { Err("service down".to_string()) }),
        ),
        _ => None,
    }
}

/// Options whose context reads the shared topic on every build.
pub fn lesson_options(topic: Arc<Mutex<String>>) -> VoiceCallOptions<Lesson> {
    VoiceCallOptions::new(
        move || Lesson {
            learner: "Ada".to_string(),
            topic: topic.lock().clone(),
        },
        "main",
        lesson_modes(),
    )
    .with_tool_handler(lesson_tools)
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub controller: CallController<Lesson>,
    pub platform: Arc<FakePlatform>,
    pub sessions: Arc<FakeSessions>,
    pub negotiator: Arc<FakeNegotiator>,
    pub topic: Arc<Mutex<String>>,
}

pub fn harness() -> Harness {
    let topic = Arc::new(Mutex::new("fractions".to_string()));
    harness_with(CallConfig::default(), lesson_options(topic.clone()), topic)
}

pub fn harness_with(
    config: CallConfig,
    options: VoiceCallOptions<Lesson>,
    topic: Arc<Mutex<String>>,
) -> Harness {
    let platform = FakePlatform::new();
    let sessions = FakeSessions::new();
    let negotiator = Arc::new(FakeNegotiator::default());
    let controller = CallController::with_providers(
        config,
        options,
        platform.clone(),
        sessions.clone(),
        negotiator.clone(),
    );
    Harness {
        controller,
        platform,
        sessions,
        negotiator,
        topic,
    }
}

/// Let spawned tasks process queued events without moving the clock much.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Yield until `condition` holds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
