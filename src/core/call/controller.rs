//! Call lifecycle controller.
//!
//! Owns the `idle → ringing → active → ending → idle` state machine (plus
//! `error`), every resource a call acquires, the countdown timer, the echo
//! sampler and the control-channel event loop.
//!
//! # Concurrency
//!
//! All mutable call state sits behind one `parking_lot::Mutex` that is never
//! held across an `.await` and never held while consumer code runs (hooks, the
//! context builder, mode closures, the tool handler). Mode changes resolve
//! outside the lock and then record the transition under it. Each dial
//! attempt gets a generation number; teardown bumps it, and every suspension
//! point in `dial()` and every background task re-checks it before touching
//! the call again. A `CancellationToken` stops the background tasks.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::options::{ModeAction, VoiceCallOptions};
use super::state::{CallSnapshot, CallState};
use super::timer::{TimerSignal, TimerState};
use crate::config::{CallConfig, ConfigError};
use crate::core::echo::EchoGate;
use crate::core::modes::{ModeMachine, ResolvedMode, TransitionEntry};
use crate::core::protocol::{ApiError, ClientEvent, ConversationItem, InboundEvent, ServerEvent};
use crate::core::session::{HttpSessionClient, SessionProvider, SessionRequest, SessionTokenError};
use crate::core::tools::{
    Dispatch, FollowUp, ModeChange, ToolCall, dispatch, follow_up_error_message,
};
use crate::core::transport::{
    AudioOutput, DataChannel, EnergyProbe, HttpSdpNegotiator, MediaPlatform, MicrophoneCapture,
    PeerConnection, PeerLink, SdpNegotiator, TransportError, TransportEvent,
};
use crate::errors::CallFailure;

/// Errors building a controller with the default HTTP clients.
#[derive(Debug, Error)]
pub enum CallSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionTokenError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Mode change applied by the controller.
#[derive(Debug, Clone, Copy)]
enum ModeStep<'a> {
    Enter { mode: &'a str, save_previous: bool },
    Exit,
    Refresh,
}

// =============================================================================
// Resources
// =============================================================================

/// Everything a single call attempt owns.
#[derive(Default)]
struct CallResources {
    microphone: Option<MicrophoneCapture>,
    peer: Option<Arc<dyn PeerConnection>>,
    channel: Option<Arc<dyn DataChannel>>,
    output: Option<Arc<dyn AudioOutput>>,
    probe: Option<Arc<dyn EnergyProbe>>,
}

impl CallResources {
    fn release(self) {
        if let Some(channel) = self.channel {
            channel.close();
        }
        if let Some(peer) = self.peer {
            peer.close();
        }
        if let Some(microphone) = self.microphone {
            microphone.media.stop();
        }
        if let Some(output) = self.output {
            output.release();
        }
    }
}

struct Inner<C> {
    state: CallState,
    failure: Option<CallFailure>,
    generation: u64,
    call_id: Option<Uuid>,
    modes: ModeMachine<C>,
    timer: Option<TimerState>,
    echo: EchoGate,
    resources: CallResources,
    tasks: Option<CancellationToken>,
}

impl<C> Inner<C> {
    /// Invalidate the current attempt and take its resources.
    fn teardown(&mut self) -> CallResources {
        self.generation += 1;
        if let Some(tasks) = self.tasks.take() {
            tasks.cancel();
        }
        self.timer = None;
        self.modes.reset();
        self.echo.reset();
        std::mem::take(&mut self.resources)
    }
}

struct Shared<C> {
    config: CallConfig,
    options: VoiceCallOptions<C>,
    platform: Arc<dyn MediaPlatform>,
    sessions: Arc<dyn SessionProvider>,
    negotiator: Arc<dyn SdpNegotiator>,
    inner: Mutex<Inner<C>>,
}

// =============================================================================
// Controller
// =============================================================================

/// Handle to one voice call slot. Cheap to clone; all clones share the call.
pub struct CallController<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for CallController<C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// Passed to the transfer callback.
pub struct TransferHandle<C> {
    controller: CallController<C>,
}

impl<C> Clone for TransferHandle<C> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
        }
    }
}

impl<C: Send + Sync + 'static> TransferHandle<C> {
    /// Tear the current call down.
    pub fn cleanup(&self) {
        self.controller.hang_up();
    }

    /// Tear the current call down and dial again with a fresh context.
    pub async fn redial(&self) {
        self.controller.hang_up();
        self.controller.dial().await;
    }

    pub fn controller(&self) -> &CallController<C> {
        &self.controller
    }
}

impl<C: Send + Sync + 'static> CallController<C> {
    /// Controller using the HTTP session client and SDP negotiator.
    pub fn new(
        config: CallConfig,
        options: VoiceCallOptions<C>,
        platform: Arc<dyn MediaPlatform>,
    ) -> Result<Self, CallSetupError> {
        config.validate()?;
        let sessions = Arc::new(HttpSessionClient::new(&config)?);
        let negotiator = Arc::new(HttpSdpNegotiator::new(&config)?);
        Ok(Self::with_providers(
            config, options, platform, sessions, negotiator,
        ))
    }

    /// Controller with explicit session and negotiation providers.
    pub fn with_providers(
        config: CallConfig,
        options: VoiceCallOptions<C>,
        platform: Arc<dyn MediaPlatform>,
        sessions: Arc<dyn SessionProvider>,
        negotiator: Arc<dyn SdpNegotiator>,
    ) -> Self {
        if !options.modes.contains(&options.initial_mode) {
            error!(mode = %options.initial_mode, "Initial mode is not in the mode registry");
        }

        let inner = Inner {
            state: CallState::Idle,
            failure: None,
            generation: 0,
            call_id: None,
            modes: ModeMachine::new(options.modes.clone(), options.initial_mode.clone()),
            timer: None,
            echo: EchoGate::new(config.echo.clone()),
            resources: CallResources::default(),
            tasks: None,
        };

        Self {
            shared: Arc::new(Shared {
                config,
                options,
                platform,
                sessions,
                negotiator,
                inner: Mutex::new(inner),
            }),
        }
    }

    pub fn config(&self) -> &CallConfig {
        &self.shared.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        self.shared.inner.lock()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Run `f` against the call if `generation` is still current.
    fn adopt(&self, generation: u64, f: impl FnOnce(&mut Inner<C>)) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        f(&mut inner);
        true
    }

    fn context(&self) -> C {
        (self.shared.options.build_context)()
    }

    // =========================================================================
    // Dialing
    // =========================================================================

    /// Place a call. Returns once the call is active, has failed, or was cancelled.
    pub async fn dial(&self) {
        let (generation, call_id) = {
            let mut inner = self.lock();
            if !inner.state.can_dial() {
                warn!(state = %inner.state, "Dial ignored, a call is already in progress");
                return;
            }
            inner.generation += 1;
            inner.state = CallState::Ringing;
            inner.failure = None;
            inner.timer = None;
            inner.modes.reset();
            inner.echo.reset();
            let call_id = Uuid::new_v4();
            inner.call_id = Some(call_id);
            (inner.generation, call_id)
        };
        let started = Instant::now();
        let platform = self.shared.platform.clone();
        info!(%call_id, "Dialing");

        let capture = match platform.acquire_microphone().await {
            Ok(capture) => capture,
            Err(e) => {
                warn!(%call_id, error = %e, "Microphone unavailable");
                self.fail(generation, e.into());
                return;
            }
        };
        if !self.adopt(generation, |inner| {
            inner.resources.microphone = Some(capture.clone())
        }) {
            capture.media.stop();
            return;
        }
        platform.start_ring_tone();
        if !self.is_current(generation) {
            // Hung up before the tone started; its teardown already ran
            platform.stop_ring_tone();
            return;
        }

        let request = {
            let initial = self.resolve_mode(&self.shared.options.initial_mode);
            SessionRequest::from_config(&self.shared.config, initial.instructions, initial.tools)
        };
        let token = self.shared.sessions.create_session(&request).await;
        if !self.is_current(generation) {
            debug!(%call_id, "Dial cancelled during session fetch");
            return;
        }
        let token = match token {
            Ok(token) => token,
            Err(e) => {
                warn!(%call_id, code = %e.code(), error = %e, "Session creation failed");
                self.fail(generation, e.into());
                return;
            }
        };

        let link = match platform.open_peer(&capture).await {
            Ok(link) => link,
            Err(e) => {
                warn!(%call_id, error = %e, "Peer connection setup failed");
                self.fail(generation, e.into());
                return;
            }
        };
        let PeerLink {
            peer,
            channel,
            events,
        } = link;
        let tasks = CancellationToken::new();
        if !self.adopt(generation, |inner| {
            inner.resources.peer = Some(peer.clone());
            inner.resources.channel = Some(channel.clone());
            inner.tasks = Some(tasks.clone());
        }) {
            channel.close();
            peer.close();
            return;
        }
        tokio::spawn(self.clone().run_events(generation, events, tasks.clone()));

        if let Err(e) = self.negotiate(generation, peer.as_ref(), &token.client_secret).await {
            warn!(%call_id, error = %e, "Signaling failed");
            self.fail(generation, e.into());
            return;
        }
        if !self.is_current(generation) {
            debug!(%call_id, "Dial cancelled during signaling");
            return;
        }

        let min_ring = self.shared.config.ring.min_ring();
        let elapsed = started.elapsed();
        if elapsed < min_ring {
            sleep(min_ring - elapsed).await;
        }

        let activated = {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != CallState::Ringing {
                false
            } else {
                inner.state = CallState::Active;
                inner.timer = Some(TimerState::start(
                    Instant::now(),
                    self.shared.config.timer.base_duration(),
                ));
                true
            }
        };
        if !activated {
            debug!(%call_id, "Dial cancelled before activation");
            return;
        }

        platform.stop_ring_tone();
        info!(%call_id, "Call active");
        self.spawn_timer(tasks.clone());
        self.spawn_echo_sampler(tasks);

        if let Some(hook) = &self.shared.options.on_session_established {
            hook(self);
        }
    }

    async fn negotiate(
        &self,
        generation: u64,
        peer: &dyn PeerConnection,
        client_secret: &str,
    ) -> Result<(), TransportError> {
        let offer = peer.create_offer().await?;
        if !self.is_current(generation) {
            return Ok(());
        }
        let answer = self
            .shared
            .negotiator
            .negotiate(&offer, client_secret, &self.shared.config.model)
            .await?;
        if !self.is_current(generation) {
            return Ok(());
        }
        peer.apply_answer(&answer).await
    }

    /// Tear down and enter `error`, if `generation` is still current.
    fn fail(&self, generation: u64, failure: CallFailure) {
        let released = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            let released = inner.teardown();
            inner.state = CallState::Error;
            inner.failure = Some(failure.clone());
            released
        };
        self.release(released);
        error!(code = %failure.code, message = %failure.message, "Call failed");
    }

    fn release(&self, resources: CallResources) {
        resources.release();
        self.shared.platform.stop_ring_tone();
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Release every call resource and stop all background work.
    ///
    /// Safe to call from any state, repeatedly and concurrently. A live call
    /// returns to `idle`; an `error` state keeps its failure.
    pub fn cleanup(&self) {
        let released = {
            let mut inner = self.lock();
            let released = inner.teardown();
            if inner.state.is_live() {
                inner.state = CallState::Idle;
            }
            released
        };
        self.release(released);
    }

    /// End the call immediately and return to `idle`.
    pub fn hang_up(&self) {
        let (released, previous) = {
            let mut inner = self.lock();
            let previous = inner.state;
            let released = inner.teardown();
            inner.state = CallState::Idle;
            inner.failure = None;
            (released, previous)
        };
        self.release(released);
        if previous != CallState::Idle {
            info!(from = %previous, "Call hung up");
        }
    }

    /// Enter `ending`, wait for remote audio to quiet (bounded), then hang up.
    ///
    /// Accepted while `ringing` too: the pending dial sees the state change and
    /// never activates.
    fn begin_drain(&self, generation: u64) {
        let previous = {
            let mut inner = self.lock();
            if inner.generation != generation
                || !matches!(inner.state, CallState::Ringing | CallState::Active)
            {
                return;
            }
            let previous = inner.state;
            inner.state = CallState::Ending;
            previous
        };
        if previous == CallState::Ringing {
            self.shared.platform.stop_ring_tone();
        }
        info!(from = %previous, "Remote side ended the call, draining audio");

        let controller = self.clone();
        let settings = self.shared.config.hang_up.clone();
        tokio::spawn(async move {
            let cap = Instant::now() + settings.max_wait();
            while controller.is_current(generation) && controller.is_remote_speaking() {
                let now = Instant::now();
                if now >= cap {
                    warn!("Remote audio still playing at drain cap, hanging up");
                    break;
                }
                sleep(settings.poll_interval().min(cap - now)).await;
            }
            sleep(settings.final_delay()).await;
            if controller.is_current(generation) {
                controller.hang_up();
            }
        });
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    async fn run_events(
        self,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        tasks: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = tasks.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Some(event) => self.handle_transport_event(generation, event),
                None => {
                    self.on_transport_lost(generation, "event stream ended");
                    break;
                }
            }
        }
        debug!("Event loop stopped");
    }

    fn spawn_timer(&self, tasks: CancellationToken) {
        let controller = self.clone();
        let period = self.shared.config.timer.tick_interval();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = tasks.cancelled() => break,
                    _ = ticker.tick() => controller.on_timer_tick(),
                }
            }
        });
    }

    fn on_timer_tick(&self) {
        let threshold = self.shared.config.timer.warning_threshold();
        let signal = {
            let mut inner = self.lock();
            if inner.state != CallState::Active {
                return;
            }
            match inner.timer.as_mut() {
                Some(timer) => timer.poll(Instant::now(), threshold),
                None => return,
            }
        };

        match signal {
            TimerSignal::Idle => {}
            TimerSignal::Warning { remaining_secs } => {
                info!(remaining_secs, "Call time running out");
                if let Some(hook) = &self.shared.options.on_time_warning {
                    hook(self, remaining_secs);
                }
            }
            TimerSignal::Expired => {
                info!("Call time expired");
                match &self.shared.options.on_time_expired {
                    Some(hook) => hook(self),
                    None => self.hang_up(),
                }
            }
        }
    }

    fn spawn_echo_sampler(&self, tasks: CancellationToken) {
        let controller = self.clone();
        let period = self.shared.config.echo.sample_interval();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = tasks.cancelled() => break,
                    _ = ticker.tick() => controller.sample_echo(),
                }
            }
        });
    }

    fn sample_echo(&self) {
        let (probe, gain) = {
            let inner = self.lock();
            if !matches!(inner.state, CallState::Active | CallState::Ending) {
                return;
            }
            match (&inner.resources.probe, &inner.resources.microphone) {
                (Some(probe), Some(mic)) => (probe.clone(), mic.gain.clone()),
                _ => return,
            }
        };

        let energy = probe.average_energy();
        let command = {
            let mut inner = self.lock();
            if !matches!(inner.state, CallState::Active | CallState::Ending) {
                return;
            }
            inner.echo.observe(energy, Instant::now())
        };
        if let Some(command) = command {
            trace!(gain = command.gain, energy, "Echo gate gain change");
            command.apply(gain.as_ref());
        }
    }

    // =========================================================================
    // Inbound events
    // =========================================================================

    fn handle_transport_event(&self, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::ChannelOpen => {
                debug!("Control channel open");
                let active = self.lock().modes.active().to_string();
                let resolved = self.resolve_mode(&active);
                self.send_session_update(resolved);
            }
            TransportEvent::Message(text) => match InboundEvent::parse(&text) {
                Ok(inbound) => self.handle_server_event(generation, inbound),
                Err(e) => warn!(error = %e, "Unparseable control message"),
            },
            TransportEvent::ChannelClosed => {
                self.on_transport_lost(generation, "control channel closed");
            }
            TransportEvent::ConnectionState(state) => {
                debug!(state = state.as_str(), "Peer connection state");
                if state.is_terminal() {
                    self.on_transport_lost(generation, state.as_str());
                }
            }
            TransportEvent::RemoteTrack { output, probe } => {
                let adopted = self.adopt(generation, |inner| {
                    inner.resources.output = Some(output.clone());
                    inner.resources.probe = Some(probe);
                });
                if !adopted {
                    output.release();
                }
            }
            TransportEvent::TrackError(e) => warn!(error = %e, "Remote track error"),
        }
    }

    /// Treat an unexpected close while ringing or active as an implicit hang-up.
    fn on_transport_lost(&self, generation: u64, reason: &str) {
        let live = {
            let inner = self.lock();
            inner.generation == generation
                && matches!(inner.state, CallState::Ringing | CallState::Active)
        };
        if live {
            info!(reason, "Transport closed, ending call");
            self.hang_up();
        }
    }

    fn handle_server_event(&self, generation: u64, inbound: InboundEvent) {
        let options = &self.shared.options;
        match inbound.event {
            ServerEvent::SessionCreated => {
                debug!("Realtime session created");
                if let Some(hook) = &options.on_session_created {
                    hook();
                }
            }
            ServerEvent::Error { ref error } => self.on_protocol_error(generation, error),
            ServerEvent::ResponseCreated => {
                if let Some(hook) = &options.on_response_created {
                    hook();
                }
            }
            ServerEvent::ResponseDone => {
                if let Some(hook) = &options.on_response_done_raw {
                    hook(&inbound.raw);
                }
                if let Some(action) = options.on_response_done.as_ref().and_then(|hook| hook(self)) {
                    self.apply_mode_action(action, "response_done");
                }
            }
            ServerEvent::AudioTranscriptDone { ref transcript } => {
                if let Some(hook) = &options.on_model_speech {
                    hook(transcript);
                }
            }
            ServerEvent::InputTranscriptionCompleted { ref transcript } => {
                if let Some(hook) = &options.on_user_speech {
                    hook(transcript);
                }
            }
            ServerEvent::FunctionCallArgumentsDone {
                ref name,
                ref call_id,
                ref arguments,
            } => {
                let call = ToolCall::parse(name.as_str(), call_id.as_str(), arguments);
                self.handle_tool_call(generation, call);
            }
            ServerEvent::Unknown => {
                trace!(event_type = inbound.event_type(), "Ignoring control event");
            }
        }
    }

    fn on_protocol_error(&self, generation: u64, error: &ApiError) {
        let code = error.effective_code();
        if self.shared.config.is_suppressed_error(code) {
            warn!(code, message = %error.message, "Suppressed protocol error");
            return;
        }
        error!(code, message = %error.message, "Protocol error");
        self.fail(generation, CallFailure::from_protocol_error(code, &error.message));
    }

    // =========================================================================
    // Tool calls
    // =========================================================================

    fn handle_tool_call(&self, generation: u64, call: ToolCall) {
        info!(tool = %call.name, call_id = %call.call_id, "Tool call");
        let plan = {
            let ctx = self.context();
            dispatch(&call, &self.shared.options.tool_handler, &ctx)
        };
        let action = format!("tool:{}", call.name);

        match plan {
            Dispatch::Unhandled { output } => {
                self.send_event(&output);
            }
            Dispatch::Transfer { output, payload } => {
                self.send_event(&output);
                match &self.shared.options.on_transfer {
                    Some(hook) => hook(
                        TransferHandle {
                            controller: self.clone(),
                        },
                        payload,
                    ),
                    None => warn!(tool = %call.name, "Transfer requested without a transfer callback"),
                }
            }
            Dispatch::HangUp { output } => {
                self.send_event(&output);
                self.begin_drain(generation);
            }
            Dispatch::Normal {
                output,
                mode_change,
                prompt_response,
                follow_up,
            } => {
                self.send_event(&output);
                match mode_change {
                    Some(ModeChange::Enter(mode)) => {
                        self.transition(
                            ModeStep::Enter {
                                mode: &mode,
                                save_previous: true,
                            },
                            &action,
                        );
                    }
                    Some(ModeChange::Exit) => {
                        self.transition(ModeStep::Exit, &action);
                    }
                    None => {}
                }
                if prompt_response {
                    self.send_event(&ClientEvent::ResponseCreate);
                }
                if let Some(follow_up) = follow_up {
                    self.spawn_follow_up(generation, call.name, follow_up);
                }
            }
        }
    }

    fn spawn_follow_up(&self, generation: u64, tool: String, follow_up: FollowUp) {
        let Some(tasks) = self.lock().tasks.clone() else {
            return;
        };
        let controller = self.clone();
        let FollowUp { future, exit_mode } = follow_up;

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = tasks.cancelled() => return,
                outcome = future => outcome,
            };
            if !controller.is_current(generation) {
                return;
            }

            let (text, exit_after) = match outcome {
                Ok(text) => (text, exit_mode),
                Err(e) => {
                    warn!(tool = %tool, error = %e, "Tool follow-up failed");
                    (follow_up_error_message(&tool, &e), false)
                }
            };
            controller.send_event(&ClientEvent::item(ConversationItem::system_text(text)));
            controller.send_event(&ClientEvent::ResponseCreate);
            if exit_after {
                let action = format!("tool:{tool}:follow_up");
                controller.transition(ModeStep::Exit, &action);
            }
        });
    }

    // =========================================================================
    // Modes
    // =========================================================================

    /// Resolve a mode against a fresh context without touching call state.
    fn resolve_mode(&self, id: &str) -> ResolvedMode {
        let ctx = self.context();
        self.shared
            .options
            .modes
            .resolve_or(id, &self.shared.options.initial_mode, &ctx)
    }

    fn transition(&self, step: ModeStep<'_>, action: &str) -> bool {
        let target = {
            let inner = self.lock();
            match step {
                ModeStep::Enter { mode, .. } => mode.to_string(),
                ModeStep::Exit => inner.modes.exit_target().to_string(),
                ModeStep::Refresh => inner.modes.active().to_string(),
            }
        };
        let resolved = self.resolve_mode(&target);
        let resolved = {
            let mut inner = self.lock();
            match step {
                ModeStep::Enter { save_previous, .. } => {
                    inner.modes.apply_enter(resolved, save_previous, action)
                }
                ModeStep::Exit => inner.modes.apply_exit(resolved, action),
                ModeStep::Refresh => inner.modes.apply_refresh(resolved, action),
            }
        };
        self.send_session_update(resolved)
    }

    fn apply_mode_action(&self, action: ModeAction, label: &str) {
        let step = match &action {
            ModeAction::Enter(mode) => ModeStep::Enter {
                mode,
                save_previous: true,
            },
            ModeAction::Exit => ModeStep::Exit,
            ModeAction::Refresh => ModeStep::Refresh,
        };
        self.transition(step, label);
    }

    /// Enter a mode and send its instructions and tools.
    pub fn enter_mode(&self, mode: &str, save_previous: bool) -> bool {
        self.transition(
            ModeStep::Enter {
                mode,
                save_previous,
            },
            "enter",
        )
    }

    /// Return to the remembered mode (or the initial one).
    pub fn exit_mode(&self) -> bool {
        self.transition(ModeStep::Exit, "exit")
    }

    /// Re-send the active mode resolved against a fresh context.
    pub fn update_session(&self) -> bool {
        self.transition(ModeStep::Refresh, "refresh")
    }

    // =========================================================================
    // Outbound messages
    // =========================================================================

    fn send_session_update(&self, resolved: ResolvedMode) -> bool {
        debug!(mode = %resolved.id, tools = resolved.tools.len(), "Sending session update");
        self.send_event(&ClientEvent::session_update(
            resolved.instructions,
            resolved.tools,
        ))
    }

    fn send_event(&self, event: &ClientEvent) -> bool {
        let Some(channel) = self.lock().resources.channel.clone() else {
            debug!("No control channel, dropping event");
            return false;
        };
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize control event");
                return false;
            }
        };
        match channel.send(&json) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to send control event");
                false
            }
        }
    }

    /// Send a system message and ask the model to respond.
    pub fn send_system_message(&self, text: impl Into<String>) -> bool {
        self.send_event(&ClientEvent::item(ConversationItem::system_text(text)))
            && self.send_event(&ClientEvent::ResponseCreate)
    }

    /// Add an image to the conversation without asking for a response.
    pub fn send_image_context(&self, image_url: impl Into<String>) -> bool {
        self.send_event(&ClientEvent::item(ConversationItem::user_image(image_url)))
    }

    /// Send text with an image and ask the model to respond.
    pub fn send_context(&self, text: impl Into<String>, image_url: impl Into<String>) -> bool {
        self.send_event(&ClientEvent::item(ConversationItem::user_text_and_image(
            text, image_url,
        ))) && self.send_event(&ClientEvent::ResponseCreate)
    }

    /// Send typed user text and ask the model to respond.
    pub fn send_user_text(&self, text: impl Into<String>) -> bool {
        self.send_event(&ClientEvent::item(ConversationItem::user_text(text)))
            && self.send_event(&ClientEvent::ResponseCreate)
    }

    // =========================================================================
    // Timer
    // =========================================================================

    /// Extend the countdown once per call. Returns false if already extended
    /// or no countdown is running.
    pub fn extend_timer(&self) -> bool {
        let extension = self.shared.config.timer.extension();
        let extended = {
            let mut inner = self.lock();
            match inner.timer.as_mut() {
                Some(timer) => timer.extend(extension),
                None => false,
            }
        };
        if extended {
            info!(extension_ms = extension.as_millis() as u64, "Call timer extended");
        }
        extended
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn state(&self) -> CallState {
        self.lock().state
    }

    pub fn failure(&self) -> Option<CallFailure> {
        self.lock().failure.clone()
    }

    /// Whole seconds left on the countdown, `None` outside a timed call.
    pub fn time_remaining(&self) -> Option<u64> {
        let inner = self.lock();
        remaining_secs(&inner)
    }

    pub fn is_remote_speaking(&self) -> bool {
        let inner = self.lock();
        inner.state.is_live() && inner.echo.is_remote_speaking()
    }

    pub fn call_id(&self) -> Option<Uuid> {
        self.lock().call_id
    }

    pub fn active_mode(&self) -> String {
        self.lock().modes.active().to_string()
    }

    /// Instructions of the active mode, resolved against a fresh context.
    pub fn current_instructions(&self) -> String {
        let active = self.lock().modes.active().to_string();
        self.resolve_mode(&active).instructions
    }

    pub fn transition_log(&self) -> Vec<TransitionEntry> {
        self.lock().modes.log()
    }

    pub fn snapshot(&self) -> CallSnapshot {
        let mut snapshot = {
            let inner = self.lock();
            CallSnapshot {
                state: inner.state,
                failure: inner.failure.clone(),
                time_remaining: remaining_secs(&inner),
                remote_speaking: inner.state.is_live() && inner.echo.is_remote_speaking(),
                active_mode: inner.modes.active().to_string(),
                previous_mode: inner.modes.previous().map(String::from),
                instructions: String::new(),
                transitions: inner.modes.log(),
            }
        };
        snapshot.instructions = self.resolve_mode(&snapshot.active_mode).instructions;
        snapshot
    }
}

fn remaining_secs<C>(inner: &Inner<C>) -> Option<u64> {
    if !matches!(inner.state, CallState::Active | CallState::Ending) {
        return None;
    }
    inner
        .timer
        .as_ref()
        .map(|timer| timer.remaining_secs(Instant::now()))
}
