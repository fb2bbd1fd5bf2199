//! Echo gate.
//!
//! A soft half-duplex bias: while the remote side is audibly speaking the
//! local microphone gain is ramped down, and it is ramped back up only after
//! the remote side has stayed quiet for a debounce window. This is not
//! acoustic echo cancellation.
//!
//! [`EchoGate`] is pure state driven by energy samples; the call controller
//! samples the remote [`EnergyProbe`](crate::core::transport::EnergyProbe) on
//! a fixed interval and applies the returned [`GainCommand`] to the outbound
//! [`GainStage`].

use std::time::Duration;

use tokio::time::Instant;

use crate::config::EchoConfig;
use crate::core::transport::GainStage;

/// Full microphone gain.
pub const FULL_GAIN: f32 = 1.0;

/// Average of a frequency-domain frame (byte magnitudes, 0-255).
pub fn average_energy(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    sum as f32 / bins.len() as f32
}

/// Gain change requested by the gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainCommand {
    pub gain: f32,
    pub time_constant: Duration,
}

impl GainCommand {
    pub fn apply(&self, stage: &dyn GainStage) {
        stage.ramp_to(self.gain, self.time_constant);
    }
}

/// Echo gate state for one call.
#[derive(Debug, Clone)]
pub struct EchoGate {
    config: EchoConfig,
    mic_attenuated: bool,
    remote_speaking: bool,
    remote_silence_since: Option<Instant>,
}

impl EchoGate {
    pub fn new(config: EchoConfig) -> Self {
        Self {
            config,
            mic_attenuated: false,
            remote_speaking: false,
            remote_silence_since: None,
        }
    }

    /// Feed one energy sample taken at `now`.
    ///
    /// Returns a gain command only when the microphone has to move.
    pub fn observe(&mut self, energy: f32, now: Instant) -> Option<GainCommand> {
        self.remote_speaking = energy > self.config.energy_threshold;

        if self.remote_speaking {
            self.remote_silence_since = None;
            if !self.mic_attenuated {
                self.mic_attenuated = true;
                return Some(GainCommand {
                    gain: self.config.attenuated_gain,
                    time_constant: self.config.attack_time_constant(),
                });
            }
            return None;
        }

        if !self.mic_attenuated {
            return None;
        }

        let since = *self.remote_silence_since.get_or_insert(now);
        if now.duration_since(since) >= self.config.restore_delay() {
            self.mic_attenuated = false;
            self.remote_silence_since = None;
            return Some(GainCommand {
                gain: FULL_GAIN,
                time_constant: self.config.release_time_constant(),
            });
        }
        None
    }

    #[inline]
    pub fn is_remote_speaking(&self) -> bool {
        self.remote_speaking
    }

    #[inline]
    pub fn is_mic_attenuated(&self) -> bool {
        self.mic_attenuated
    }

    pub fn reset(&mut self) {
        self.mic_attenuated = false;
        self.remote_speaking = false;
        self.remote_silence_since = None;
    }
}
