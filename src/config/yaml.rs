use serde::Deserialize;
use std::path::Path;

use super::{
    CallConfig, ConfigError, EchoConfig, HangUpConfig, RingConfig, TimerConfig,
    TurnDetectionConfig,
};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override whatever the environment provided.
///
/// # Example YAML structure
/// ```yaml
/// session:
///   endpoint: "https://app.example.com/api/realtime/session"
///   api_key: "server-side-key"
///   http_timeout_secs: 15
///
/// realtime:
///   negotiation_url: "https://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview"
///   voice: "alloy"
///   transcription_model: "whisper-1"
///   turn_detection:
///     type: server_vad
///     threshold: 0.5
///
/// timer:
///   base_duration_ms: 300000
///   extension_ms: 120000
///   warning_threshold_ms: 15000
///
/// echo:
///   energy_threshold: 15.0
///   attenuated_gain: 0.15
///   restore_delay_ms: 250
///
/// ring:
///   min_ring_ms: 1500
///
/// hang_up:
///   poll_interval_ms: 150
///   max_wait_ms: 8000
///   final_delay_ms: 1000
///
/// suppressed_error_codes:
///   - "input_audio_buffer_commit_empty"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub session: Option<SessionYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub timer: Option<TimerConfig>,
    pub echo: Option<EchoConfig>,
    pub ring: Option<RingConfig>,
    pub hang_up: Option<HangUpConfig>,
    pub suppressed_error_codes: Option<Vec<String>>,
    pub allow_insecure_endpoints: Option<bool>,
}

/// Session endpoint configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub http_timeout_secs: Option<u64>,
}

/// Realtime endpoint configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub negotiation_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub transcription_model: Option<String>,
    pub turn_detection: Option<TurnDetectionConfig>,
}

impl YamlConfig {
    /// Load YAML configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse YAML configuration from a string.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Overlay the values present in this file onto `config`.
    ///
    /// Timing sections replace the whole section; missing keys inside a
    /// section fall back to that section's defaults.
    pub fn apply_to(self, config: &mut CallConfig) {
        if let Some(session) = self.session {
            if let Some(v) = session.endpoint {
                config.session_endpoint = v;
            }
            if let Some(v) = session.api_key {
                config.session_api_key = Some(v);
            }
            if let Some(v) = session.http_timeout_secs {
                config.http_timeout_secs = v;
            }
        }

        if let Some(realtime) = self.realtime {
            if let Some(v) = realtime.negotiation_url {
                config.negotiation_url = v;
            }
            if let Some(v) = realtime.model {
                config.model = v;
            }
            if let Some(v) = realtime.voice {
                config.voice = v;
            }
            if let Some(v) = realtime.transcription_model {
                config.transcription_model = (!v.eq_ignore_ascii_case("none")).then_some(v);
            }
            if let Some(v) = realtime.turn_detection {
                config.turn_detection = v;
            }
        }

        if let Some(timer) = self.timer {
            config.timer = timer;
        }
        if let Some(echo) = self.echo {
            config.echo = echo;
        }
        if let Some(ring) = self.ring {
            config.ring = ring;
        }
        if let Some(hang_up) = self.hang_up {
            config.hang_up = hang_up;
        }
        if let Some(codes) = self.suppressed_error_codes {
            config.suppressed_error_codes = codes;
        }
        if let Some(v) = self.allow_insecure_endpoints {
            config.allow_insecure_endpoints = v;
        }
    }
}
