//! Configuration for voice calls
//!
//! Everything that is plain data (endpoints, model, voice, timings, echo
//! tuning, suppressed protocol errors) lives in [`CallConfig`]. Consumer code
//! such as the mode registry and tool handler is supplied separately through
//! [`crate::core::call::VoiceCallOptions`].
//!
//! Sources and priority: YAML > ENV vars > .env values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use waav_call::config::CallConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = CallConfig::from_env()?;
//!
//! // Load from YAML file with environment variables underneath
//! let config = CallConfig::from_file(&PathBuf::from("call.yaml"))?;
//! println!("Minting sessions at {}", config.session_endpoint);
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default realtime negotiation endpoint (HTTPS, SDP offer/answer).
pub const DEFAULT_NEGOTIATION_URL: &str = "https://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Default voice.
pub const DEFAULT_VOICE: &str = "alloy";

/// Default input transcription model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Protocol error codes that are benign races and never end a call.
pub const DEFAULT_SUPPRESSED_ERROR_CODES: &[&str] = &[
    "response_cancel_not_active",
    "conversation_already_has_active_response",
];

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Turn detection configuration sent with the session request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// Semantic-aware turn detection
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        /// Eagerness level (low, medium, high, auto)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
        }
    }
}

/// Countdown timer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Length of a call before any extension (ms)
    pub base_duration_ms: u64,
    /// One-time extension granted by `extend_timer` (ms)
    pub extension_ms: u64,
    /// Remaining time at which the warning hook fires (ms)
    pub warning_threshold_ms: u64,
    /// How often remaining time is recomputed (ms)
    pub tick_interval_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            base_duration_ms: 300_000,
            extension_ms: 120_000,
            warning_threshold_ms: 15_000,
            tick_interval_ms: 1_000,
        }
    }
}

impl TimerConfig {
    pub fn base_duration(&self) -> Duration {
        Duration::from_millis(self.base_duration_ms)
    }

    pub fn extension(&self) -> Duration {
        Duration::from_millis(self.extension_ms)
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::from_millis(self.warning_threshold_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Echo gate tuning. These values are empirical; keep them configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Average remote energy above which the remote side counts as speaking
    pub energy_threshold: f32,
    /// Microphone gain while the remote side is speaking
    pub attenuated_gain: f32,
    /// Continued remote silence required before restoring the microphone (ms)
    pub restore_delay_ms: u64,
    /// Time constant for ramping the microphone down (ms)
    pub attack_time_constant_ms: u64,
    /// Time constant for ramping the microphone back up (ms)
    pub release_time_constant_ms: u64,
    /// Interval between remote energy samples (ms)
    pub sample_interval_ms: u64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 15.0,
            attenuated_gain: 0.15,
            restore_delay_ms: 250,
            attack_time_constant_ms: 30,
            release_time_constant_ms: 80,
            sample_interval_ms: 16,
        }
    }
}

impl EchoConfig {
    pub fn restore_delay(&self) -> Duration {
        Duration::from_millis(self.restore_delay_ms)
    }

    pub fn attack_time_constant(&self) -> Duration {
        Duration::from_millis(self.attack_time_constant_ms)
    }

    pub fn release_time_constant(&self) -> Duration {
        Duration::from_millis(self.release_time_constant_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Ringing phase settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Minimum time spent ringing even if signaling completes sooner (ms)
    pub min_ring_ms: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self { min_ring_ms: 1_500 }
    }
}

impl RingConfig {
    pub fn min_ring(&self) -> Duration {
        Duration::from_millis(self.min_ring_ms)
    }
}

/// Hang-up drain settings used when the remote side ends the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HangUpConfig {
    /// Poll interval while waiting for remote audio to quiet (ms)
    pub poll_interval_ms: u64,
    /// Hard cap on the drain wait (ms)
    pub max_wait_ms: u64,
    /// Delay between the drain finishing and cleanup (ms)
    pub final_delay_ms: u64,
}

impl Default for HangUpConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 150,
            max_wait_ms: 8_000,
            final_delay_ms: 1_000,
        }
    }
}

impl HangUpConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn final_delay(&self) -> Duration {
        Duration::from_millis(self.final_delay_ms)
    }
}

/// Voice call configuration
///
/// Contains the data half of a call setup:
/// - Session endpoint and credentials
/// - Negotiation endpoint, model and voice
/// - Timer, echo gate, ringing and hang-up timings
/// - Protocol error codes to suppress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Endpoint that mints ephemeral client secrets
    pub session_endpoint: String,
    /// Optional bearer credential for the session endpoint
    pub session_api_key: Option<String>,
    /// Base URL for the SDP offer/answer exchange
    pub negotiation_url: String,
    pub model: String,
    pub voice: String,
    /// Input audio transcription model, `None` disables transcription
    pub transcription_model: Option<String>,
    pub turn_detection: TurnDetectionConfig,
    /// Timeout for each outbound HTTP request (seconds)
    pub http_timeout_secs: u64,
    /// Accept plain HTTP endpoints (local development only)
    pub allow_insecure_endpoints: bool,
    pub timer: TimerConfig,
    pub echo: EchoConfig,
    pub ring: RingConfig,
    pub hang_up: HangUpConfig,
    /// Protocol error codes suppressed in addition to the defaults
    pub suppressed_error_codes: Vec<String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            session_endpoint: String::new(),
            session_api_key: None,
            negotiation_url: DEFAULT_NEGOTIATION_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            turn_detection: TurnDetectionConfig::default(),
            http_timeout_secs: 15,
            allow_insecure_endpoints: false,
            timer: TimerConfig::default(),
            echo: EchoConfig::default(),
            ring: RingConfig::default(),
            hang_up: HangUpConfig::default(),
            suppressed_error_codes: Vec::new(),
        }
    }
}

impl CallConfig {
    /// Load configuration from environment variables.
    ///
    /// Recognised variables (all optional):
    /// `WAAV_CALL_SESSION_ENDPOINT`, `WAAV_CALL_SESSION_API_KEY`,
    /// `WAAV_CALL_NEGOTIATION_URL`, `WAAV_CALL_MODEL`, `WAAV_CALL_VOICE`,
    /// `WAAV_CALL_TRANSCRIPTION_MODEL`, `WAAV_CALL_HTTP_TIMEOUT_SECS`,
    /// `WAAV_CALL_ALLOW_INSECURE_ENDPOINTS`, `WAAV_CALL_BASE_DURATION_MS`,
    /// `WAAV_CALL_EXTENSION_MS`, `WAAV_CALL_WARNING_THRESHOLD_MS`,
    /// `WAAV_CALL_SUPPRESSED_ERROR_CODES` (comma separated).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = env_string("WAAV_CALL_SESSION_ENDPOINT") {
            config.session_endpoint = v;
        }
        config.session_api_key = env_string("WAAV_CALL_SESSION_API_KEY");
        if let Some(v) = env_string("WAAV_CALL_NEGOTIATION_URL") {
            config.negotiation_url = v;
        }
        if let Some(v) = env_string("WAAV_CALL_MODEL") {
            config.model = v;
        }
        if let Some(v) = env_string("WAAV_CALL_VOICE") {
            config.voice = v;
        }
        if let Some(v) = env_string("WAAV_CALL_TRANSCRIPTION_MODEL") {
            // "none" turns input transcription off
            config.transcription_model = (!v.eq_ignore_ascii_case("none")).then_some(v);
        }
        if let Some(v) = env_parse::<u64>("WAAV_CALL_HTTP_TIMEOUT_SECS")? {
            config.http_timeout_secs = v;
        }
        if let Some(v) = env_parse::<bool>("WAAV_CALL_ALLOW_INSECURE_ENDPOINTS")? {
            config.allow_insecure_endpoints = v;
        }
        if let Some(v) = env_parse::<u64>("WAAV_CALL_BASE_DURATION_MS")? {
            config.timer.base_duration_ms = v;
        }
        if let Some(v) = env_parse::<u64>("WAAV_CALL_EXTENSION_MS")? {
            config.timer.extension_ms = v;
        }
        if let Some(v) = env_parse::<u64>("WAAV_CALL_WARNING_THRESHOLD_MS")? {
            config.timer.warning_threshold_ms = v;
        }
        if let Some(v) = env_string("WAAV_CALL_SUPPRESSED_ERROR_CODES") {
            config.suppressed_error_codes = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    /// Load configuration from a YAML file layered over the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = Self::from_env()?;
        yaml_config.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_endpoints(self)?;
        validation::validate_timer(&self.timer)?;
        validation::validate_echo(&self.echo)?;
        validation::validate_hang_up(&self.hang_up)?;
        Ok(())
    }

    /// Whether a protocol error code is suppressed (defaults plus configured extras).
    pub fn is_suppressed_error(&self, code: &str) -> bool {
        DEFAULT_SUPPRESSED_ERROR_CODES.contains(&code)
            || self.suppressed_error_codes.iter().any(|c| c == code)
    }

    /// Timeout applied to each outbound HTTP request.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}
