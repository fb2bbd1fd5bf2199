use super::{CallConfig, ConfigError, EchoConfig, HangUpConfig, TimerConfig};
use crate::utils::url_validation::validate_endpoint_url;

/// Validate the session and negotiation endpoints.
pub(super) fn validate_endpoints(config: &CallConfig) -> Result<(), ConfigError> {
    if config.session_endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "session endpoint must be set (WAAV_CALL_SESSION_ENDPOINT or session.endpoint)"
                .to_string(),
        ));
    }

    validate_endpoint_url(&config.session_endpoint, config.allow_insecure_endpoints)
        .map_err(|e| ConfigError::Invalid(format!("session endpoint: {e}")))?;
    validate_endpoint_url(&config.negotiation_url, config.allow_insecure_endpoints)
        .map_err(|e| ConfigError::Invalid(format!("negotiation url: {e}")))?;

    if config.model.trim().is_empty() {
        return Err(ConfigError::Invalid("model must not be empty".to_string()));
    }
    Ok(())
}

pub(super) fn validate_timer(timer: &TimerConfig) -> Result<(), ConfigError> {
    if timer.base_duration_ms == 0 {
        return Err(ConfigError::Invalid(
            "timer.base_duration_ms must be greater than zero".to_string(),
        ));
    }
    if timer.warning_threshold_ms >= timer.base_duration_ms {
        return Err(ConfigError::Invalid(format!(
            "timer.warning_threshold_ms ({}) must be below timer.base_duration_ms ({})",
            timer.warning_threshold_ms, timer.base_duration_ms
        )));
    }
    if timer.tick_interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "timer.tick_interval_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub(super) fn validate_echo(echo: &EchoConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&echo.attenuated_gain) {
        return Err(ConfigError::Invalid(format!(
            "echo.attenuated_gain must be within 0.0..=1.0, got {}",
            echo.attenuated_gain
        )));
    }
    if echo.energy_threshold < 0.0 {
        return Err(ConfigError::Invalid(
            "echo.energy_threshold must not be negative".to_string(),
        ));
    }
    if echo.sample_interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "echo.sample_interval_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub(super) fn validate_hang_up(hang_up: &HangUpConfig) -> Result<(), ConfigError> {
    if hang_up.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid(
            "hang_up.poll_interval_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
