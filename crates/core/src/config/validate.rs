use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Paths section exists (enforced by serde)
/// - Server port is not 0
/// - Retry bounds and admission thresholds are non-degenerate
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_attempts cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.workers == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.workers cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.period_days <= 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.period_days must be positive".to_string(),
        ));
    }

    if config.orchestrator.page_window == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.page_window cannot be 0".to_string(),
        ));
    }

    if !(0.0..=100.0).contains(&config.admission.max_ram_percent) {
        return Err(ConfigError::ValidationError(
            "admission.max_ram_percent must be between 0 and 100".to_string(),
        ));
    }

    if !(0.0..=100.0).contains(&config.admission.max_cpu_percent) {
        return Err(ConfigError::ValidationError(
            "admission.max_cpu_percent must be between 0 and 100".to_string(),
        ));
    }

    Ok(())
}
