use crate::config::types::{Config, OutputFormat};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seed_url(&config.url)?;
    validate_budgets(config)?;
    validate_timeouts(config)?;
    validate_pool(config)?;
    validate_output(config)?;
    Ok(())
}

/// Validates the seed URL
fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    Ok(())
}

/// Validates the success/error budgets and the depth step
fn validate_budgets(config: &Config) -> Result<(), ConfigError> {
    // max_depth >= 0 is always true for u64, so no check needed

    if config.max_results < 1 {
        return Err(ConfigError::Validation(
            "max_results must be >= 1".to_string(),
        ));
    }

    if config.max_errors < 1 {
        return Err(ConfigError::Validation(
            "max_errors must be >= 1".to_string(),
        ));
    }

    if config.delta < 1 {
        return Err(ConfigError::Validation("delta must be >= 1".to_string()));
    }

    Ok(())
}

/// Longest accepted run or request timeout: one year
const MAX_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

/// Validates the run and request timeouts
fn validate_timeouts(config: &Config) -> Result<(), ConfigError> {
    if config.timeout < 1 || config.timeout > MAX_TIMEOUT_SECS {
        return Err(ConfigError::Validation(format!(
            "timeout must be between 1 and {} seconds, got {}",
            MAX_TIMEOUT_SECS, config.timeout
        )));
    }

    if let Some(request_timeout) = config.request_timeout {
        if request_timeout < 1 || request_timeout > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "request_timeout must be between 1 and {} seconds, got {}",
                MAX_TIMEOUT_SECS, request_timeout
            )));
        }
    }

    Ok(())
}

/// Validates the worker pool sizing
fn validate_pool(config: &Config) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(
            "queue_capacity must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the output destination against the output format
fn validate_output(config: &Config) -> Result<(), ConfigError> {
    if config.format == OutputFormat::Sqlite && config.output_path().is_none() {
        return Err(ConfigError::Validation(
            "sqlite output requires an output path".to_string(),
        ));
    }

    Ok(())
}
