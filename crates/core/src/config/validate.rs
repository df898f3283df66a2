use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one job may run at a time
/// - Cancelled processes get a non-zero grace period
/// - A Python interpreter and packager module are configured
///
/// Every violation is reported, joined into one error.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut issues = Vec::new();

    if config.server.port == 0 {
        issues.push("server.port cannot be 0");
    }

    if config.queue.max_concurrent_jobs == 0 {
        issues.push("queue.max_concurrent_jobs must be at least 1");
    }

    if config.queue.cancel_grace_period_ms == 0 {
        issues.push("queue.cancel_grace_period_ms must be greater than 0");
    }

    if config.packager.python_path.as_os_str().is_empty() {
        issues.push("packager.python_path cannot be empty");
    }

    if config.packager.module.trim().is_empty() {
        issues.push("packager.module cannot be empty");
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(issues.join("; ")))
    }
}
