// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths, sane intervals, and well-formed
//! blacklist entries.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::PerchConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects all validation errors instead of failing fast.
pub fn validate_config(config: &PerchConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    let base_url = config.worker.base_url.trim();
    if base_url.is_empty() {
        errors.push(ConfigError::Validation {
            message: "worker.base_url must not be empty".to_string(),
        });
    } else if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        errors.push(ConfigError::Validation {
            message: format!("worker.base_url `{base_url}` must start with http:// or https://"),
        });
    }

    for (name, value) in [
        ("scheduler.due_check_secs", config.scheduler.due_check_secs),
        (
            "scheduler.metrics_refresh_secs",
            config.scheduler.metrics_refresh_secs,
        ),
        (
            "scheduler.history_sync_secs",
            config.scheduler.history_sync_secs,
        ),
        ("publish.timeout_secs", config.publish.timeout_secs),
        ("publish.stuck_after_secs", config.publish.stuck_after_secs),
        ("sync.timeout_secs", config.sync.timeout_secs),
        ("sync.scrape_timeout_secs", config.sync.scrape_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{name} must be greater than zero"),
            });
        }
    }

    for (i, id) in config.sync.blacklist.iter().enumerate() {
        if id.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("sync.blacklist[{i}] must not be empty"),
            });
        }
    }

    let mut seen_accounts = HashSet::new();
    for (i, account) in config.accounts.iter().enumerate() {
        if account.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("accounts[{i}] must not be empty"),
            });
        } else if !seen_accounts.insert(account.trim()) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate account handle `{}`", account.trim()),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = PerchConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = PerchConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn non_http_worker_url_fails_validation() {
        let mut config = PerchConfig::default();
        config.worker.base_url = "ftp://worker".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("base_url"))));
    }

    #[test]
    fn zero_interval_fails_validation() {
        let mut config = PerchConfig::default();
        config.scheduler.due_check_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("due_check_secs"))));
    }

    #[test]
    fn empty_blacklist_entry_fails_validation() {
        let mut config = PerchConfig::default();
        config.sync.blacklist = vec!["2007387117551530408".to_string(), "  ".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("blacklist[1]"))));
    }

    #[test]
    fn duplicate_accounts_fail_validation() {
        let mut config = PerchConfig::default();
        config.accounts = vec!["sparrow".to_string(), "sparrow".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("duplicate account"))));
    }

    #[test]
    fn valid_custom_config_passes() {
        let mut config = PerchConfig::default();
        config.storage.database_path = "/tmp/perch-test.db".to_string();
        config.worker.base_url = "http://localhost:9000".to_string();
        config.accounts = vec!["sparrow".to_string(), "finch".to_string()];
        config.sync.blacklist = vec!["2007387117551530408".to_string()];
        assert!(validate_config(&config).is_ok());
    }
}
