//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, retry bounds)
//! - Check that URLs and header names are well-formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("base_url `{value}` is invalid: {reason}")]
    InvalidBaseUrl { value: String, reason: String },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffBounds { base: u64, max: u64 },

    #[error("{field} `{value}` is not a valid header name")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("observability.log_level `{0}` is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(base_url) = &config.base_url {
        match Url::parse(base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::InvalidBaseUrl {
                value: base_url.clone(),
                reason: format!("scheme `{}` is not supported", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidBaseUrl {
                value: base_url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "timeouts.connect_secs",
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "timeouts.request_secs",
        });
    }

    if config.retries.enabled {
        if config.retries.max_attempts == 0 {
            errors.push(ValidationError::NotPositive {
                field: "retries.max_attempts",
            });
        }
        if config.retries.base_delay_ms > config.retries.max_delay_ms {
            errors.push(ValidationError::BackoffBounds {
                base: config.retries.base_delay_ms,
                max: config.retries.max_delay_ms,
            });
        }
    }

    let mut check_header = |field: &'static str, value: &str| {
        if HeaderName::from_bytes(value.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName {
                field,
                value: value.to_string(),
            });
        }
    };
    for name in config.default_headers.keys() {
        check_header("default_headers", name);
    }
    check_header("xsrf.header_name", &config.xsrf.header_name);
    check_header("request_id.header_name", &config.request_id.header_name);

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
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
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ClientConfig {
            base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        config.timeouts.request_secs = 0;
        config.default_headers.insert("bad header".into(), "x".into());
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::NotPositive {
            field: "timeouts.request_secs"
        }));
        assert!(errors.contains(&ValidationError::UnknownLogLevel("loud".into())));
    }

    #[test]
    fn test_retry_bounds_only_checked_when_enabled() {
        let mut config = ClientConfig::default();
        config.retries.base_delay_ms = 5000;
        config.retries.max_delay_ms = 100;
        assert!(validate_config(&config).is_ok());

        config.retries.enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::BackoffBounds {
                base: 5000,
                max: 100
            }]
        );
    }

    #[test]
    fn test_base_url_scheme() {
        let mut config = ClientConfig {
            base_url: Some("https://api.example.com/".into()),
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());

        config.base_url = Some("ftp://files.local/".into());
        assert!(matches!(
            validate_config(&config).unwrap_err()[0],
            ValidationError::InvalidBaseUrl { .. }
        ));
    }
}
