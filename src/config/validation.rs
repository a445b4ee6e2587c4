//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check that the origin can be turned into an upstream endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::upstream::Endpoint;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `listener.port`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check every field and collect all problems found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be between 1 and 65535"));
    }
    if listener.socket_address().parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not an IP address", listener.bind_address),
        ));
    }
    if listener.accept_wait_secs == 0 {
        errors.push(ValidationError::new("listener.accept_wait_secs", "must be greater than 0"));
    }
    if listener.read_buffer_bytes == 0 {
        errors.push(ValidationError::new("listener.read_buffer_bytes", "must be greater than 0"));
    }
    if listener.client_read_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.client_read_timeout_secs",
            "must be greater than 0",
        ));
    }

    let upstream = &config.upstream;
    if let Err(e) = Endpoint::parse(&upstream.origin) {
        errors.push(ValidationError::new("upstream.origin", e.to_string()));
    }
    if upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be greater than 0"));
    }
    if upstream.max_retries == 0 {
        errors.push(ValidationError::new("upstream.max_retries", "must allow at least one attempt"));
    }
    if upstream.retry_base_delay_ms > upstream.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "upstream.retry_base_delay_ms",
            "must not exceed upstream.retry_max_delay_ms",
        ));
    }

    if config.cache.check_interval_secs == 0 {
        errors.push(ValidationError::new("cache.check_interval_secs", "must be greater than 0"));
    }

    if config.control.enabled && config.control.socket_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("control.socket_path", "must not be empty"));
    }

    let observability = &config.observability;
    if !matches!(
        observability.log_level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
