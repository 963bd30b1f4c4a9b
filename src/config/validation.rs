//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports and weights valid)
//! - Resolve the algorithm identifier
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::BalancerConfig;
use crate::load_balancer::Algorithm;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("unsupported algorithm '{0}'")]
    Algorithm(String),

    #[error("backend #{index}: host is empty")]
    EmptyHost { index: usize },

    #[error("backend #{index}: port must be non-zero")]
    ZeroPort { index: usize },

    #[error("backend #{index}: weight must be positive")]
    ZeroWeight { index: usize },

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("simulator.backends must be greater than zero when no backends are configured")]
    EmptyFleet,

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_bind_address(&config.listener.bind_address) {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.algorithm_name().parse::<Algorithm>().is_err() {
        errors.push(ValidationError::Algorithm(config.algorithm_name().to_string()));
    }

    for (index, backend) in config.backends.iter().enumerate() {
        if backend.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost { index });
        }
        if backend.port == 0 {
            errors.push(ValidationError::ZeroPort { index });
        }
        if backend.weight == 0 {
            errors.push(ValidationError::ZeroWeight { index });
        }
    }

    if config.backends.is_empty() && config.simulator.backends == 0 {
        errors.push(ValidationError::EmptyFleet);
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("request_secs", config.timeouts.request_secs),
        ("idle_secs", config.timeouts.idle_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `ip:port` or `host:port`. Host names are resolved when binding, not here.
fn is_bind_address(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !host.contains(|c: char| c.is_whitespace() || c == ':' || c == '/')
                && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}
