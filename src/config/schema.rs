//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the load
//! balancer. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Selection algorithm identifier (e.g. "round_robin").
    pub algorithm: String,

    /// Static backend targets. When empty, a simulated fleet is started.
    pub backends: Vec<BackendConfig>,

    /// Simulated backend fleet settings.
    pub simulator: SimulatorConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend host name or IP.
    pub host: String,

    /// Backend port; 443 is forwarded over https.
    pub port: u16,

    /// Weight for weighted round robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Simulated backend fleet configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Number of simulated backends (at least 3 are started).
    pub backends: usize,

    /// Give each backend a random weight in [1, 5] instead of 2.
    pub random_weight: bool,

    /// Host the simulated backends bind to.
    pub host: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            backends: 5,
            random_weight: false,
            host: "localhost".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 3,
            request_secs: 10,
            idle_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

impl BalancerConfig {
    /// Algorithm identifier, falling back to round robin when unset.
    pub fn algorithm_name(&self) -> &str {
        if self.algorithm.is_empty() {
            "round_robin"
        } else {
            &self.algorithm
        }
    }
}
