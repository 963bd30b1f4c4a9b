//! Lowest latency load balancing strategy.

use std::time::Duration;
use url::Url;

use crate::error::BalancerError;
use crate::load_balancer::{
    lowest_index, validate_targets, LoadBalancer, RequestInfo, SharedTarget, Upstream,
};

/// Selects the backend with the lowest last observed response time.
#[derive(Debug)]
pub struct LowestLatency {
    backends: Vec<Upstream>,
}

impl LowestLatency {
    pub fn new(targets: Vec<SharedTarget>) -> Result<Self, BalancerError> {
        Ok(Self {
            backends: validate_targets(targets)?,
        })
    }
}

impl LoadBalancer for LowestLatency {
    fn next_server(&self, _request: &RequestInfo<'_>) -> Url {
        if self.backends.len() == 1 {
            return self.backends[0].url.clone();
        }

        let latencies: Vec<Duration> = self.backends.iter().map(|b| b.target.latency()).collect();
        let selected = lowest_index(&latencies);

        tracing::debug!(
            latencies = ?latencies,
            selected,
            latency = ?latencies[selected],
            "Lowest latency scan"
        );

        self.backends[selected].url.clone()
    }
}
