//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Algorithm identifier + targets
//!         → build() (closed dispatch table)
//!         → validate_targets() (fail fast: empty set, invalid URL)
//!         → Box<dyn LoadBalancer>
//!
//! Per request:
//!     RequestInfo → next_server()
//!         - round_robin.rs (atomic rotation counter)
//!         - weighted_round_robin.rs (mutex-guarded weight budget)
//!         - source_ip_hash.rs (FNV-1a over client IP)
//!         - least_conn.rs / lowest_latency.rs / resource_based.rs
//!           (scan live metrics, lowest value wins)
//!     → target Url
//! ```
//!
//! # Design Decisions
//! - Targets are fixed at construction; strategies never mutate them
//! - Validation happens once, selection never fails
//! - Metric reads are lock-free and may be stale

pub mod backend;
pub mod least_conn;
pub mod lowest_latency;
pub mod resource_based;
pub mod round_robin;
pub mod source_ip_hash;
pub mod weighted_round_robin;

use std::fmt;
use std::str::FromStr;

use axum::http::HeaderMap;
use url::Url;

use crate::error::BalancerError;

pub use backend::{Backend, SharedTarget, Target};
pub use least_conn::LeastConnections;
pub use lowest_latency::LowestLatency;
pub use resource_based::ResourceBased;
pub use round_robin::RoundRobin;
pub use source_ip_hash::SourceIpHash;
pub use weighted_round_robin::WeightedRoundRobin;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Pick the target for an incoming request.
    fn next_server(&self, request: &RequestInfo<'_>) -> Url;
}

/// Request attributes visible to the selection strategies.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    headers: &'a HeaderMap,
    remote_addr: &'a str,
}

impl<'a> RequestInfo<'a> {
    pub fn new(headers: &'a HeaderMap, remote_addr: &'a str) -> Self {
        Self {
            headers,
            remote_addr,
        }
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// Peer address of the connection, usually `ip:port`.
    pub fn remote_addr(&self) -> &'a str {
        self.remote_addr
    }
}

/// A validated target: its forwarding URL is known to be present.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub url: Url,
    pub target: SharedTarget,
}

/// Supported selection algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    RoundRobin,
    WeightedRoundRobin,
    SourceIpHash,
    LeastConnection,
    LowestLatency,
    ResourceBase,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::RoundRobin,
        Algorithm::WeightedRoundRobin,
        Algorithm::SourceIpHash,
        Algorithm::LeastConnection,
        Algorithm::LowestLatency,
        Algorithm::ResourceBase,
    ];

    /// Identifier accepted in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::WeightedRoundRobin => "weighted_round_robin",
            Algorithm::SourceIpHash => "source_ip_hash",
            Algorithm::LeastConnection => "least_connection",
            Algorithm::LowestLatency => "lowest_latency",
            Algorithm::ResourceBase => "resource_base",
        }
    }

    /// Human readable name, for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "Round Robin",
            Algorithm::WeightedRoundRobin => "Weighted Round Robin",
            Algorithm::SourceIpHash => "Source IP Hash",
            Algorithm::LeastConnection => "Least Connection",
            Algorithm::LowestLatency => "Lowest Response Time",
            Algorithm::ResourceBase => "Resource Base",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" | "rr" => Ok(Algorithm::RoundRobin),
            "weighted_round_robin" | "wr" => Ok(Algorithm::WeightedRoundRobin),
            "source_ip_hash" | "ih" => Ok(Algorithm::SourceIpHash),
            "least_connection" | "lc" => Ok(Algorithm::LeastConnection),
            "lowest_latency" | "ll" => Ok(Algorithm::LowestLatency),
            "resource_base" | "rb" => Ok(Algorithm::ResourceBase),
            other => Err(BalancerError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Build the strategy for `algorithm` over `targets`.
pub fn build(
    algorithm: Algorithm,
    targets: Vec<SharedTarget>,
) -> Result<Box<dyn LoadBalancer>, BalancerError> {
    let lb: Box<dyn LoadBalancer> = match algorithm {
        Algorithm::RoundRobin => Box::new(RoundRobin::new(targets)?),
        Algorithm::WeightedRoundRobin => Box::new(WeightedRoundRobin::new(targets)?),
        Algorithm::SourceIpHash => Box::new(SourceIpHash::new(targets)?),
        Algorithm::LeastConnection => Box::new(LeastConnections::new(targets)?),
        Algorithm::LowestLatency => Box::new(LowestLatency::new(targets)?),
        Algorithm::ResourceBase => Box::new(ResourceBased::new(targets)?),
    };
    Ok(lb)
}

/// Reject empty target sets and targets without a forwarding URL.
pub(crate) fn validate_targets(targets: Vec<SharedTarget>) -> Result<Vec<Upstream>, BalancerError> {
    if targets.is_empty() {
        return Err(BalancerError::NoTargetServers);
    }

    targets
        .into_iter()
        .map(|target| match target.url() {
            Some(url) => Ok(Upstream { url, target }),
            None => Err(BalancerError::InvalidBackendUrl),
        })
        .collect()
}

/// Index of the smallest metric; the first one wins a tie.
///
/// Uses a strict `<` so incomparable values (NaN) never displace the
/// current candidate.
pub(crate) fn lowest_index<T: PartialOrd>(values: &[T]) -> usize {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate().skip(1) {
        if *value < values[best] {
            best = idx;
        }
    }
    best
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_parse_algorithm_identifiers() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<Algorithm>(), Ok(algorithm));
        }
        assert_eq!("ll".parse::<Algorithm>(), Ok(Algorithm::LowestLatency));
        assert_eq!(
            "random".parse::<Algorithm>(),
            Err(BalancerError::UnsupportedAlgorithm("random".into()))
        );
    }

    #[test]
    fn test_empty_set_rejected_by_every_algorithm() {
        for algorithm in Algorithm::ALL {
            let err = build(algorithm, Vec::new()).unwrap_err();
            assert_eq!(err, BalancerError::NoTargetServers);
            assert_eq!(err.to_string(), "no target servers found");
        }
    }

    #[test]
    fn test_invalid_url_rejected_by_every_algorithm() {
        for algorithm in Algorithm::ALL {
            let targets: Vec<SharedTarget> = vec![
                Arc::new(Backend::new("127.0.0.1", 8080, 1)),
                Arc::new(Backend::new("", 8081, 1)),
            ];
            let err = build(algorithm, targets).unwrap_err();
            assert_eq!(err, BalancerError::InvalidBackendUrl);
            assert_eq!(err.to_string(), "invalid backend url");
        }
    }

    #[test]
    fn test_single_target_always_selected() {
        let headers = no_request();
        let request = RequestInfo::new(&headers, "10.1.2.3:5555");
        for algorithm in Algorithm::ALL {
            let list = backends(&[4]);
            let lb = build(algorithm, shared(&list)).unwrap();
            for _ in 0..10 {
                assert_eq!(port_of(&lb.next_server(&request)), 8080, "{}", algorithm);
            }
        }
    }

    #[test]
    fn test_lowest_index_prefers_first_on_tie() {
        assert_eq!(lowest_index(&[5, 2, 8]), 1);
        assert_eq!(lowest_index(&[2, 2, 8]), 0);
        assert_eq!(lowest_index(&[4.0, f64::NAN, 1.0]), 2);
    }
}
