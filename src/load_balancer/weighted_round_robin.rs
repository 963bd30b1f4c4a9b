//! Weighted round-robin load balancing strategy.
//!
//! Backends are served in bursts: a backend with weight 5 receives five
//! consecutive picks before the next backend gets its turn. This is not the
//! smooth (interleaved) variant.

use std::cmp::Reverse;
use std::sync::Mutex;
use url::Url;

use crate::error::BalancerError;
use crate::load_balancer::{validate_targets, LoadBalancer, RequestInfo, SharedTarget, Upstream};

#[derive(Debug)]
struct Cursor {
    index: usize,
    /// Picks left for the backend at `index`.
    remaining: u32,
}

/// Classical (bursty) Weighted Round Robin.
#[derive(Debug)]
pub struct WeightedRoundRobin {
    /// Sorted by descending weight, ties keep their original order.
    backends: Vec<Upstream>,
    cursor: Mutex<Cursor>,
}

impl WeightedRoundRobin {
    pub fn new(targets: Vec<SharedTarget>) -> Result<Self, BalancerError> {
        let mut backends = validate_targets(targets)?;
        backends.sort_by_key(|b| Reverse(b.target.weight()));

        let remaining = weight_of(&backends[0]);
        Ok(Self {
            backends,
            cursor: Mutex::new(Cursor {
                index: 0,
                remaining,
            }),
        })
    }
}

/// A zero weight still gets one turn per cycle.
fn weight_of(upstream: &Upstream) -> u32 {
    upstream.target.weight().max(1)
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_server(&self, _request: &RequestInfo<'_>) -> Url {
        // Poisoning cannot leave the cursor torn: it is only written here.
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());

        if cursor.remaining == 0 {
            cursor.index = (cursor.index + 1) % self.backends.len();
            cursor.remaining = weight_of(&self.backends[cursor.index]);
        }
        cursor.remaining -= 1;

        self.backends[cursor.index].url.clone()
    }
}
