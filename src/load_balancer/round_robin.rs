//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use crate::error::BalancerError;
use crate::load_balancer::{validate_targets, LoadBalancer, RequestInfo, SharedTarget, Upstream};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
///
/// Concurrent callers only share the modulo distribution of the counter;
/// a single caller sees the targets in order.
#[derive(Debug)]
pub struct RoundRobin {
    backends: Vec<Upstream>,
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new(targets: Vec<SharedTarget>) -> Result<Self, BalancerError> {
        Ok(Self {
            backends: validate_targets(targets)?,
            counter: AtomicUsize::new(0),
        })
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, _request: &RequestInfo<'_>) -> Url {
        let count = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let index = count % self.backends.len();
        self.backends[index].url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::*;
    use std::sync::Arc;

    #[test]
    fn test_round_robin() {
        let list = backends(&[1, 1, 1]);
        let lb = RoundRobin::new(shared(&list)).unwrap();
        let headers = no_request();
        let req = RequestInfo::new(&headers, "");

        // Fresh counter: first pick is index 1.
        let picks: Vec<u16> = (0..6).map(|_| port_of(&lb.next_server(&req))).collect();
        assert_eq!(picks, vec![8081, 8082, 8080, 8081, 8082, 8080]);
    }

    #[test]
    fn test_counter_wraps() {
        let list = backends(&[1, 1, 1]);
        let lb = RoundRobin::new(shared(&list)).unwrap();
        lb.counter.store(usize::MAX, Ordering::Relaxed);
        let headers = no_request();
        let req = RequestInfo::new(&headers, "");

        // usize::MAX + 1 wraps to 0.
        assert_eq!(port_of(&lb.next_server(&req)), 8080);
        assert_eq!(port_of(&lb.next_server(&req)), 8081);
    }

    #[test]
    fn test_even_distribution_under_concurrency() {
        let list = backends(&[1, 1, 1, 1]);
        let lb = Arc::new(RoundRobin::new(shared(&list)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lb = lb.clone();
                std::thread::spawn(move || {
                    let headers = no_request();
                    let req = RequestInfo::new(&headers, "");
                    (0..100).map(|_| port_of(&lb.next_server(&req))).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = [0usize; 4];
        for handle in handles {
            for port in handle.join().unwrap() {
                counts[(port - 8080) as usize] += 1;
            }
        }
        assert_eq!(counts, [200, 200, 200, 200]);
    }
}
