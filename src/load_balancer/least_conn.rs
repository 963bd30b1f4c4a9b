//! Least Connections load balancing strategy.

use url::Url;

use crate::error::BalancerError;
use crate::load_balancer::{
    lowest_index, validate_targets, LoadBalancer, RequestInfo, SharedTarget, Upstream,
};

/// Least connections selector.
/// Selects the backend with the minimum number of active connections.
#[derive(Debug)]
pub struct LeastConnections {
    backends: Vec<Upstream>,
}

impl LeastConnections {
    pub fn new(targets: Vec<SharedTarget>) -> Result<Self, BalancerError> {
        Ok(Self {
            backends: validate_targets(targets)?,
        })
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, _request: &RequestInfo<'_>) -> Url {
        if self.backends.len() == 1 {
            return self.backends[0].url.clone();
        }

        let connections: Vec<usize> = self
            .backends
            .iter()
            .map(|b| b.target.active_connections())
            .collect();

        // In case of tie, the first one is selected (stability)
        let selected = lowest_index(&connections);

        tracing::debug!(
            connections = ?connections,
            selected,
            connection = connections[selected],
            "Least connections scan"
        );

        self.backends[selected].url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::*;

    #[test]
    fn test_least_conn() {
        let list = backends(&[1, 1]);
        let lb = LeastConnections::new(shared(&list)).unwrap();
        let headers = no_request();
        let req = RequestInfo::new(&headers, "");

        // artificially increase connections on b1
        list[0].inc_connections();

        // Should pick b2 (0 connections)
        assert_eq!(port_of(&lb.next_server(&req)), 8081);

        // increase b2
        list[1].inc_connections();
        list[1].inc_connections(); // now b2 has 2, b1 has 1

        // Should pick b1 (1 connection)
        assert_eq!(port_of(&lb.next_server(&req)), 8080);
    }

    #[test]
    fn test_minimum_and_tie() {
        let list = backends(&[1, 1, 1]);
        let lb = LeastConnections::new(shared(&list)).unwrap();
        let headers = no_request();
        let req = RequestInfo::new(&headers, "");

        for (b, n) in list.iter().zip([5, 2, 8]) {
            b.set_active_connections(n);
        }
        assert_eq!(port_of(&lb.next_server(&req)), 8081);

        for (b, n) in list.iter().zip([2, 2, 8]) {
            b.set_active_connections(n);
        }
        assert_eq!(port_of(&lb.next_server(&req)), 8080);
    }
}
