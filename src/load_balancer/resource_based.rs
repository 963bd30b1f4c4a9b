//! Resource based (CPU load) load balancing strategy.

use url::Url;

use crate::error::BalancerError;
use crate::load_balancer::{
    lowest_index, validate_targets, LoadBalancer, RequestInfo, SharedTarget, Upstream,
};

/// Selects the backend reporting the lowest CPU load.
#[derive(Debug)]
pub struct ResourceBased {
    backends: Vec<Upstream>,
}

impl ResourceBased {
    pub fn new(targets: Vec<SharedTarget>) -> Result<Self, BalancerError> {
        Ok(Self {
            backends: validate_targets(targets)?,
        })
    }
}

impl LoadBalancer for ResourceBased {
    fn next_server(&self, _request: &RequestInfo<'_>) -> Url {
        if self.backends.len() == 1 {
            return self.backends[0].url.clone();
        }

        // A NaN load is unknown, it must never win.
        let loads: Vec<f64> = self
            .backends
            .iter()
            .map(|b| b.target.cpu_load())
            .map(|load| if load.is_nan() { f64::INFINITY } else { load })
            .collect();
        let selected = lowest_index(&loads);

        tracing::debug!(
            cpu_loads = ?loads,
            selected,
            cpu_load = loads[selected],
            "Resource based scan"
        );

        self.backends[selected].url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::*;

    #[test]
    fn test_lowest_cpu_selected() {
        let list = backends(&[1, 1, 1]);
        let lb = ResourceBased::new(shared(&list)).unwrap();
        let headers = no_request();
        let req = RequestInfo::new(&headers, "");

        for (b, load) in list.iter().zip([5.0, 2.0, 8.0]) {
            b.set_cpu_load(load);
        }
        assert_eq!(port_of(&lb.next_server(&req)), 8081);

        for (b, load) in list.iter().zip([2.0, 2.0, 8.0]) {
            b.set_cpu_load(load);
        }
        assert_eq!(port_of(&lb.next_server(&req)), 8080);
    }

    #[test]
    fn test_nan_load_never_wins() {
        let list = backends(&[1, 1, 1]);
        let lb = ResourceBased::new(shared(&list)).unwrap();
        let headers = no_request();
        let req = RequestInfo::new(&headers, "");

        for (b, load) in list.iter().zip([f64::NAN, 55.5, 12.25]) {
            b.set_cpu_load(load);
        }
        assert_eq!(port_of(&lb.next_server(&req)), 8082);
    }
}
