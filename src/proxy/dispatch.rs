//! Request dispatch: select a target, resolve its proxy, forward.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
};
use std::net::SocketAddr;
use std::time::Instant;

use crate::error::BalancerError;
use crate::load_balancer::{self, Algorithm, LoadBalancer, RequestInfo, SharedTarget};
use crate::observability::metrics;
use crate::proxy::cache::ProxyCache;
use crate::proxy::forwarder::ForwardSettings;

/// Entry point for every proxied request.
#[derive(Debug)]
pub struct Dispatcher {
    algorithm: Algorithm,
    balancer: Box<dyn LoadBalancer>,
    proxies: ProxyCache,
}

impl Dispatcher {
    /// Build the engine for `algorithm` over `targets`.
    ///
    /// This is the only validation gate: an empty target set or a target
    /// without a usable URL fails here, never per request.
    pub fn new(
        algorithm: Algorithm,
        targets: Vec<SharedTarget>,
        settings: ForwardSettings,
    ) -> Result<Self, BalancerError> {
        let target_count = targets.len();
        let balancer = load_balancer::build(algorithm, targets)?;

        tracing::info!(
            algorithm = %algorithm,
            name = algorithm.label(),
            targets = target_count,
            "Load balancer ready"
        );

        Ok(Self {
            algorithm,
            balancer,
            proxies: ProxyCache::new(settings),
        })
    }

    /// Resolve an algorithm identifier such as `"least_connection"`, then
    /// build the engine as [`Dispatcher::new`] does.
    pub fn from_identifier(
        identifier: &str,
        targets: Vec<SharedTarget>,
        settings: ForwardSettings,
    ) -> Result<Self, BalancerError> {
        Self::new(identifier.parse()?, targets, settings)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn proxies(&self) -> &ProxyCache {
        &self.proxies
    }

    /// Forward `request` to the target picked by the active strategy.
    pub async fn dispatch(&self, request: Request<Body>) -> Response<Body> {
        let start_time = Instant::now();
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        let target = self
            .balancer
            .next_server(&RequestInfo::new(request.headers(), &remote_addr));

        tracing::info!(
            backend = %target,
            method = %request.method(),
            path = %request.uri().path(),
            "Load balancer forwarding request"
        );
        metrics::record_selection(self.algorithm, &target);

        let proxy = self.proxies.get_or_create(&target);
        let response = proxy.forward(request).await;

        metrics::record_request(response.status().as_u16(), &target, start_time);
        response
    }
}
