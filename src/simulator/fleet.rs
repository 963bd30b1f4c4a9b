//! Fleet construction and teardown.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::config::SimulatorConfig;
use crate::load_balancer::{Backend, SharedTarget};
use crate::simulator::{MetricsGenerator, SimulatedBackend, SimulatorError};

/// Smallest fleet that is started.
pub const MIN_BACKENDS: usize = 3;
pub const MAX_PORT_ATTEMPTS: usize = 10;
pub const DEFAULT_WEIGHT: u32 = 2;

/// Builder for a [`BackendFleet`].
#[derive(Debug)]
pub struct FleetBuilder {
    count: usize,
    random_weight: bool,
    host: String,
    metrics: Option<Arc<MetricsGenerator>>,
}

impl FleetBuilder {
    pub fn new() -> Self {
        Self::from_config(&SimulatorConfig::default())
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self {
            count: MIN_BACKENDS,
            random_weight: config.random_weight,
            host: config.host.clone(),
            metrics: None,
        }
        .backends(config.backends)
    }

    /// Fleet size, raised to [`MIN_BACKENDS`] when smaller.
    pub fn backends(mut self, count: usize) -> Self {
        if count < MIN_BACKENDS {
            tracing::warn!(
                requested = count,
                using = MIN_BACKENDS,
                "Too few backends requested"
            );
        }
        self.count = count.max(MIN_BACKENDS);
        self
    }

    /// Draw each weight from 1..=5 instead of the fixed default.
    pub fn random_weight(mut self, enabled: bool) -> Self {
        self.random_weight = enabled;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Use a seeded metrics source.
    pub fn seed(mut self, seed: u64) -> Self {
        self.metrics = Some(Arc::new(MetricsGenerator::seeded(seed)));
        self
    }

    /// Start every backend.
    ///
    /// Already started backends are stopped again if a later one fails.
    pub async fn build(self) -> Result<BackendFleet, SimulatorError> {
        tracing::info!(backends = self.count, random_weight = self.random_weight, "Building backends");
        let metrics = self.metrics.unwrap_or_default();
        let mut servers = Vec::with_capacity(self.count);

        for id in 0..self.count {
            let weight = if self.random_weight {
                metrics.weight()
            } else {
                DEFAULT_WEIGHT
            };

            match start_backend(id, &self.host, weight, &metrics).await {
                Ok(server) => servers.push(server),
                Err(e) => {
                    tracing::error!(id, error = %e, "Failed to start backend");
                    let partial = BackendFleet { servers };
                    let _ = partial.shutdown(Duration::from_secs(1)).await;
                    return Err(e);
                }
            }
        }

        Ok(BackendFleet { servers })
    }
}

impl Default for FleetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn start_backend(
    id: usize,
    host: &str,
    weight: u32,
    metrics: &Arc<MetricsGenerator>,
) -> Result<SimulatedBackend, SimulatorError> {
    for attempt in 1..=MAX_PORT_ATTEMPTS {
        let port = metrics.port();
        let listener = match TcpListener::bind((host, port)).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::debug!(id, port, attempt, error = %e, "Port unavailable, retrying");
                continue;
            }
        };

        match SimulatedBackend::serve(id, host, weight, listener, metrics.clone()) {
            Ok(server) => return Ok(server),
            Err(e) => {
                tracing::debug!(id, port, attempt, error = %e, "Listener unusable, retrying");
            }
        }
    }

    Err(SimulatorError::NoFreePort {
        id,
        attempts: MAX_PORT_ATTEMPTS,
    })
}

/// A set of running simulated backends.
#[derive(Debug)]
pub struct BackendFleet {
    servers: Vec<SimulatedBackend>,
}

impl BackendFleet {
    pub fn builder() -> FleetBuilder {
        FleetBuilder::new()
    }

    /// Descriptors handed to the load balancer, in id order.
    pub fn targets(&self) -> Vec<SharedTarget> {
        self.servers.iter().map(SimulatedBackend::target).collect()
    }

    pub fn backends(&self) -> impl Iterator<Item = &Arc<Backend>> {
        self.servers.iter().map(SimulatedBackend::backend)
    }

    pub fn servers(&self) -> &[SimulatedBackend] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Stop all backends concurrently, each under `deadline`.
    pub async fn shutdown(self, deadline: Duration) -> Result<(), SimulatorError> {
        let mut tasks = JoinSet::new();
        for server in self.servers {
            tasks.spawn(server.stop(deadline));
        }

        let mut failed = 0;
        while let Some(result) = tasks.join_next().await {
            if !matches!(result, Ok(true)) {
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(SimulatorError::Shutdown { failed });
        }
        tracing::info!("All backends stopped");
        Ok(())
    }
}
