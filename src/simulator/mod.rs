//! Simulated backend fleet.
//!
//! # Data Flow
//! ```text
//! FleetBuilder (count, weights, seed)
//!     → fleet.rs (pick free ports, start one server per backend)
//!     → server.rs (axum app on /req/{req_id})
//!         on each request: sleep, then refresh synthetic metrics
//!     → Backend descriptors shared with the load balancer
//! ```
//!
//! # Design Decisions
//! - One random source per fleet, seeded once, owned here and never by the
//!   selection engine
//! - Metrics are written through the descriptor's atomics; readers never block

pub mod fleet;
pub mod server;

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::load_balancer::Backend;

pub use fleet::{BackendFleet, FleetBuilder};
pub use server::SimulatedBackend;

pub const MIN_CONNECTIONS: usize = 1;
pub const MAX_CONNECTIONS: usize = 10;
pub const MIN_CPU_LOAD: f64 = 0.1;
pub const MAX_CPU_LOAD: f64 = 100.0;

/// Errors raised while running the simulated fleet.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("setup backend {id} failed after {attempts} attempts")]
    NoFreePort { id: usize, attempts: usize },

    #[error("{failed} backend(s) failed to shut down in time")]
    Shutdown { failed: usize },
}

/// Source of synthetic backend metrics.
#[derive(Debug)]
pub struct MetricsGenerator {
    rng: Mutex<StdRng>,
}

impl MetricsGenerator {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    pub fn connections(&self) -> usize {
        self.with_rng(|rng| rng.gen_range(MIN_CONNECTIONS..=MAX_CONNECTIONS))
    }

    /// Response time in [200, 500) ms.
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.with_rng(|rng| rng.gen_range(200..500)))
    }

    /// CPU load in [0.1, 100.0], rounded to two decimals.
    pub fn cpu_load(&self) -> f64 {
        let raw = self.with_rng(|rng| rng.gen::<f64>()) * (MAX_CPU_LOAD - MIN_CPU_LOAD) + MIN_CPU_LOAD;
        (raw * 100.0).round() / 100.0
    }

    pub fn weight(&self) -> u32 {
        self.with_rng(|rng| rng.gen_range(1..=5))
    }

    /// Port in the dynamic range 49152–65535.
    pub fn port(&self) -> u16 {
        self.with_rng(|rng| rng.gen_range(49152..=65535))
    }

    /// Write a fresh set of metrics into `backend`.
    pub fn refresh(&self, backend: &Backend) {
        backend.set_active_connections(self.connections());
        backend.set_latency(self.latency());
        backend.set_cpu_load(self.cpu_load());
    }
}

impl Default for MetricsGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}
