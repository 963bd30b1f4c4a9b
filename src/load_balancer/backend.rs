//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server (host, port, derived forwarding URL)
//! - Expose live metrics read by the metric-driven strategies
//! - Let the owner of the backend update those metrics concurrently
//!
//! # Design Decisions
//! - Every metric lives in its own atomic, so reads are never torn
//! - Cross-field consistency is not provided; stale reads are acceptable
//! - The URL is resolved once at construction and never changes

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Read-only view of a backend, as consumed by the selection engine.
pub trait Target: Send + Sync + fmt::Debug {
    /// Forwarding URL, or `None` when the address is unusable.
    fn url(&self) -> Option<Url>;

    /// Current number of active connections.
    fn active_connections(&self) -> usize;

    /// Last observed response latency.
    fn latency(&self) -> Duration;

    /// Last observed CPU load, in percent.
    fn cpu_load(&self) -> f64;

    /// Static weight used by weighted round robin.
    fn weight(&self) -> u32;
}

/// Targets are shared between their owner and the engine.
pub type SharedTarget = Arc<dyn Target>;

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    host: String,
    port: u16,
    weight: u32,
    /// Pre-calculated forwarding URL.
    url: Option<Url>,
    active_connections: AtomicUsize,
    /// Latency in microseconds.
    latency_us: AtomicU64,
    /// `f64` bit pattern of the CPU load.
    cpu_load_bits: AtomicU64,
}

impl Backend {
    /// Create a new backend.
    ///
    /// Port 443 is forwarded over `https`, anything else over `http`.
    pub fn new(host: impl Into<String>, port: u16, weight: u32) -> Self {
        let host = host.into();
        let url = forwarding_url(&host, port);
        Self {
            host,
            port,
            weight,
            url,
            active_connections: AtomicUsize::new(0),
            latency_us: AtomicU64::new(0),
            cpu_load_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Overwrite the active connection count.
    pub fn set_active_connections(&self, connections: usize) {
        self.active_connections.store(connections, Ordering::Relaxed);
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connection count, saturating at zero.
    pub fn dec_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn set_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_us.store(micros, Ordering::Relaxed);
    }

    pub fn set_cpu_load(&self, load: f64) {
        self.cpu_load_bits.store(load.to_bits(), Ordering::Relaxed);
    }
}

impl Target for Backend {
    fn url(&self) -> Option<Url> {
        self.url.clone()
    }

    fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    fn latency(&self) -> Duration {
        Duration::from_micros(self.latency_us.load(Ordering::Relaxed))
    }

    fn cpu_load(&self) -> f64 {
        f64::from_bits(self.cpu_load_bits.load(Ordering::Relaxed))
    }

    fn weight(&self) -> u32 {
        self.weight
    }
}

fn forwarding_url(host: &str, port: u16) -> Option<Url> {
    if host.is_empty() {
        return None;
    }
    let scheme = if port == 443 { "https" } else { "http" };
    let authority = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };
    Url::parse(&format!("{}://{}", scheme, authority))
        .ok()
        .filter(|url| url.has_host())
}
