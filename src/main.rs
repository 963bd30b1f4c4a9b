//! HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request     ┌─────────┐    ┌────────────┐    ┌──────────────┐
//!     ──────────────────▶│  http   │───▶│  dispatch  │───▶│load_balancer │
//!                        │ server  │    │            │◀───│  strategy    │
//!                        └─────────┘    └─────┬──────┘    └──────────────┘
//!                                             │
//!                                             ▼
//!     Client Response    ┌─────────┐    ┌────────────┐
//!     ◀──────────────────│forwarder│◀───│proxy cache │          Backend
//!                        └────┬────┘    └────────────┘          (static or
//!                             └────────────────────────────────▶ simulated)
//! ```
//!
//! Without configured backends a simulated fleet is started and its
//! descriptors are handed to the balancer.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use balancer_proxy::config::loader::{load_config, ConfigError};
use balancer_proxy::config::validation::validate_config;
use balancer_proxy::config::BalancerConfig;
use balancer_proxy::lifecycle::{wait_for_signal, Shutdown, ShutdownTasks, SHUTDOWN_DEADLINE};
use balancer_proxy::load_balancer::{Backend, SharedTarget};
use balancer_proxy::observability::{logging, metrics};
use balancer_proxy::proxy::{Dispatcher, ForwardSettings};
use balancer_proxy::simulator::FleetBuilder;
use balancer_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "balancer-proxy", version, about = "HTTP load balancer with pluggable selection strategies")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Selection algorithm (round_robin, weighted_round_robin, source_ip_hash,
    /// least_connection, lowest_latency, resource_base).
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Listener address, e.g. 127.0.0.1:8080.
    #[arg(short, long)]
    bind: Option<String>,

    /// Number of simulated backends.
    #[arg(short = 'n', long)]
    backends: Option<usize>,

    /// Give simulated backends random weights in [1, 5].
    #[arg(short, long)]
    random_weight: bool,

    /// Log level, overridden by RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut BalancerConfig) {
        if let Some(algorithm) = &self.algorithm {
            config.algorithm = algorithm.clone();
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(backends) = self.backends {
            config.simulator.backends = backends;
        }
        if self.random_weight {
            config.simulator.random_weight = true;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_level);
    tracing::info!("balancer-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        algorithm = config.algorithm_name(),
        static_backends = config.backends.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let mut shutdown_tasks = ShutdownTasks::new();
    let targets: Vec<SharedTarget> = if config.backends.is_empty() {
        let fleet = FleetBuilder::from_config(&config.simulator).build().await?;
        let targets = fleet.targets();
        shutdown_tasks.push("backend fleet", async move {
            fleet
                .shutdown(SHUTDOWN_DEADLINE)
                .await
                .map_err(|e| e.to_string())
        });
        targets
    } else {
        config
            .backends
            .iter()
            .map(|b| Arc::new(Backend::new(b.host.clone(), b.port, b.weight)) as SharedTarget)
            .collect()
    };

    let settings = ForwardSettings::from(&config.timeouts);
    let dispatcher = match Dispatcher::from_identifier(config.algorithm_name(), targets, settings) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            shutdown_tasks.run(SHUTDOWN_DEADLINE).await;
            return Err(e.into());
        }
    };

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %config.listener.bind_address, error = %e, "Failed to bind listener");
            shutdown_tasks.run(SHUTDOWN_DEADLINE).await;
            return Err(e.into());
        }
    };
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, dispatcher);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let server_exited = tokio::select! {
        _ = wait_for_signal() => false,
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => tracing::warn!("HTTP server exited unexpectedly"),
                Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
                Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
            }
            true
        }
    };

    if !server_exited {
        shutdown.trigger();
        match tokio::time::timeout(SHUTDOWN_DEADLINE, &mut server_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server failed"),
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task panicked"),
            Err(_) => {
                tracing::warn!("HTTP server did not drain before deadline");
                server_task.abort();
            }
        }
    }

    if shutdown_tasks.run(SHUTDOWN_DEADLINE).await {
        tracing::info!("Shutdown complete");
    } else {
        tracing::warn!("Shutdown finished with errors");
    }
    Ok(())
}
