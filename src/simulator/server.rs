//! A single simulated backend.
//!
//! Serves `GET /req/{req_id}`: sleeps according to its weight, refreshes
//! its synthetic metrics, then answers with a fixed greeting.

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::load_balancer::{Backend, SharedTarget, Target};
use crate::simulator::MetricsGenerator;

#[derive(Debug)]
struct ServerState {
    id: usize,
    backend: Arc<Backend>,
    metrics: Arc<MetricsGenerator>,
}

/// A running backend and the descriptor the balancer reads.
#[derive(Debug)]
pub struct SimulatedBackend {
    id: usize,
    addr: SocketAddr,
    backend: Arc<Backend>,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SimulatedBackend {
    /// Start serving on `listener`.
    ///
    /// `host` is the name advertised in the descriptor; the port is taken
    /// from the listener.
    pub fn serve(
        id: usize,
        host: &str,
        weight: u32,
        listener: TcpListener,
        metrics: Arc<MetricsGenerator>,
    ) -> std::io::Result<Self> {
        let addr = listener.local_addr()?;
        let backend = Arc::new(Backend::new(host, addr.port(), weight));

        let state = Arc::new(ServerState {
            id,
            backend: backend.clone(),
            metrics,
        });
        let app = Router::new()
            .route("/req/{req_id}", get(handle_request))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(id, error = %e, "Backend server failed");
            }
        });

        tracing::info!(id, address = %addr, weight, "Backend started");

        Ok(Self {
            id,
            addr,
            backend,
            shutdown_tx,
            task,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn target(&self) -> SharedTarget {
        self.backend.clone()
    }

    /// Stop accepting and wait up to `deadline` for in-flight requests.
    ///
    /// Returns `false` if the deadline passed first.
    pub async fn stop(self, deadline: Duration) -> bool {
        let _ = self.shutdown_tx.send(());
        match tokio::time::timeout(deadline, self.task).await {
            Ok(_) => {
                tracing::info!(id = self.id, "Backend stopped");
                true
            }
            Err(_) => {
                tracing::warn!(id = self.id, "Backend did not stop before deadline");
                false
            }
        }
    }
}

async fn handle_request(
    State(state): State<Arc<ServerState>>,
    Path(req_id): Path<String>,
) -> String {
    // Heavier backends answer faster: 1/weight whole seconds.
    let handle_time = Duration::from_secs(u64::from(1 / state.backend.weight().max(1)));
    tokio::time::sleep(handle_time).await;

    state.metrics.refresh(&state.backend);
    tracing::debug!(
        id = state.id,
        req_id = %req_id,
        connections = state.backend.active_connections(),
        latency = ?state.backend.latency(),
        cpu_load = state.backend.cpu_load(),
        "Handled request"
    );

    format!("Server {}, handle request {}!", state.id, req_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::MIN_CONNECTIONS;

    #[tokio::test]
    async fn test_serves_and_refreshes_metrics() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = SimulatedBackend::serve(
            3,
            "127.0.0.1",
            2,
            listener,
            Arc::new(MetricsGenerator::seeded(9)),
        )
        .unwrap();

        assert_eq!(server.backend().active_connections(), 0);
        let url = format!("http://{}/req/17", server.local_addr());
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();

        assert_eq!(body, "Server 3, handle request 17!");
        assert!(server.backend().active_connections() >= MIN_CONNECTIONS);
        assert!(server.backend().latency() >= Duration::from_millis(200));
        assert_eq!(server.target().weight(), 2);

        assert!(server.stop(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server =
            SimulatedBackend::serve(0, "127.0.0.1", 1, listener, Arc::default()).unwrap();

        let url = format!("http://{}/health", server.local_addr());
        let status = reqwest::get(&url).await.unwrap().status();
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

        server.stop(Duration::from_secs(5)).await;
    }
}
