//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (request ID, timeout, tracing)
//! - Bind server to listener with peer addresses exposed to handlers
//! - Hand every request to the dispatcher
//! - Stop accepting when the shutdown broadcast fires

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::Response,
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::BalancerConfig;
use crate::proxy::Dispatcher;

pub const X_REQUEST_ID: &str = "x-request-id";

/// HTTP front end of the load balancer.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server forwarding through `dispatcher`.
    pub fn new(config: BalancerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            router: Self::build_router(&config, dispatcher),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &BalancerConfig, dispatcher: Arc<Dispatcher>) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        // Outer bound: forwarding budget plus connect time.
        let timeout = Duration::from_secs(config.timeouts.request_secs + config.timeouts.connect_secs);

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(dispatcher)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(request_id))
                    .layer(TimeoutLayer::new(timeout)),
            )
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for serving it elsewhere.
    pub fn into_router(self) -> Router {
        self.router
    }
}

async fn proxy_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request<Body>,
) -> Response<Body> {
    dispatcher.dispatch(request).await
}
