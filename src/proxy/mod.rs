//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → dispatch.rs (ask the load balancer for a target URL)
//!     → cache.rs (reuse or lazily build the target's proxy)
//!     → forwarder.rs (rewrite, forward, stream response back)
//! ```
//!
//! # Design Decisions
//! - Exactly one forwarding handler per target URL, shared by all requests
//! - Selection and caching never await; only forwarding does I/O
//! - Upstream failures stay local to the request

pub mod cache;
pub mod dispatch;
pub mod forwarder;

pub use cache::ProxyCache;
pub use dispatch::Dispatcher;
pub use forwarder::{ForwardSettings, ReverseProxy};
