//! HTTP load balancer library.
//!
//! A reverse proxy that spreads requests over a fixed set of backends with
//! one of six selection strategies, plus a simulated backend fleet to
//! drive it.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod simulator;

pub use config::schema::BalancerConfig;
pub use error::BalancerError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Algorithm, Backend, LoadBalancer, SharedTarget, Target};
pub use proxy::{Dispatcher, ForwardSettings};
pub use simulator::BackendFleet;
