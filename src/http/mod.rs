//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → [dispatcher picks a target and forwards]
//!     → Send upstream response to client
//! ```

pub mod server;

pub use server::{HttpServer, X_REQUEST_ID};
