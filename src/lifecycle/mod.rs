//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → Server stops accepting → Drain
//!     → Shutdown tasks (backend fleet) under a deadline → Exit
//! ```
//!
//! # Design Decisions
//! - Shutdown has timeout: tasks still running at the deadline are abandoned
//! - Shutdown tasks run concurrently, not in registration order

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownTasks, SHUTDOWN_DEADLINE};
pub use signals::wait_for_signal;
