//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → CLI flags override individual fields
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the algorithm is fixed for the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BackendConfig;
pub use schema::BalancerConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::SimulatorConfig;
pub use schema::TimeoutConfig;
