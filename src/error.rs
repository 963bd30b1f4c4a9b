//! Engine error definitions.

use thiserror::Error;

/// Errors raised while building the selection engine.
///
/// All of them are construction-time failures: once an engine exists,
/// selection itself never fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalancerError {
    /// The backend set is empty.
    #[error("no target servers found")]
    NoTargetServers,

    /// A backend has no usable forwarding URL.
    #[error("invalid backend url")]
    InvalidBackendUrl,

    /// The algorithm identifier is not one of the supported variants.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
