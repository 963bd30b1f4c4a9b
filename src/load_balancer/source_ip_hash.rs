//! Source IP hash load balancing strategy.
//!
//! Gives session affinity: a client IP always maps to the same backend for
//! a fixed backend count. Changing the backend count remaps every client.

use std::net::SocketAddr;
use url::Url;

use crate::error::BalancerError;
use crate::load_balancer::{validate_targets, LoadBalancer, RequestInfo, SharedTarget, Upstream};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Source IP hash selector.
#[derive(Debug)]
pub struct SourceIpHash {
    backends: Vec<Upstream>,
}

impl SourceIpHash {
    pub fn new(targets: Vec<SharedTarget>) -> Result<Self, BalancerError> {
        Ok(Self {
            backends: validate_targets(targets)?,
        })
    }

    /// Index of the backend serving `client_ip`.
    pub fn bucket(&self, client_ip: &str) -> usize {
        fnv1a_32(client_ip.as_bytes()) as usize % self.backends.len()
    }
}

impl LoadBalancer for SourceIpHash {
    fn next_server(&self, request: &RequestInfo<'_>) -> Url {
        let ip = client_ip(request);
        let index = self.bucket(&ip);
        let url = self.backends[index].url.clone();

        tracing::debug!(source_ip = %ip, backend = %url, "Source IP hashed");
        url
    }
}

/// Resolve the client IP.
///
/// Priority:
/// 1. First entry of `X-Forwarded-For`
/// 2. Peer address without its port
/// 3. Raw peer address string, if the port cannot be split off
pub fn client_ip(request: &RequestInfo<'_>) -> String {
    if let Some(ip) = request
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return ip.to_owned();
    }

    let remote = request.remote_addr();
    match remote.parse::<SocketAddr>() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => {
            tracing::warn!(remote_addr = %remote, "Failed to get client ip, keeping raw remote address");
            remote.to_owned()
        }
    }
}

/// 32-bit FNV-1a.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
