//! Forwarding handler cache.

use dashmap::DashMap;
use std::sync::Arc;
use url::Url;

use crate::proxy::forwarder::{ForwardSettings, ReverseProxy};

/// A thread-safe map of target URL -> forwarding handler.
///
/// Handlers are built on first use and live as long as the cache. The key
/// space is bounded by the (static) backend set, so nothing is evicted.
#[derive(Debug)]
pub struct ProxyCache {
    proxies: DashMap<String, Arc<ReverseProxy>>,
    settings: ForwardSettings,
}

impl ProxyCache {
    pub fn new(settings: ForwardSettings) -> Self {
        Self {
            proxies: DashMap::new(),
            settings,
        }
    }

    /// Return the handler for `target`, building it on a miss.
    ///
    /// Racing first uses of the same URL converge on a single entry.
    pub fn get_or_create(&self, target: &Url) -> Arc<ReverseProxy> {
        if let Some(proxy) = self.proxies.get(target.as_str()) {
            return Arc::clone(proxy.value());
        }

        let entry = self.proxies.entry(target.as_str().to_owned()).or_insert_with(|| {
            tracing::debug!(upstream = %target, "Creating forwarding handler");
            Arc::new(ReverseProxy::new(target.clone(), &self.settings))
        });
        Arc::clone(entry.value())
    }

    pub fn contains(&self, target: &Url) -> bool {
        self.proxies.contains_key(target.as_str())
    }

    /// Number of cached handlers.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

impl Default for ProxyCache {
    fn default() -> Self {
        Self::new(ForwardSettings::default())
    }
}
