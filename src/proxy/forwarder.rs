//! Single-target reverse proxy.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the target's scheme and authority
//! - Strip hop-by-hop headers in both directions
//! - Append the client IP to `X-Forwarded-For`
//! - Stream the upstream response back unmodified
//! - Map upstream failures to 502 and forwarding timeouts to 504
//! - Speak TLS to `https` targets (rustls, webpki roots)
//!
//! # Design Decisions
//! - One pooled client per target, built once and reused for every request
//! - The timeout is fixed at construction, not chosen per call
//! - No retries and no failover: a failed request fails for that request only

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, PathAndQuery, Scheme},
        Request, Response, StatusCode, Uri, Version,
    },
    response::IntoResponse,
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::config::TimeoutConfig;
use crate::load_balancer::source_ip_hash::X_FORWARDED_FOR;

/// Headers that only apply to a single connection hop.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// Timeouts applied by every forwarding handler.
#[derive(Debug, Clone, Copy)]
pub struct ForwardSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
}

impl From<&TimeoutConfig> for ForwardSettings {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_secs),
            request_timeout: Duration::from_secs(config.request_secs),
            idle_timeout: Duration::from_secs(config.idle_secs),
        }
    }
}

impl Default for ForwardSettings {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// A forwarding handler bound to one target URL.
#[derive(Debug)]
pub struct ReverseProxy {
    target: Url,
    scheme: Scheme,
    authority: Option<Authority>,
    client: Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

impl ReverseProxy {
    pub fn new(target: Url, settings: &ForwardSettings) -> Self {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(settings.connect_timeout));
        http.enforce_http(false);

        // Both schemes go through one connector; TLS only for https.
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(settings.idle_timeout)
            .build(connector);

        let scheme = if target.scheme() == "https" {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        };
        let authority = target_authority(&target);
        if authority.is_none() {
            tracing::warn!(upstream = %target, "Target has no usable authority");
        }

        Self {
            target,
            scheme,
            authority,
            client,
            timeout: settings.request_timeout,
        }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Forward `request` to the target and return its response.
    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        let (mut parts, body) = request.into_parts();

        let Some(uri) = self.rewrite_uri(&parts.uri) else {
            tracing::error!(upstream = %self.target, uri = %parts.uri, "Failed to rewrite request URI");
            return (StatusCode::BAD_GATEWAY, "Invalid upstream URI").into_response();
        };
        parts.uri = uri;
        // The pooled client speaks HTTP/1.1 to targets.
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        if let Some(peer) = peer {
            append_forwarded_for(&mut parts.headers, peer);
        }

        let upstream = Request::from_parts(parts, body);
        match tokio::time::timeout(self.timeout, self.client.request(upstream)).await {
            Ok(Ok(response)) => {
                let response: Response<hyper::body::Incoming> = response;
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Ok(Err(e)) => {
                tracing::error!(upstream = %self.target, error = %e, "Upstream error");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
            Err(_) => {
                tracing::error!(upstream = %self.target, timeout = ?self.timeout, "Upstream timed out");
                (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out").into_response()
            }
        }
    }

    fn rewrite_uri(&self, original: &Uri) -> Option<Uri> {
        let authority = self.authority.clone()?;
        let request_path = original
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");
        let path_and_query = PathAndQuery::from_str(&join_paths(self.target.path(), request_path)).ok()?;

        let mut uri_parts = original.clone().into_parts();
        uri_parts.scheme = Some(self.scheme.clone());
        uri_parts.authority = Some(authority);
        uri_parts.path_and_query = Some(path_and_query);
        Uri::from_parts(uri_parts).ok()
    }
}

fn target_authority(target: &Url) -> Option<Authority> {
    let host = match target.host()? {
        url::Host::Ipv6(ip) => format!("[{}]", ip),
        host => host.to_string(),
    };
    let authority = match target.port_or_known_default() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };
    Authority::from_str(&authority).ok()
}

/// Join the target's base path with the request path, with exactly one
/// slash between them.
fn join_paths(base: &str, request: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return if request.starts_with('/') {
            request.to_string()
        } else {
            format!("/{}", request)
        };
    }
    match request.strip_prefix('/') {
        Some(rest) => format!("{}/{}", base, rest),
        None => format!("{}/{}", base, request),
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers listed in `Connection` are hop-by-hop too.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{}, {}", prior, ip),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
