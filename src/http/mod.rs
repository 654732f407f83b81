// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer for Prestige
//!
//! Provides the transport used by a session: direct calls through reqwest,
//! calls relayed through a Prestige proxy, and the cookie store the proxy
//! keeps in sync.

mod client;
mod cookie;
mod request;
mod response;

use std::net::IpAddr;
use std::time::Duration;

use url::{Host, Url};

pub use client::{HttpClient, HttpClientConfig};
pub use cookie::{Cookie, CookieChanges, CookieEntry, CookieMap, CookieStore};
pub use request::{ProxyRequest, RequestSpec};
pub use response::{interpret_proxy_payload, verify_proxy_handshake, ProxyOutcome, Reply, Response};

/// Protocol version a proxy must report in its handshake
pub const PROXY_PROTOCOL_VERSION: u64 = 1;

/// Time a proxy may spend on one call
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("prestige/", env!("CARGO_PKG_VERSION"));

/// Check whether `url` points at this machine
///
/// Local targets are always called directly, even when a proxy is available.
pub fn is_local_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                domain == "localhost" || domain.ends_with(".localhost")
            }
            Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
            Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
            None => false,
        },
        Err(_) => url.contains("://localhost"),
    }
}
