// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP client: direct calls, proxied calls and the proxy handshake

use std::time::{Duration, Instant};

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::cookie::CookieStore;
use super::request::{ProxyRequest, RequestSpec};
use super::response::{interpret_proxy_payload, verify_proxy_handshake, ProxyOutcome, Response};
use super::{DEFAULT_PROXY_TIMEOUT, DEFAULT_USER_AGENT};
use crate::error::{Error, Result};

const JSON: &str = "application/json";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Timeout for direct calls and the proxy handshake
    pub timeout: Duration,
    /// Time the proxy may spend on one call; sent in the envelope
    pub proxy_timeout: Duration,
    /// Maximum redirects to follow on direct calls
    pub max_redirects: usize,
    /// Accept invalid certificates (dangerous!)
    pub accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            proxy_timeout: DEFAULT_PROXY_TIMEOUT,
            max_redirects: 10,
            accept_invalid_certs: false,
        }
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            // Cookies are tracked by the session store, not by the transport.
            .cookie_store(false)
            .build()?;

        Ok(Self { client, config })
    }

    /// Get client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Perform `request` from this process
    ///
    /// Method, headers and body pass through unchanged; an empty body is not
    /// sent. Non-2xx statuses are returned, not treated as errors.
    pub async fn fetch(&self, request: &RequestSpec) -> Result<Response> {
        let start = Instant::now();
        let url = Url::parse(&request.url)?;

        let mut builder = self
            .client
            .request(request.http_method()?, url.clone())
            .headers(request.header_map()?)
            .timeout(self.config.timeout);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        tracing::debug!(
            method = %request.method,
            url = %url,
            status = status.as_u16(),
            time_ms = start.elapsed().as_millis() as u64,
            "Direct response"
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            url: final_url,
            headers,
            body,
        })
    }

    /// Ask the proxy at `proxy` to perform `request`
    ///
    /// The current cookie snapshot travels with the call so the proxy can
    /// send the right cookies; the reply carries any it received.
    pub async fn fetch_via_proxy(
        &self,
        proxy: &str,
        request: &RequestSpec,
        cookies: &CookieStore,
    ) -> Result<ProxyOutcome> {
        let start = Instant::now();
        let envelope = ProxyRequest::new(request, cookies, self.config.proxy_timeout.as_secs());

        let payload: Value = self
            .client
            .post(proxy)
            .header(CONTENT_TYPE, HeaderValue::from_static(JSON))
            .header(ACCEPT, HeaderValue::from_static(JSON))
            .json(&envelope)
            // Leave the proxy room to report its own timeout.
            .timeout(self.config.proxy_timeout + self.config.timeout)
            .send()
            .await?
            .json()
            .await?;

        let outcome = interpret_proxy_payload(proxy, payload);
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            proxy = %proxy,
            ok = outcome.is_ok(),
            time_ms = start.elapsed().as_millis() as u64,
            "Proxied response"
        );
        outcome
    }

    /// Confirm that `proxy` is reachable and speaks our protocol version
    pub async fn check_proxy(&self, proxy: &str) -> Result<()> {
        let payload: Value = self
            .client
            .get(proxy)
            .header(ACCEPT, HeaderValue::from_static(JSON))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| Error::protocol(format!("proxy unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::protocol(format!("proxy handshake is not JSON: {}", e)))?;

        verify_proxy_handshake(&payload)
    }
}
