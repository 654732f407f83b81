// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session configuration

use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, DEFAULT_PROXY_TIMEOUT, DEFAULT_USER_AGENT};
use crate::js::JsRuntimeConfig;

/// Environment variable naming the proxy endpoint
pub const PROXY_URL_ENV: &str = "PRESTIGE_PROXY_URL";

/// Environment variable holding the request timeout in seconds
pub const TIMEOUT_ENV: &str = "PRESTIGE_TIMEOUT_SECS";

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Proxy endpoint, checked once when the session starts
    pub proxy: Option<String>,
    /// Timeout for direct calls and the proxy handshake
    pub request_timeout: Duration,
    /// Time the proxy may spend on one call
    pub proxy_timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Accept invalid TLS certificates on direct calls
    pub accept_invalid_certs: bool,
    /// Limits for user scripts
    pub script: JsRuntimeConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            request_timeout: Duration::from_secs(30),
            proxy_timeout: DEFAULT_PROXY_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: false,
            script: JsRuntimeConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new session config
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `PRESTIGE_PROXY_URL` and `PRESTIGE_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(proxy) = lookup(PROXY_URL_ENV).filter(|p| !p.trim().is_empty()) {
            config = config.proxy(proxy.trim());
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a whole number of seconds, got {:?}", TIMEOUT_ENV, secs))
            })?;
            config = config.request_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set proxy timeout
    pub fn proxy_timeout(mut self, timeout: Duration) -> Self {
        self.proxy_timeout = timeout;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Accept invalid TLS certificates
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set script limits
    pub fn script(mut self, script: JsRuntimeConfig) -> Self {
        self.script = script;
        self
    }

    pub(crate) fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            user_agent: self.user_agent.clone(),
            timeout: self.request_timeout,
            proxy_timeout: self.proxy_timeout,
            accept_invalid_certs: self.accept_invalid_certs,
            ..HttpClientConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new();
        assert!(config.proxy.is_none());
        assert_eq!(config.proxy_timeout, Duration::from_secs(300));
        assert!(config.user_agent.starts_with("prestige/"));
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .proxy("http://localhost:8080/proxy")
            .request_timeout(Duration::from_secs(5))
            .accept_invalid_certs(true);
        let http = config.http_config();
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert!(http.accept_invalid_certs);
        assert_eq!(config.proxy.as_deref(), Some("http://localhost:8080/proxy"));
    }

    #[test]
    fn test_environment() {
        let config = SessionConfig::from_lookup(lookup(&[
            (PROXY_URL_ENV, " http://proxy.test/ "),
            (TIMEOUT_ENV, "12"),
        ]))
        .unwrap();
        assert_eq!(config.proxy.as_deref(), Some("http://proxy.test/"));
        assert_eq!(config.request_timeout, Duration::from_secs(12));

        let config = SessionConfig::from_lookup(lookup(&[(PROXY_URL_ENV, "")])).unwrap();
        assert!(config.proxy.is_none());

        assert!(matches!(
            SessionConfig::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")])),
            Err(Error::Config(_))
        ));
    }
}
