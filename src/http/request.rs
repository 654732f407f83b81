// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request types: the extracted request and the proxy envelope

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::cookie::CookieStore;
use crate::error::{Error, Result};

/// A request extracted from a document block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    /// Upper-cased method
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    /// Header pairs in document order; duplicates allowed
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
    /// Indented lines under the request line, parsed but not merged into the URL
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_lines: Vec<String>,
}

fn default_method() -> String {
    RequestSpec::DEFAULT_METHOD.to_string()
}

impl RequestSpec {
    pub const DEFAULT_METHOD: &'static str = "GET";

    /// Create a request with no headers or body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: String::new(),
            query_lines: Vec::new(),
        }
    }

    /// Append a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First header value with `name`, compared case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Method for the HTTP client; an empty method means GET
    pub fn http_method(&self) -> Result<Method> {
        let method = if self.method.is_empty() {
            Self::DEFAULT_METHOD
        } else {
            self.method.as_str()
        };
        Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::Config(format!("invalid HTTP method: {}", method)))
    }

    /// Header pairs as a reqwest header map, keeping duplicates
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| Error::Config(format!("invalid header name {:?}: {}", name, e)))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| Error::Config(format!("invalid value for header {}: {}", name, e)))?;
            map.append(name, value);
        }
        Ok(map)
    }
}

/// JSON body posted to the proxy
#[derive(Debug, Serialize)]
pub struct ProxyRequest<'a> {
    pub url: &'a str,
    pub method: &'a str,
    pub headers: &'a [(String, String)],
    /// Seconds the proxy may spend on the call
    pub timeout: u64,
    pub cookies: &'a CookieStore,
    pub body: &'a str,
}

impl<'a> ProxyRequest<'a> {
    pub fn new(request: &'a RequestSpec, cookies: &'a CookieStore, timeout: u64) -> Self {
        Self {
            url: &request.url,
            method: if request.method.is_empty() {
                RequestSpec::DEFAULT_METHOD
            } else {
                &request.method
            },
            headers: &request.headers,
            timeout,
            cookies,
            body: &request.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_headers_as_pairs() {
        let request = RequestSpec::new("POST", "http://x/a")
            .header("X", "1")
            .header("X", "2")
            .body("b");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"method": "POST", "url": "http://x/a", "headers": [["X", "1"], ["X", "2"]], "body": "b"})
        );
    }

    #[test]
    fn test_request_defaults_when_deserializing() {
        let request: RequestSpec = serde_json::from_value(json!({"url": "http://x"})).unwrap();
        assert_eq!(request.method, "GET");
        assert!(request.headers.is_empty());
        assert_eq!(request.body, "");
    }

    #[test]
    fn test_header_map_keeps_duplicates() {
        let request = RequestSpec::new("GET", "http://x")
            .header("Accept", "a")
            .header("accept", "b");
        let map = request.header_map().unwrap();
        assert_eq!(map.get_all("accept").iter().count(), 2);
        assert_eq!(request.header_value("ACCEPT"), Some("a"));
    }

    #[test]
    fn test_invalid_header_name() {
        let request = RequestSpec::new("GET", "http://x").header("Bad Name", "v");
        assert!(matches!(request.header_map(), Err(Error::Config(_))));
    }

    #[test]
    fn test_http_method() {
        assert_eq!(RequestSpec::new("", "http://x").http_method().unwrap(), Method::GET);
        assert_eq!(RequestSpec::new("PURGE", "http://x").http_method().unwrap().as_str(), "PURGE");
    }

    #[test]
    fn test_proxy_envelope() {
        let request = RequestSpec::new("DELETE", "https://api.test/item/1").header("A", "b");
        let cookies: CookieStore =
            serde_json::from_value(json!({"api.test": {"/": {"sid": {"value": "v", "expires": ""}}}}))
                .unwrap();
        let envelope = serde_json::to_value(ProxyRequest::new(&request, &cookies, 300)).unwrap();
        assert_eq!(
            envelope,
            json!({
                "url": "https://api.test/item/1",
                "method": "DELETE",
                "headers": [["A", "b"]],
                "timeout": 300,
                "cookies": {"api.test": {"/": {"sid": {"value": "v", "expires": ""}}}},
                "body": ""
            })
        );
    }
}
