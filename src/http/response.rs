// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response types and proxy reply interpretation

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::cookie::{lenient_string, CookieMap};
use super::PROXY_PROTOCOL_VERSION;
use crate::error::{Error, Result};

/// A response as seen by the caller, whichever way it was fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status: u16,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status_text: String,
    /// Final URL
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    /// Header pairs in the order received
    #[serde(default, deserialize_with = "header_pairs")]
    pub headers: Vec<(String, String)>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: String,
}

impl Response {
    /// First header value with `name`, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Content type without parameters
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(Error::from)
    }
}

/// Outcome of a call, by the path it took
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "via", rename_all = "lowercase")]
pub enum Reply {
    /// Fetched by this process
    Direct(Response),
    /// Fetched by the proxy; `history` holds redirect hops, oldest first
    Proxied {
        proxy: String,
        response: Response,
        history: Vec<Response>,
    },
    /// The proxy answered without a usable `ok` flag; passed through untouched
    Unrecognized { proxy: String, payload: Value },
}

impl Reply {
    /// The final response, if the reply carries one
    pub fn response(&self) -> Option<&Response> {
        match self {
            Reply::Direct(response) | Reply::Proxied { response, .. } => Some(response),
            Reply::Unrecognized { .. } => None,
        }
    }

    /// Proxy that handled the call
    pub fn proxy(&self) -> Option<&str> {
        match self {
            Reply::Direct(_) => None,
            Reply::Proxied { proxy, .. } | Reply::Unrecognized { proxy, .. } => Some(proxy),
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }
}

/// A proxy reply turned into a [`Reply`] plus the cookies it carried
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyOutcome {
    pub reply: Reply,
    pub cookies: Option<CookieMap>,
}

#[derive(Deserialize)]
struct ProxySuccess {
    response: Response,
    #[serde(default)]
    history: Option<Vec<Response>>,
}

/// Interpret the JSON a proxy sent back for a call
///
/// `ok: false` becomes [`Error::Proxy`] with the reported message. A missing
/// or non-boolean `ok` is passed through as [`Reply::Unrecognized`].
pub fn interpret_proxy_payload(proxy: &str, payload: Value) -> Result<ProxyOutcome> {
    let cookies = payload
        .get("cookies")
        .filter(|c| c.is_object())
        .and_then(|c| serde_json::from_value::<CookieMap>(c.clone()).ok());

    match payload.get("ok").and_then(Value::as_bool) {
        Some(true) => {
            let success: ProxySuccess = serde_json::from_value(payload)?;
            Ok(ProxyOutcome {
                reply: Reply::Proxied {
                    proxy: proxy.to_string(),
                    response: success.response,
                    history: success.history.unwrap_or_default(),
                },
                cookies,
            })
        }
        Some(false) => {
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| "proxy reported a failure without a message".to_string());
            Err(Error::proxy(message))
        }
        None => {
            tracing::warn!(proxy = %proxy, "Unexpected protocol response from proxy");
            Ok(ProxyOutcome {
                reply: Reply::Unrecognized {
                    proxy: proxy.to_string(),
                    payload,
                },
                cookies,
            })
        }
    }
}

/// Check a proxy's health-check answer
pub fn verify_proxy_handshake(payload: &Value) -> Result<()> {
    let ok = payload.get("ok").and_then(Value::as_bool);
    let version = payload.get("prestigeProxyVersion").and_then(Value::as_u64);
    match (ok, version) {
        (Some(true), Some(v)) if v == PROXY_PROTOCOL_VERSION => Ok(()),
        (Some(true), Some(v)) => Err(Error::protocol(format!(
            "proxy speaks version {}, expected {}",
            v, PROXY_PROTOCOL_VERSION
        ))),
        _ => Err(Error::protocol(format!("unexpected handshake: {}", payload))),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderShape {
    Pairs(Vec<(String, String)>),
    Map(BTreeMap<String, String>),
}

fn header_pairs<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<HeaderShape>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(HeaderShape::Pairs(pairs)) => pairs,
        Some(HeaderShape::Map(map)) => map.into_iter().collect(),
    })
}
