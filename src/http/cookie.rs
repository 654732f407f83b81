// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session cookie store with diff-aware merging
//!
//! Cookies are kept as `domain -> path -> name -> {value, expires}`, the same
//! nested shape the proxy sends back and expects in its `cookies` field. The
//! store serializes transparently as that map, so a snapshot can be posted to
//! the proxy or written to disk without conversion.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// `domain -> path -> name -> entry`
pub type CookieMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, CookieEntry>>>;

/// Value half of a stored cookie
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub expires: String,
}

impl CookieEntry {
    pub fn new(value: impl Into<String>, expires: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires: expires.into(),
        }
    }
}

/// Flat view of one stored cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cookie {
    pub domain: String,
    pub path: String,
    pub name: String,
    pub value: String,
    pub expires: String,
}

/// Counts reported by [`CookieStore::merge`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieChanges {
    pub added: usize,
    pub modified: usize,
    /// Incoming snapshots only carry live cookies, so nothing is ever counted here
    pub removed: usize,
    pub any: bool,
}

/// Cookie storage owned by one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieStore {
    cookies: CookieMap,
}

impl CookieStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an incoming snapshot and report what changed
    pub fn merge(&mut self, incoming: &CookieMap) -> CookieChanges {
        let mut changes = CookieChanges::default();

        for (domain, paths) in incoming {
            for (path, names) in paths {
                let stored = self
                    .cookies
                    .entry(domain.clone())
                    .or_default()
                    .entry(path.clone())
                    .or_default();
                for (name, entry) in names {
                    match stored.get_mut(name) {
                        None => {
                            stored.insert(name.clone(), entry.clone());
                            changes.added += 1;
                        }
                        Some(existing) if existing != entry => {
                            *existing = entry.clone();
                            changes.modified += 1;
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        self.prune();
        changes.any = changes.added + changes.modified + changes.removed > 0;
        changes
    }

    /// Look up one cookie
    pub fn get(&self, domain: &str, path: &str, name: &str) -> Option<&CookieEntry> {
        self.cookies.get(domain)?.get(path)?.get(name)
    }

    /// Number of stored cookies
    pub fn len(&self) -> usize {
        self.cookies
            .values()
            .flat_map(|paths| paths.values())
            .map(|names| names.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cookie
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Remove one cookie, returning it if it was stored
    pub fn remove(&mut self, domain: &str, path: &str, name: &str) -> Option<CookieEntry> {
        let removed = self
            .cookies
            .get_mut(domain)?
            .get_mut(path)?
            .remove(name);
        self.prune();
        removed
    }

    /// All cookies in domain, path, name order
    pub fn cookies(&self) -> Vec<Cookie> {
        self.cookies
            .iter()
            .flat_map(|(domain, paths)| {
                paths.iter().flat_map(move |(path, names)| {
                    names.iter().map(move |(name, entry)| Cookie {
                        domain: domain.clone(),
                        path: path.clone(),
                        name: name.clone(),
                        value: entry.value.clone(),
                        expires: entry.expires.clone(),
                    })
                })
            })
            .collect()
    }

    /// Borrow the nested map
    pub fn as_map(&self) -> &CookieMap {
        &self.cookies
    }

    /// Export the store as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Import a store from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut store: CookieStore = serde_json::from_str(json)?;
        store.prune();
        Ok(store)
    }

    fn prune(&mut self) {
        for paths in self.cookies.values_mut() {
            paths.retain(|_, names| !names.is_empty());
        }
        self.cookies.retain(|_, paths| !paths.is_empty());
    }
}

impl From<CookieMap> for CookieStore {
    fn from(cookies: CookieMap) -> Self {
        let mut store = Self { cookies };
        store.prune();
        store
    }
}

/// Accept strings, numbers, booleans and `null` where text is expected
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
