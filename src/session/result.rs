// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Outcome of a run and the events a session publishes

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::{Error, ErrorKind};
use crate::http::{CookieChanges, CookieMap, Reply, RequestSpec};

/// Result of the most recent run on a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ExecutionResult {
    Success(Success),
    Failure(Failure),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }

    /// Request that was (or was about to be) sent
    pub fn request(&self) -> Option<&RequestSpec> {
        match self {
            ExecutionResult::Success(s) => Some(&s.request),
            ExecutionResult::Failure(f) => f.request.as_ref(),
        }
    }

    /// Time from the start of the run until it settled
    pub fn time_taken(&self) -> Duration {
        match self {
            ExecutionResult::Success(s) => s.time_taken,
            ExecutionResult::Failure(f) => f.time_taken,
        }
    }

    /// Cookie changes from the merge that followed this run
    pub fn cookie_changes(&self) -> Option<CookieChanges> {
        match self {
            ExecutionResult::Success(s) => Some(s.cookie_changes),
            ExecutionResult::Failure(_) => None,
        }
    }
}

/// A call that produced a reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Success {
    pub reply: Reply,
    /// Cookies carried by the reply, before merging
    pub cookies: Option<CookieMap>,
    pub cookie_changes: CookieChanges,
    pub request: RequestSpec,
    #[serde(serialize_with = "millis")]
    pub time_taken: Duration,
}

/// A run that failed at some stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error: String,
    pub kind: ErrorKind,
    /// Request as far as it was derived when the run failed
    pub request: Option<RequestSpec>,
    #[serde(serialize_with = "millis")]
    pub time_taken: Duration,
}

impl Failure {
    pub(crate) fn new(error: &Error, request: Option<RequestSpec>, time_taken: Duration) -> Self {
        Self {
            error: error.to_string(),
            kind: error.kind(),
            request,
            time_taken,
        }
    }
}

/// Notification sent to session subscribers after a state change
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A top-level run started (`true`) or settled (`false`)
    LoadingChanged(bool),
    /// A new result was stored
    ResultChanged,
    /// The cookie store changed
    CookiesChanged(CookieChanges),
}

fn millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::http::Response;
    use serde_json::json;

    #[test]
    fn test_failure_serialization() {
        let failure = Failure::new(
            &Error::from(ParseError::EmptyUrl),
            None,
            Duration::from_millis(12),
        );
        let result = ExecutionResult::Failure(failure);
        assert!(!result.is_success());
        assert_eq!(result.cookie_changes(), None);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "outcome": "failure",
                "error": "Parse error: URL cannot be empty",
                "kind": "parse",
                "request": null,
                "timeTaken": 12
            })
        );
    }

    #[test]
    fn test_success_accessors() {
        let request = RequestSpec::new("GET", "http://localhost/x");
        let result = ExecutionResult::Success(Success {
            reply: Reply::Direct(Response {
                status: 200,
                status_text: "OK".into(),
                url: request.url.clone(),
                headers: vec![],
                body: "hi".into(),
            }),
            cookies: None,
            cookie_changes: CookieChanges::default(),
            request: request.clone(),
            time_taken: Duration::from_millis(3),
        });
        assert_eq!(result.request(), Some(&request));
        assert_eq!(result.time_taken(), Duration::from_millis(3));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["outcome"], "success");
        assert_eq!(value["reply"]["body"], "hi");
        assert_eq!(value["cookieChanges"]["any"], false);
    }
}
