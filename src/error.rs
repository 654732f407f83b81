// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for Prestige
//!
//! Every failure of a run is one of four kinds: the document could not be
//! parsed, a user script failed, the transport failed, or the proxy spoke an
//! unexpected protocol. [`Error::kind`] maps each variant onto that taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Prestige operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Prestige
#[derive(Error, Debug)]
pub enum Error {
    /// The document or a template in it is malformed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A user script threw, rejected, or never settled
    #[error("Script error{}: {message}", line_suffix(.line))]
    Script {
        message: String,
        /// First document line of the failing script, 0-based
        line: Option<usize>,
    },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The proxy performed the call and reported a failure
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// The proxy answered the handshake with an unexpected shape or version
    #[error("Proxy protocol mismatch: {0}")]
    Protocol(String),

    /// A run is already in flight on this session
    #[error("There's a request currently pending. Please wait for it to finish.")]
    Busy,

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Conditions raised while turning document text into a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("script block started on line {} is not terminated", .line + 1)]
    UnterminatedScript { line: usize },

    #[error("cursor is inside the script block started on line {}", .line + 1)]
    CursorInScript { line: usize },

    #[error("header name cannot be blank (line {})", .line + 1)]
    BlankHeaderName { line: usize },

    #[error("URL cannot be empty")]
    EmptyUrl,

    #[error("template error on line {}: {reason}", .line + 1)]
    Template { line: usize, reason: String },
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Parse,
    Script,
    Transport,
    Protocol,
    Busy,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Script => "script",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Busy => "busy",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" (block at line {})", l + 1))
        .unwrap_or_default()
}

impl Error {
    /// Create a script error without location
    pub fn script<S: Into<String>>(msg: S) -> Self {
        Error::Script {
            message: msg.into(),
            line: None,
        }
    }

    /// Create a script error for the block starting at `line`
    pub fn script_at<S: Into<String>>(msg: S, line: usize) -> Self {
        Error::Script {
            message: msg.into(),
            line: Some(line),
        }
    }

    /// Create a proxy failure
    pub fn proxy<S: Into<String>>(msg: S) -> Self {
        Error::Proxy(msg.into())
    }

    /// Create a protocol mismatch error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Parse,
            Error::Script { .. } => ErrorKind::Script,
            Error::Http(_) | Error::Proxy(_) | Error::Url(_) => ErrorKind::Transport,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Busy => ErrorKind::Busy,
            Error::Io(_) | Error::Serialization(_) | Error::Config(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Fatal errors end the current run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Protocol(_) | Error::Busy)
    }

    /// Check if this is a busy rejection
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy)
    }

    /// Get the document line this error points at, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Script { line, .. } => *line,
            Error::Parse(ParseError::UnterminatedScript { line })
            | Error::Parse(ParseError::CursorInScript { line })
            | Error::Parse(ParseError::BlankHeaderName { line })
            | Error::Parse(ParseError::Template { line, .. }) => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_kind() {
        let err = Error::from(ParseError::EmptyUrl);
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Parse error: URL cannot be empty");
    }

    #[test]
    fn test_script_error_location() {
        let err = Error::script_at("ReferenceError: nope is not defined", 4);
        assert_eq!(err.kind(), ErrorKind::Script);
        assert_eq!(err.line(), Some(4));
        assert_eq!(
            err.to_string(),
            "Script error (block at line 5): ReferenceError: nope is not defined"
        );
    }

    #[test]
    fn test_non_fatal_errors() {
        assert!(!Error::protocol("version 2").is_fatal());
        assert!(!Error::Busy.is_fatal());
        assert!(Error::Busy.is_busy());
        assert_eq!(Error::proxy("refused").kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_parse_error_lines_are_one_based_in_messages() {
        let err = ParseError::BlankHeaderName { line: 0 };
        assert_eq!(err.to_string(), "header name cannot be blank (line 1)");
        assert_eq!(Error::from(err).line(), Some(0));
    }
}
