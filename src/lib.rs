// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # Prestige - Request Documents
//!
//! Write HTTP requests in a plain-text document, put the cursor on one and
//! run it. Script blocks above the request prepare template data, register
//! event handlers and can fire nested requests of their own.
//!
//! ## Features
//!
//! - Documents: `###` blocks for requests, `### javascript` for scripts
//! - Templates: `{{name}}` placeholders filled from `this.data`
//! - Expression bodies: a body starting with `=` is evaluated as JavaScript
//! - Scripts: boa_engine, no external runtime
//! - Proxy: calls can be relayed through a Prestige proxy that keeps cookies
//! - Cookie store: merged from proxy replies, serializable to JSON
//!
//! ## Example
//!
//! ```rust,no_run
//! use prestige::{Session, SessionConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(SessionConfig::from_env()?).await?;
//!
//!     let doc = "### javascript\nthis.data.id = 7;\n###\nGET https://api.example.com/items/{{id}}";
//!     let success = session.run_at_cursor(doc, 3).await?;
//!     println!("{:?}", success.reply.status());
//!
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod http;
pub mod js;
pub mod session;
pub mod template;

// Documents
pub use document::{BlockSummary, DocumentParser};

// Errors
pub use error::{Error, ErrorKind, ParseError, Result};

// HTTP
pub use http::{CookieChanges, CookieStore, HttpClient, Reply, RequestSpec, Response};

// JavaScript
pub use js::{JsRuntime, JsRuntimeConfig, ScriptEngine};

// Sessions
pub use session::{ExecutionResult, Session, SessionConfig, SessionEvent, Success};

/// Prestige version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
