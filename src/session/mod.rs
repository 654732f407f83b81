// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Execution sessions
//!
//! A [`Session`] turns a document and a cursor line into an HTTP call:
//! replay the scripts above the cursor, extract the request, let
//! `BeforeExecute` handlers adjust it, send it directly or through the
//! proxy, and merge any cookies that come back.

mod config;
mod result;
#[allow(clippy::module_inception)]
mod session;


pub use config::{SessionConfig, PROXY_URL_ENV, TIMEOUT_ENV};
pub use result::{ExecutionResult, Failure, SessionEvent, Success};
pub use session::{Session, BEFORE_EXECUTE};
