// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! JavaScript runtime using boa_engine
//!
//! Script blocks run as function bodies with the session object as `this`.
//! The [`ScriptEngine`] trait is all the session depends on; [`JsRuntime`]
//! implements it on boa.

mod engine;
mod runtime;

pub use engine::{ScriptEngine, SubRunRequest, TaskId, TaskState};
pub use runtime::{ConsoleLevel, ConsoleMessage, JsRuntime, JsRuntimeConfig};
