// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Script evaluation interface used by the session

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Handle to a script task started on an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// A nested run requested by a script through `this.run(...)`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubRunRequest {
    pub id: u64,
    /// Document text to run
    pub text: String,
    /// Line of the block to run within `text`
    #[serde(default)]
    pub line: usize,
}

/// Progress of a task after the engine has run all queued jobs
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// The task finished with this value (`null` for `undefined`)
    Settled(Value),
    /// The task is waiting on a nested run the host must perform
    SubRun(SubRunRequest),
    /// The task is waiting on something that will never happen
    Stalled,
}

/// Capability-scoped script evaluator
///
/// Every script sees the same session object as `this`. It exposes `data`
/// (the template context), `on`/`off` for event handlers and `run` for
/// nested runs. Scripts never reach the session any other way.
pub trait ScriptEngine {
    /// Clear the template context, handlers and any unfinished tasks
    fn reset(&mut self) -> Result<()>;

    /// Compile `source` as a function body and call it with the session object
    ///
    /// `first_line` is the document line the source starts on; errors raised
    /// by the task carry it.
    fn start_script(&mut self, source: &str, first_line: usize) -> Result<TaskId>;

    /// Evaluate `expression` and return its text form
    ///
    /// Strings are returned as-is, `undefined` as the empty string and any
    /// other value as JSON.
    fn evaluate(&mut self, expression: &str, first_line: usize) -> Result<String>;

    /// Call every handler registered for `event` with `{type, detail}`
    ///
    /// The task settles with the (possibly rewritten) `detail` once every
    /// promise returned by a handler has settled.
    fn emit(&mut self, event: &str, detail: &Value) -> Result<TaskId>;

    /// Run queued jobs and report where `task` stands
    ///
    /// A thrown or rejected task is returned as [`crate::Error::Script`].
    fn poll(&mut self, task: TaskId) -> Result<TaskState>;

    /// Resolve or reject the promise returned by `this.run`
    fn complete_sub_run(&mut self, id: u64, outcome: std::result::Result<Value, String>) -> Result<()>;

    /// Snapshot of `this.data`
    fn template_data(&mut self) -> Result<Value>;
}
