// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! JavaScript runtime implementation using boa_engine

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use base64::Engine as _;
use boa_engine::context::ContextBuilder;
use boa_engine::job::{FutureJob, JobQueue, NativeJob};
use boa_engine::{
    js_string, Context, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue,
    NativeFunction, Source,
};
use serde::Deserialize;
use serde_json::Value;

use super::engine::{ScriptEngine, SubRunRequest, TaskId, TaskState};
use crate::error::{Error, Result};

const PRELUDE: &str = include_str!("prelude.js");

/// JavaScript runtime configuration
#[derive(Debug, Clone)]
pub struct JsRuntimeConfig {
    /// Maximum iterations of any single loop
    pub loop_iteration_limit: u64,
    /// Maximum call depth
    pub recursion_limit: usize,
    /// Forward `console` output to tracing
    pub forward_console: bool,
}

impl Default for JsRuntimeConfig {
    fn default() -> Self {
        Self {
            loop_iteration_limit: 10_000_000,
            recursion_limit: 512,
            forward_console: true,
        }
    }
}

/// Console message captured from a script
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub message: String,
}

/// Console log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

#[derive(Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
enum PollReport {
    Pending,
    Fulfilled {
        #[serde(default)]
        value: Value,
    },
    Rejected {
        error: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EvaluateReport {
    Body { body: String },
    Failed { error: String },
}

/// boa-backed [`ScriptEngine`]
///
/// One runtime holds one JS realm for the lifetime of a session. Script
/// state lives in the realm; [`ScriptEngine::reset`] clears it between runs.
pub struct JsRuntime {
    context: Context,
    host: JsObject,
    config: JsRuntimeConfig,
    /// First document line of each live task, for error reporting
    task_lines: HashMap<TaskId, usize>,
    console: Vec<ConsoleMessage>,
}

impl std::fmt::Debug for JsRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsRuntime")
            .field("config", &self.config)
            .field("live_tasks", &self.task_lines.len())
            .finish_non_exhaustive()
    }
}

impl JsRuntime {
    /// Create a new JavaScript runtime
    pub fn new(config: JsRuntimeConfig) -> Result<Self> {
        let mut context = ContextBuilder::new()
            .job_queue(Rc::new(QueuedJobs::default()))
            .build()
            .map_err(|e| Error::script(format!("Failed to create JS context: {}", e)))?;

        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(config.loop_iteration_limit);
        context
            .runtime_limits_mut()
            .set_recursion_limit(config.recursion_limit);

        Self::install_base64(&mut context)?;

        let host = context
            .eval(Source::from_bytes(PRELUDE))
            .map_err(|e| Error::script(format!("Failed to install session object: {}", e)))?
            .as_object()
            .cloned()
            .ok_or_else(|| Error::script("session prelude did not produce an object"))?;

        Ok(Self {
            context,
            host,
            config,
            task_lines: HashMap::new(),
            console: Vec::new(),
        })
    }

    /// Get console output captured so far
    pub fn console_output(&self) -> &[ConsoleMessage] {
        &self.console
    }

    /// Clear console output
    pub fn clear_console(&mut self) {
        self.console.clear();
    }

    /// `btoa`/`atob` over UTF-8 text
    fn install_base64(context: &mut Context) -> Result<()> {
        context
            .register_global_builtin_callable(js_string!("btoa"), 1, NativeFunction::from_fn_ptr(btoa))
            .map_err(|e| Error::script(format!("Failed to register btoa: {}", e)))?;
        context
            .register_global_builtin_callable(js_string!("atob"), 1, NativeFunction::from_fn_ptr(atob))
            .map_err(|e| Error::script(format!("Failed to register atob: {}", e)))?;
        Ok(())
    }

    /// Call a bridge function from the prelude
    fn call_host(&mut self, name: &str, args: &[JsValue]) -> JsResult<JsValue> {
        let function = self.host.get(JsString::from(name), &mut self.context)?;
        let function = function.as_object().cloned().ok_or_else(|| {
            JsError::from(JsNativeError::typ().with_message(format!("bridge function {} is missing", name)))
        })?;
        let this = JsValue::from(self.host.clone());
        let result = function.call(&this, args, &mut self.context);
        self.context.run_jobs();
        result
    }

    /// Call a bridge function that answers with JSON text
    fn call_host_json<T: serde::de::DeserializeOwned>(&mut self, name: &str, args: &[JsValue]) -> Result<T> {
        let value = self
            .call_host(name, args)
            .map_err(|e| Error::script(e.to_string()))?;
        let text = self.text(&value)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn text(&mut self, value: &JsValue) -> Result<String> {
        value
            .to_string(&mut self.context)
            .map(|s| s.to_std_string_escaped())
            .map_err(|e| Error::script(e.to_string()))
    }

    /// Compile `body` as a function expression
    fn compile(&mut self, body: &str, first_line: usize) -> Result<JsValue> {
        let wrapped = format!("(function () {{\n{}\n}})", body);
        self.context
            .eval(Source::from_bytes(&wrapped))
            .map_err(|e| Error::script_at(e.to_string(), first_line))
    }

    fn task_id(&self, value: &JsValue) -> Result<TaskId> {
        value
            .as_number()
            .filter(|n| n.is_finite() && *n >= 1.0)
            .map(|n| TaskId(n as u64))
            .ok_or_else(|| Error::script("bridge returned an invalid task id"))
    }

    fn forward_console(&mut self) {
        let Ok(messages) = self.call_host_json::<Vec<ConsoleMessage>>("drainConsole", &[]) else {
            return;
        };
        for message in messages {
            if self.config.forward_console {
                match message.level {
                    ConsoleLevel::Error => tracing::error!(target: "prestige::script", "{}", message.message),
                    ConsoleLevel::Warn => tracing::warn!(target: "prestige::script", "{}", message.message),
                    ConsoleLevel::Debug => tracing::debug!(target: "prestige::script", "{}", message.message),
                    ConsoleLevel::Log | ConsoleLevel::Info => {
                        tracing::info!(target: "prestige::script", "{}", message.message)
                    }
                }
            }
            self.console.push(message);
        }
    }
}

impl ScriptEngine for JsRuntime {
    fn reset(&mut self) -> Result<()> {
        self.call_host("reset", &[])
            .map_err(|e| Error::script(e.to_string()))?;
        self.task_lines.clear();
        self.clear_console();
        Ok(())
    }

    fn start_script(&mut self, source: &str, first_line: usize) -> Result<TaskId> {
        let function = self.compile(source, first_line)?;
        let id = self
            .call_host("start", &[function])
            .map_err(|e| Error::script_at(e.to_string(), first_line))?;
        let id = self.task_id(&id)?;
        self.task_lines.insert(id, first_line);
        self.forward_console();
        Ok(id)
    }

    fn evaluate(&mut self, expression: &str, first_line: usize) -> Result<String> {
        let function = self.compile(&format!("return (\n{}\n);", expression), first_line)?;
        let report = self
            .call_host("evaluate", &[function])
            .map_err(|e| Error::script_at(e.to_string(), first_line))?;
        let report = self.text(&report)?;
        self.forward_console();
        match serde_json::from_str(&report)? {
            EvaluateReport::Body { body } => Ok(body),
            EvaluateReport::Failed { error } => Err(Error::script_at(error, first_line)),
        }
    }

    fn emit(&mut self, event: &str, detail: &Value) -> Result<TaskId> {
        let args = [
            JsValue::from(JsString::from(event)),
            JsValue::from(JsString::from(detail.to_string().as_str())),
        ];
        let id = self
            .call_host("emit", &args)
            .map_err(|e| Error::script(e.to_string()))?;
        let id = self.task_id(&id)?;
        self.forward_console();
        Ok(id)
    }

    fn poll(&mut self, task: TaskId) -> Result<TaskState> {
        self.context.run_jobs();
        let report: PollReport = self.call_host_json("poll", &[JsValue::from(task.0 as f64)])?;
        self.forward_console();

        match report {
            PollReport::Fulfilled { value } => {
                self.task_lines.remove(&task);
                Ok(TaskState::Settled(value))
            }
            PollReport::Rejected { error } => Err(match self.task_lines.remove(&task) {
                Some(line) => Error::script_at(error, line),
                None => Error::script(error),
            }),
            PollReport::Pending => {
                let request: Option<SubRunRequest> = self.call_host_json("nextSubRun", &[])?;
                Ok(request.map_or(TaskState::Stalled, TaskState::SubRun))
            }
        }
    }

    fn complete_sub_run(&mut self, id: u64, outcome: std::result::Result<Value, String>) -> Result<()> {
        let (ok, payload) = match outcome {
            Ok(value) => (true, value.to_string()),
            Err(message) => (false, message),
        };
        let args = [
            JsValue::from(id as f64),
            JsValue::from(ok),
            JsValue::from(JsString::from(payload.as_str())),
        ];
        self.call_host("settleSubRun", &args)
            .map_err(|e| Error::script(e.to_string()))?;
        Ok(())
    }

    fn template_data(&mut self) -> Result<Value> {
        self.call_host_json("data", &[])
    }
}

fn string_arg(args: &[JsValue], context: &mut Context) -> JsResult<String> {
    Ok(args
        .first()
        .map(|v| v.to_string(context))
        .transpose()?
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default())
}

fn btoa(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let text = string_arg(args, context)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    Ok(JsValue::from(JsString::from(encoded.as_str())))
}

fn atob(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let text = string_arg(args, context)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| JsNativeError::typ().with_message(format!("atob: {}", e)))?;
    Ok(JsValue::from(JsString::from(
        String::from_utf8_lossy(&decoded).as_ref(),
    )))
}

/// Promise job queue driven by [`JsRuntime::poll`]
#[derive(Default)]
struct QueuedJobs(RefCell<VecDeque<NativeJob>>);

impl JobQueue for QueuedJobs {
    fn enqueue_promise_job(&self, job: NativeJob, _context: &mut Context) {
        self.0.borrow_mut().push_back(job);
    }

    fn enqueue_future_job(&self, future: FutureJob, context: &mut Context) {
        let job = futures::executor::block_on(future);
        self.enqueue_promise_job(job, context);
    }

    fn run_jobs(&self, context: &mut Context) {
        loop {
            let Some(job) = self.0.borrow_mut().pop_front() else {
                break;
            };
            if let Err(e) = job.call(context) {
                tracing::warn!(error = %e, "Promise job failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn runtime() -> JsRuntime {
        JsRuntime::new(JsRuntimeConfig::default()).unwrap()
    }

    fn settle(rt: &mut JsRuntime, task: TaskId) -> Value {
        match rt.poll(task).unwrap() {
            TaskState::Settled(value) => value,
            other => panic!("task did not settle: {:?}", other),
        }
    }

    #[test]
    fn test_scripts_mutate_data() {
        let mut rt = runtime();
        let task = rt.start_script("this.data.host = 'api.test';\nthis.data.n = 1 + 1;", 3).unwrap();
        settle(&mut rt, task);
        assert_eq!(rt.template_data().unwrap(), json!({"host": "api.test", "n": 2}));

        rt.reset().unwrap();
        assert_eq!(rt.template_data().unwrap(), json!({}));
    }

    #[test]
    fn test_async_script_is_awaited() {
        let mut rt = runtime();
        let task = rt
            .start_script(
                "const self = this;\nreturn Promise.resolve(1).then(v => { self.data.v = v + 1; return 'done'; });",
                0,
            )
            .unwrap();
        assert_eq!(settle(&mut rt, task), json!("done"));
        assert_eq!(rt.template_data().unwrap()["v"], json!(2));
    }

    #[test]
    fn test_async_function_body() {
        let mut rt = runtime();
        let task = rt
            .start_script("return (async () => { await null; this.data.a = 1; })();", 0)
            .unwrap();
        assert_eq!(settle(&mut rt, task), Value::Null);
        assert_eq!(rt.template_data().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_throw_carries_block_line() {
        let mut rt = runtime();
        let task = rt.start_script("this.data.before = true;\nthrow new Error('boom');", 7).unwrap();
        let err = rt.poll(task).unwrap_err();
        assert!(matches!(err, Error::Script { ref message, line: Some(7) } if message == "Error: boom"));
        // Mutations made before the throw stay.
        assert_eq!(rt.template_data().unwrap(), json!({"before": true}));
    }

    #[test]
    fn test_rejection_is_a_script_error() {
        let mut rt = runtime();
        let task = rt.start_script("return Promise.reject(new TypeError('nope'));", 2).unwrap();
        assert!(matches!(
            rt.poll(task),
            Err(Error::Script { ref message, line: Some(2) }) if message == "TypeError: nope"
        ));
    }

    #[test]
    fn test_syntax_error() {
        let mut rt = runtime();
        assert!(matches!(
            rt.start_script("this.data = {", 4),
            Err(Error::Script { line: Some(4), .. })
        ));
    }

    #[test]
    fn test_never_settling_promise_stalls() {
        let mut rt = runtime();
        let task = rt.start_script("return new Promise(() => {});", 0).unwrap();
        assert_eq!(rt.poll(task).unwrap(), TaskState::Stalled);
    }

    #[test]
    fn test_evaluate() {
        let mut rt = runtime();
        assert_eq!(rt.evaluate("1+1", 0).unwrap(), "2");
        assert_eq!(rt.evaluate("{a:1}", 0).unwrap(), "{\"a\":1}");
        assert_eq!(rt.evaluate("'text'", 0).unwrap(), "text");
        assert_eq!(rt.evaluate("undefined", 0).unwrap(), "");
        assert!(matches!(rt.evaluate("missing.x", 5), Err(Error::Script { line: Some(5), .. })));

        let task = rt.start_script("this.data.id = 9;", 0).unwrap();
        settle(&mut rt, task);
        assert_eq!(rt.evaluate("{id: this.data.id}", 0).unwrap(), "{\"id\":9}");
    }

    #[test]
    fn test_handlers_rewrite_event_detail() {
        let mut rt = runtime();
        let task = rt
            .start_script(
                "this.on('BeforeExecute', e => { e.detail.request.headers.push(['X-Sync', '1']); });\n\
                 this.on('BeforeExecute', async e => { await null; e.detail.request.method = 'POST'; });",
                0,
            )
            .unwrap();
        settle(&mut rt, task);

        let task = rt
            .emit("BeforeExecute", &json!({"request": {"method": "GET", "url": "http://x", "headers": []}}))
            .unwrap();
        let detail = settle(&mut rt, task);
        assert_eq!(detail["request"]["method"], "POST");
        assert_eq!(detail["request"]["headers"], json!([["X-Sync", "1"]]));
    }

    #[test]
    fn test_off_and_reset_remove_handlers() {
        let mut rt = runtime();
        let task = rt
            .start_script(
                "const f = e => { e.detail.hits += 1; };\nthis.on('Ping', f);\nthis.on('Ping', e => { e.detail.hits += 10; });\nthis.off('Ping', f);",
                0,
            )
            .unwrap();
        settle(&mut rt, task);

        let task = rt.emit("Ping", &json!({"hits": 0})).unwrap();
        assert_eq!(settle(&mut rt, task), json!({"hits": 10}));

        rt.reset().unwrap();
        let task = rt.emit("Ping", &json!({"hits": 0})).unwrap();
        assert_eq!(settle(&mut rt, task), json!({"hits": 0}));
    }

    #[test]
    fn test_sub_run_round_trip() {
        let mut rt = runtime();
        let task = rt
            .start_script(
                "return this.run(['GET http://x/a'], 0).then(r => { this.data.status = r.status; });",
                0,
            )
            .unwrap();

        let request = match rt.poll(task).unwrap() {
            TaskState::SubRun(request) => request,
            other => panic!("expected a sub-run, got {:?}", other),
        };
        assert_eq!(request.text, "GET http://x/a");
        assert_eq!(request.line, 0);

        rt.complete_sub_run(request.id, Ok(json!({"status": 204}))).unwrap();
        settle(&mut rt, task);
        assert_eq!(rt.template_data().unwrap(), json!({"status": 204}));
    }

    #[test]
    fn test_expression_runs_are_rejected_not_queued() {
        let mut rt = runtime();
        let body = rt
            .evaluate(
                "(this.run('GET http://x/stale').catch(e => { this.data.err = e.message; }), 'body')",
                3,
            )
            .unwrap();
        assert_eq!(body, "body");
        assert_eq!(
            rt.template_data().unwrap()["err"],
            json!("nested runs are not available in expression bodies")
        );

        // A later script waiting on its own run only sees that run.
        let task = rt.start_script("return this.run('GET http://x/fresh');", 5).unwrap();
        let TaskState::SubRun(request) = rt.poll(task).unwrap() else {
            panic!("expected a sub-run");
        };
        assert_eq!(request.text, "GET http://x/fresh");
    }

    #[test]
    fn test_failed_sub_run_rejects() {
        let mut rt = runtime();
        let task = rt.start_script("return this.run('GET http://x');", 1).unwrap();
        let TaskState::SubRun(request) = rt.poll(task).unwrap() else {
            panic!("expected a sub-run");
        };
        rt.complete_sub_run(request.id, Err("Proxy error: refused".into())).unwrap();
        assert!(matches!(
            rt.poll(task),
            Err(Error::Script { ref message, .. }) if message == "Error: Proxy error: refused"
        ));
    }

    #[test]
    fn test_base64_helpers() {
        let mut rt = runtime();
        assert_eq!(rt.evaluate("btoa('user:pass')", 0).unwrap(), "dXNlcjpwYXNz");
        assert_eq!(rt.evaluate("atob('dXNlcjpwYXNz')", 0).unwrap(), "user:pass");
        assert_eq!(
            rt.evaluate("this.authHeader('user', 'pass')", 0).unwrap(),
            "Authorization: Basic dXNlcjpwYXNz"
        );
    }

    #[test]
    fn test_console_is_captured() {
        let mut rt = runtime();
        let task = rt.start_script("console.log('hello', {a: 1});\nconsole.warn('careful');", 0).unwrap();
        settle(&mut rt, task);
        assert_eq!(
            rt.console_output(),
            &[
                ConsoleMessage { level: ConsoleLevel::Log, message: "hello {\"a\":1}".into() },
                ConsoleMessage { level: ConsoleLevel::Warn, message: "careful".into() },
            ]
        );
    }

    #[test]
    fn test_runaway_loop_is_stopped() {
        let mut rt = JsRuntime::new(JsRuntimeConfig {
            loop_iteration_limit: 1_000,
            ..JsRuntimeConfig::default()
        })
        .unwrap();
        let outcome = rt.start_script("while (true) {}", 0).and_then(|task| rt.poll(task));
        assert!(matches!(outcome, Err(Error::Script { .. })));
    }
}
