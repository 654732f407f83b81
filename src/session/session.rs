// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Execution session: runs the request under a cursor

use std::cell::{Cell, RefCell};
use std::time::Instant;

use async_recursion::async_recursion;
use serde_json::{Map, Value};

use super::config::SessionConfig;
use super::result::{ExecutionResult, Failure, SessionEvent, Success};
use crate::document::{extract, split_lines, DocumentParser};
use crate::error::{Error, ParseError, Result};
use crate::http::{
    is_local_url, CookieChanges, CookieEntry, CookieMap, CookieStore, HttpClient, Reply,
    RequestSpec,
};
use crate::js::{JsRuntime, ScriptEngine, TaskId, TaskState};

/// Event emitted to script handlers before a top-level run sends its request
pub const BEFORE_EXECUTE: &str = "BeforeExecute";

type Observer = Box<dyn Fn(&SessionEvent)>;

/// How a run was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// `run_at_cursor`: fresh script state, `BeforeExecute` emitted
    Top,
    /// `run_block`: script state kept, no event
    Block,
    /// `this.run(...)` from a script, inside another run
    Nested,
    /// `compile`: fresh script state, nothing sent
    Compile,
}

impl Mode {
    fn resets_scripts(self) -> bool {
        matches!(self, Mode::Top | Mode::Compile)
    }
}

/// A request-document session
///
/// Owns the template context and handlers (inside the script engine), the
/// cookie store and the last result. One top-level run may be in flight at
/// a time; the session is single-threaded and meant to be driven from a
/// current-thread executor.
pub struct Session {
    client: HttpClient,
    /// Proxy confirmed by the handshake at startup
    proxy: Option<String>,
    engine: RefCell<Option<Box<dyn ScriptEngine>>>,
    cookies: RefCell<CookieStore>,
    result: RefCell<Option<ExecutionResult>>,
    loading: Cell<bool>,
    observers: RefCell<Vec<Observer>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("proxy", &self.proxy)
            .field("loading", &self.loading.get())
            .field("cookies", &self.cookies.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session with a boa script engine
    ///
    /// A configured proxy is checked here; if it is unreachable or speaks
    /// another protocol version it is disabled for the life of the session.
    pub async fn new(config: SessionConfig) -> Result<Self> {
        let engine = JsRuntime::new(config.script.clone())?;
        Self::with_engine(config, Box::new(engine)).await
    }

    /// Create a session around an existing script engine
    pub async fn with_engine(config: SessionConfig, engine: Box<dyn ScriptEngine>) -> Result<Self> {
        let client = HttpClient::with_config(config.http_config())?;

        let proxy = match &config.proxy {
            None => {
                tracing::info!("No proxy set");
                None
            }
            Some(proxy) => match client.check_proxy(proxy).await {
                Ok(()) => {
                    tracing::info!(proxy = %proxy, "Proxy available");
                    Some(proxy.clone())
                }
                Err(e) => {
                    tracing::warn!(proxy = %proxy, error = %e, "No proxy available, calls will be made directly");
                    None
                }
            },
        };

        Ok(Self {
            client,
            proxy,
            engine: RefCell::new(Some(engine)),
            cookies: RefCell::new(CookieStore::new()),
            result: RefCell::new(None),
            loading: Cell::new(false),
            observers: RefCell::new(Vec::new()),
        })
    }

    /// Run the request block under `cursor_line`
    ///
    /// Script state is reset first, every script block above the target is
    /// replayed, and `BeforeExecute` handlers may rewrite the request before
    /// it is sent. Fails with [`Error::Busy`] while another run is in flight.
    pub async fn run_at_cursor(&self, text: &str, cursor_line: usize) -> Result<Success> {
        let _loading = self.begin()?;
        let mut lease = EngineLease::take(&self.engine)?;
        self.execute(lease.engine()?, text, cursor_line, Mode::Top).await
    }

    /// Run the block at `block_line` without resetting script state
    pub async fn run_block(&self, text: &str, block_line: usize) -> Result<Success> {
        let _loading = self.begin()?;
        let mut lease = EngineLease::take(&self.engine)?;
        self.execute(lease.engine()?, text, block_line, Mode::Block).await
    }

    /// Build the request under `cursor_line` without sending it
    ///
    /// Scripts are replayed as for [`Session::run_at_cursor`]; a script that
    /// asks for a nested run fails, since that would send a request.
    pub async fn compile(&self, text: &str, cursor_line: usize) -> Result<RequestSpec> {
        let mut lease = EngineLease::take(&self.engine)?;
        self.prepare(lease.engine()?, text, cursor_line, Mode::Compile)
            .await
    }

    /// Whether a top-level run is in flight
    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// Proxy in use, if the handshake succeeded
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Result of the most recent run
    pub fn result(&self) -> Option<ExecutionResult> {
        self.result.borrow().clone()
    }

    /// Snapshot of the cookie store
    pub fn cookies(&self) -> CookieStore {
        self.cookies.borrow().clone()
    }

    /// Replace the cookie store, e.g. with one loaded from disk
    pub fn replace_cookies(&self, store: CookieStore) {
        let changes = CookieChanges {
            added: store.len(),
            removed: self.cookies.borrow().len(),
            ..CookieChanges::default()
        };
        *self.cookies.borrow_mut() = store;
        self.cookies_changed(changes);
    }

    /// Drop every cookie
    pub fn clear_cookies(&self) {
        let removed = self.cookies.borrow().len();
        self.cookies.borrow_mut().clear();
        self.cookies_changed(CookieChanges {
            removed,
            ..CookieChanges::default()
        });
    }

    /// Remove one cookie
    pub fn remove_cookie(&self, domain: &str, path: &str, name: &str) -> Option<CookieEntry> {
        let removed = self.cookies.borrow_mut().remove(domain, path, name);
        if removed.is_some() {
            self.cookies_changed(CookieChanges {
                removed: 1,
                ..CookieChanges::default()
            });
        }
        removed
    }

    /// Call `observer` after every state change
    pub fn subscribe(&self, observer: impl Fn(&SessionEvent) + 'static) {
        self.observers.borrow_mut().push(Box::new(observer));
    }

    fn notify(&self, event: SessionEvent) {
        for observer in self.observers.borrow().iter() {
            observer(&event);
        }
    }

    fn cookies_changed(&self, mut changes: CookieChanges) {
        changes.any = changes.added + changes.modified + changes.removed > 0;
        if changes.any {
            self.notify(SessionEvent::CookiesChanged(changes));
        }
    }

    /// Enter the loading state
    fn begin(&self) -> Result<LoadingGuard<'_>> {
        if self.loading.replace(true) {
            return Err(Error::Busy);
        }
        self.notify(SessionEvent::LoadingChanged(true));
        Ok(LoadingGuard { session: self })
    }

    /// Run the whole pipeline and record its outcome
    async fn execute(
        &self,
        engine: &mut dyn ScriptEngine,
        text: &str,
        line: usize,
        mode: Mode,
    ) -> Result<Success> {
        let start = Instant::now();
        let mut request = None;
        let outcome = self.pipeline(engine, text, line, mode, &mut request).await;
        let time_taken = start.elapsed();

        let (result, returned) = match outcome {
            Ok((request, reply, cookies)) => {
                let cookie_changes = match &cookies {
                    Some(incoming) => {
                        let changes = self.cookies.borrow_mut().merge(incoming);
                        self.cookies_changed(changes);
                        changes
                    }
                    None => CookieChanges::default(),
                };
                tracing::info!(
                    method = %request.method,
                    url = %request.url,
                    status = reply.status(),
                    proxied = reply.proxy().is_some(),
                    time_ms = time_taken.as_millis() as u64,
                    "Request finished"
                );
                let success = Success {
                    reply,
                    cookies,
                    cookie_changes,
                    request,
                    time_taken,
                };
                (ExecutionResult::Success(success.clone()), Ok(success))
            }
            Err(e) => {
                tracing::warn!(
                    kind = %e.kind(),
                    error = %e,
                    time_ms = time_taken.as_millis() as u64,
                    "Run failed"
                );
                (
                    ExecutionResult::Failure(Failure::new(&e, request, time_taken)),
                    Err(e),
                )
            }
        };

        *self.result.borrow_mut() = Some(result);
        self.notify(SessionEvent::ResultChanged);
        returned
    }

    async fn pipeline(
        &self,
        engine: &mut dyn ScriptEngine,
        text: &str,
        line: usize,
        mode: Mode,
        request: &mut Option<RequestSpec>,
    ) -> Result<(RequestSpec, Reply, Option<CookieMap>)> {
        let mut spec = self.prepare(engine, text, line, mode).await?;
        *request = Some(spec.clone());

        if mode == Mode::Top {
            spec = self.before_execute(engine, spec).await?;
            *request = Some(spec.clone());
        }

        let (reply, cookies) = self.send(&spec).await?;
        Ok((spec, reply, cookies))
    }

    /// Replay scripts above `line` and extract the request there
    async fn prepare(
        &self,
        engine: &mut dyn ScriptEngine,
        text: &str,
        line: usize,
        mode: Mode,
    ) -> Result<RequestSpec> {
        let lines = split_lines(text);
        let plan = DocumentParser::plan(&lines, line);

        if mode.resets_scripts() {
            engine.reset()?;
        }

        for script in &plan.scripts {
            tracing::debug!(line = script.start_line, "Replaying script block");
            let task = engine.start_script(&script.source, script.start_line)?;
            self.drive(engine, task, mode).await?;
        }

        let block = plan.target.into_block()?;
        let data = engine.template_data()?;
        extract(&block, &data, engine)
    }

    /// Let `BeforeExecute` handlers see and rewrite the request
    async fn before_execute(
        &self,
        engine: &mut dyn ScriptEngine,
        request: RequestSpec,
    ) -> Result<RequestSpec> {
        let mut detail = Map::new();
        detail.insert("request".to_string(), serde_json::to_value(&request)?);

        let task = engine.emit(BEFORE_EXECUTE, &Value::Object(detail))?;
        let detail = self.drive(engine, task, Mode::Top).await?;

        let request = match detail.get("request") {
            Some(value) => serde_json::from_value::<RequestSpec>(value.clone()).map_err(|e| {
                Error::script(format!("{} handler left an invalid request: {}", BEFORE_EXECUTE, e))
            })?,
            None => request,
        };
        if request.url.is_empty() {
            return Err(ParseError::EmptyUrl.into());
        }
        Ok(request)
    }

    /// Drive a script task to completion, serving nested runs it asks for
    #[async_recursion(?Send)]
    async fn drive(&self, engine: &mut dyn ScriptEngine, task: TaskId, mode: Mode) -> Result<Value> {
        loop {
            match engine.poll(task)? {
                TaskState::Settled(value) => return Ok(value),
                TaskState::Stalled => {
                    return Err(Error::script(
                        "script is awaiting a promise that can never settle",
                    ))
                }
                TaskState::SubRun(request) => {
                    tracing::debug!(line = request.line, "Nested run requested by script");
                    let outcome = if mode == Mode::Compile {
                        Err("nested runs are not available while compiling".to_string())
                    } else {
                        self.execute(engine, &request.text, request.line, Mode::Nested)
                            .await
                            .and_then(|success| serde_json::to_value(&success).map_err(Error::from))
                            .map_err(|e| e.to_string())
                    };
                    engine.complete_sub_run(request.id, outcome)?;
                }
            }
        }
    }

    /// Choose the transport and send
    async fn send(&self, request: &RequestSpec) -> Result<(Reply, Option<CookieMap>)> {
        match self.route(&request.url) {
            Some(proxy) => {
                tracing::debug!(method = %request.method, url = %request.url, proxy = %proxy, "Sending via proxy");
                let snapshot = self.cookies.borrow().clone();
                let outcome = self
                    .client
                    .fetch_via_proxy(proxy, request, &snapshot)
                    .await?;
                Ok((outcome.reply, outcome.cookies))
            }
            None => {
                tracing::debug!(method = %request.method, url = %request.url, "Sending directly");
                Ok((Reply::Direct(self.client.fetch(request).await?), None))
            }
        }
    }

    /// Local targets go direct; anything else uses the proxy when there is one
    fn route(&self, url: &str) -> Option<&str> {
        if is_local_url(url) {
            None
        } else {
            self.proxy.as_deref()
        }
    }
}

/// Clears the loading flag when a top-level run ends, however it ends
struct LoadingGuard<'s> {
    session: &'s Session,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.loading.set(false);
        self.session.notify(SessionEvent::LoadingChanged(false));
    }
}

/// Exclusive use of the session's script engine; returned on drop
struct EngineLease<'s> {
    slot: &'s RefCell<Option<Box<dyn ScriptEngine>>>,
    engine: Option<Box<dyn ScriptEngine>>,
}

impl<'s> EngineLease<'s> {
    fn take(slot: &'s RefCell<Option<Box<dyn ScriptEngine>>>) -> Result<Self> {
        let engine = slot.borrow_mut().take().ok_or(Error::Busy)?;
        Ok(Self {
            slot,
            engine: Some(engine),
        })
    }

    fn engine(&mut self) -> Result<&mut (dyn ScriptEngine + 'static)> {
        self.engine.as_deref_mut().ok_or(Error::Busy)
    }
}

impl Drop for EngineLease<'_> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            *self.slot.borrow_mut() = Some(engine);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::JsRuntimeConfig;

    fn slot() -> RefCell<Option<Box<dyn ScriptEngine>>> {
        RefCell::new(Some(Box::new(JsRuntime::new(JsRuntimeConfig::default()).unwrap())))
    }

    #[test]
    fn test_engine_lease_is_exclusive_and_returned() {
        let slot = slot();
        {
            let mut lease = EngineLease::take(&slot).unwrap();
            assert!(slot.borrow().is_none());
            assert!(matches!(EngineLease::take(&slot), Err(Error::Busy)));

            let engine = lease.engine().unwrap();
            engine.reset().unwrap();
            assert_eq!(engine.evaluate("1 + 2", 0).unwrap(), "3");
        }
        assert!(slot.borrow().is_some());
        assert!(EngineLease::take(&slot).is_ok());
    }
}
