//! Scripted engine for controller tests
//!
//! Records every capability call and plays back configured outcomes, so the
//! session logic can be exercised without a real browser process.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    BrowserEngine, EngineLauncher, EventReceiver, InputKind, LoadStatus, PageEvent,
};
use crate::error::SessionError;
use crate::proxy::Proxy;

/// What `open_page` should do for one navigation: emit a `LoadFinished` with
/// the given status, or stay silent (lets timeout paths be tested).
pub(crate) type OpenOutcome = Option<LoadStatus>;

pub(crate) struct MockEngine {
    events: mpsc::UnboundedSender<PageEvent>,
    pub open_outcomes: Mutex<VecDeque<OpenOutcome>>,
    /// Error messages `open_page` fails with, one per call, before any event
    pub open_errors: Mutex<VecDeque<String>>,
    /// Event batches emitted during `open_page`, before the load finishes
    pub open_events: Mutex<VecDeque<Vec<PageEvent>>>,
    pub opened_urls: Mutex<Vec<String>>,
    pub applied_proxies: Mutex<Vec<Proxy>>,
    pub aborted: Mutex<Vec<u64>>,
    pub properties: Mutex<Vec<(String, Value)>>,
    pub settings: Mutex<Vec<(String, Value)>>,
    pub injected: Mutex<Vec<PathBuf>>,
    pub inputs: Mutex<Vec<(InputKind, f64, f64)>>,
    pub eval_results: Mutex<VecDeque<Value>>,
    pub eval_scripts: Mutex<Vec<String>>,
    pub rendered: Mutex<Vec<PathBuf>>,
    /// When set, `render` writes the target file (snapshot polling succeeds)
    pub render_writes_file: AtomicBool,
    /// When set, `exit` emits a `ProcessExited` event
    pub exit_emits_event: AtomicBool,
    pub page_closed: AtomicBool,
    pub exited: AtomicBool,
    pub killed: AtomicBool,
}

impl MockEngine {
    pub fn create() -> (Arc<Self>, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            events: tx,
            open_outcomes: Mutex::new(VecDeque::new()),
            open_errors: Mutex::new(VecDeque::new()),
            open_events: Mutex::new(VecDeque::new()),
            opened_urls: Mutex::new(Vec::new()),
            applied_proxies: Mutex::new(Vec::new()),
            aborted: Mutex::new(Vec::new()),
            properties: Mutex::new(Vec::new()),
            settings: Mutex::new(Vec::new()),
            injected: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
            eval_results: Mutex::new(VecDeque::new()),
            eval_scripts: Mutex::new(Vec::new()),
            rendered: Mutex::new(Vec::new()),
            render_writes_file: AtomicBool::new(true),
            exit_emits_event: AtomicBool::new(true),
            page_closed: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            killed: AtomicBool::new(false),
        });
        (engine, rx)
    }

    /// Push events into the page event stream, as the engine would.
    pub fn emit(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }

    pub fn script_open(&self, outcomes: Vec<OpenOutcome>) {
        self.open_outcomes.lock().extend(outcomes);
    }

    pub fn script_eval(&self, results: Vec<Value>) {
        self.eval_results.lock().extend(results);
    }

    pub fn script_open_failure(&self, message: &str) {
        self.open_errors.lock().push_back(message.to_string());
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn open_page(&self, url: &str) -> Result<(), SessionError> {
        if let Some(message) = self.open_errors.lock().pop_front() {
            return Err(SessionError::Engine(message));
        }
        self.opened_urls.lock().push(url.to_string());
        if let Some(batch) = self.open_events.lock().pop_front() {
            for event in batch {
                let _ = self.events.send(event);
            }
        }
        // Default to a successful load when no outcome is scripted
        let outcome = self
            .open_outcomes
            .lock()
            .pop_front()
            .unwrap_or(Some(LoadStatus::Success));
        if let Some(status) = outcome {
            let _ = self.events.send(PageEvent::LoadFinished { status });
        }
        Ok(())
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<(), SessionError> {
        self.properties.lock().push((name.to_string(), value));
        Ok(())
    }

    async fn set_setting(&self, name: &str, value: Value) -> Result<(), SessionError> {
        self.settings.lock().push((name.to_string(), value));
        Ok(())
    }

    async fn set_proxy(&self, proxy: &Proxy) -> Result<(), SessionError> {
        self.applied_proxies.lock().push(proxy.clone());
        Ok(())
    }

    async fn evaluate(&self, script: &str, _args: Vec<Value>) -> Result<Value, SessionError> {
        self.eval_scripts.lock().push(script.to_string());
        Ok(self.eval_results.lock().pop_front().unwrap_or(Value::Null))
    }

    async fn send_input_event(
        &self,
        kind: InputKind,
        x: f64,
        y: f64,
    ) -> Result<(), SessionError> {
        self.inputs.lock().push((kind, x, y));
        Ok(())
    }

    async fn render(&self, path: &Path) -> Result<(), SessionError> {
        self.rendered.lock().push(path.to_path_buf());
        if self.render_writes_file.load(Ordering::Relaxed) {
            std::fs::write(path, b"\x89PNG")?;
        }
        Ok(())
    }

    async fn inject_script(&self, path: &Path) -> Result<(), SessionError> {
        self.injected.lock().push(path.to_path_buf());
        Ok(())
    }

    async fn abort_resource(&self, request_id: u64) -> Result<(), SessionError> {
        self.aborted.lock().push(request_id);
        Ok(())
    }

    async fn close_page(&self) -> Result<(), SessionError> {
        self.page_closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn exit(&self) -> Result<(), SessionError> {
        self.exited.store(true, Ordering::Relaxed);
        if self.exit_emits_event.load(Ordering::Relaxed) {
            let _ = self.events.send(PageEvent::ProcessExited {
                code: Some(0),
                signal: None,
            });
        }
        Ok(())
    }

    async fn kill(&self) -> Result<(), SessionError> {
        self.killed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// One-shot launcher wrapping a prepared mock engine.
pub(crate) struct MockLauncher {
    slot: Mutex<Option<(Arc<MockEngine>, EventReceiver)>>,
}

impl MockLauncher {
    pub fn new() -> (Self, Arc<MockEngine>) {
        let (engine, rx) = MockEngine::create();
        let launcher = Self {
            slot: Mutex::new(Some((engine.clone(), rx))),
        };
        (launcher, engine)
    }
}

#[async_trait]
impl EngineLauncher for MockLauncher {
    async fn launch(&self) -> Result<(Arc<dyn BrowserEngine>, EventReceiver), SessionError> {
        let (engine, rx) = self
            .slot
            .lock()
            .take()
            .ok_or_else(|| SessionError::Engine("mock launcher already consumed".into()))?;
        Ok((engine, rx))
    }
}
