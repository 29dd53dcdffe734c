//! Browser engine capability
//!
//! The controller never talks to a concrete browser directly. It drives an
//! opaque engine through [`BrowserEngine`] and observes it through the
//! [`PageEvent`] stream handed back by an [`EngineLauncher`]. Historical
//! bindings differed in how they applied proxies and page settings; both are
//! adapters to this same surface, so only the surface is defined here.

mod events;

#[cfg(test)]
pub(crate) mod mock;

pub use events::{LoadStatus, PageEvent, ResourceFailure, ResourceRequest, ResourceResponse};

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::proxy::Proxy;

/// Pointer input kinds the engine can synthesize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Click,
    MouseDown,
    MouseUp,
    MouseMove,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Click => "click",
            InputKind::MouseDown => "mousedown",
            InputKind::MouseUp => "mouseup",
            InputKind::MouseMove => "mousemove",
        }
    }
}

/// The capabilities the controller requires from a browser engine.
///
/// All calls are one page deep: an engine instance owns exactly one page and
/// the process behind it.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Start navigating the page to `url`. Completion is reported through a
    /// `LoadFinished` event, not through this call.
    async fn open_page(&self, url: &str) -> Result<(), SessionError>;

    /// Set a page-level property (viewport size, cookies file, ...).
    async fn set_property(&self, name: &str, value: Value) -> Result<(), SessionError>;

    /// Set an engine setting (user agent, timeouts, SSL handling, ...).
    async fn set_setting(&self, name: &str, value: Value) -> Result<(), SessionError>;

    /// Apply a proxy to the live session.
    async fn set_proxy(&self, proxy: &Proxy) -> Result<(), SessionError>;

    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, SessionError>;

    /// Dispatch a synthetic pointer event at page coordinates.
    async fn send_input_event(&self, kind: InputKind, x: f64, y: f64)
        -> Result<(), SessionError>;

    /// Render the current page to a file.
    async fn render(&self, path: &Path) -> Result<(), SessionError>;

    /// Inject a script file into the page.
    async fn inject_script(&self, path: &Path) -> Result<(), SessionError>;

    /// Abort an in-flight resource request.
    async fn abort_resource(&self, request_id: u64) -> Result<(), SessionError>;

    /// Close the page handle.
    async fn close_page(&self) -> Result<(), SessionError>;

    /// Request a graceful engine exit. The actual exit is reported through a
    /// `ProcessExited` event.
    async fn exit(&self) -> Result<(), SessionError>;

    /// Force-terminate the engine process.
    async fn kill(&self) -> Result<(), SessionError>;
}

/// Receiver half of an engine's event stream
pub type EventReceiver = mpsc::UnboundedReceiver<PageEvent>;

/// Creates engine processes.
///
/// Launching is separated from the engine handle so the controller can be
/// tested against scripted engines and so callers choose the binding.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<(std::sync::Arc<dyn BrowserEngine>, EventReceiver), SessionError>;
}
