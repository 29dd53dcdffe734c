//! Engine event stream types
//!
//! Low-level page events as emitted by the browser engine. The session's
//! event pump consumes these and routes them through the [`EventRouter`].
//!
//! [`EventRouter`]: crate::session::EventRouter

use serde::{Deserialize, Serialize};

/// Outcome reported by a `LoadFinished` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadStatus {
    Success,
    Fail,
}

impl LoadStatus {
    pub fn is_success(self) -> bool {
        matches!(self, LoadStatus::Success)
    }
}

/// A resource request observed before it is issued
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    pub id: u64,
    pub url: String,
}

/// A response (or response stage) observed for a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    pub id: u64,
    /// URL the request was issued for (redirect source)
    pub url: String,
    pub status: Option<u16>,
    /// Explicit redirect target, when the engine reports one
    pub redirect_url: Option<String>,
    /// Raw response headers as (name, value) pairs
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl ResourceResponse {
    /// Look up a response header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A resource load that ended in error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFailure {
    pub id: u64,
    pub url: String,
    pub status: Option<u16>,
    pub text: String,
}

/// Events emitted by the browser engine for one page
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// The main page finished loading (successfully or not)
    LoadFinished { status: LoadStatus },
    /// A top-level navigation is about to happen
    NavigationRequested { url: String },
    /// A resource is about to be requested (main document or subresource)
    ResourceRequested(ResourceRequest),
    /// A resource response arrived
    ResourceReceived(ResourceResponse),
    /// A resource load failed
    ResourceError(ResourceFailure),
    /// A console message from in-page JavaScript
    ConsoleMessage { text: String },
    /// An uncaught in-page script error
    PageError { message: String, trace: Vec<String> },
    /// The engine process exited
    ProcessExited {
        code: Option<i32>,
        signal: Option<String>,
    },
}
