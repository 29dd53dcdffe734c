//! Controller error types

use thiserror::Error;

use crate::proxy::ProxyFailure;

/// Errors surfaced by the session controller
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Proxy failure: {0}")]
    Proxy(ProxyFailure),

    #[error("No proxy available in the rotation pool")]
    NoProxyAvailable,

    #[error("Page load failed: {url}")]
    PageLoadFailed { url: String },

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Engine process exited (code: {code:?}, signal: {signal:?})")]
    EngineExited {
        code: Option<i32>,
        signal: Option<String>,
    },

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SessionError> for String {
    fn from(err: SessionError) -> String {
        err.to_string()
    }
}
