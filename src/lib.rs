//! Browser Pilot
//!
//! A headless-browser session controller for scraping pipelines: per-session
//! proxy selection and rotation, navigation with proxy-health-driven retry,
//! redirect tracking, resource filtering, and an async waiter contract over
//! the engine's page event stream.
//!
//! The browser engine itself is an external collaborator, bound through the
//! [`engine::BrowserEngine`] capability trait and started by an
//! [`engine::EngineLauncher`].

pub mod engine;
pub mod error;
pub mod proxy;
pub mod session;

pub use engine::{BrowserEngine, EngineLauncher, EventReceiver, InputKind, LoadStatus, PageEvent};
pub use error::SessionError;
pub use proxy::{
    FailureKind, HealthMonitor, IndicatorLevel, Proxy, ProxyFailure, ProxyIndicator, ProxyPool,
    RotationFn,
};
pub use session::{Session, SessionConfig};

/// Initialize logging for binaries embedding the controller. Filtering
/// defaults to `info` and is overridable through `RUST_LOG`.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    // Embedding applications may have installed their own subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

/// Truncate a string for logging without splitting a UTF-8 character.
pub fn safe_truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
