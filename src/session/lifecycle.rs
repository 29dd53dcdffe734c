//! Session lifecycle
//!
//! Page configuration and engine teardown. Configuration is pushed to the
//! engine in a fixed order — timeout and user agent must be in place before
//! any navigation is issued. Teardown races a grace period against the
//! engine's own exit notification and force-terminates on expiry.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::router::RouterState;
use crate::engine::BrowserEngine;
use crate::error::SessionError;

/// Push the session configuration into the engine.
pub(crate) async fn configure_page(
    engine: &Arc<dyn BrowserEngine>,
    config: &SessionConfig,
    user_agent: &str,
    screen_size: (u32, u32),
) -> Result<(), SessionError> {
    engine.set_setting("userAgent", json!(user_agent)).await?;
    engine
        .set_setting("resourceTimeout", json!(config.timeout_secs * 1000))
        .await?;
    engine
        .set_setting("loadImages", json!(config.load_images))
        .await?;
    engine
        .set_setting("ignoreSslErrors", json!(config.ignore_ssl_errors))
        .await?;
    engine
        .set_setting("webSecurityEnabled", json!(config.web_security))
        .await?;

    let (width, height) = screen_size;
    engine
        .set_property("viewportSize", json!({ "width": width, "height": height }))
        .await?;
    if let Some(cookies) = &config.cookies_file {
        engine
            .set_property("cookiesFile", json!(cookies.display().to_string()))
            .await?;
    }

    debug!(
        "Page configured (viewport {}x{}, timeout {}s)",
        width, height, config.timeout_secs
    );
    Ok(())
}

/// Shut the engine down: close the page, request a graceful exit, and race
/// the grace period against the exit notification.
pub(crate) async fn tear_down_engine(
    engine: Arc<dyn BrowserEngine>,
    state: &Arc<Mutex<RouterState>>,
    grace: Duration,
) -> Result<(), SessionError> {
    if let Err(e) = engine.close_page().await {
        warn!("Failed to close page during teardown: {}", e);
    }

    let rx = {
        let mut state = state.lock();
        if state.engine_exited {
            debug!("Engine already exited, teardown is a no-op");
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        state.register_teardown_waiter(tx);
        rx
    };

    if let Err(e) = engine.exit().await {
        warn!("Graceful engine exit request failed: {}", e);
    }

    match tokio::time::timeout(grace, rx).await {
        Ok(Ok((code, signal))) => {
            info!("Engine exited (code: {:?}, signal: {:?})", code, signal);
        }
        Ok(Err(_)) => {
            debug!("Exit notification channel closed before the engine reported");
        }
        Err(_) => {
            warn!("Engine did not exit within {:?}, force-terminating", grace);
            engine.kill().await?;
        }
    }

    Ok(())
}
