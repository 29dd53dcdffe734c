//! Browser session control
//!
//! One [`Session`] owns one engine page: its configuration, its proxy
//! rotation state, and the event routing that turns engine callbacks into
//! the async contract exposed to the extraction layer (`goto`,
//! `wait_for_navigation`, `wait_for_matching_request`, `evaluate`, ...).

mod config;
mod input;
mod lifecycle;
mod router;

pub use config::{SessionConfig, DEFAULT_TEARDOWN_GRACE_MS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use router::{resource_allowed, EventRouter, NavSignal, RedirectChain, RouterState, CONSOLE_DIAG_TAG};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::engine::{BrowserEngine, EngineLauncher, InputKind, PageEvent};
use crate::error::SessionError;
use crate::proxy::{HealthMonitor, Proxy, ProxyFailure, ProxyPool};

/// The error a `goto` ends with once no proxy candidate is left: the last
/// recorded proxy failure when an indicator condemned the final attempt,
/// otherwise a plain load failure for the URL.
fn terminal_load_error(url: &str, last_failure: Option<ProxyFailure>) -> SessionError {
    match last_failure {
        Some(failure) => SessionError::Proxy(failure),
        None => SessionError::PageLoadFailed {
            url: url.to_string(),
        },
    }
}

/// A live browser session.
///
/// Created by [`Session::prepare`], torn down by [`Session::tear_down`] (or
/// implicitly when the engine process dies). All methods take `&self`; state
/// mutations are serialized behind the session's internal locks.
pub struct Session {
    config: SessionConfig,
    engine: RwLock<Option<Arc<dyn BrowserEngine>>>,
    state: Arc<Mutex<RouterState>>,
    pool: Mutex<ProxyPool>,
    current_proxy: Mutex<Option<Proxy>>,
    /// Cleared when the engine disconnects or the session is torn down
    alive: Arc<AtomicBool>,
    user_agent: String,
    screen_size: (u32, u32),
}

impl Session {
    /// Create the engine process and page, configure it, wire the event
    /// router, rotate to an initial proxy, and (when an initial URL is
    /// configured) perform the first navigation.
    pub async fn prepare(
        config: SessionConfig,
        launcher: &dyn EngineLauncher,
    ) -> Result<Arc<Self>, SessionError> {
        let user_agent = config.sample_user_agent();
        let screen_size = config.sample_screen_size();

        let (engine, mut events) = launcher.launch().await?;
        info!(
            "Session starting (viewport {}x{}, {} proxies configured)",
            screen_size.0,
            screen_size.1,
            config.proxies.len()
        );

        // Timeout and user agent must be applied before any navigation
        lifecycle::configure_page(&engine, &config, &user_agent, screen_size).await?;

        let state = Arc::new(Mutex::new(RouterState::new(HealthMonitor::new(
            config.indicators.clone(),
        ))));
        let router = EventRouter::new(
            state.clone(),
            engine.clone(),
            config.allowed_resources.clone(),
            config.denied_resources.clone(),
        );

        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_pump = alive.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let exited = matches!(event, PageEvent::ProcessExited { .. });
                router.dispatch(event).await;
                if exited {
                    break;
                }
            }
            debug!("Engine event stream ended");
            alive_for_pump.store(false, Ordering::Relaxed);
        });

        let session = Arc::new(Self {
            pool: Mutex::new(ProxyPool::new(config.proxies.clone(), config.rotation.clone())),
            engine: RwLock::new(Some(engine)),
            state,
            current_proxy: Mutex::new(None),
            alive,
            user_agent,
            screen_size,
            config,
        });

        // Initial proxy rotation; a single configured proxy is applied as-is
        let initial = session.pool.lock().rotate(None)?;
        if let Some(proxy) = initial {
            session.set_proxy(&proxy).await?;
        }

        if let Some(url) = session.config.initial_url.clone() {
            session.goto(&url).await?;
        }

        Ok(session)
    }

    /// Whether the engine is still connected.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// The user agent sampled for this session.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The screen size sampled for this session.
    pub fn screen_size(&self) -> (u32, u32) {
        self.screen_size
    }

    /// Look up a configuration option by name.
    pub fn option(&self, name: &str) -> Option<Value> {
        self.config.option(name)
    }

    /// The currently applied proxy, if any.
    pub fn proxy(&self) -> Option<Proxy> {
        self.current_proxy.lock().clone()
    }

    async fn engine_handle(&self) -> Result<Arc<dyn BrowserEngine>, SessionError> {
        self.engine
            .read()
            .await
            .clone()
            .ok_or_else(|| SessionError::Engine("session is torn down".into()))
    }

    /// Push a proxy into the live engine session and record it as current.
    /// This is the only place the current proxy is mutated.
    pub async fn set_proxy(&self, proxy: &Proxy) -> Result<(), SessionError> {
        let engine = self.engine_handle().await?;
        engine.set_proxy(proxy).await?;
        info!("Applied proxy {}", proxy.endpoint());
        *self.current_proxy.lock() = Some(proxy.clone());
        Ok(())
    }

    /// Rotate to `proxy` after a failed attempt: the accumulated proxy
    /// failures are attributed to the proxy being discarded.
    async fn apply_rotated(&self, proxy: &Proxy) -> Result<(), SessionError> {
        self.set_proxy(proxy).await?;
        self.state.lock().health.clear();
        Ok(())
    }

    /// Navigate the page to `url`, rotating proxies on proxy-related failure
    /// until the load succeeds or the candidate pool is exhausted.
    ///
    /// The retry loop is bounded: every failed attempt evicts the current
    /// proxy from the pool, so there are at most as many attempts as
    /// configured candidates.
    pub async fn goto(&self, url: &str) -> Result<(), SessionError> {
        if url.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "goto requires a non-empty URL".into(),
            ));
        }
        let engine = self.engine_handle().await?;

        loop {
            // Fresh redirect/error state per attempt so a failed attempt does
            // not leak into the next proxy's attempt
            let mut last_failure: Option<ProxyFailure> = None;
            let (tx, rx) = oneshot::channel();
            let token = {
                let mut state = self.state.lock();
                state.begin_attempt(url);
                state.register_nav_waiter(tx)
            };

            if let Err(e) = engine.open_page(url).await {
                self.state.lock().remove_nav_waiter(token);
                return Err(e);
            }

            let attempt_ok = match tokio::time::timeout(self.config.wait_timeout(), rx).await {
                Ok(Ok(NavSignal::Finished(status))) => status.is_success(),
                Ok(Ok(NavSignal::Exited { code, signal })) => {
                    return Err(SessionError::EngineExited { code, signal });
                }
                Ok(Err(_)) => false,
                Err(_) => {
                    self.state.lock().remove_nav_waiter(token);
                    warn!("Navigation to {} timed out", url);
                    false
                }
            };

            if attempt_ok {
                match self.state.lock().health.drain_or_fail() {
                    Ok(()) => break,
                    Err(failure) => {
                        warn!("Navigation to {} flagged proxy failure: {}", url, failure);
                        last_failure = Some(failure);
                    }
                }
            } else {
                warn!("Navigation to {} did not load", url);
            }

            // Failed attempt: evict the current proxy and retry with a
            // replacement, or give up when none is left
            let rotated = {
                let current = self.current_proxy.lock().clone();
                self.pool.lock().rotate(current.as_ref())
            };
            let next = match rotated {
                Ok(Some(proxy)) => proxy,
                Ok(None) => {
                    return Err(terminal_load_error(url, last_failure));
                }
                Err(SessionError::NoProxyAvailable) => {
                    warn!("Proxy pool exhausted while loading {}", url);
                    return Err(terminal_load_error(url, last_failure));
                }
                Err(e) => return Err(e),
            };
            self.apply_rotated(&next).await?;
        }

        for script in &self.config.inject_scripts {
            engine.inject_script(script).await?;
        }
        debug!("Navigation to {} complete", url);
        Ok(())
    }

    /// Wait for the next page load to finish, up to `timeout`.
    pub async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        let token = self.state.lock().register_nav_waiter(tx);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(NavSignal::Finished(status))) if status.is_success() => Ok(()),
            Ok(Ok(NavSignal::Finished(_))) => {
                let url = self
                    .state
                    .lock()
                    .redirects
                    .origin()
                    .unwrap_or("about:blank")
                    .to_string();
                Err(SessionError::PageLoadFailed { url })
            }
            Ok(Ok(NavSignal::Exited { code, signal })) => {
                Err(SessionError::EngineExited { code, signal })
            }
            Ok(Err(_)) => Err(SessionError::Engine("navigation waiter dropped".into())),
            Err(_) => {
                self.state.lock().remove_nav_waiter(token);
                Err(SessionError::Timeout(format!(
                    "no navigation finished within {:?}",
                    timeout
                )))
            }
        }
    }

    /// Wait for a top-level navigation whose URL contains `pattern`, up to
    /// `timeout`. Resolves with the matched URL, at most once.
    pub async fn wait_for_matching_request(
        &self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        if pattern.is_empty() {
            return Err(SessionError::InvalidArgument(
                "wait_for_matching_request requires a pattern".into(),
            ));
        }
        let (tx, rx) = oneshot::channel();
        let token = self.state.lock().register_request_waiter(pattern, tx);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(url)) => Ok(url),
            Ok(Err(_)) => Err(SessionError::Engine("request waiter dropped".into())),
            Err(_) => {
                self.state.lock().remove_request_waiter(token);
                Err(SessionError::Timeout(format!(
                    "no request matching '{}' within {:?}",
                    pattern, timeout
                )))
            }
        }
    }

    /// Evaluate a script in the page, bounded by the session timeout.
    pub async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, SessionError> {
        if script.trim().is_empty() {
            return Err(SessionError::InvalidArgument(
                "evaluate requires a script".into(),
            ));
        }
        let engine = self.engine_handle().await?;
        tokio::time::timeout(self.config.wait_timeout(), engine.evaluate(script, args))
            .await
            .map_err(|_| {
                SessionError::Timeout(format!(
                    "script evaluation exceeded {}s",
                    self.config.timeout_secs
                ))
            })?
    }

    /// Navigate back in the page history.
    pub async fn back(&self) -> Result<(), SessionError> {
        self.evaluate("window.history.back()", vec![]).await?;
        Ok(())
    }

    /// Render the page to `<snapshot_dir>/<name>.png`, waiting for the file
    /// to materialize. Returns `None` when snapshots are disabled.
    pub async fn snapshot(&self, name: &str) -> Result<Option<PathBuf>, SessionError> {
        if !self.config.snapshots_enabled {
            debug!("Snapshots disabled, skipping '{}'", name);
            return Ok(None);
        }
        let engine = self.engine_handle().await?;

        std::fs::create_dir_all(&self.config.snapshot_dir)?;
        let path = self.config.snapshot_dir.join(format!("{}.png", name));
        engine.render(&path).await?;

        // Rendering may complete after the engine call returns; poll until
        // the file exists and is non-empty
        let deadline = tokio::time::Instant::now() + self.config.wait_timeout();
        loop {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if meta.len() > 0 {
                    info!("Snapshot written: {}", path.display());
                    return Ok(Some(path));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::Timeout(format!(
                    "snapshot '{}' was not written within {}s",
                    name, self.config.timeout_secs
                )));
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Click the element matching `selector`.
    pub async fn mouse_click(&self, selector: &str) -> Result<(), SessionError> {
        let engine = self.engine_handle().await?;
        input::pointer_event(&engine, InputKind::Click, selector).await
    }

    /// Press the mouse button on the element matching `selector`.
    pub async fn mouse_down(&self, selector: &str) -> Result<(), SessionError> {
        let engine = self.engine_handle().await?;
        input::pointer_event(&engine, InputKind::MouseDown, selector).await
    }

    /// Release the mouse button on the element matching `selector`.
    pub async fn mouse_up(&self, selector: &str) -> Result<(), SessionError> {
        let engine = self.engine_handle().await?;
        input::pointer_event(&engine, InputKind::MouseUp, selector).await
    }

    /// Move the pointer to the element matching `selector`.
    pub async fn mouse_move(&self, selector: &str) -> Result<(), SessionError> {
        let engine = self.engine_handle().await?;
        input::pointer_event(&engine, InputKind::MouseMove, selector).await
    }

    /// Whether the current navigation observed a redirect hop, optionally
    /// restricted to hops matching `pattern`.
    pub fn has_redirect(&self, pattern: Option<&str>) -> bool {
        self.state.lock().redirects.has_match(pattern)
    }

    /// The redirect hops observed for the current navigation.
    pub fn redirects(&self) -> Vec<String> {
        self.state.lock().redirects.hops().to_vec()
    }

    /// Flag that the consumer detected a captcha on the current page.
    /// Recorded as a proxy failure when a captcha indicator is configured.
    pub fn flag_captcha(&self) {
        info!("Captcha flagged on current page");
        self.state.lock().health.record_captcha();
    }

    /// Tear the session down: close the page and stop the engine, bounded by
    /// the configured grace period. Idempotent.
    pub async fn tear_down(&self) -> Result<(), SessionError> {
        let engine = self.engine.write().await.take();
        let Some(engine) = engine else {
            debug!("Teardown without a live engine, nothing to do");
            return Ok(());
        };
        self.alive.store(false, Ordering::Relaxed);
        let grace = Duration::from_millis(self.config.teardown_grace_ms);
        lifecycle::tear_down_engine(engine, &self.state, grace).await
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &Arc<Mutex<RouterState>> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockEngine, MockLauncher};
    use crate::engine::{LoadStatus, ResourceFailure, ResourceResponse};
    use crate::proxy::{FailureKind, IndicatorLevel, ProxyIndicator};
    use serde_json::json;

    fn proxy_list(n: u16) -> Vec<Proxy> {
        (0..n).map(|i| Proxy::new("10.0.0.1", 9000 + i)).collect()
    }

    async fn prepared(config: SessionConfig) -> (Arc<Session>, Arc<MockEngine>) {
        let (launcher, engine) = MockLauncher::new();
        let session = Session::prepare(config, &launcher).await.unwrap();
        (session, engine)
    }

    #[tokio::test]
    async fn test_prepare_configures_and_navigates() {
        let config = SessionConfig::default()
            .user_agent("agent-x")
            .proxy(Proxy::new("proxy.example.com", 3128))
            .initial_url("http://start.example.com/");
        let (session, engine) = prepared(config).await;

        // Settings were pushed before the first navigation
        assert_eq!(engine.settings.lock()[0].1, json!("agent-x"));
        assert_eq!(
            *engine.opened_urls.lock(),
            vec!["http://start.example.com/".to_string()]
        );
        // The single configured proxy was applied during setup
        assert_eq!(engine.applied_proxies.lock().len(), 1);
        assert_eq!(session.proxy().unwrap().endpoint(), "proxy.example.com:3128");
        assert!(session.is_alive());
    }

    #[tokio::test]
    async fn test_goto_rejects_empty_url() {
        let (session, _engine) = prepared(SessionConfig::default()).await;
        let err = session.goto("  ").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_goto_success_injects_support_scripts() {
        let config = SessionConfig::default().inject_script("/opt/pilot/bridge.js");
        let (session, engine) = prepared(config).await;
        session.goto("http://site.com/").await.unwrap();
        assert_eq!(
            *engine.injected.lock(),
            vec![std::path::PathBuf::from("/opt/pilot/bridge.js")]
        );
    }

    #[tokio::test]
    async fn test_goto_rotates_on_failed_load() {
        let config = SessionConfig::default().timeout(5).proxies(proxy_list(3));
        let (session, engine) = prepared(config).await;
        engine.script_open(vec![Some(LoadStatus::Fail), Some(LoadStatus::Success)]);

        session.goto("http://site.com/").await.unwrap();

        assert_eq!(engine.opened_urls.lock().len(), 2);
        let applied = engine.applied_proxies.lock();
        // Initial proxy plus the rotation replacement, never the same endpoint
        assert_eq!(applied.len(), 2);
        assert!(!applied[0].same_endpoint(&applied[1]));
    }

    #[tokio::test]
    async fn test_goto_terminates_after_pool_exhaustion() {
        let config = SessionConfig::default().timeout(5).proxies(proxy_list(2));
        let (session, engine) = prepared(config).await;
        engine.script_open(vec![Some(LoadStatus::Fail), Some(LoadStatus::Fail)]);

        let err = session.goto("http://site.com/").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::PageLoadFailed { ref url } if url == "http://site.com/"
        ));
        // At most one attempt per configured candidate
        assert_eq!(engine.opened_urls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_goto_without_proxies_fails_directly() {
        let config = SessionConfig::default().timeout(5);
        let (session, engine) = prepared(config).await;
        engine.script_open(vec![Some(LoadStatus::Fail)]);

        let err = session.goto("http://site.com/").await.unwrap_err();
        assert!(matches!(err, SessionError::PageLoadFailed { .. }));
        assert_eq!(engine.opened_urls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_goto_rotates_on_proxy_indicator() {
        let config = SessionConfig::default()
            .timeout(5)
            .proxies(proxy_list(2))
            .indicators(vec![ProxyIndicator::ResponseCode {
                code: 403,
                level: IndicatorLevel::Medium,
            }]);
        let (session, engine) = prepared(config).await;
        // First load succeeds but a 403 resource marks the proxy as burnt
        engine.open_events.lock().push_back(vec![PageEvent::ResourceError(
            ResourceFailure {
                id: 1,
                url: "http://site.com/app.js".to_string(),
                status: Some(403),
                text: "forbidden".to_string(),
            },
        )]);
        engine.script_open(vec![Some(LoadStatus::Success), Some(LoadStatus::Success)]);

        session.goto("http://site.com/").await.unwrap();
        assert_eq!(engine.opened_urls.lock().len(), 2);
        assert_eq!(engine.applied_proxies.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_proxy_failure() {
        let config = SessionConfig::default()
            .timeout(5)
            .proxies(proxy_list(2))
            .indicators(vec![ProxyIndicator::ResponseCode {
                code: 403,
                level: IndicatorLevel::Medium,
            }]);
        let (session, engine) = prepared(config).await;
        // Every candidate's attempt loads but trips the indicator
        for _ in 0..2 {
            engine.open_events.lock().push_back(vec![PageEvent::ResourceError(
                ResourceFailure {
                    id: 1,
                    url: "http://site.com/app.js".to_string(),
                    status: Some(403),
                    text: "forbidden".to_string(),
                },
            )]);
        }

        let err = session.goto("http://site.com/").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Proxy(ref failure)
                if failure.kind == FailureKind::ResponseCode && failure.detail == "403"
        ));
        assert_eq!(engine.opened_urls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_open_call_leaves_no_waiter_behind() {
        let (session, engine) = prepared(SessionConfig::default()).await;
        engine.script_open_failure("page handle lost");

        let err = session.goto("http://site.com/").await.unwrap_err();
        assert!(matches!(err, SessionError::Engine(_)));
        assert_eq!(session.state().lock().nav_waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_goto_tracks_redirect_chain() {
        let (session, engine) = prepared(SessionConfig::default()).await;
        engine.open_events.lock().push_back(vec![PageEvent::ResourceReceived(
            ResourceResponse {
                id: 1,
                url: "http://start.com/".to_string(),
                status: Some(301),
                redirect_url: Some("http://moved.com/".to_string()),
                headers: vec![],
            },
        )]);

        session.goto("http://start.com/").await.unwrap();
        assert!(session.has_redirect(None));
        assert!(session.has_redirect(Some("moved.com")));
        assert!(!session.has_redirect(Some("other.com")));
        assert_eq!(session.redirects(), vec!["http://moved.com/".to_string()]);
    }

    #[tokio::test]
    async fn test_goto_surfaces_engine_exit() {
        let (session, engine) = prepared(SessionConfig::default().timeout(5)).await;
        engine.script_open(vec![None]); // navigation never finishes

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.goto("http://site.com/").await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.emit(PageEvent::ProcessExited {
            code: Some(1),
            signal: None,
        });

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::EngineExited { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_wait_for_navigation_timeout_removes_waiter() {
        let (session, _engine) = prepared(SessionConfig::default()).await;
        let err = session
            .wait_for_navigation(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
        assert_eq!(session.state().lock().nav_waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_matching_request_resolves_with_url() {
        let (session, engine) = prepared(SessionConfig::default()).await;
        let task = tokio::spawn({
            let session = session.clone();
            async move {
                session
                    .wait_for_matching_request("/api/search", Duration::from_secs(5))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.emit(PageEvent::NavigationRequested {
            url: "http://site.com/api/search?q=1".to_string(),
        });

        let url = task.await.unwrap().unwrap();
        assert_eq!(url, "http://site.com/api/search?q=1");
        assert_eq!(session.state().lock().request_waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_matching_request_timeout() {
        let (session, _engine) = prepared(SessionConfig::default()).await;
        let err = session
            .wait_for_matching_request("/never", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
        assert_eq!(session.state().lock().request_waiter_count(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_requires_script() {
        let (session, _engine) = prepared(SessionConfig::default()).await;
        let err = session.evaluate("", vec![]).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_back_runs_history_script() {
        let (session, engine) = prepared(SessionConfig::default()).await;
        session.back().await.unwrap();
        assert!(engine
            .eval_scripts
            .lock()
            .iter()
            .any(|s| s.contains("history.back")));
    }

    #[tokio::test]
    async fn test_snapshot_polls_for_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default().snapshots(dir.path());
        let (session, _engine) = prepared(config).await;
        let path = session.snapshot("page").await.unwrap().unwrap();
        assert!(path.ends_with("page.png"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_snapshot_disabled_is_noop() {
        let (session, engine) = prepared(SessionConfig::default()).await;
        assert!(session.snapshot("page").await.unwrap().is_none());
        assert!(engine.rendered.lock().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_times_out_when_file_never_appears() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::default().timeout(1).snapshots(dir.path());
        let (session, engine) = prepared(config).await;
        engine.render_writes_file.store(false, Ordering::Relaxed);
        let err = session.snapshot("page").await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_flag_captcha_records_failure() {
        let config = SessionConfig::default().indicators(vec![ProxyIndicator::Captcha {
            level: IndicatorLevel::High,
        }]);
        let (session, _engine) = prepared(config).await;
        session.flag_captcha();
        assert!(session.state().lock().health.has_failures());
    }

    #[tokio::test]
    async fn test_tear_down_is_idempotent() {
        let (session, engine) = prepared(SessionConfig::default()).await;
        session.tear_down().await.unwrap();
        session.tear_down().await.unwrap();
        assert!(engine.page_closed.load(Ordering::Relaxed));
        assert!(engine.exited.load(Ordering::Relaxed));
        assert!(!session.is_alive());
    }

    #[tokio::test]
    async fn test_operations_fail_after_teardown() {
        let (session, _engine) = prepared(SessionConfig::default()).await;
        session.tear_down().await.unwrap();
        let err = session.goto("http://site.com/").await.unwrap_err();
        assert!(matches!(err, SessionError::Engine(_)));
    }

    #[tokio::test]
    async fn test_option_lookup_passthrough() {
        let (session, _engine) = prepared(SessionConfig::default().timeout(9)).await;
        assert_eq!(session.option("timeout"), Some(json!(9)));
    }
}
