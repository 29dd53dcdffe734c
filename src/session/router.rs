//! Page event routing
//!
//! A single dispatcher bound to one page's event stream. Every engine event
//! is routed to exactly the concerns that care about it: redirect tracking,
//! resource allow/deny filtering, the proxy health monitor, and the pending
//! navigation/request waiters. All session state mutated here lives behind
//! one lock, and guards are never held across engine calls.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::engine::{BrowserEngine, LoadStatus, PageEvent, ResourceResponse};
use crate::proxy::HealthMonitor;

/// Console lines starting with this tag come from injected support scripts
/// and are routed to the diagnostic log target.
pub const CONSOLE_DIAG_TAG: &str = "[pilot]";

/// What a navigation waiter is resolved with
#[derive(Debug, Clone)]
pub enum NavSignal {
    Finished(LoadStatus),
    Exited {
        code: Option<i32>,
        signal: Option<String>,
    },
}

/// The 301/302 hops observed for the current navigation attempt.
///
/// A hop is appended only when its source is the originally requested URL or
/// the chain's current tail, so redirects belonging to unrelated concurrent
/// resource loads are never recorded.
#[derive(Debug, Default)]
pub struct RedirectChain {
    origin: Option<String>,
    hops: Vec<String>,
}

impl RedirectChain {
    /// Start tracking a fresh navigation to `url`.
    pub fn begin(&mut self, url: &str) {
        self.origin = Some(url.to_string());
        self.hops.clear();
    }

    /// Record a redirect hop if it extends the chain. Returns whether it did.
    ///
    /// The origin stays a valid source even after hops were recorded; the
    /// main document may redirect again from the requested URL while
    /// subresource redirects are in flight.
    pub fn record(&mut self, source: &str, target: &str) -> bool {
        let origin = self.origin.as_deref();
        let tail = self.hops.last().map(String::as_str);
        if origin == Some(source) || tail == Some(source) {
            self.hops.push(target.to_string());
            true
        } else {
            false
        }
    }

    /// The originally requested URL, if a navigation has begun.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn hops(&self) -> &[String] {
        &self.hops
    }

    /// Whether any hop was observed, optionally restricted to hops matching
    /// `pattern` (substring match).
    pub fn has_match(&self, pattern: Option<&str>) -> bool {
        match pattern {
            Some(p) => self.hops.iter().any(|h| h.contains(p)),
            None => !self.hops.is_empty(),
        }
    }
}

struct NavWaiter {
    token: u64,
    tx: oneshot::Sender<NavSignal>,
}

struct RequestWaiter {
    token: u64,
    pattern: String,
    tx: oneshot::Sender<String>,
}

/// Session state shared between the event-dispatch path and the
/// navigation/rotation path.
pub struct RouterState {
    pub redirects: RedirectChain,
    pub health: HealthMonitor,
    nav_waiters: VecDeque<NavWaiter>,
    request_waiters: VecDeque<RequestWaiter>,
    teardown_waiters: Vec<oneshot::Sender<(Option<i32>, Option<String>)>>,
    next_token: u64,
    /// Set once the engine process is gone
    pub engine_exited: bool,
}

impl RouterState {
    pub fn new(health: HealthMonitor) -> Self {
        Self {
            redirects: RedirectChain::default(),
            health,
            nav_waiters: VecDeque::new(),
            request_waiters: VecDeque::new(),
            teardown_waiters: Vec::new(),
            next_token: 0,
            engine_exited: false,
        }
    }

    /// Reset redirect and proxy-error state for a new navigation attempt.
    pub fn begin_attempt(&mut self, url: &str) {
        self.redirects.begin(url);
        self.health.clear();
    }

    fn alloc_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub fn register_nav_waiter(&mut self, tx: oneshot::Sender<NavSignal>) -> u64 {
        let token = self.alloc_token();
        self.nav_waiters.push_back(NavWaiter { token, tx });
        token
    }

    /// Remove a timed-out navigation waiter so it does not leak in the queue.
    pub fn remove_nav_waiter(&mut self, token: u64) {
        self.nav_waiters.retain(|w| w.token != token);
    }

    pub fn register_request_waiter(
        &mut self,
        pattern: &str,
        tx: oneshot::Sender<String>,
    ) -> u64 {
        let token = self.alloc_token();
        self.request_waiters.push_back(RequestWaiter {
            token,
            pattern: pattern.to_string(),
            tx,
        });
        token
    }

    pub fn remove_request_waiter(&mut self, token: u64) {
        self.request_waiters.retain(|w| w.token != token);
    }

    pub fn register_teardown_waiter(
        &mut self,
        tx: oneshot::Sender<(Option<i32>, Option<String>)>,
    ) {
        self.teardown_waiters.push(tx);
    }

    #[cfg(test)]
    pub fn nav_waiter_count(&self) -> usize {
        self.nav_waiters.len()
    }

    #[cfg(test)]
    pub fn request_waiter_count(&self) -> usize {
        self.request_waiters.len()
    }
}

/// Decide whether a resource request may proceed.
///
/// `allowed` = no allow-list, or the URL matches one of its patterns.
/// `blocked` = no allow-list, a deny-list exists, and the URL matches it.
/// The allow-list strictly dominates the deny-list.
pub fn resource_allowed(url: &str, allow: &[String], deny: &[String]) -> bool {
    let allowed = allow.is_empty() || allow.iter().any(|p| url.contains(p.as_str()));
    let blocked = allow.is_empty() && !deny.is_empty() && deny.iter().any(|p| url.contains(p.as_str()));
    allowed && !blocked
}

/// Extract the redirect target from a 301/302 response: prefer the engine's
/// explicit redirect field, fall back to the `Location` header (resolved
/// against the source URL when relative).
fn redirect_target(response: &ResourceResponse) -> Option<String> {
    if let Some(target) = &response.redirect_url {
        if !target.is_empty() {
            return Some(target.clone());
        }
    }
    let location = response.header("location")?;
    match Url::parse(location) {
        Ok(absolute) => Some(absolute.to_string()),
        Err(_) => Url::parse(&response.url)
            .ok()?
            .join(location)
            .ok()
            .map(|u| u.to_string()),
    }
}

/// Dispatches one page's engine events into session state.
pub struct EventRouter {
    state: Arc<Mutex<RouterState>>,
    engine: Arc<dyn BrowserEngine>,
    allowed_resources: Vec<String>,
    denied_resources: Vec<String>,
}

impl EventRouter {
    pub fn new(
        state: Arc<Mutex<RouterState>>,
        engine: Arc<dyn BrowserEngine>,
        allowed_resources: Vec<String>,
        denied_resources: Vec<String>,
    ) -> Self {
        Self {
            state,
            engine,
            allowed_resources,
            denied_resources,
        }
    }

    pub async fn dispatch(&self, event: PageEvent) {
        match event {
            PageEvent::LoadFinished { status } => {
                // Fan out to every pending navigation waiter, FIFO, then
                // clear the queue.
                let waiters: Vec<NavWaiter> = {
                    let mut state = self.state.lock();
                    state.nav_waiters.drain(..).collect()
                };
                debug!(
                    "Load finished ({:?}), resolving {} navigation waiter(s)",
                    status,
                    waiters.len()
                );
                for waiter in waiters {
                    let _ = waiter.tx.send(NavSignal::Finished(status));
                }
            }
            PageEvent::NavigationRequested { url } => {
                // First matching request waiter is consumed; the rest stay
                // queued for future events.
                let resolved = {
                    let mut state = self.state.lock();
                    let idx = state
                        .request_waiters
                        .iter()
                        .position(|w| url.contains(w.pattern.as_str()));
                    idx.and_then(|i| state.request_waiters.remove(i))
                };
                if let Some(waiter) = resolved {
                    debug!("Navigation to {} matched waiter '{}'", url, waiter.pattern);
                    let _ = waiter.tx.send(url);
                }
            }
            PageEvent::ResourceRequested(request) => {
                if !resource_allowed(
                    &request.url,
                    &self.allowed_resources,
                    &self.denied_resources,
                ) {
                    debug!("Aborting filtered resource: {}", request.url);
                    if let Err(e) = self.engine.abort_resource(request.id).await {
                        warn!("Failed to abort resource {}: {}", request.id, e);
                    }
                }
            }
            PageEvent::ResourceReceived(response) => {
                if matches!(response.status, Some(301) | Some(302)) {
                    if let Some(target) = redirect_target(&response) {
                        let mut state = self.state.lock();
                        if state.redirects.record(&response.url, &target) {
                            debug!("Redirect hop: {} -> {}", response.url, target);
                        }
                        state.health.record_redirect(&response.url, &target);
                    }
                }
            }
            PageEvent::ResourceError(failure) => {
                debug!(
                    "Resource error ({}): {:?} {}",
                    failure.url, failure.status, failure.text
                );
                self.state.lock().health.record_resource_outcome(failure.status);
            }
            PageEvent::ConsoleMessage { text } => {
                if let Some(line) = text.strip_prefix(CONSOLE_DIAG_TAG) {
                    info!(target: "browser_pilot::page", "{}", line.trim());
                } else {
                    debug!(target: "browser_pilot::console", "{}", crate::safe_truncate(&text, 500));
                }
            }
            PageEvent::PageError { message, trace } => {
                // Browser-internal script errors never abort the controller.
                warn!("Page error: {} (trace: {} frames)", message, trace.len());
            }
            PageEvent::ProcessExited { code, signal } => {
                warn!(
                    "Engine process exited (code: {:?}, signal: {:?})",
                    code, signal
                );
                let (teardowns, navs) = {
                    let mut state = self.state.lock();
                    state.engine_exited = true;
                    let teardowns: Vec<_> = state.teardown_waiters.drain(..).collect();
                    let navs: Vec<NavWaiter> = state.nav_waiters.drain(..).collect();
                    (teardowns, navs)
                };
                for tx in teardowns {
                    let _ = tx.send((code, signal.clone()));
                }
                for waiter in navs {
                    let _ = waiter.tx.send(NavSignal::Exited {
                        code,
                        signal: signal.clone(),
                    });
                }
            }
        }
    }
}
