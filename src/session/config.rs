//! Session configuration
//!
//! Resolved configuration for one browser session. One instance is built per
//! session; there is no process-global state. When a list of user agents or
//! screen sizes is configured, one entry is sampled per session.

use std::path::PathBuf;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde_json::{json, Value};

use crate::proxy::{Proxy, ProxyIndicator, RotationFn};

/// Default navigation / wait timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default teardown grace period before force-terminating the engine
pub const DEFAULT_TEARDOWN_GRACE_MS: u64 = 3000;
/// User agent applied when none is configured
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Resolved configuration for a browser session
#[derive(Clone)]
pub struct SessionConfig {
    /// Navigation and wait timeout in seconds
    pub timeout_secs: u64,
    /// Load images during navigation
    pub load_images: bool,
    /// Ignore SSL certificate errors
    pub ignore_ssl_errors: bool,
    /// Enforce same-origin policy in the page
    pub web_security: bool,
    /// Cookies file path, if cookie persistence is wanted
    pub cookies_file: Option<PathBuf>,
    /// User agent candidates; one is sampled per session
    pub user_agents: Vec<String>,
    /// Screen size candidates (width, height); one is sampled per session
    pub screen_sizes: Vec<(u32, u32)>,
    /// Resource allow-list patterns (substring match); dominates the deny-list
    pub allowed_resources: Vec<String>,
    /// Resource deny-list patterns (substring match)
    pub denied_resources: Vec<String>,
    /// Configured proxies (empty = proxying disabled)
    pub proxies: Vec<Proxy>,
    /// Custom rotation strategy; uniform random pick when absent
    pub rotation: Option<RotationFn>,
    /// Proxy health indicators
    pub indicators: Vec<ProxyIndicator>,
    /// Write snapshots when `snapshot` is called
    pub snapshots_enabled: bool,
    /// Directory snapshots are rendered into
    pub snapshot_dir: PathBuf,
    /// Support scripts injected into the page after every successful `goto`
    pub inject_scripts: Vec<PathBuf>,
    /// Navigated to at the end of `prepare` when set
    pub initial_url: Option<String>,
    /// Grace period for `tear_down` before force-terminating the engine
    pub teardown_grace_ms: u64,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("timeout_secs", &self.timeout_secs)
            .field("load_images", &self.load_images)
            .field("ignore_ssl_errors", &self.ignore_ssl_errors)
            .field("web_security", &self.web_security)
            .field("proxies", &self.proxies.len())
            .field("custom_rotation", &self.rotation.is_some())
            .field("indicators", &self.indicators.len())
            .field("allowed_resources", &self.allowed_resources)
            .field("denied_resources", &self.denied_resources)
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            load_images: true,
            ignore_ssl_errors: false,
            web_security: true,
            cookies_file: None,
            user_agents: Vec::new(),
            screen_sizes: Vec::new(),
            allowed_resources: Vec::new(),
            denied_resources: Vec::new(),
            proxies: Vec::new(),
            rotation: None,
            indicators: Vec::new(),
            snapshots_enabled: false,
            snapshot_dir: std::env::temp_dir().join("browser-pilot").join("snapshots"),
            inject_scripts: Vec::new(),
            initial_url: None,
            teardown_grace_ms: DEFAULT_TEARDOWN_GRACE_MS,
        }
    }
}

impl SessionConfig {
    /// Set the navigation timeout in seconds
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Enable or disable image loading
    pub fn load_images(mut self, load: bool) -> Self {
        self.load_images = load;
        self
    }

    /// Ignore SSL certificate errors
    pub fn ignore_ssl_errors(mut self, ignore: bool) -> Self {
        self.ignore_ssl_errors = ignore;
        self
    }

    /// Enable or disable web security (same-origin policy)
    pub fn web_security(mut self, enabled: bool) -> Self {
        self.web_security = enabled;
        self
    }

    /// Set the cookies file path
    pub fn cookies_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_file = Some(path.into());
        self
    }

    /// Set a single user agent
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agents = vec![ua.to_string()];
        self
    }

    /// Set user agent candidates; one is sampled per session
    pub fn user_agents(mut self, uas: Vec<String>) -> Self {
        self.user_agents = uas;
        self
    }

    /// Set a single screen size
    pub fn screen_size(mut self, width: u32, height: u32) -> Self {
        self.screen_sizes = vec![(width, height)];
        self
    }

    /// Set screen size candidates; one is sampled per session
    pub fn screen_sizes(mut self, sizes: Vec<(u32, u32)>) -> Self {
        self.screen_sizes = sizes;
        self
    }

    /// Set the resource allow-list (dominates the deny-list)
    pub fn allow_resources(mut self, patterns: Vec<String>) -> Self {
        self.allowed_resources = patterns;
        self
    }

    /// Set the resource deny-list
    pub fn deny_resources(mut self, patterns: Vec<String>) -> Self {
        self.denied_resources = patterns;
        self
    }

    /// Set a single proxy
    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxies = vec![proxy];
        self
    }

    /// Set the proxy rotation list
    pub fn proxies(mut self, proxies: Vec<Proxy>) -> Self {
        self.proxies = proxies;
        self
    }

    /// Set a custom rotation strategy
    pub fn rotation(mut self, rotation: RotationFn) -> Self {
        self.rotation = Some(rotation);
        self
    }

    /// Set the proxy health indicators
    pub fn indicators(mut self, indicators: Vec<ProxyIndicator>) -> Self {
        self.indicators = indicators;
        self
    }

    /// Enable snapshots, rendered into `dir`
    pub fn snapshots(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshots_enabled = true;
        self.snapshot_dir = dir.into();
        self
    }

    /// Add a support script injected after every successful navigation
    pub fn inject_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.inject_scripts.push(path.into());
        self
    }

    /// Set the URL `prepare` navigates to once the session is wired up
    pub fn initial_url(mut self, url: &str) -> Self {
        self.initial_url = Some(url.to_string());
        self
    }

    /// Set the teardown grace period in milliseconds
    pub fn teardown_grace_ms(mut self, ms: u64) -> Self {
        self.teardown_grace_ms = ms;
        self
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Sample the user agent for this session.
    pub fn sample_user_agent(&self) -> String {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    /// Sample the screen size for this session.
    pub fn sample_screen_size(&self) -> (u32, u32) {
        self.screen_sizes
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or((1920, 1080))
    }

    /// Look up a configuration option by name, as a JSON value.
    pub fn option(&self, name: &str) -> Option<Value> {
        match name {
            "timeout" => Some(json!(self.timeout_secs)),
            "loadImages" => Some(json!(self.load_images)),
            "ignoreSslErrors" => Some(json!(self.ignore_ssl_errors)),
            "webSecurity" => Some(json!(self.web_security)),
            "cookiesFile" => Some(json!(self.cookies_file.as_ref().map(|p| p.display().to_string()))),
            "userAgents" => Some(json!(self.user_agents)),
            "screenSizes" => Some(json!(self.screen_sizes)),
            "allowedResources" => Some(json!(self.allowed_resources)),
            "deniedResources" => Some(json!(self.denied_resources)),
            "proxies" => Some(json!(self.proxies)),
            "snapshotsEnabled" => Some(json!(self.snapshots_enabled)),
            "snapshotDir" => Some(json!(self.snapshot_dir.display().to_string())),
            "initialUrl" => Some(json!(self.initial_url)),
            "teardownGraceMs" => Some(json!(self.teardown_grace_ms)),
            _ => None,
        }
    }
}
