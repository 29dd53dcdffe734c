//! Proxy health indicators
//!
//! Indicators are declarative rules that classify engine signals as evidence
//! of a compromised proxy: a redirect to a known block page, a specific
//! response code, or an explicit captcha flag. Matched indicators accumulate
//! as [`ProxyFailure`]s on the [`HealthMonitor`]; the navigation that is
//! under evaluation drains them through a single `drain_or_fail` gate.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Informational severity attached to a matched indicator.
/// Does not change control flow here; downstream policy may act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndicatorLevel {
    Low,
    Medium,
    High,
}

/// A rule converting an observed engine signal into a typed proxy failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ProxyIndicator {
    /// A 301/302 whose target matches `pattern` (substring match)
    Redirect {
        pattern: String,
        level: IndicatorLevel,
    },
    /// A resource that came back with this HTTP status code
    ResponseCode { code: u16, level: IndicatorLevel },
    /// A captcha flag raised by the consumer
    Captcha { level: IndicatorLevel },
}

/// What kind of indicator produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Redirect,
    ResponseCode,
    Captcha,
}

/// A proxy failure produced from a matched indicator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyFailure {
    pub kind: FailureKind,
    pub level: IndicatorLevel,
    /// The matched URL or status code, for diagnostics
    pub detail: String,
}

impl std::fmt::Display for ProxyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({:?}): {}", self.kind, self.level, self.detail)
    }
}

/// Collects proxy failures for the navigation attempt in progress.
///
/// Appended to only from the event-dispatch path; drained only by the
/// navigation that initiated the attempt.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    indicators: Vec<ProxyIndicator>,
    failures: Vec<ProxyFailure>,
}

impl HealthMonitor {
    pub fn new(indicators: Vec<ProxyIndicator>) -> Self {
        Self {
            indicators,
            failures: Vec::new(),
        }
    }

    /// Match a resource's response status against `ResponseCode` indicators.
    pub fn record_resource_outcome(&mut self, status: Option<u16>) {
        let Some(status) = status else { return };
        for indicator in &self.indicators {
            if let ProxyIndicator::ResponseCode { code, level } = indicator {
                if *code == status {
                    debug!("Response code {} matched proxy indicator", status);
                    self.failures.push(ProxyFailure {
                        kind: FailureKind::ResponseCode,
                        level: *level,
                        detail: status.to_string(),
                    });
                }
            }
        }
    }

    /// Match a redirect target against `Redirect` indicators.
    pub fn record_redirect(&mut self, source_url: &str, target_url: &str) {
        for indicator in &self.indicators {
            if let ProxyIndicator::Redirect { pattern, level } = indicator {
                if target_url.contains(pattern.as_str()) {
                    debug!(
                        "Redirect {} -> {} matched proxy indicator '{}'",
                        source_url, target_url, pattern
                    );
                    self.failures.push(ProxyFailure {
                        kind: FailureKind::Redirect,
                        level: *level,
                        detail: target_url.to_string(),
                    });
                }
            }
        }
    }

    /// Record a captcha flag raised by the consumer.
    /// A failure is produced only if a `Captcha` indicator is configured.
    pub fn record_captcha(&mut self) {
        for indicator in &self.indicators {
            if let ProxyIndicator::Captcha { level } = indicator {
                self.failures.push(ProxyFailure {
                    kind: FailureKind::Captcha,
                    level: *level,
                    detail: "captcha flagged".to_string(),
                });
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Clear accumulated failures (start of a `goto`, successful rotation).
    pub fn clear(&mut self) {
        self.failures.clear();
    }

    /// The gate a navigation attempt passes before being considered
    /// successful: fails with the last-recorded failure, earlier ones are
    /// diagnostic only.
    pub fn drain_or_fail(&mut self) -> Result<(), ProxyFailure> {
        match self.failures.pop() {
            Some(last) => {
                if !self.failures.is_empty() {
                    debug!(
                        "{} earlier proxy failures superseded by: {}",
                        self.failures.len(),
                        last
                    );
                }
                self.failures.clear();
                Err(last)
            }
            None => Ok(()),
        }
    }
}
