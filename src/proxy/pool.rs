//! Proxy rotation pool
//!
//! Tracks the candidate proxies for one session. A proxy handed to
//! `rotate` as the current one is presumed unreachable and is evicted for
//! the rest of the session; replacements come from a caller-supplied
//! rotation function or a uniform random pick.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use super::Proxy;
use crate::error::SessionError;

/// Caller-supplied rotation strategy: given the remaining candidates and the
/// proxy just evicted, return the replacement to use (or `None` to give up).
pub type RotationFn = Arc<dyn Fn(&[Proxy], &Proxy) -> Option<Proxy> + Send + Sync>;

pub struct ProxyPool {
    /// Proxies as originally configured (never mutated)
    configured: Vec<Proxy>,
    /// Remaining candidates; shrinks on every eviction
    candidates: Vec<Proxy>,
    rotation: Option<RotationFn>,
}

impl std::fmt::Debug for ProxyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPool")
            .field("configured", &self.configured.len())
            .field("candidates", &self.candidates.len())
            .field("custom_rotation", &self.rotation.is_some())
            .finish()
    }
}

impl ProxyPool {
    pub fn new(proxies: Vec<Proxy>, rotation: Option<RotationFn>) -> Self {
        Self {
            candidates: proxies.clone(),
            configured: proxies,
            rotation,
        }
    }

    /// Number of candidates still in rotation.
    pub fn remaining(&self) -> usize {
        self.candidates.len()
    }

    /// Pick the proxy for the next navigation attempt.
    ///
    /// - No proxy configured: `Ok(None)` (proxying disabled).
    /// - Single proxy configured: re-applied as long as it has not itself
    ///   failed; once it is the evicted proxy there is nothing left to try.
    /// - Proxy list: evict `current` (matched by host + port), then select
    ///   from the remaining candidates.
    pub fn rotate(&mut self, current: Option<&Proxy>) -> Result<Option<Proxy>, SessionError> {
        if self.configured.is_empty() {
            return Ok(None);
        }

        if self.configured.len() == 1 {
            let single = &self.configured[0];
            if current.is_some_and(|c| c.same_endpoint(single)) {
                info!("Single configured proxy {} exhausted", single.endpoint());
                return Err(SessionError::NoProxyAvailable);
            }
            return Ok(Some(single.clone()));
        }

        if let Some(current) = current {
            let before = self.candidates.len();
            self.candidates.retain(|p| !p.same_endpoint(current));
            if self.candidates.len() < before {
                info!(
                    "Evicted proxy {} from rotation ({} candidates left)",
                    current.endpoint(),
                    self.candidates.len()
                );
            }
        }

        if self.candidates.is_empty() {
            return Err(SessionError::NoProxyAvailable);
        }

        let picked = match (&self.rotation, current) {
            (Some(rotation), Some(evicted)) => rotation(&self.candidates, evicted),
            (Some(rotation), None) => {
                // Initial selection: nothing evicted yet, hand a placeholder
                // of the first candidate so the strategy still sees a proxy.
                let evicted = self.candidates[0].clone();
                rotation(&self.candidates, &evicted)
            }
            (None, _) => {
                let idx = rand::thread_rng().gen_range(0..self.candidates.len());
                Some(self.candidates[idx].clone())
            }
        };

        match picked {
            Some(proxy) => {
                debug!("Rotation selected proxy {}", proxy.endpoint());
                Ok(Some(proxy))
            }
            None => Err(SessionError::NoProxyAvailable),
        }
    }
}
