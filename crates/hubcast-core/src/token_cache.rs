//! Expiry-aware memoization of short-lived credentials (§4.1).
//!
//! Mirrors the original `TokenCache.get(name, renew, time_needed=60)`:
//! a cached token is returned as-is as long as it is valid for at least
//! `time_needed` more seconds; otherwise `renew` is awaited and the cache
//! entry replaced atomically under the lock. A failing `renew` leaves the
//! existing entry (if any) untouched.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::Mutex;

use crate::Timestamp;

/// A cached `(expires_at_epoch, token)` pair, keyed by an opaque name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub expires_at_epoch: i64,
    pub token: String,
}

/// Default lookahead window: a returned token must still be valid this many
/// seconds from now, or it is renewed before being handed back.
pub const DEFAULT_TIME_NEEDED_SECONDS: i64 = 60;

/// Process-wide cache of short-lived credentials.
///
/// Renewal is not single-flighted: two concurrent misses on the same name
/// may both call `renew`, and the last write under the lock wins. This
/// matches the original design (§4.1, §9) and is acceptable because a
/// redundant renewal is wasteful but harmless, not incorrect.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, TokenEntry>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a token for `name`, renewing it if absent or expiring within
    /// `time_needed` seconds. `renew` must return `(expires_at_epoch, token)`
    /// on success.
    pub async fn get<F, Fut, E>(&self, name: &str, time_needed: i64, renew: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(i64, String), E>>,
    {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(name) {
                let now = Timestamp::now().epoch_seconds();
                if entry.expires_at_epoch >= now + time_needed {
                    return Ok(entry.token.clone());
                }
            }
        }

        let (expires_at_epoch, token) = renew().await?;

        let mut entries = self.entries.lock().await;
        entries.insert(
            name.to_string(),
            TokenEntry {
                expires_at_epoch,
                token: token.clone(),
            },
        );
        Ok(token)
    }

    /// Convenience wrapper using the default 60-second lookahead.
    pub async fn get_default<F, Fut, E>(&self, name: &str, renew: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(i64, String), E>>,
    {
        self.get(name, DEFAULT_TIME_NEEDED_SECONDS, renew).await
    }

    /// Current cache size, for diagnostics and tests.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
#[path = "token_cache_tests.rs"]
mod tests;
