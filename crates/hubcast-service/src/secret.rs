//! A zeroizing secret-string newtype (§10.1).
//!
//! Webhook secrets, the GitHub App private key, and the GitLab admin token
//! are wrapped in [`Secret`] so `Debug` never leaks a value into logs or the
//! `hubcast config validate` summary, and so the backing buffer is wiped
//! when the value is dropped.

use serde::{Deserialize, Deserializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying value. Callers should not log or `Display`
    /// the result; this exists only for handing the value to an HTTP
    /// client or signing routine.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(\"<REDACTED>\")")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret::new)
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
