//! # Hubcast Core
//!
//! Domain logic shared by every Hubcast component: the event and identifier
//! types that flow through ingress and routing, the expiry-aware token cache,
//! the shallow/deep event router, the repo-config resolver, the account-map
//! abstraction, and the git smart-HTTP wire engine.
//!
//! Forge-specific authentication and REST clients live in `hubcast-github`
//! and `hubcast-gitlab`; this crate has no knowledge of either forge's wire
//! format beyond the shapes described in its data model.
//!
//! ## Usage
//!
//! ```rust
//! use hubcast_core::{ObjectId, RefName};
//!
//! let sha = ObjectId::zero();
//! assert!(sha.is_zero());
//! let r = RefName::new("refs/heads/main").unwrap();
//! assert_eq!(r.as_str(), "refs/heads/main");
//! ```

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use uuid::Uuid;

/// Standard result type for hubcast operations
pub type HubcastResult<T> = Result<T, HubcastError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// A 40-hex-character git object id, or the all-zero id denoting "absent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// The all-zero object id used as `from` on creates and `to` on deletes.
    pub fn zero() -> Self {
        Self([0u8; 20])
    }

    /// True if this is the all-zero object id.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Hex-encoded representation, always 40 characters.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidFormat {
                expected: "40 hex characters".to_string(),
                actual: s.to_string(),
            });
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseError::InvalidFormat {
            expected: "40 hex characters".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

/// A fully-qualified git ref name, e.g. `refs/heads/main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefName(String);

impl RefName {
    /// Create a new ref name; must be fully qualified under `refs/`.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if !value.starts_with("refs/") {
            return Err(ValidationError::InvalidFormat {
                field: "ref_name".to_string(),
                message: "must be fully qualified and start with 'refs/'".to_string(),
            });
        }
        if value.len() > 1024 {
            return Err(ValidationError::TooLong {
                field: "ref_name".to_string(),
                max_length: 1024,
            });
        }
        Ok(Self(value))
    }

    /// Build a pull-request head ref for a fork-originated GitHub PR.
    pub fn github_pull_request(number: u64) -> Self {
        Self(format!("refs/heads/pr-{number}"))
    }

    /// Build a merge-request head ref for a fork-originated GitLab MR.
    pub fn gitlab_merge_request(iid: u64) -> Self {
        Self(format!("refs/heads/mr-{iid}"))
    }

    /// Build a plain branch ref.
    pub fn branch(name: &str) -> Self {
        Self(format!("refs/heads/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RefName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// A `owner/name` repository full name, used as the repo-config cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoFullName(String);

impl RepoFullName {
    pub fn new(owner: impl AsRef<str>, name: impl AsRef<str>) -> Result<Self, ValidationError> {
        let owner = owner.as_ref();
        let name = name.as_ref();
        if owner.is_empty() || name.is_empty() {
            return Err(ValidationError::Required {
                field: "repo_full_name".to_string(),
            });
        }
        Ok(Self(format!("{owner}/{name}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into `(owner, name)`.
    pub fn parts(&self) -> (&str, &str) {
        // validated at construction to always contain exactly one separator
        self.0.split_once('/').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for RepoFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for tracing a single webhook delivery across log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

// ============================================================================
// Time
// ============================================================================

/// UTC timestamp, used for token-expiry bookkeeping and log timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_epoch(seconds: i64) -> Self {
        Self(
            DateTime::from_timestamp(seconds, 0)
                .unwrap_or_else(|| DateTime::from_timestamp(0, 0).expect("epoch zero is valid")),
        )
    }

    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Parse a GitHub-style UTC timestamp ending in `Z` (not necessarily
    /// RFC3339-fractional) into epoch seconds.
    pub fn from_github_isotime(s: &str) -> Result<Self, ParseError> {
        if !s.ends_with('Z') {
            return Err(ParseError::InvalidFormat {
                expected: "UTC timestamp ending in 'Z'".to_string(),
                actual: s.to_string(),
            });
        }
        Self::from_rfc3339(s)
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn add_seconds(&self, seconds: i64) -> Self {
        Self(self.0 + chrono::Duration::seconds(seconds))
    }

    /// UTC midnight `days` days from now, used for GitLab impersonation
    /// token expiry (the GitLab API accepts only a date, not a datetime).
    pub fn utc_midnight_after(days: i64) -> Self {
        let target = Utc::now() + chrono::Duration::days(days);
        let midnight = target
            .with_hour(0)
            .and_then(|d| d.with_minute(0))
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(target);
        Self(midnight)
    }

    /// `YYYY-MM-DD` representation, as required by GitLab's impersonation
    /// token `expires_at` field.
    pub fn as_date_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.0.year(), self.0.month(), self.0.day())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Configuration-adjacent enums
// ============================================================================

/// Deployment environment, used to pick the logging formatter (§10.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ParseError::InvalidFormat {
                expected: "development, staging, or production".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// Logging verbosity, used to build the `tracing_subscriber` `EnvFilter`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(ParseError::InvalidFormat {
                expected: "error, warn, info, debug, or trace".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// High-level error categorization for retry and alerting decisions.
///
/// Every crate-local error enum exposes `error_category()` returning one of
/// these variants so logging and metrics can classify failures uniformly
/// (§7, §10.4) instead of matching on display strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary upstream failures that should be retried.
    Transient,
    /// Permanent failures that won't succeed on retry.
    Permanent,
    /// Configuration errors preventing startup.
    Configuration,
    /// Git smart-HTTP negotiation or `receive-pack` rejection.
    GitWire,
    /// Webhook signature or schema validation failed before any side effect.
    InvalidInput,
}

/// Exponential/linear/fixed backoff for the retry-capable outbound HTTP
/// helper (§9 Backoff). Webhook-triggered sync itself relies on the forge's
/// own retry and does not use this policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_enabled: bool,
}

impl RetryPolicy {
    pub fn exponential() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_enabled: true,
        }
    }

    pub fn linear() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.0,
            jitter_enabled: true,
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: 3,
            base_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter_enabled: false,
        }
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let mut delay = self.base_delay.as_millis() as f64;
        for _ in 1..attempt {
            delay *= self.backoff_multiplier;
        }

        if self.jitter_enabled {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};

            let mut hasher = DefaultHasher::new();
            attempt.hash(&mut hasher);
            let hash = hasher.finish();

            // +/-25% jitter
            let jitter_factor = 0.75 + (hash % 500) as f64 / 2000.0;
            delay *= jitter_factor;
        }

        let delay_ms = delay.min(self.max_delay.as_millis() as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("field '{field}' is required")]
    Required { field: String },

    #[error("field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Top-level error type for operations spanning more than one hubcast-core
/// module (callers of a single module generally prefer that module's own
/// error enum for richer context).
#[derive(Debug, thiserror::Error)]
pub enum HubcastError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl HubcastError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::InvalidInput,
            Self::Parse(_) => ErrorCategory::InvalidInput,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Expiry-aware in-memory cache for short-lived forge credentials.
pub mod token_cache;

/// Event model shared across ingress handlers.
pub mod event;

/// Shallow/deep event router (§4.6).
pub mod router;

/// Per-repository YAML configuration resolver (§4.5).
pub mod repo_config;

/// Abstract source-identity to destination-username mapping (§4.4).
pub mod account_map;

/// Git smart-HTTP wire engine (§4.9).
pub mod git_wire;

/// Forge-agnostic REST client interfaces (§2 "Forge Clients").
pub mod forge;

pub use account_map::{AccountMap, AccountMapError, FileAccountMap};
pub use event::{Event, EventKind};
pub use forge::{
    DestinationClient, ForgeError, GitHubCheckStatus, PipelineStatus, PullRequestRef,
    SourceForgeClient,
};
pub use git_wire::{GitCredentials, GitWireClient, GitWireError, HttpGitWireClient, RefMap};
pub use repo_config::{RepoConfig, RepoConfigError, RepoConfigResolver};
pub use router::{CallbackError, EventCallback, Router};
pub use token_cache::{TokenCache, TokenEntry};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
