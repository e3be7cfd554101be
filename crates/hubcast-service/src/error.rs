//! Top-level service errors (§7).

use hubcast_core::{AccountMapError, ErrorCategory};

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("server failed: {message}")]
    ServerFailed { message: String },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("failed to load the account map: {0}")]
    AccountMapBootstrap(#[from] AccountMapError),
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        false
    }

    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::BindFailed { .. } | Self::ServerFailed { .. } => ErrorCategory::Transient,
            Self::Configuration(e) => e.error_category(),
            Self::AccountMapBootstrap(e) => e.error_category(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
