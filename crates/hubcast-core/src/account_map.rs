//! Abstract source-identity to destination-username mapping (§4.4).
//!
//! `AccountMap` is the trust boundary between "who sent this webhook" and
//! "whose credentials do we act as on the destination". Lookup is a single
//! async method so that non-file-backed implementations (LDAP, a
//! destination-forge OAuth lookup) can make network calls without forcing a
//! different trait shape; only [`FileAccountMap`] is built here; `Ldap` and
//! `GitLabOAuth` are documented extension points selected by
//! `AccountMapKind` in `hubcast-service` (§10.6).

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AccountMapError {
    #[error("failed to read account map file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse account map file {path}: {source}")]
    InvalidYaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl AccountMapError {
    pub fn error_category(&self) -> crate::ErrorCategory {
        crate::ErrorCategory::Configuration
    }
}

/// Translates a source-forge identity (GitHub login, GitLab username) into
/// a destination-GitLab username. Returns `None` when the identity is
/// unknown; callers treat an unknown sender as a benign skip (§4.7, §7),
/// never as an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountMap: Send + Sync {
    async fn lookup(&self, source_identity: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct RawAccountMapFile {
    #[serde(rename = "Users")]
    users: HashMap<String, String>,
}

/// File-backed account map. Parses `Users: { src: dest, ... }` once at
/// construction; an unreadable or malformed file is fatal to process
/// bootstrap (§4.4) rather than surfaced per-lookup.
#[derive(Debug, Clone)]
pub struct FileAccountMap {
    users: HashMap<String, String>,
}

impl FileAccountMap {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AccountMapError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| AccountMapError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes, path)
    }

    fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, AccountMapError> {
        let raw: RawAccountMapFile =
            serde_yaml::from_slice(bytes).map_err(|source| AccountMapError::InvalidYaml {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self { users: raw.users })
    }

    /// Parse directly from YAML source, for tests that don't want a temp file.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AccountMapError> {
        Self::from_bytes(yaml.as_bytes(), Path::new("<inline>"))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl AccountMap for FileAccountMap {
    async fn lookup(&self, source_identity: &str) -> Option<String> {
        self.users.get(source_identity).cloned()
    }
}

#[cfg(test)]
#[path = "account_map_tests.rs"]
mod tests;
