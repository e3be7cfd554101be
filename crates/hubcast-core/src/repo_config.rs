//! Per-repository YAML configuration resolver (§4.5).
//!
//! `.github/hubcast.yml` (or its destination-forge equivalent) configures
//! how a source repository mirrors onto the destination GitLab instance.
//! Resolved configs are cached by [`RepoFullName`] and only refetched when
//! the caller explicitly asks for a refresh (push events do; PR events may
//! reuse a cached entry).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::RepoFullName;

/// Fetches the raw bytes of a repository's hubcast config file. Implemented
/// by the forge-specific clients in `hubcast-github` and `hubcast-gitlab`
/// (GitHub: raw contents API; GitLab: repository file API), so this crate
/// stays ignorant of either forge's REST surface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RawConfigFetcher: Send + Sync {
    async fn fetch_hubcast_yaml(&self, fullname: &RepoFullName) -> Result<Vec<u8>, RepoConfigError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepoConfigError {
    #[error("failed to fetch .github/hubcast.yml for {fullname}: {message}")]
    FetchFailed { fullname: String, message: String },

    #[error("invalid .github/hubcast.yml for {fullname}: {source}")]
    InvalidYaml {
        fullname: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl RepoConfigError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }

    pub fn error_category(&self) -> crate::ErrorCategory {
        match self {
            Self::FetchFailed { .. } => crate::ErrorCategory::Transient,
            Self::InvalidYaml { .. } => crate::ErrorCategory::Permanent,
        }
    }
}

/// Resolved, defaulted repository configuration (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    pub fullname: RepoFullName,
    pub dest_org: String,
    pub dest_name: String,
    pub check_name: String,
    pub check_type: String,
    pub create_mr: bool,
    pub delete_closed: bool,
    pub sync_drafts: bool,
    pub draft_sync_msg: bool,
}

#[derive(Debug, Deserialize)]
struct RawConfigFile {
    #[serde(rename = "Repo")]
    repo: RawRepo,
}

#[derive(Debug, Deserialize)]
struct RawRepo {
    owner: String,
    name: String,
    #[serde(default)]
    check_name: Option<String>,
    #[serde(default)]
    check_type: Option<String>,
    #[serde(default)]
    create_mr: Option<bool>,
    #[serde(default)]
    delete_closed: Option<bool>,
    #[serde(default)]
    draft_sync: Option<bool>,
    #[serde(default)]
    draft_sync_msg: Option<bool>,
}

impl RepoConfig {
    fn from_raw(fullname: RepoFullName, raw: RawConfigFile) -> Self {
        let repo = raw.repo;
        Self {
            fullname,
            dest_org: repo.owner,
            dest_name: repo.name,
            check_name: repo.check_name.unwrap_or_else(|| "gitlab-ci".to_string()),
            check_type: repo.check_type.unwrap_or_else(|| "pipeline".to_string()),
            create_mr: repo.create_mr.unwrap_or(false),
            delete_closed: repo.delete_closed.unwrap_or(true),
            sync_drafts: repo.draft_sync.unwrap_or(true),
            draft_sync_msg: repo.draft_sync_msg.unwrap_or(true),
        }
    }

    pub fn dest_remote_url(&self, dest_instance_url: &str) -> String {
        format!(
            "{}/{}/{}.git",
            dest_instance_url.trim_end_matches('/'),
            self.dest_org,
            self.dest_name
        )
    }
}

fn parse(fullname: &RepoFullName, bytes: &[u8]) -> Result<RepoConfig, RepoConfigError> {
    let raw: RawConfigFile = serde_yaml::from_slice(bytes).map_err(|source| RepoConfigError::InvalidYaml {
        fullname: fullname.to_string(),
        source,
    })?;
    Ok(RepoConfig::from_raw(fullname.clone(), raw))
}

/// Process-wide cache of resolved repo configs.
#[derive(Default)]
pub struct RepoConfigResolver {
    cache: Mutex<HashMap<RepoFullName, RepoConfig>>,
}

impl RepoConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the config for `fullname`, fetching and parsing through
    /// `fetcher` on a cache miss or when `refresh` is requested.
    pub async fn get(
        &self,
        fullname: &RepoFullName,
        fetcher: &dyn RawConfigFetcher,
        refresh: bool,
    ) -> Result<RepoConfig, RepoConfigError> {
        if !refresh {
            let cache = self.cache.lock().await;
            if let Some(config) = cache.get(fullname) {
                return Ok(config.clone());
            }
        }

        let bytes = fetcher.fetch_hubcast_yaml(fullname).await?;
        let config = parse(fullname, &bytes)?;

        let mut cache = self.cache.lock().await;
        cache.insert(fullname.clone(), config.clone());
        Ok(config)
    }
}

#[cfg(test)]
#[path = "repo_config_tests.rs"]
mod tests;
