//! Layered service configuration: built-in defaults, an optional TOML file,
//! then `HC_`-prefixed environment variables, using the `config` crate the
//! same way the model codebase's `ServiceConfig` loader does (§10.1).

use std::path::Path;

use serde::Deserialize;

use crate::secret::Secret;

/// Which forge originates events. GitLab is always the destination (§1);
/// this selects whether GitHub or GitLab also plays the source role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceForgeKind {
    Github,
    Gitlab,
}

impl SourceForgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
        }
    }
}

impl Default for SourceForgeKind {
    fn default() -> Self {
        Self::Github
    }
}

/// Selects the `AccountMap` implementation built at bootstrap (§4.4, §10.6).
/// Only `File` is implemented; `Ldap` and `GitLabOAuth` are documented
/// extension points that fail configuration validation until a real
/// implementation exists behind the same trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountMapKind {
    File,
    Ldap,
    GitLabOAuth,
}

impl Default for AccountMapKind {
    fn default() -> Self {
        Self::File
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `json` when stdout is not a TTY (e.g. running under a container
    /// supervisor), `pretty` for an interactive terminal (§10.1).
    fn default_for_environment() -> Self {
        if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read private key file {path}: {source}")]
    PrivateKeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required configuration key: {key}")]
    Missing { key: &'static str },

    #[error("account map type '{kind:?}' is not implemented; only 'file' is available")]
    UnsupportedAccountMapType { kind: AccountMapKind },
}

impl ConfigError {
    pub fn error_category(&self) -> hubcast_core::ErrorCategory {
        hubcast_core::ErrorCategory::Configuration
    }
}

/// Service-wide configuration, loaded by [`ServiceConfig::load`]. Field
/// names intentionally mirror their `HC_*` environment variable suffix
/// (lowercased) so the flat `config::Environment` source maps onto them
/// without nesting (§10.1).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub port: u16,
    pub source_forge: SourceForgeKind,
    pub account_map_type: AccountMapKind,
    pub account_map_path: Option<String>,

    pub gh_app_identifier: Option<String>,
    pub gh_private_key: Option<Secret>,
    pub gh_private_key_path: Option<String>,
    pub gh_requester: Option<String>,
    pub gh_secret: Option<Secret>,
    pub gh_bot_user: Option<String>,

    pub gl_url: Option<String>,
    pub gl_access_token: Option<Secret>,
    pub gl_secret: Option<Secret>,
    pub gl_callback_url: Option<String>,
    pub gl_requester: Option<String>,

    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            source_forge: SourceForgeKind::default(),
            account_map_type: AccountMapKind::default(),
            account_map_path: None,
            gh_app_identifier: None,
            gh_private_key: None,
            gh_private_key_path: None,
            gh_requester: None,
            gh_secret: None,
            gh_bot_user: None,
            gl_url: None,
            gl_access_token: None,
            gl_secret: None,
            gl_callback_url: None,
            gl_requester: None,
            log_format: LogFormat::default_for_environment(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration by layering, in increasing priority: built-in
    /// defaults, an optional TOML file, then `HC_`-prefixed environment
    /// variables (§10.1). `config_path` is typically `--config` or
    /// `HC_CONFIG_PATH`, resolved by the caller before this is invoked.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("port", defaults.port)?
            .set_default("source_forge", defaults.source_forge.as_str())?
            .set_default("account_map_type", "file")?
            .set_default(
                "log_format",
                match defaults.log_format {
                    LogFormat::Json => "json",
                    LogFormat::Pretty => "pretty",
                },
            )?;

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path));
        }

        // No explicit `.separator()` call: the remainder of each `HC_*`
        // variable (lowercased) is used as a single flat key, matching
        // this struct's field names directly instead of nesting on `_`.
        builder = builder.add_source(config::Environment::with_prefix("HC").try_parsing(true));

        let raw = builder.build()?;
        let mut config: Self = raw.try_deserialize()?;
        config.resolve_private_key_from_file()?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_private_key_from_file(&mut self) -> Result<(), ConfigError> {
        if self.gh_private_key.is_none() {
            if let Some(path) = &self.gh_private_key_path {
                let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::PrivateKeyFile {
                    path: path.clone(),
                    source,
                })?;
                self.gh_private_key = Some(Secret::new(contents));
            }
        }
        Ok(())
    }

    /// Enforce presence of every required key for the configured source
    /// forge (§10.1, §6). GitLab credentials are always required since
    /// GitLab is always the destination (§1).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account_map_type == AccountMapKind::File && self.account_map_path.is_none() {
            return Err(ConfigError::Missing { key: "HC_ACCOUNT_MAP_PATH" });
        }
        if self.account_map_type != AccountMapKind::File {
            return Err(ConfigError::UnsupportedAccountMapType { kind: self.account_map_type });
        }

        if self.source_forge == SourceForgeKind::Github {
            if self.gh_app_identifier.is_none() {
                return Err(ConfigError::Missing { key: "HC_GH_APP_IDENTIFIER" });
            }
            if self.gh_private_key.is_none() {
                return Err(ConfigError::Missing { key: "HC_GH_PRIVATE_KEY" });
            }
            if self.gh_requester.is_none() {
                return Err(ConfigError::Missing { key: "HC_GH_REQUESTER" });
            }
            if self.gh_secret.is_none() {
                return Err(ConfigError::Missing { key: "HC_GH_SECRET" });
            }
            if self.gh_bot_user.is_none() {
                return Err(ConfigError::Missing { key: "HC_GH_BOT_USER" });
            }
        }

        if self.gl_url.is_none() {
            return Err(ConfigError::Missing { key: "HC_GL_URL" });
        }
        if self.gl_access_token.is_none() {
            return Err(ConfigError::Missing { key: "HC_GL_ACCESS_TOKEN" });
        }
        if self.gl_secret.is_none() {
            return Err(ConfigError::Missing { key: "HC_GL_SECRET" });
        }
        if self.gl_callback_url.is_none() {
            return Err(ConfigError::Missing { key: "HC_GL_CALLBACK_URL" });
        }
        if self.gl_requester.is_none() {
            return Err(ConfigError::Missing { key: "HC_GL_REQUESTER" });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
