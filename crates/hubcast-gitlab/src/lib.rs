//! GitLab impersonation-token authentication, REST client, and webhook
//! verification for Hubcast's GitLab-as-source and GitLab-as-destination
//! integrations (§4.3, §4.7, §4.8).

pub mod auth;
pub mod client;
pub mod webhook;

pub use auth::{GitLabAuthError, GitLabAuthenticator};
pub use client::GitLabClient;
pub use webhook::{construct_event, sender_login, source_repository, verify_token, GitLabWebhookError};
