//! GitHub App authentication, REST client, and webhook verification for
//! Hubcast's GitHub-as-source integration (§4.2, §4.7, §4.8).

pub mod auth;
pub mod client;
pub mod webhook;

pub use auth::{GitHubAuthError, GitHubAuthenticator};
pub use client::GitHubClient;
pub use webhook::{construct_event, sender_login, source_repository, verify_signature, GitHubWebhookError};
