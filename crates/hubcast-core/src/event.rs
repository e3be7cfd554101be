//! The normalized event shape ingress handlers construct from HTTP requests
//! and hand to the [`crate::router::Router`] (§3).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The forge-reported event kind: GitHub's `X-GitHub-Event` header value
/// (`push`, `pull_request`, `issue_comment`, ...) or GitLab's `X-Gitlab-Event`
/// header value (`Push Hook`, `Merge Request Hook`, `Pipeline Hook`, ...).
///
/// Kept as an opaque string rather than a closed enum because the two
/// forges' vocabularies differ and the router (§4.6) only ever compares
/// kinds for equality against its registration table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKind(String);

impl EventKind {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub const GITHUB_PUSH: &'static str = "push";
    pub const GITHUB_PULL_REQUEST: &'static str = "pull_request";
    pub const GITHUB_ISSUE_COMMENT: &'static str = "issue_comment";
    pub const GITLAB_PUSH_HOOK: &'static str = "Push Hook";
    pub const GITLAB_MERGE_REQUEST_HOOK: &'static str = "Merge Request Hook";
    pub const GITLAB_PIPELINE_HOOK: &'static str = "Pipeline Hook";
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// An immutable, already-authenticated webhook event (§3).
///
/// `object_attributes` is populated for the GitLab events that carry a
/// nested `object_attributes` map (Merge Request Hook, Pipeline Hook); it is
/// `None` for GitHub events, whose payload shape differs per event kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    delivery_id: String,
    payload: Value,
    object_attributes: Option<Map<String, Value>>,
}

impl Event {
    pub fn new(kind: EventKind, delivery_id: impl Into<String>, payload: Value) -> Self {
        let object_attributes = payload
            .get("object_attributes")
            .and_then(Value::as_object)
            .cloned();
        Self {
            kind,
            delivery_id: delivery_id.into(),
            payload,
            object_attributes,
        }
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn delivery_id(&self) -> &str {
        &self.delivery_id
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn object_attributes(&self) -> Option<&Map<String, Value>> {
        self.object_attributes.as_ref()
    }

    /// Look up a top-level-ish payload field by JSON pointer path segments,
    /// e.g. `event.field_path(&["sender", "login"])`.
    pub fn field_path<'a>(&'a self, path: &[&str]) -> Option<&'a Value> {
        let mut current = &self.payload;
        for segment in path {
            current = current.get(segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
