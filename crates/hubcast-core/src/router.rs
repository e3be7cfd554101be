//! Shallow + deep event-attribute routing registry (§4.6).
//!
//! Dispatch for an event with `kind = k`:
//! 1. Collect `shallow[k]` if present.
//! 2. If `deep[k]` is present and the event has `object_attributes`, for each
//!    `(attr, value_map)` in `deep[k]`, if `attr` is in `object_attributes`
//!    and its value is a key of `value_map`, extend the callback list.
//! 3. Invoke callbacks in registration order; a callback's error is caught
//!    and logged, and never stops other callbacks or escapes `dispatch`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::event::{Event, EventKind};

/// Error returned by a single callback invocation. Collected by `dispatch`
/// for observability but never allowed to abort the dispatch loop.
#[derive(Debug, thiserror::Error)]
#[error("callback '{callback}' failed: {message}")]
pub struct CallbackError {
    pub callback: String,
    pub message: String,
}

/// A unit of work bound to one or more event kinds in the router table.
#[async_trait]
pub trait EventCallback: Send + Sync {
    /// A short, stable name used in logs and in `CallbackError`.
    fn name(&self) -> &str;

    async fn call(&self, event: &Event) -> Result<(), String>;
}

type CallbackList = Vec<Arc<dyn EventCallback>>;

/// The shallow + deep registration table and dispatch loop.
#[derive(Default)]
pub struct Router {
    shallow: HashMap<String, CallbackList>,
    // kind -> attribute -> attribute_value -> callbacks
    deep: HashMap<String, HashMap<String, HashMap<String, CallbackList>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a callback to every event of kind `kind`.
    pub fn register(&mut self, kind: impl Into<String>, callback: Arc<dyn EventCallback>) {
        self.shallow.entry(kind.into()).or_default().push(callback);
    }

    /// Bind a callback to events of kind `kind` whose `object_attributes[attribute] == value`.
    pub fn register_deep(
        &mut self,
        kind: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
        callback: Arc<dyn EventCallback>,
    ) {
        self.deep
            .entry(kind.into())
            .or_default()
            .entry(attribute.into())
            .or_default()
            .entry(value.into())
            .or_default()
            .push(callback);
    }

    fn callbacks_for(&self, event: &Event) -> CallbackList {
        let kind = event.kind().as_str();
        let mut callbacks: CallbackList = self.shallow.get(kind).cloned().unwrap_or_default();

        if let (Some(deep_for_kind), Some(object_attributes)) =
            (self.deep.get(kind), event.object_attributes())
        {
            for (attribute, value_map) in deep_for_kind {
                let Some(actual_value) = object_attributes.get(attribute) else {
                    continue;
                };
                let Some(actual_value) = value_as_lookup_key(actual_value) else {
                    continue;
                };
                if let Some(bound) = value_map.get(&actual_value) {
                    callbacks.extend(bound.iter().cloned());
                }
            }
        }

        callbacks
    }

    /// Dispatch `event` to every bound callback in registration order.
    /// Returns the errors raised by individual callbacks, purely for the
    /// caller's own logging/metrics; it is never treated as dispatch failure.
    pub async fn dispatch(&self, event: &Event) -> Vec<CallbackError> {
        let callbacks = self.callbacks_for(event);
        let mut errors = Vec::new();

        for callback in callbacks {
            match callback.call(event).await {
                Ok(()) => {}
                Err(message) => {
                    let error = CallbackError {
                        callback: callback.name().to_string(),
                        message,
                    };
                    tracing::error!(
                        callback = %error.callback,
                        error = %error.message,
                        event_kind = %event.kind(),
                        delivery_id = %event.delivery_id(),
                        "sync callback failed"
                    );
                    errors.push(error);
                }
            }
        }

        errors
    }

    /// Registered event kinds and attribute keys, for the `hubcast routes
    /// print` CLI subcommand (§10.6) and for diagnostics.
    pub fn registered_kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self
            .shallow
            .keys()
            .chain(self.deep.keys())
            .map(|k| EventKind::new(k.clone()))
            .collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds.dedup();
        kinds
    }
}

fn value_as_lookup_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
