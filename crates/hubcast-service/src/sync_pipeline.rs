//! Pipeline-status relay, destination → source (§4.8). Registered only on
//! the router built for `/v1/events/dest/gitlab`, since the destination is
//! always GitLab (§1). `check_name` comes from the `src_check_name` query
//! parameter the callback webhook was registered with (§4.7, §6), not from
//! the repo config, since this handler never refetches it.

use async_trait::async_trait;
use hubcast_core::router::EventCallback;
use hubcast_core::{Event, ObjectId, PipelineStatus};
use serde_json::Value;

use crate::sync_context::{SyncContext, SyncError};

fn pipeline_sha(event: &Event) -> Option<ObjectId> {
    event.field_path(&["object_attributes", "sha"]).and_then(Value::as_str)?.parse().ok()
}

fn pipeline_status(event: &Event) -> Option<PipelineStatus> {
    let raw = event.field_path(&["object_attributes", "status"]).and_then(Value::as_str)?;
    PipelineStatus::parse(raw)
}

fn pipeline_url(event: &Event) -> Option<&str> {
    event.field_path(&["object_attributes", "url"]).and_then(Value::as_str)
}

pub struct PipelineStatusRelayCallback {
    pub ctx: SyncContext,
    pub check_name: String,
}

#[async_trait]
impl EventCallback for PipelineStatusRelayCallback {
    fn name(&self) -> &str {
        "pipeline_status_relay"
    }

    async fn call(&self, event: &Event) -> Result<(), String> {
        let result = self.handle(event).await;
        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) => e.metrics_outcome(),
        };
        self.ctx.metrics.record_sync_outcome("pipeline_status_relay", outcome);
        result.map_err(|e| e.to_string())
    }
}

impl PipelineStatusRelayCallback {
    async fn handle(&self, event: &Event) -> Result<(), SyncError> {
        let Some(status) = pipeline_status(event) else {
            return Ok(());
        };
        let sha = pipeline_sha(event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing pipeline commit sha".to_string(),
        })?;
        let url = pipeline_url(event);

        self.ctx.source.set_check_status(&sha, &self.check_name, status, url).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "sync_pipeline_tests.rs"]
mod tests;
