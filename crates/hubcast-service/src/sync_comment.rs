//! `/hubcast ...` comment commands (§4.8). GitHub-source only: GitLab has no
//! reaction-on-comment primitive in scope here, and the legacy `@{bot_user}`
//! prefix is not honored (§9 design notes).

use async_trait::async_trait;
use hubcast_core::router::EventCallback;
use hubcast_core::{Event, RepoFullName};
use regex::Regex;
use serde_json::Value;

use crate::sync_context::{SyncContext, SyncError};
use crate::sync_pull_request::sync_pull_request;

const HELP_TEXT: &str = "Hubcast commands: `/hubcast help`, `/hubcast approve`, `/hubcast run pipeline`.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Help,
    Approve,
    RunPipeline,
}

fn parse_command(body: &str) -> Option<Command> {
    let help = Regex::new(r"(?i)^\s*/hubcast\s+help\b").unwrap();
    let approve = Regex::new(r"(?i)^\s*/hubcast\s+approve\b").unwrap();
    let run_pipeline = Regex::new(r"(?i)^\s*/hubcast\s+run\s+pipeline\b").unwrap();

    if help.is_match(body) {
        Some(Command::Help)
    } else if approve.is_match(body) {
        Some(Command::Approve)
    } else if run_pipeline.is_match(body) {
        Some(Command::RunPipeline)
    } else {
        None
    }
}

fn is_pull_request_comment(event: &Event) -> bool {
    event.field_path(&["issue", "pull_request"]).is_some()
}

fn comment_body(event: &Event) -> Option<&str> {
    event.field_path(&["comment", "body"]).and_then(Value::as_str)
}

fn comment_id(event: &Event) -> Option<u64> {
    event.field_path(&["comment", "id"]).and_then(Value::as_u64)
}

fn issue_number(event: &Event) -> Option<u64> {
    event.field_path(&["issue", "number"]).and_then(Value::as_u64)
}

fn source_repository(event: &Event) -> Option<(String, String)> {
    hubcast_github::source_repository(event)
}

pub struct CommentCommandCallback {
    pub ctx: SyncContext,
}

#[async_trait]
impl EventCallback for CommentCommandCallback {
    fn name(&self) -> &str {
        "comment_command"
    }

    async fn call(&self, event: &Event) -> Result<(), String> {
        let result = self.handle(event).await;
        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) => e.metrics_outcome(),
        };
        self.ctx.metrics.record_sync_outcome("comment_command", outcome);
        result.map_err(|e| e.to_string())
    }
}

impl CommentCommandCallback {
    async fn handle(&self, event: &Event) -> Result<(), SyncError> {
        if event.field_path(&["action"]).and_then(Value::as_str) != Some("created") {
            return Ok(());
        }
        if !is_pull_request_comment(event) {
            return Ok(());
        }
        let Some(body) = comment_body(event) else {
            return Ok(());
        };
        let Some(command) = parse_command(body) else {
            return Ok(());
        };

        let number = issue_number(event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing issue number".to_string(),
        })?;
        let (owner, name) = source_repository(event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing source repository".to_string(),
        })?;
        let fullname = RepoFullName::new(&owner, &name).map_err(|e| SyncError::InvalidPayload { message: e.to_string() })?;

        match command {
            Command::Help => {
                self.ctx.source.post_comment(number, HELP_TEXT).await?;
            }
            Command::Approve => {
                let pr = self.ctx.source.get_pull_request(number).await?;
                sync_pull_request(&self.ctx, &fullname, &pr).await?;
                if let Some(id) = comment_id(event) {
                    self.ctx.source.add_reaction_thumbsup(id).await?;
                }
            }
            Command::RunPipeline => {
                self.run_pipeline(event, &fullname, number).await?;
            }
        }
        Ok(())
    }

    async fn run_pipeline(&self, event: &Event, fullname: &RepoFullName, number: u64) -> Result<(), SyncError> {
        let pr = self.ctx.source.get_pull_request(number).await?;
        let repo_config = self.ctx.repo_config_resolver.get(fullname, self.ctx.source_raw_fetcher.as_ref(), false).await?;
        let branch = pr.github_target_ref();
        let branch_name = branch.as_str().strip_prefix("refs/heads/").unwrap_or(branch.as_str());

        let url = self
            .ctx
            .destination
            .run_pipeline(&repo_config.dest_org, &repo_config.dest_name, branch_name)
            .await?;

        match url {
            Some(url) => {
                self.ctx.source.post_comment(number, &format!("Pipeline started: {url}")).await?;
                if let Some(id) = comment_id(event) {
                    self.ctx.source.add_reaction_thumbsup(id).await?;
                }
            }
            None => {
                self.ctx.source.post_comment(number, "Failed to start the destination pipeline.").await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "sync_comment_tests.rs"]
mod tests;
