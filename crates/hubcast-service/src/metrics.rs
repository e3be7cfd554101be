//! Prometheus metrics for ingress and sync outcomes (§10.3).
//!
//! Deliberately a small slice of what the model codebase's `ServiceMetrics`
//! exposes — sized to what this service actually does (ingress + git-wire
//! sync), not mass-ported from a queue-processing pipeline.
//!
//! Each [`ServiceMetrics`] owns its own [`prometheus::Registry`] rather than
//! registering into the global default registry, so tests (and any future
//! multi-instance embedding) can construct more than one without colliding
//! on metric names.

use std::sync::Arc;

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Webhook ingress outcomes, labeled `source_forge` (`github`/`gitlab`)
    /// and `outcome` (`received`/`accepted`/`rejected_signature`/`benign_skipped`).
    pub webhooks_total: IntCounterVec,

    /// Sync-handler outcomes, labeled `operation` (`push`/`pull_request_sync`/
    /// `pull_request_close`/`comment_command`/`pipeline_status_relay`) and
    /// `outcome` (`ok`/`git_wire_failure`/`upstream_failure`).
    pub sync_outcomes_total: IntCounterVec,

    /// Round-trip latency of a single git smart-HTTP operation
    /// (`ls_remote`/`fetch_pack`/`send_pack`).
    pub git_wire_duration_seconds: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhooks_total = IntCounterVec::new(
            Opts::new("hubcast_webhooks_total", "Webhook ingress requests by source forge and outcome"),
            &["source_forge", "outcome"],
        )?;
        registry.register(Box::new(webhooks_total.clone()))?;

        let sync_outcomes_total = IntCounterVec::new(
            Opts::new("hubcast_sync_outcomes_total", "Sync handler outcomes by operation and outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(sync_outcomes_total.clone()))?;

        let git_wire_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "hubcast_git_wire_duration_seconds",
                "Round-trip latency of a single git smart-HTTP operation",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(git_wire_duration_seconds.clone()))?;

        Ok(Arc::new(Self { registry, webhooks_total, sync_outcomes_total, git_wire_duration_seconds }))
    }

    pub fn record_webhook(&self, source_forge: &str, outcome: &str) {
        self.webhooks_total.with_label_values(&[source_forge, outcome]).inc();
    }

    pub fn record_sync_outcome(&self, operation: &str, outcome: &str) {
        self.sync_outcomes_total.with_label_values(&[operation, outcome]).inc();
    }

    pub fn record_git_wire_duration(&self, seconds: f64) {
        self.git_wire_duration_seconds.observe(seconds);
    }

    /// Render this instance's metrics in Prometheus text exposition format,
    /// for the `GET /metrics` handler.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
