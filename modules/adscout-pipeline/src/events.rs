//! Typed pipeline progress events and the emitter used by the orchestrator.
//!
//! Events are transient: they exist to be broadcast, not persisted. The only
//! thing that outlives delivery is the per-keyword snapshot held by the bus.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::bus::{EventBus, PipelineState};
use crate::config::RunRequest;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    PipelineStart {
        config: serde_json::Value,
        message: String,
    },
    StepStart {
        step: u8,
        step_name: String,
        details: String,
        message: String,
    },
    StepProgress {
        step: u8,
        progress: u32,
        total: u32,
        percentage: f64,
        current_item: Option<String>,
        message: String,
    },
    StepComplete {
        step: u8,
        results: serde_json::Value,
        duration_seconds: f64,
        message: String,
    },
    PipelineComplete {
        summary: serde_json::Value,
        total_duration_seconds: f64,
        message: String,
    },
    PipelineError {
        error: String,
        step: Option<u8>,
        message: String,
    },
    Log {
        level: String,
        message: String,
    },
    /// Synthetic catch-up event delivered to subscribers that join mid-run.
    StateSync {
        state: PipelineState,
    },
}

impl PipelineEvent {
    /// Wire name, used as the SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::PipelineStart { .. } => "pipeline_start",
            PipelineEvent::StepStart { .. } => "step_start",
            PipelineEvent::StepProgress { .. } => "step_progress",
            PipelineEvent::StepComplete { .. } => "step_complete",
            PipelineEvent::PipelineComplete { .. } => "pipeline_complete",
            PipelineEvent::PipelineError { .. } => "pipeline_error",
            PipelineEvent::Log { .. } => "log",
            PipelineEvent::StateSync { .. } => "state_sync",
        }
    }

    /// Whether this event ends the run (and therefore the stream).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::PipelineComplete { .. } | PipelineEvent::PipelineError { .. }
        )
    }
}

/// A broadcast event: the payload plus run correlation and wall-clock time.
/// `correlation_id` is `None` only for bus-synthesized state_sync events.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: PipelineEvent,
    pub correlation_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventEmitter
// ---------------------------------------------------------------------------

/// Per-run emitter. Stamps every event with the run's correlation id and
/// computes elapsed-time fields from the run start.
pub struct EventEmitter {
    bus: Arc<EventBus>,
    keyword: String,
    correlation_id: Uuid,
    started: DateTime<Utc>,
}

impl EventEmitter {
    pub fn new(bus: Arc<EventBus>, keyword: String) -> Self {
        Self {
            bus,
            keyword,
            correlation_id: Uuid::new_v4(),
            started: Utc::now(),
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    async fn emit(&self, event: PipelineEvent) {
        self.bus
            .publish(
                &self.keyword,
                Envelope {
                    event,
                    correlation_id: Some(self.correlation_id),
                    timestamp: Utc::now(),
                },
            )
            .await;
    }

    pub async fn start(&self, config: &RunRequest) {
        let config_json = serde_json::to_value(config).unwrap_or_default();
        self.emit(PipelineEvent::PipelineStart {
            config: config_json,
            message: format!("Starting pipeline for keyword: {}", self.keyword),
        })
        .await;
    }

    pub async fn step_start(&self, step: u8, step_name: &str, details: String) {
        self.emit(PipelineEvent::StepStart {
            step,
            step_name: step_name.to_string(),
            details,
            message: format!("Step {step} started: {step_name}"),
        })
        .await;
    }

    pub async fn step_progress(&self, step: u8, progress: u32, total: u32, current_item: Option<String>) {
        let percentage = if total > 0 {
            (progress as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        self.emit(PipelineEvent::StepProgress {
            step,
            progress,
            total,
            percentage,
            current_item,
            message: format!("Step {step}: {progress}/{total} completed"),
        })
        .await;
    }

    pub async fn step_complete(&self, step: u8, results: serde_json::Value) {
        self.emit(PipelineEvent::StepComplete {
            step,
            results,
            duration_seconds: self.elapsed_seconds(),
            message: format!("Step {step} completed successfully"),
        })
        .await;
    }

    pub async fn complete(&self, summary: serde_json::Value) {
        self.emit(PipelineEvent::PipelineComplete {
            summary,
            total_duration_seconds: self.elapsed_seconds(),
            message: "Pipeline completed successfully".to_string(),
        })
        .await;
    }

    pub async fn error(&self, error: &str, step: Option<u8>) {
        self.emit(PipelineEvent::PipelineError {
            error: error.to_string(),
            step,
            message: format!("Pipeline error: {error}"),
        })
        .await;
    }

    pub async fn log(&self, level: &str, message: impl Into<String>) {
        self.emit(PipelineEvent::Log {
            level: level.to_string(),
            message: message.into(),
        })
        .await;
    }

    fn elapsed_seconds(&self) -> f64 {
        (Utc::now() - self.started)
            .to_std()
            .map(|d| (d.as_secs_f64() * 10.0).round() / 10.0)
            .unwrap_or(0.0)
    }
}
