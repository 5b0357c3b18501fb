//! In-memory registry of run state per keyword.
//!
//! The single mutex serializes all mutations, so a racing duplicate
//! submission always observes either no entry or a fully-written one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    RunningStep1,
    CompletedStep1,
    RunningStep2,
    CompletedStep2,
    Completed,
    Failed,
}

impl RunStatus {
    /// A run in either stage; duplicate submissions bounce off these.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::RunningStep1 | RunStatus::RunningStep2)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One keyword's run state, mutated only by its orchestrator task.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub keyword: String,
    pub status: RunStatus,
    pub step1_products: u32,
    pub step2_enriched: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub errors: Vec<String>,
}

impl RunSnapshot {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            status: RunStatus::NotStarted,
            step1_products: 0,
            step2_enriched: 0,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
            errors: Vec::new(),
        }
    }

    /// Derive `duration_seconds` from the timestamps. Skipped (left `None`)
    /// when `started_at` was never set.
    pub fn finalize_duration(&mut self) {
        if let (Some(started), Some(completed)) = (self.started_at, self.completed_at) {
            self.duration_seconds = (completed - started).to_std().ok().map(|d| d.as_secs_f64());
        }
    }
}

#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, RunSnapshot>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent run admission. If an active run exists for the keyword its
    /// snapshot is returned unchanged with `started = false`. Otherwise a
    /// fresh entry is created and marked RunningStep1 before this returns,
    /// so a racing duplicate observes "already running".
    pub async fn begin(&self, keyword: &str) -> (RunSnapshot, bool) {
        let mut runs = self.runs.lock().await;
        if let Some(existing) = runs.get(keyword) {
            if existing.status.is_active() {
                return (existing.clone(), false);
            }
        }

        let mut run = RunSnapshot::new(keyword);
        run.status = RunStatus::RunningStep1;
        runs.insert(keyword.to_string(), run.clone());
        (run, true)
    }

    pub async fn get(&self, keyword: &str) -> Option<RunSnapshot> {
        self.runs.lock().await.get(keyword).cloned()
    }

    pub async fn insert(&self, run: RunSnapshot) {
        self.runs.lock().await.insert(run.keyword.clone(), run);
    }

    /// Mutate the entry for a keyword under the lock; returns the updated
    /// snapshot, or `None` when no entry exists.
    pub async fn update<F>(&self, keyword: &str, mutate: F) -> Option<RunSnapshot>
    where
        F: FnOnce(&mut RunSnapshot),
    {
        let mut runs = self.runs.lock().await;
        let run = runs.get_mut(keyword)?;
        mutate(run);
        Some(run.clone())
    }

    pub async fn remove(&self, keyword: &str) -> Option<RunSnapshot> {
        self.runs.lock().await.remove(keyword)
    }

    /// Number of runs currently in stage 1 or 2.
    pub async fn active_count(&self) -> usize {
        self.runs
            .lock()
            .await
            .values()
            .filter(|r| r.status.is_active())
            .count()
    }
}
