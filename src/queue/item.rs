//! Queued command records and their lifecycle
//!
//! `Pending -> Running -> Completed | Failed`. Transitions only move forward;
//! the mutators return `false` and leave the item untouched otherwise.

use crate::agent::dispatch::ExecutionResult;
use crate::core::types::QueueItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a queued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }
}

/// One command in the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub command: String,
    pub status: QueueStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// New pending item; `command` is stored as given
    pub(crate) fn new(command: impl Into<String>) -> Self {
        Self {
            id: QueueItemId::new(),
            command: command.into(),
            status: QueueStatus::Pending,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub(crate) fn mark_running(&mut self) -> bool {
        if self.status != QueueStatus::Pending {
            return false;
        }
        self.status = QueueStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Record a dispatch outcome on a running item
    pub(crate) fn finish(&mut self, result: &ExecutionResult) -> bool {
        if self.status != QueueStatus::Running {
            return false;
        }
        self.output = Some(result.output.clone());
        if result.success {
            self.status = QueueStatus::Completed;
            self.error = (!result.error.is_empty()).then(|| result.error.clone());
        } else {
            self.status = QueueStatus::Failed;
            self.error = Some(failure_message(result));
        }
        self.completed_at = Some(Utc::now());
        true
    }

    /// Mark a running item failed without a result
    pub(crate) fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status != QueueStatus::Running {
            return false;
        }
        self.status = QueueStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        true
    }
}

fn failure_message(result: &ExecutionResult) -> String {
    if !result.error.is_empty() {
        return result.error.clone();
    }
    match result.return_code {
        Some(code) => format!("Command exited with code {}", code),
        None => "Command failed".to_string(),
    }
}

/// Item counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a QueueItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut stats, item| {
            match item.status {
                QueueStatus::Pending => stats.pending += 1,
                QueueStatus::Running => stats.running += 1,
                QueueStatus::Completed => stats.completed += 1,
                QueueStatus::Failed => stats.failed += 1,
            }
            stats
        })
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }

    /// Percentage of items in a terminal state; 0 for an empty queue
    pub fn progress(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        ((self.completed + self.failed) * 100) as f64 / total as f64
    }
}
