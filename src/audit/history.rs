//! In-memory audit trail of executed commands
//!
//! Newest entry first. Nothing is deduplicated, capped or persisted.

use crate::core::types::HistoryEntryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// A recorded execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    /// Tool the command was generated for, e.g. `nmap`
    pub tool: String,
    pub command: String,
    pub target: Option<String>,
    /// Command output, or the error text for failed runs
    pub output: String,
    /// AI analysis of the output, when one was produced
    pub analysis: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Run without the user pressing "execute"
    pub auto_executed: bool,
}

/// Caller-supplied part of a `HistoryEntry`; id and timestamp are assigned
/// on append
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub tool: String,
    pub command: String,
    pub target: Option<String>,
    pub output: String,
    pub analysis: Option<String>,
    pub success: bool,
    pub auto_executed: bool,
}

/// Append-only execution history shared between handles
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Arc<RwLock<VecDeque<HistoryEntry>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `entry` with a fresh id and the current time and record it
    pub fn append(&self, entry: NewHistoryEntry) -> HistoryEntry {
        let entry = HistoryEntry {
            id: HistoryEntryId::new(),
            tool: entry.tool,
            command: entry.command,
            target: entry.target,
            output: entry.output,
            analysis: entry.analysis,
            timestamp: Utc::now(),
            success: entry.success,
            auto_executed: entry.auto_executed,
        };

        debug!(id = %entry.id, tool = %entry.tool, success = entry.success, "Audit entry recorded");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push_front(entry.clone());
        entry
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        info!(removed = entries.len(), "Audit log cleared");
        entries.clear();
    }

    /// All entries, newest first
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<HistoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .front()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
