//! Batch execution queue
//!
//! Commands are queued, then run strictly in order against a `Dispatch`.

pub mod item;
pub mod scheduler;

pub use item::{QueueItem, QueueStats, QueueStatus};
pub use scheduler::{CommandQueue, RunSummary, RUN_ABORTED};

/// Split a user-entered batch into commands, one per line
///
/// Lines are trimmed and blank lines dropped.
pub fn parse_batch(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
