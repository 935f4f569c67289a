pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentSettings, RelayConfig};
pub use error::{RelayError, Result};
pub use types::{HistoryEntryId, ProcessId, QueueItemId};
