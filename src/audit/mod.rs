pub mod history;

pub use history::{AuditLog, HistoryEntry, NewHistoryEntry};
