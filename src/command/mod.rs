//! Single-command execution pipeline
//!
//! AI text -> extract_command -> Dispatch -> OutputAnalyzer -> AuditLog

pub mod executor;

pub use executor::{CommandExecutor, ExecutionRequest, NoAnalysis, OutputAnalyzer};
