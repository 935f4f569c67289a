//! Auto-execute pipeline - AI text to audited execution
//!
//! Extracts a command from an assistant reply, dispatches it, optionally asks
//! for an analysis of the output, and records the outcome in the audit log.

use crate::agent::connection::tool_name;
use crate::agent::dispatch::{Dispatch, ExecutionResult};
use crate::audit::history::{AuditLog, HistoryEntry, NewHistoryEntry};
use crate::llm::extract::extract_command;
use std::future::Future;
use tracing::{debug, info};

/// Output recorded for a failed run that produced no error text
pub const EXECUTION_FAILED: &str = "Execution failed";

/// Produces an analysis of successful command output
///
/// The relay does not talk to the model itself; callers plug their
/// assistant in here.
pub trait OutputAnalyzer: Send + Sync {
    fn analyze(&self, tool: &str, output: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Analyzer that never produces an analysis
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnalysis;

impl OutputAnalyzer for NoAnalysis {
    async fn analyze(&self, _tool: &str, _output: &str) -> Option<String> {
        None
    }
}

/// Context recorded alongside an execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Tool the command belongs to; derived from the command when empty
    pub tool: String,
    pub target: Option<String>,
}

impl ExecutionRequest {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Runs single commands and writes them to the audit log
pub struct CommandExecutor;

impl CommandExecutor {
    /// Extract a command from `ai_text` and run it
    ///
    /// Returns `None` without dispatching when the text holds no shell block.
    pub async fn auto_execute<D, A>(
        ai_text: &str,
        request: &ExecutionRequest,
        dispatch: &D,
        analyzer: &A,
        log: &AuditLog,
    ) -> Option<HistoryEntry>
    where
        D: Dispatch,
        A: OutputAnalyzer,
    {
        let Some(command) = extract_command(ai_text) else {
            debug!("No command found in assistant reply");
            return None;
        };
        info!(command, "Auto-executing extracted command");
        Some(Self::execute(&command, request, dispatch, analyzer, log, true).await)
    }

    /// Run `command` and record the outcome
    pub async fn execute<D, A>(
        command: &str,
        request: &ExecutionRequest,
        dispatch: &D,
        analyzer: &A,
        log: &AuditLog,
        auto_executed: bool,
    ) -> HistoryEntry
    where
        D: Dispatch,
        A: OutputAnalyzer,
    {
        let result = match dispatch.dispatch(command.to_string()).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failure(e),
        };

        let tool = if request.tool.is_empty() {
            tool_name(command).unwrap_or_default().to_string()
        } else {
            request.tool.clone()
        };

        let analysis = if result.success && !result.output.is_empty() {
            analyzer.analyze(&tool, &result.output).await
        } else {
            None
        };

        let output = if result.success {
            result.output
        } else if result.error.is_empty() {
            EXECUTION_FAILED.to_string()
        } else {
            result.error
        };

        log.append(NewHistoryEntry {
            tool,
            command: command.to_string(),
            target: request.target.clone(),
            output,
            analysis,
            success: result.success,
            auto_executed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    struct EchoAnalyzer;

    impl OutputAnalyzer for EchoAnalyzer {
        async fn analyze(&self, tool: &str, output: &str) -> Option<String> {
            Some(format!("{} found: {}", tool, output))
        }
    }

    fn succeed(command: String) -> impl Future<Output = Result<ExecutionResult, Infallible>> {
        async move { Ok(ExecutionResult::succeeded(format!("out of {}", command))) }
    }

    fn fail_silently(
        _command: String,
    ) -> impl Future<Output = Result<ExecutionResult, Infallible>> {
        async move { Ok(ExecutionResult::default()) }
    }

    #[tokio::test]
    async fn test_auto_execute_records_success_with_analysis() {
        let log = AuditLog::new();
        let text = "Try:\n```bash\nnmap -sV 10.0.0.1\nnmap -A 10.0.0.1\n```";
        let request = ExecutionRequest::new("nmap").with_target("10.0.0.1");

        let entry = CommandExecutor::auto_execute(text, &request, &succeed, &EchoAnalyzer, &log)
            .await
            .unwrap();

        assert_eq!(entry.command, "nmap -sV 10.0.0.1");
        assert_eq!(entry.output, "out of nmap -sV 10.0.0.1");
        assert_eq!(entry.analysis.as_deref(), Some("nmap found: out of nmap -sV 10.0.0.1"));
        assert_eq!(entry.target.as_deref(), Some("10.0.0.1"));
        assert!(entry.success);
        assert!(entry.auto_executed);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_execute_miss_records_nothing() {
        let log = AuditLog::new();
        let entry = CommandExecutor::auto_execute(
            "no code here",
            &ExecutionRequest::default(),
            &succeed,
            &NoAnalysis,
            &log,
        )
        .await;
        assert!(entry.is_none());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_failure_records_error_without_analysis() {
        let log = AuditLog::new();
        let failing = |_command: String| async move {
            Ok::<_, Infallible>(ExecutionResult::failure("Command not in allowed list"))
        };

        let entry = CommandExecutor::execute(
            "rm -rf /tmp/x",
            &ExecutionRequest::default(),
            &failing,
            &EchoAnalyzer,
            &log,
            false,
        )
        .await;

        assert!(!entry.success);
        assert_eq!(entry.output, "Command not in allowed list");
        assert!(entry.analysis.is_none());
        assert_eq!(entry.tool, "rm");
        assert!(!entry.auto_executed);
    }

    #[tokio::test]
    async fn test_empty_failure_uses_placeholder() {
        let log = AuditLog::new();
        let entry = CommandExecutor::execute(
            "id",
            &ExecutionRequest::new("id"),
            &fail_silently,
            &NoAnalysis,
            &log,
            true,
        )
        .await;
        assert_eq!(entry.output, EXECUTION_FAILED);
    }

    #[tokio::test]
    async fn test_dispatch_error_becomes_failure() {
        let log = AuditLog::new();
        let broken = |_command: String| async move { Err::<ExecutionResult, _>("socket closed") };
        let entry = CommandExecutor::execute(
            "id",
            &ExecutionRequest::default(),
            &broken,
            &NoAnalysis,
            &log,
            false,
        )
        .await;
        assert!(!entry.success);
        assert_eq!(entry.output, "socket closed");
    }
}
