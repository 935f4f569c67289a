//! Command dispatch with non-failing outcomes
//!
//! `DispatchClient::execute` never returns an error. Every failure, from
//! "agent offline" to a malformed response, is folded into an
//! `ExecutionResult` with `success == false` and a descriptive `error`.

use crate::agent::client::AgentClient;
use crate::agent::connection::{tool_name, ConnectionState};
use crate::core::config::AgentSettings;
use crate::core::types::ProcessId;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Message returned when dispatching while the agent is not online
pub const NOT_CONNECTED_MESSAGE: &str =
    "Execution agent is not connected. Start the agent on the execution host.";

/// Reasons a dispatch or probe can fail before a remote verdict exists
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Status was not online; no request was sent
    #[error("{}", NOT_CONNECTED_MESSAGE)]
    NotConnected,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid agent response: {0}")]
    Decode(String),

    /// The dispatch future panicked
    #[error("dispatch panicked: {0}")]
    Panicked(String),
}

/// Normalized outcome of one dispatch
///
/// Mirrors the agent's `/execute` response body. Missing `success`,
/// `output` or `error` fields deserialize as `false` / empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<ProcessId>,
}

impl ExecutionResult {
    /// Successful result with the given output
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            ..Self::default()
        }
    }

    /// Failed result carrying `error`'s message and empty output
    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            ..Self::default()
        }
    }
}

/// Anything the queue can hand a command to
///
/// Implemented by `DispatchClient` and by any
/// `Fn(String) -> impl Future<Output = Result<ExecutionResult, E>>`, which
/// lets tests drive the queue with plain closures. An `Err` marks the item
/// failed with the error's message.
pub trait Dispatch: Send + Sync + 'static {
    type Error: fmt::Display + Send + 'static;

    fn dispatch(
        &self,
        command: String,
    ) -> impl Future<Output = Result<ExecutionResult, Self::Error>> + Send + 'static;
}

impl<F, Fut, E> Dispatch for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ExecutionResult, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Error = E;

    fn dispatch(
        &self,
        command: String,
    ) -> impl Future<Output = Result<ExecutionResult, E>> + Send + 'static {
        self(command)
    }
}

/// Issues commands to the agent, gated on the shared connection status
#[derive(Debug, Clone)]
pub struct DispatchClient {
    client: AgentClient,
    connection: ConnectionState,
    default_timeout_secs: u64,
    /// Requests in flight across all clones
    executing: Arc<AtomicUsize>,
    last_result: Arc<Mutex<Option<ExecutionResult>>>,
}

impl DispatchClient {
    pub fn new(
        client: AgentClient,
        connection: ConnectionState,
        default_timeout_secs: u64,
    ) -> Self {
        Self {
            client,
            connection,
            default_timeout_secs,
            executing: Arc::new(AtomicUsize::new(0)),
            last_result: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_settings(settings: &AgentSettings, connection: ConnectionState) -> Self {
        Self::new(
            AgentClient::from_settings(settings),
            connection,
            settings.exec_timeout_secs,
        )
    }

    /// Run `command` on the agent
    ///
    /// `timeout_secs` defaults to the configured execution timeout. Returns
    /// immediately without any network traffic when the agent is not online.
    pub async fn execute(&self, command: &str, timeout_secs: Option<u64>) -> ExecutionResult {
        let connection = self.connection.snapshot();
        if !connection.is_online() {
            debug!(command, status = %connection.status, "Refusing dispatch, agent not online");
            return ExecutionResult::failure(DispatchError::NotConnected);
        }

        if connection.allowed_tools.is_some() && !connection.permits(command) {
            warn!(
                tool = tool_name(command).unwrap_or_default(),
                "Command tool is not on the agent's advertised list"
            );
        }

        let timeout = timeout_secs.unwrap_or(self.default_timeout_secs);
        let _busy = ExecutingGuard::engage(&self.executing);

        info!(command, timeout, "Dispatching command");
        let result = match self.client.execute(command, timeout).await {
            Ok(result) => result,
            Err(e) => {
                warn!(command, error = %e, "Dispatch failed");
                ExecutionResult::failure(e)
            }
        };
        info!(
            command,
            success = result.success,
            return_code = ?result.return_code,
            "Dispatch finished"
        );

        *self.last_result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
        result
    }

    /// Ask the agent to terminate `process_id`
    ///
    /// Advisory and fire-and-forget: failures are logged and dropped.
    pub async fn stop(&self, process_id: ProcessId) {
        match self.client.stop(process_id).await {
            Ok(()) => info!(%process_id, "Stop requested"),
            Err(e) => debug!(%process_id, error = %e, "Stop request failed; ignoring"),
        }
    }

    /// True while any request from this client or its clones is in flight
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst) > 0
    }

    /// Most recent result that reached the network path
    pub fn last_result(&self) -> Option<ExecutionResult> {
        self.last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }
}

impl Dispatch for DispatchClient {
    type Error = Infallible;

    fn dispatch(
        &self,
        command: String,
    ) -> impl Future<Output = Result<ExecutionResult, Infallible>> + Send + 'static {
        let client = self.clone();
        async move { Ok(client.execute(&command, None).await) }
    }
}

/// Counts one in-flight request; released on drop, including on panic or
/// cancellation of the owning future.
struct ExecutingGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> ExecutingGuard<'a> {
    fn engage(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
