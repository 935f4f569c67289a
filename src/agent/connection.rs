//! Shared view of the execution agent's liveness and capabilities
//!
//! There is one `ConnectionState` per relay. The monitor is its only writer;
//! the dispatch client, the queue and any UI layer read snapshots or
//! subscribe to changes. Each write replaces the whole `AgentConnection`, so
//! readers never see a status from one probe paired with tools from another.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Liveness of the agent as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No probe has resolved yet, or one is outstanding
    Checking,
    Online,
    Offline,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionStatus::Checking => "checking",
            ConnectionStatus::Online => "online",
            ConnectionStatus::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// Snapshot of the agent connection
///
/// `version` and `allowed_tools` are only populated while `status` is
/// `Online`; the constructors enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConnection {
    pub status: ConnectionStatus,
    pub version: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
}

impl AgentConnection {
    pub fn checking() -> Self {
        Self {
            status: ConnectionStatus::Checking,
            version: None,
            allowed_tools: None,
        }
    }

    pub fn online(version: Option<String>, allowed_tools: Option<Vec<String>>) -> Self {
        Self {
            status: ConnectionStatus::Online,
            version,
            allowed_tools,
        }
    }

    pub fn offline() -> Self {
        Self {
            status: ConnectionStatus::Offline,
            version: None,
            allowed_tools: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ConnectionStatus::Online
    }

    /// Whether the agent advertises the command's base tool
    ///
    /// Advisory only. Returns `false` when offline or when no tool list was
    /// advertised.
    pub fn permits(&self, command: &str) -> bool {
        if !self.is_online() {
            return false;
        }
        match (&self.allowed_tools, tool_name(command)) {
            (Some(tools), Some(tool)) => tools.iter().any(|t| t == tool),
            _ => false,
        }
    }
}

impl Default for AgentConnection {
    fn default() -> Self {
        Self::checking()
    }
}

/// Base tool of a shell command line: first token with any path stripped
///
/// `"/usr/bin/nmap -sV host"` yields `"nmap"`.
pub fn tool_name(command: &str) -> Option<&str> {
    let first = command.split_whitespace().next()?;
    first.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Injectable handle to the process-wide connection record
///
/// Cheap to clone; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    tx: Arc<watch::Sender<AgentConnection>>,
}

impl ConnectionState {
    /// New state in `Checking`
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AgentConnection::checking());
        Self { tx: Arc::new(tx) }
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> AgentConnection {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.tx.borrow().status
    }

    pub fn is_online(&self) -> bool {
        self.status() == ConnectionStatus::Online
    }

    /// Receiver notified on every published record
    pub fn subscribe(&self) -> watch::Receiver<AgentConnection> {
        self.tx.subscribe()
    }

    /// Replace the record wholesale; last write wins
    pub(crate) fn publish(&self, connection: AgentConnection) {
        let next = connection.status;
        let previous = self.tx.send_replace(connection);
        if previous.status != next {
            info!(from = %previous.status, to = %next, "Agent connection status changed");
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
