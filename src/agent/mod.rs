//! Execution agent plumbing
//!
//! `ConnectionMonitor` keeps a `ConnectionState` current; `DispatchClient`
//! reads it before sending commands through `AgentClient`.

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod monitor;

pub use client::{AgentClient, HealthReport};
pub use connection::{tool_name, AgentConnection, ConnectionState, ConnectionStatus};
pub use dispatch::{Dispatch, DispatchClient, DispatchError, ExecutionResult};
pub use monitor::ConnectionMonitor;
