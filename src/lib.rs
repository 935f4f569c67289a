//! Pentest Relay - remote command execution orchestrator

pub mod agent;
pub mod audit;
pub mod command;
pub mod core;
pub mod llm;
pub mod queue;
