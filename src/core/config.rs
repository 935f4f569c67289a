//! Relay configuration with documented defaults
//!
//! The agent endpoint and every timing constant live here. Values come from
//! built-in defaults, an optional TOML file, and finally environment overrides.

use crate::core::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides the agent base URL
pub const ENDPOINT_ENV: &str = "PENTEST_AGENT_URL";

/// Environment variable that overrides the default execution timeout (seconds)
pub const EXEC_TIMEOUT_ENV: &str = "PENTEST_AGENT_EXEC_TIMEOUT";

/// Top-level configuration file layout
///
/// ```toml
/// [agent]
/// endpoint = "http://localhost:8888"
/// probe_interval_secs = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub agent: AgentSettings,
}

/// Settings for talking to the execution agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Base URL of the agent. All endpoints (`/health`, `/execute`, `/stop`)
    /// are resolved against it.
    pub endpoint: String,

    /// Seconds between background liveness probes
    pub probe_interval_secs: u64,

    /// Upper bound on a single liveness probe (seconds)
    ///
    /// A probe that takes longer is treated exactly like a refused
    /// connection.
    pub probe_timeout_secs: u64,

    /// Default `timeout` forwarded with `/execute` (seconds)
    ///
    /// The agent enforces it; the relay only waits.
    pub exec_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8888".into(),
            probe_interval_secs: 10,
            probe_timeout_secs: 3,
            exec_timeout_secs: 300,
        }
    }
}

impl AgentSettings {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Endpoint without a trailing slash
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RelayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `PENTEST_AGENT_URL` and `PENTEST_AGENT_EXEC_TIMEOUT` if set
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(
            std::env::var(ENDPOINT_ENV).ok(),
            std::env::var(EXEC_TIMEOUT_ENV).ok(),
        )
    }

    fn with_overrides(
        mut self,
        endpoint: Option<String>,
        exec_timeout: Option<String>,
    ) -> Result<Self> {
        if let Some(endpoint) = endpoint {
            self.agent.endpoint = endpoint;
        }
        if let Some(raw) = exec_timeout {
            self.agent.exec_timeout_secs = raw.trim().parse().map_err(|_| {
                RelayError::Config(format!(
                    "{} must be a number of seconds, got {:?}",
                    EXEC_TIMEOUT_ENV, raw
                ))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let endpoint = self.agent.base_url();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(RelayError::Config(format!(
                "agent endpoint must be an http(s) URL, got {:?}",
                self.agent.endpoint
            )));
        }

        if self.agent.probe_interval_secs == 0 {
            return Err(RelayError::Config("probe_interval_secs must be positive".into()));
        }

        if self.agent.probe_timeout_secs == 0 {
            return Err(RelayError::Config("probe_timeout_secs must be positive".into()));
        }

        Ok(())
    }
}
