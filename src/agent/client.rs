//! HTTP client for the execution agent
//!
//! Thin wrapper over the agent's three endpoints. It reports failures as
//! `DispatchError`; turning those into non-failing outcomes is the job of
//! `DispatchClient` and `ConnectionMonitor`.

use crate::agent::dispatch::{DispatchError, ExecutionResult};
use crate::core::config::AgentSettings;
use crate::core::types::ProcessId;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Async client bound to one agent base URL
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
}

impl AgentClient {
    /// Create a client for an explicit base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self::new(settings.base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /health`, bounded by `limit`
    ///
    /// The bound covers the whole exchange including the body. Exceeding it
    /// yields `DispatchError::Timeout`.
    pub async fn health(&self, limit: Duration) -> Result<HealthReport, DispatchError> {
        let request = async {
            let response = self
                .client
                .get(self.url("/health"))
                .send()
                .await
                .map_err(|e| DispatchError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                return Err(DispatchError::Transport(format!(
                    "health check returned HTTP {}",
                    response.status()
                )));
            }

            response
                .json::<HealthReport>()
                .await
                .map_err(|e| DispatchError::Decode(e.to_string()))
        };

        tokio::time::timeout(limit, request)
            .await
            .map_err(|_| DispatchError::Timeout(limit))?
    }

    /// `POST /execute`
    ///
    /// No client-side deadline: the agent enforces `timeout_secs` itself.
    pub async fn execute(
        &self,
        command: &str,
        timeout_secs: u64,
    ) -> Result<ExecutionResult, DispatchError> {
        let request = ExecuteRequest {
            command,
            timeout: timeout_secs,
        };

        let response = self
            .client
            .post(self.url("/execute"))
            .json(&request)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        // The agent reports rejected requests with a JSON body too, so a
        // parseable body wins over the status code.
        match serde_json::from_str::<ExecutionResult>(&body) {
            Ok(result) => Ok(result),
            Err(_) if !status.is_success() => Err(DispatchError::Transport(format!(
                "execute returned HTTP {}",
                status
            ))),
            Err(e) => Err(DispatchError::Decode(e.to_string())),
        }
    }

    /// `POST /stop`; the response body is ignored
    pub async fn stop(&self, process_id: ProcessId) -> Result<(), DispatchError> {
        self.client
            .post(self.url("/stop"))
            .json(&StopRequest { process_id })
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Capability descriptor returned by `/health`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    command: &'a str,
    timeout: u64,
}

#[derive(Serialize)]
struct StopRequest {
    process_id: ProcessId,
}
