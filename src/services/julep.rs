//! Julep task-runner client
//!
//! Thin typed wrapper over the Julep REST API: users, sessions, tasks, and
//! task executions. Enrichment work (birth charts, horoscopes) runs as task
//! executions that are polled until they reach a terminal state.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::JulepArgs;
use crate::types::{AstraError, Result};

/// Terminal and in-flight execution states reported by Julep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Queued,
    Starting,
    Running,
    AwaitingInput,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Succeeded | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Julep user record (the external half of the account linkage)
#[derive(Debug, Clone, Deserialize)]
pub struct JulepUser {
    pub id: String,
}

/// Julep session record
#[derive(Debug, Clone, Deserialize)]
pub struct JulepSession {
    pub id: String,
}

/// Julep task record
#[derive(Debug, Clone, Deserialize)]
pub struct JulepTask {
    pub id: String,
}

/// Julep task execution
#[derive(Debug, Clone, Deserialize)]
pub struct JulepExecution {
    pub id: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Client for the Julep REST API
#[derive(Clone)]
pub struct JulepClient {
    client: Client,
    base_url: String,
    api_key: String,
    /// Delay between execution status polls
    poll_interval: Duration,
    /// Maximum polls before giving up on an execution
    max_polls: u32,
}

impl JulepClient {
    pub fn new(config: &JulepArgs, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AstraError::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.julep_base_url.trim_end_matches('/').to_string(),
            api_key: config.julep_api_key.clone(),
            poll_interval: Duration::from_secs(2),
            max_polls: 60,
        })
    }

    /// Create a Julep user for a local account
    pub async fn create_user(&self, name: &str, about: &str) -> Result<JulepUser> {
        let body = serde_json::json!({ "name": name, "about": about });
        self.post_json("/users", &body).await
    }

    /// Create a session between a user and the enrichment agent
    pub async fn create_session(&self, user_id: &str, agent_id: &str) -> Result<JulepSession> {
        let body = serde_json::json!({ "user": user_id, "agent": agent_id });
        self.post_json("/sessions", &body).await
    }

    /// Register a task definition on an agent
    pub async fn create_task(&self, agent_id: &str, definition: &Value) -> Result<JulepTask> {
        let path = format!("/agents/{}/tasks", agent_id);
        self.post_json(&path, definition).await
    }

    /// Start a task execution with the given input
    pub async fn execute_task(&self, task_id: &str, input: &Value) -> Result<JulepExecution> {
        let path = format!("/tasks/{}/executions", task_id);
        let body = serde_json::json!({ "input": input });
        self.post_json(&path, &body).await
    }

    /// Fetch the current state of an execution
    pub async fn get_execution(&self, execution_id: &str) -> Result<JulepExecution> {
        let url = format!("{}/executions/{}", self.base_url, execution_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AstraError::Julep(format!("Request failed: {}", e)))?;

        self.parse_response(response).await
    }

    /// Poll an execution until it reaches a terminal state.
    ///
    /// Returns the succeeded execution; failed or cancelled executions map to
    /// an error carrying the execution's own error message when present.
    pub async fn wait_for_execution(&self, execution_id: &str) -> Result<JulepExecution> {
        for attempt in 0..self.max_polls {
            let execution = self.get_execution(execution_id).await?;

            if execution.status.is_terminal() {
                return match execution.status {
                    ExecutionStatus::Succeeded => {
                        info!(execution = %execution_id, polls = attempt + 1, "Execution succeeded");
                        Ok(execution)
                    }
                    status => {
                        warn!(execution = %execution_id, status = ?status, "Execution did not succeed");
                        Err(AstraError::Julep(format!(
                            "Execution {} ended as {:?}: {}",
                            execution_id,
                            status,
                            execution.error.unwrap_or_else(|| "no error detail".into())
                        )))
                    }
                };
            }

            debug!(
                execution = %execution_id,
                status = ?execution.status,
                attempt = attempt + 1,
                "Execution still running"
            );
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(AstraError::Julep(format!(
            "Execution {} did not finish within {} polls",
            execution_id, self.max_polls
        )))
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        debug!(url = %url, "Julep POST");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AstraError::Julep(format!("Request to {} timed out", path))
                } else {
                    AstraError::Julep(format!("Request failed: {}", e))
                }
            })?;

        self.parse_response(response).await
    }

    async fn parse_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AstraError::Julep(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AstraError::Julep(format!("Invalid response: {}", e)))
    }

    /// Base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ExecutionStatus::Succeeded.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Queued.is_terminal());
    }

    #[test]
    fn test_status_deserializes_snake_case() {
        let status: ExecutionStatus = serde_json::from_str("\"awaiting_input\"").unwrap();
        assert_eq!(status, ExecutionStatus::AwaitingInput);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = JulepArgs {
            julep_api_key: "key".into(),
            julep_base_url: "https://api.julep.ai/api/".into(),
            julep_agent_id: "agent".into(),
        };
        let client = JulepClient::new(&config, 5000).unwrap();
        assert_eq!(client.base_url(), "https://api.julep.ai/api");
    }
}
