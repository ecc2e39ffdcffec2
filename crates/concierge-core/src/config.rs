//! Agent endpoint configuration

use serde::{Deserialize, Serialize};

/// Connection settings for the backend conversational agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentEndpointConfig {
    /// Base URL of the agent service
    pub base_url: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    /// Overall request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AgentEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}
