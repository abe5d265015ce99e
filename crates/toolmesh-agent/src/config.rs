//! Client configuration file.
//!
//! ```yaml
//! servers:
//!   - name: math
//!     url: http://localhost:8000/mcp
//!     transport: streamable_http
//!   - name: weather
//!     url: http://localhost:8001/mcp
//! aggregator: { fetch_timeout: 10s, call_timeout: 30s }
//! reasoning: { max_rounds: 10, run_timeout: 2m }
//! oracle: { model: gemini-2.5-flash, api_key_env: GOOGLE_API_KEY, temperature: 0.0 }
//! ```
//!
//! Every section except `servers` is optional. Durations use humantime
//! syntax (`500ms`, `10s`, `2m`).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use toolmesh_core::EndpointId;
use tracing::debug;

use crate::aggregator::{AggregatorConfig, DEFAULT_CALL_TIMEOUT, DEFAULT_FETCH_TIMEOUT};
use crate::chat_completions::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_ORACLE_TIMEOUT, DEFAULT_SYSTEM_PROMPT, OracleConfig,
};
use crate::error::{AgentError, AgentResult};
use crate::reasoning::{DEFAULT_MAX_ROUNDS, LoopConfig};

/// Default whole-run budget.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variable holding the oracle API key unless configured otherwise.
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub servers: Vec<EndpointId>,
    #[serde(default)]
    pub aggregator: AggregatorSection,
    #[serde(default)]
    pub reasoning: ReasoningSection,
    #[serde(default)]
    pub oracle: OracleSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSection {
    #[serde(with = "humantime_duration")]
    pub fetch_timeout: Duration,
    #[serde(with = "humantime_duration")]
    pub call_timeout: Duration,
}

impl Default for AggregatorSection {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningSection {
    pub max_rounds: usize,
    #[serde(with = "humantime_duration")]
    pub run_timeout: Duration,
}

impl Default for ReasoningSection {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSection {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub system_prompt: String,
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }
}

impl AgentConfig {
    pub fn from_file(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AgentError::config(format!("cannot read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded client configuration");
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> AgentResult<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AgentResult<()> {
        if self.servers.is_empty() {
            return Err(AgentError::NoEndpointsConfigured);
        }

        let mut seen = HashSet::with_capacity(self.servers.len());
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(AgentError::config("server name must not be empty"));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(AgentError::config(format!(
                    "server '{}' is configured twice",
                    server.name
                )));
            }
        }

        if self.reasoning.max_rounds == 0 {
            return Err(AgentError::config("reasoning.max_rounds must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(AgentError::config("oracle.temperature must be between 0 and 2"));
        }
        Ok(())
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            fetch_timeout: self.aggregator.fetch_timeout,
            call_timeout: self.aggregator.call_timeout,
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_rounds: self.reasoning.max_rounds,
            run_timeout: Some(self.reasoning.run_timeout),
        }
    }

    /// Oracle settings, with the API key read from the configured variable.
    pub fn oracle_config(&self) -> AgentResult<OracleConfig> {
        let mut config = OracleConfig::new(&self.oracle.base_url, self.oracle.model.clone())?
            .with_temperature(self.oracle.temperature)
            .with_system_prompt(self.oracle.system_prompt.clone())
            .with_request_timeout(self.oracle.request_timeout);

        match std::env::var(&self.oracle.api_key_env) {
            Ok(key) if !key.is_empty() => config = config.with_api_key(key),
            _ => debug!(variable = %self.oracle.api_key_env, "No oracle API key in environment"),
        }
        Ok(config)
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}
