//! # Server Configuration
//!
//! Configuration for the MCP streamable HTTP endpoint, loaded from defaults,
//! then environment variables, then explicit overrides (the CLI applies its
//! flags on top of [`McpServerConfigBuilder::from_env`]).
//!
//! ## Environment Variables
//!
//! - `TOOLMESH_HOST` - Bind address (default: 0.0.0.0)
//! - `TOOLMESH_PORT` - Bind port (default: 8000)
//! - `TOOLMESH_MCP_PATH` - Mount path of the endpoint (default: /mcp)
//! - `TOOLMESH_JSON_RESPONSE` - Answer with buffered JSON instead of an event stream (default: false)
//! - `TOOLMESH_CALL_TIMEOUT` - Per-call execution budget, humantime syntax (default: 30s)
//! - `TOOLMESH_SHUTDOWN_TIMEOUT` - Drain deadline after a shutdown signal (default: 10s)
//! - `TOOLMESH_MAX_BODY_SIZE` - Maximum request body size in bytes (default: 4194304 / 4MB)
//! - `TOOLMESH_PAGE_SIZE` - Tools per `tools/list` page, unset for a single page

use std::{env, fmt, time::Duration};

/// Response encoding for JSON-RPC replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// One buffered `application/json` body
    Json,
    /// A `text/event-stream` with one `message` event
    #[default]
    Sse,
}

impl ResponseMode {
    pub fn from_json_flag(json_response: bool) -> Self {
        if json_response {
            ResponseMode::Json
        } else {
            ResponseMode::Sse
        }
    }

    /// Media type of the response body in this mode
    pub fn content_type(&self) -> &'static str {
        match self {
            ResponseMode::Json => "application/json",
            ResponseMode::Sse => "text/event-stream",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Json => f.write_str("json"),
            ResponseMode::Sse => f.write_str("sse"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable '{key}': {message}")]
    InvalidEnvVar { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Validated server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub response_mode: ResponseMode,
    pub call_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub max_body_size: usize,
    pub page_size: Option<usize>,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            path: "/mcp".to_string(),
            response_mode: ResponseMode::default(),
            call_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            max_body_size: 4 * 1024 * 1024, // 4MB
            page_size: None,
        }
    }
}

impl McpServerConfig {
    pub fn builder() -> McpServerConfigBuilder {
        McpServerConfigBuilder::new()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default)]
pub struct McpServerConfigBuilder {
    config: McpServerConfig,
}

impl McpServerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::default();

        if let Some(host) = get_env_string("TOOLMESH_HOST") {
            builder = builder.host(host);
        }
        if let Some(port) = get_env_u16("TOOLMESH_PORT")? {
            builder = builder.port(port);
        }
        if let Some(path) = get_env_string("TOOLMESH_MCP_PATH") {
            builder = builder.path(path);
        }
        if let Some(json) = get_env_bool("TOOLMESH_JSON_RESPONSE")? {
            builder = builder.response_mode(ResponseMode::from_json_flag(json));
        }
        if let Some(timeout) = get_env_duration("TOOLMESH_CALL_TIMEOUT")? {
            builder = builder.call_timeout(timeout);
        }
        if let Some(timeout) = get_env_duration("TOOLMESH_SHUTDOWN_TIMEOUT")? {
            builder = builder.shutdown_timeout(timeout);
        }
        if let Some(size) = get_env_usize("TOOLMESH_MAX_BODY_SIZE")? {
            builder = builder.max_body_size(size);
        }
        if let Some(size) = get_env_usize("TOOLMESH_PAGE_SIZE")? {
            builder = builder.page_size(Some(size));
        }

        Ok(builder)
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    #[must_use]
    pub fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.config.response_mode = mode;
        self
    }

    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: Option<usize>) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn build(self) -> Result<McpServerConfig, ConfigError> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let config = &self.config;

        if !config.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "path must start with '/', got '{}'",
                config.path
            )));
        }
        if config.path.len() > 1 && config.path.ends_with('/') {
            return Err(ConfigError::ValidationError(
                "path must not end with '/'".to_string(),
            ));
        }
        if config.call_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "call_timeout must be greater than 0".to_string(),
            ));
        }
        if config.max_body_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_body_size must be greater than 0".to_string(),
            ));
        }
        if config.max_body_size > 100 * 1024 * 1024 {
            return Err(ConfigError::ValidationError(
                "max_body_size must be <= 100MB".to_string(),
            ));
        }
        if config.page_size == Some(0) {
            return Err(ConfigError::ValidationError(
                "page_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn get_env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(val) => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!(
                    "invalid boolean value '{val}', expected true/false/1/0/yes/no/on/off"
                ),
            }),
        },
        Err(_) => Ok(None),
    }
}

fn get_env_u16(key: &str) -> Result<Option<u16>, ConfigError> {
    match env::var(key) {
        Ok(val) => val
            .parse::<u16>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid port value '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}

fn get_env_usize(key: &str) -> Result<Option<usize>, ConfigError> {
    match env::var(key) {
        Ok(val) => val
            .parse::<usize>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid usize value '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}

fn get_env_duration(key: &str) -> Result<Option<Duration>, ConfigError> {
    match env::var(key) {
        Ok(val) => humantime::parse_duration(&val)
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid duration '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let config = McpServerConfigBuilder::new().build().unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.path, "/mcp");
        assert_eq!(config.response_mode, ResponseMode::Sse);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.max_body_size, 4 * 1024 * 1024);
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_builder_validation_path() {
        let result = McpServerConfigBuilder::new().path("mcp").build();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("path must start with '/'")
        );

        assert!(McpServerConfigBuilder::new().path("/mcp/").build().is_err());
        assert!(McpServerConfigBuilder::new().path("/").build().is_ok());
    }

    #[test]
    fn test_builder_validation_limits() {
        assert!(
            McpServerConfigBuilder::new()
                .call_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(McpServerConfigBuilder::new().max_body_size(0).build().is_err());
        assert!(
            McpServerConfigBuilder::new()
                .page_size(Some(0))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_json_flag() {
        assert_eq!(ResponseMode::from_json_flag(true), ResponseMode::Json);
        assert_eq!(ResponseMode::from_json_flag(false), ResponseMode::Sse);
    }

    // Env vars are process-global; each test uses its own keys.
    #[test]
    fn test_env_parsing_helpers() {
        unsafe {
            env::set_var("TOOLMESH_TEST_DURATION", "1m 30s");
            env::set_var("TOOLMESH_TEST_BOOL", "maybe");
        }
        assert_eq!(
            get_env_duration("TOOLMESH_TEST_DURATION").unwrap(),
            Some(Duration::from_secs(90))
        );
        assert!(matches!(
            get_env_bool("TOOLMESH_TEST_BOOL"),
            Err(ConfigError::InvalidEnvVar { .. })
        ));
        assert_eq!(get_env_u16("TOOLMESH_TEST_UNSET_PORT").unwrap(), None);
        unsafe {
            env::remove_var("TOOLMESH_TEST_DURATION");
            env::remove_var("TOOLMESH_TEST_BOOL");
        }
    }
}
