use std::sync::Arc;

use axum::http::HeaderValue;
use noise_core::config::{parse_or, ConfigError, OrchestrationConfig};

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT`; anything other than `json` means text.
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Everything except the engine command has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`). Must exceed the
    /// synchronous execution timeout.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running jobs, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Program run once per job by the command engine.
    pub engine_command: String,
    /// Arguments passed to `engine_command`, whitespace separated in `ENGINE_ARGS`.
    pub engine_args: Vec<String>,
    pub orchestration: Arc<OrchestrationConfig>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `60`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `ENGINE_COMMAND`       | required                   |
    /// | `ENGINE_ARGS`          | empty                      |
    ///
    /// Orchestration settings are read by [`OrchestrationConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "PORT", 8000, "a valid port number")?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| o.as_str() != "*" && o.parse::<HeaderValue>().is_err())
        {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGINS",
                expected: "a comma-separated list of origins",
                value: bad.clone(),
            });
        }

        let request_timeout_secs: u64 = parse_or(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            60,
            "an integer number of seconds",
        )?;
        let shutdown_timeout_secs: u64 = parse_or(
            &lookup,
            "SHUTDOWN_TIMEOUT_SECS",
            30,
            "an integer number of seconds",
        )?;

        let engine_command = lookup("ENGINE_COMMAND")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("ENGINE_COMMAND"))?;
        let engine_args = lookup("ENGINE_ARGS")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let orchestration = OrchestrationConfig::from_lookup(&lookup)?;

        let config = Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            engine_command,
            engine_args,
            orchestration: Arc::new(orchestration),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sync_secs = self.orchestration.sync_execution_timeout.as_secs();
        if self.request_timeout_secs <= sync_secs {
            return Err(ConfigError::Inconsistent(format!(
                "request timeout ({}s) must exceed the synchronous execution timeout ({sync_secs}s)",
                self.request_timeout_secs
            )));
        }
        Ok(())
    }
}
