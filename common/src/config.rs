//! Engine configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {name}")]
    MissingEnvVar { name: &'static str },
    /// Present but not parseable as the expected type.
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Process-wide engine configuration.
///
/// Wired explicitly into a `CatalogClient`, a `StepDispatcher`, and a
/// `WorkflowStore` at host-application startup; the engine itself holds
/// no global state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the Action Catalog Service.
    pub catalog_base_url: String,
    /// Timeout applied to each outbound catalog/action HTTP call.
    pub request_timeout: Duration,
    /// Upper bound on concurrently in-flight actions in parallel mode.
    pub max_workers: usize,
    /// Root directory for the Workflow Store's content-addressed layout.
    pub store_root: String,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CATALOG_BASE_URL`
    ///
    /// Optional (typed defaults applied when absent):
    /// - `CATALOG_REQUEST_TIMEOUT_SECS` (default 30)
    /// - `DISPATCH_MAX_WORKERS` (default: available parallelism)
    /// - `WORKFLOW_STORE_ROOT` (default `./.workflow-store`)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `CATALOG_BASE_URL` is unset,
    /// or `ConfigError::InvalidValue` if an optional variable is present
    /// but not parseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let catalog_base_url = get_required_env("CATALOG_BASE_URL")?;

        let request_timeout = match env::var("CATALOG_REQUEST_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "CATALOG_REQUEST_TIMEOUT_SECS",
                value: v,
            })?),
            Err(_) => Duration::from_secs(30),
        };

        let max_workers = match env::var("DISPATCH_MAX_WORKERS") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "DISPATCH_MAX_WORKERS",
                value: v,
            })?,
            Err(_) => std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
        };

        let store_root = env::var("WORKFLOW_STORE_ROOT")
            .unwrap_or_else(|_| "./.workflow-store".to_string());

        Ok(Self {
            catalog_base_url,
            request_timeout,
            max_workers,
            store_root,
        })
    }
}

fn get_required_env(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar { name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_catalog_url_is_an_error() {
        // SAFETY-equivalent: tests run single-threaded per process for this check.
        env::remove_var("CATALOG_BASE_URL");
        let result = EngineConfig::from_env();
        assert!(matches!(result, Err(ConfigError::MissingEnvVar { name: "CATALOG_BASE_URL" })));
    }

    #[test]
    fn invalid_timeout_is_an_error() {
        env::set_var("CATALOG_BASE_URL", "https://catalog.example.com");
        env::set_var("CATALOG_REQUEST_TIMEOUT_SECS", "not-a-number");
        let result = EngineConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        env::remove_var("CATALOG_REQUEST_TIMEOUT_SECS");
        env::remove_var("CATALOG_BASE_URL");
    }

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        env::set_var("CATALOG_BASE_URL", "https://catalog.example.com");
        env::remove_var("CATALOG_REQUEST_TIMEOUT_SECS");
        env::remove_var("WORKFLOW_STORE_ROOT");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.store_root, "./.workflow-store");
        env::remove_var("CATALOG_BASE_URL");
    }
}
