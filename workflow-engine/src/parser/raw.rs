//! Raw YAML shapes, mirroring the document format exactly before any
//! normalization (combined vs. split action, expression compilation).
//!
//! `deny_unknown_fields` on every struct here is the compilation step
//! against the embedded schema (§7): a document with an unrecognized
//! key fails to parse instead of silently ignoring it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{ExecutionConfig, ExecutionMode, ServiceBinding, UserParameterSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRoot {
    pub workflow: RawWorkflow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<RawStep>,
    #[serde(default)]
    pub user_parameters: HashMap<String, UserParameterSpec>,
    #[serde(default)]
    pub service_bindings: HashMap<String, ServiceBinding>,
    #[serde(default)]
    pub execution_config: RawExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStep {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    pub action: String,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    /// Each value is either the literal string `"RUNTIME"` or a named
    /// schema reference; see `crate::document::OutputSpec`.
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

impl From<RawExecutionConfig> for ExecutionConfig {
    fn from(raw: RawExecutionConfig) -> Self {
        Self {
            mode: raw.mode,
            timeout_seconds: raw.timeout_seconds,
            environment: raw.environment,
        }
    }
}
