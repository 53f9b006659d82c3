//! Normalized in-memory representation of a parsed workflow document.
//!
//! These types are the parser's *output*; the raw YAML shapes it reads
//! live in `parser::raw`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::expression::Expression;

/// A parsed, normalized workflow document.
#[derive(Debug, Clone)]
pub struct WorkflowDocument {
    pub name: String,
    pub description: String,
    pub steps: Vec<StepDeclaration>,
    pub user_parameters: HashMap<String, UserParameterSpec>,
    pub service_bindings: HashMap<String, ServiceBinding>,
    pub execution_config: ExecutionConfig,
}

#[derive(Debug, Clone)]
pub struct StepDeclaration {
    pub id: String,
    pub name: Option<String>,
    pub service: String,
    pub action: String,
    pub inputs: HashMap<String, Expression>,
    pub outputs: HashMap<String, OutputSpec>,
    pub depends_on: Vec<String>,
}

/// An output declaration: either resolved only at runtime, or a
/// reference to a named schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSpec {
    Runtime,
    SchemaRef(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserParameterSpec {
    #[serde(rename = "type", default)]
    pub param_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceBinding {
    #[serde(rename = "type", default)]
    pub binding_type: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSpec {
    #[serde(rename = "type", default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub timeout_seconds: Option<u64>,
    pub environment: HashMap<String, String>,
}
