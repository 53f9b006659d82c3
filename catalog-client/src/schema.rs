//! Catalog model: providers → services → functions, with JSON-Schema-shaped
//! input/output/error schemas attached to each function.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The full provider/service/function catalog fetched from the Action
/// Catalog Service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub providers: HashMap<String, Provider>,
}

impl Catalog {
    /// Look up a function by its `service.function` pair, searching every
    /// provider (a service name is unique across the catalog by
    /// construction of the upstream directory, not enforced here).
    #[must_use]
    pub fn find_function(&self, service: &str, action: &str) -> Option<&Function> {
        self.providers
            .values()
            .find_map(|p| p.services.get(service))
            .and_then(|s| s.functions.get(action))
    }

    /// True iff the named service exists in any provider.
    #[must_use]
    pub fn has_service(&self, service: &str) -> bool {
        self.providers.values().any(|p| p.services.contains_key(service))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub display_name: String,
    #[serde(default)]
    pub services: HashMap<String, Service>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub display_name: String,
    #[serde(default)]
    pub functions: HashMap<String, Function>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub example_payload: Option<Value>,
    #[serde(default)]
    pub output_schema: Option<JsonSchema>,
    #[serde(default)]
    pub error_schema: Option<JsonSchema>,
}

impl Function {
    /// Fields in `required_fields` that are missing from `inputs`.
    ///
    /// A JSON `null` at a required key counts as missing; a resolver
    /// `Deferred` placeholder (never reified as a `Value`, see
    /// `we_workflow_engine::resolver`) is accepted by the caller before
    /// this check ever runs.
    #[must_use]
    pub fn missing_required_fields(&self, inputs: &HashMap<String, Value>) -> Vec<String> {
        self.required_fields
            .iter()
            .filter(|name| !matches!(inputs.get(*name), Some(v) if !v.is_null()))
            .cloned()
            .collect()
    }

    /// True iff `field` is declared in this function's output schema.
    ///
    /// A function with no output schema is legacy and treated as
    /// accepting any output field (deferred runtime typing).
    #[must_use]
    pub fn declares_output_field(&self, field: &str) -> bool {
        match &self.output_schema {
            Some(schema) => schema.properties.contains_key(field),
            None => true,
        }
    }
}

/// A JSON-Schema-shaped object schema: `{type, properties, required}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type", default)]
    pub schema_type: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, SchemaProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type", default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Response body returned by `POST /execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default)]
    pub data: HashMap<String, Value>,
    #[serde(default)]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Catalog {
        let json = serde_json::json!({
            "providers": {
                "google": {
                    "display_name": "Google",
                    "services": {
                        "gmail": {
                            "display_name": "Gmail",
                            "functions": {
                                "send_message": {
                                    "name": "send_message",
                                    "required_fields": ["recipient_email", "body"],
                                    "output_schema": {
                                        "type": "object",
                                        "properties": {
                                            "message_id": {"type": "string"}
                                        },
                                        "required": ["message_id"]
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn finds_function_by_service_and_action() {
        let catalog = sample_catalog();
        let f = catalog.find_function("gmail", "send_message").unwrap();
        assert_eq!(f.name, "send_message");
    }

    #[test]
    fn unknown_service_returns_none() {
        let catalog = sample_catalog();
        assert!(catalog.find_function("nonexistent_service", "send_message").is_none());
    }

    #[test]
    fn missing_required_fields_reports_absent_and_null() {
        let catalog = sample_catalog();
        let f = catalog.find_function("gmail", "send_message").unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("recipient_email".to_string(), Value::Null);
        let missing = f.missing_required_fields(&inputs);
        assert_eq!(missing, vec!["recipient_email".to_string(), "body".to_string()]);
    }

    #[test]
    fn declares_output_field_true_for_known_field() {
        let catalog = sample_catalog();
        let f = catalog.find_function("gmail", "send_message").unwrap();
        assert!(f.declares_output_field("message_id"));
        assert!(!f.declares_output_field("thread_id"));
    }

    #[test]
    fn function_without_output_schema_accepts_any_field() {
        let f = Function {
            name: "legacy_fn".to_string(),
            required_fields: vec![],
            example_payload: None,
            output_schema: None,
            error_schema: None,
        };
        assert!(f.declares_output_field("anything"));
    }

    #[test]
    fn catalog_without_schemas_parses() {
        let json = serde_json::json!({
            "providers": {
                "legacy": {
                    "display_name": "Legacy",
                    "services": {
                        "svc": {
                            "display_name": "Svc",
                            "functions": {
                                "fn1": {"name": "fn1", "required_fields": []}
                            }
                        }
                    }
                }
            }
        });
        let catalog: Catalog = serde_json::from_value(json).unwrap();
        let f = catalog.find_function("svc", "fn1").unwrap();
        assert!(f.output_schema.is_none());
        assert!(f.error_schema.is_none());
    }
}
