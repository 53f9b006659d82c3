//! Workflow document parsing and action-field normalization.

use std::collections::HashMap;

use thiserror::Error;

use crate::document::{OutputSpec, StepDeclaration, WorkflowDocument};
use crate::expression::{Expression, ExpressionParseError};

use super::raw::{RawRoot, RawStep};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("step '{0}' has an ambiguous action: both 'service' and a dotted 'action' were given")]
    AmbiguousAction(String),

    #[error("step '{0}' action '{1}' has no service qualifier and no '.' separator")]
    UnqualifiedAction(String, String),

    #[error("invalid expression in step '{step_id}' input '{field}': {source}")]
    InvalidExpression {
        step_id: String,
        field: String,
        #[source]
        source: ExpressionParseError,
    },
}

/// Parse a workflow document from its YAML text, extracting the
/// `workflow` subtree and normalizing each step's action field.
///
/// # Errors
///
/// Returns `ParseError::Yaml` if the text is not valid YAML or does not
/// match the document shape, or a normalization error if a step's
/// `service`/`action` fields are ambiguous or malformed.
pub fn parse_workflow_document(yaml: &str) -> Result<WorkflowDocument, ParseError> {
    let root: RawRoot = serde_yaml::from_str(yaml)?;
    let raw = root.workflow;

    let steps = raw
        .steps
        .into_iter()
        .map(normalize_step)
        .collect::<Result<Vec<_>, _>>()?;

    let document = WorkflowDocument {
        name: raw.name,
        description: raw.description,
        steps,
        user_parameters: raw.user_parameters,
        service_bindings: raw.service_bindings,
        execution_config: raw.execution_config.into(),
    };

    tracing::debug!(workflow = %document.name, steps = document.steps.len(), "document parsed");

    Ok(document)
}

/// Normalize a step's `service`/`action` fields to the canonical split
/// form, compiling each input expression along the way.
///
/// Two shapes are accepted: a combined `action: "service.function"` with
/// no `service` field, or a split `service` + bare `action`. A `service`
/// field paired with a dotted `action` is rejected as ambiguous.
fn normalize_step(raw: RawStep) -> Result<StepDeclaration, ParseError> {
    let (service, action) = match (raw.service, raw.action.contains('.')) {
        (Some(_service), true) => return Err(ParseError::AmbiguousAction(raw.id)),
        (Some(service), false) => (service, raw.action),
        (None, true) => {
            let mut parts = raw.action.splitn(2, '.');
            let service = parts.next().unwrap_or_default().to_string();
            let action = parts.next().unwrap_or_default().to_string();
            (service, action)
        }
        (None, false) => return Err(ParseError::UnqualifiedAction(raw.id, raw.action)),
    };

    let mut inputs = HashMap::with_capacity(raw.inputs.len());
    for (field, value) in raw.inputs {
        let expr = Expression::parse(&value).map_err(|source| ParseError::InvalidExpression {
            step_id: raw.id.clone(),
            field: field.clone(),
            source,
        })?;
        inputs.insert(field, expr);
    }

    let outputs = raw
        .outputs
        .into_iter()
        .map(|(field, spec)| {
            let parsed = if spec == "RUNTIME" {
                OutputSpec::Runtime
            } else {
                OutputSpec::SchemaRef(spec)
            };
            (field, parsed)
        })
        .collect();

    Ok(StepDeclaration {
        id: raw.id,
        name: raw.name,
        service,
        action,
        inputs,
        outputs,
        depends_on: raw.depends_on,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPLIT_FORM: &str = r#"
workflow:
  name: Send Report
  description: Send a report to a recipient
  steps:
    - id: send_message
      service: gmail
      action: send_message
      inputs:
        recipient_email: "${user.recipient_email}"
      outputs:
        message_id: RUNTIME
  user_parameters:
    recipient_email:
      type: string
      required: true
"#;

    const COMBINED_FORM: &str = r#"
workflow:
  name: Send Report
  steps:
    - id: send_message
      action: gmail.send_message
      inputs:
        recipient_email: "${user.recipient_email}"
"#;

    const MIXED_FORM: &str = r#"
workflow:
  name: Send Report
  steps:
    - id: send_message
      service: gmail
      action: gmail.send_message
      inputs: {}
"#;

    #[test]
    fn parses_split_service_action_form() {
        let doc = parse_workflow_document(SPLIT_FORM).unwrap();
        assert_eq!(doc.steps[0].service, "gmail");
        assert_eq!(doc.steps[0].action, "send_message");
    }

    #[test]
    fn normalizes_combined_action_form() {
        let doc = parse_workflow_document(COMBINED_FORM).unwrap();
        assert_eq!(doc.steps[0].service, "gmail");
        assert_eq!(doc.steps[0].action, "send_message");
    }

    #[test]
    fn rejects_mixed_form() {
        let result = parse_workflow_document(MIXED_FORM);
        assert!(matches!(result, Err(ParseError::AmbiguousAction(_))));
    }

    #[test]
    fn rejects_invalid_yaml() {
        let result = parse_workflow_document("not: [valid: yaml");
        assert!(matches!(result, Err(ParseError::Yaml(_))));
    }

    #[test]
    fn compiles_reference_expressions_in_inputs() {
        let doc = parse_workflow_document(SPLIT_FORM).unwrap();
        let input = doc.steps[0].inputs.get("recipient_email").unwrap();
        assert!(matches!(input, Expression::Ref(_)));
    }
}
