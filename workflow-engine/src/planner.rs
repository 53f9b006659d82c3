//! Drives parsing, resolution, and catalog validation into an immutable
//! Execution Plan.

use std::collections::HashMap;

use we_catalog_client::{Catalog, CatalogClient};

use crate::context::ParameterContext;
use crate::error::EngineError;
use crate::parser::parser::parse_workflow_document;
use crate::parser::validator::{validate_dependency_graph, validate_step_against_catalog, ValidationError};
use crate::resolver::{apply_user_parameter_defaults, check_required_user_parameters, resolve, ResolutionOutcome};
use crate::state::{ResolvedInput, ResolvedStep, StepStatus};

/// The immutable output of preparation: resolved steps in document
/// order, the seeded parameter context, and every error accumulated
/// while resolving and validating. A non-empty `validation_errors` means
/// the plan must not be dispatched.
#[derive(Debug)]
pub struct ExecutionPlan {
    pub resolved_steps: Vec<ResolvedStep>,
    pub parameter_context: ParameterContext,
    pub validation_errors: Vec<ValidationError>,
}

impl ExecutionPlan {
    #[must_use]
    pub fn is_executable(&self) -> bool {
        self.validation_errors.is_empty()
    }
}

/// Parse `yaml`, resolve every step's inputs against `context`, validate
/// against `catalog`, and assemble the plan.
///
/// Parse failures and a missing required user parameter (with no
/// declared default) are fatal and returned as `Err`; everything else
/// discovered during resolution and catalog validation is instead
/// accumulated into `ExecutionPlan::validation_errors` so a caller sees
/// every problem at once rather than the first one.
///
/// # Errors
///
/// Returns `EngineError::Parse` if `yaml` does not match the document
/// shape, or `EngineError::Resolution` if a user parameter declared
/// `required: true` has neither a caller-supplied value nor a default.
pub fn prepare_execution(yaml: &str, mut context: ParameterContext, catalog: &Catalog) -> Result<ExecutionPlan, EngineError> {
    let document = parse_workflow_document(yaml)?;
    apply_user_parameter_defaults(&document.user_parameters, &mut context.user_parameters);
    check_required_user_parameters(&document.user_parameters, &context)?;

    let mut errors = validate_dependency_graph(&document);
    let step_lookup: HashMap<String, (String, String)> = document
        .steps
        .iter()
        .map(|s| (s.id.clone(), (s.service.clone(), s.action.clone())))
        .collect();

    let mut resolved_steps = Vec::with_capacity(document.steps.len());
    for step in &document.steps {
        let mut inputs = HashMap::with_capacity(step.inputs.len());
        for (field, expr) in &step.inputs {
            match resolve(expr, &context) {
                Ok(ResolutionOutcome::Resolved(value)) => {
                    inputs.insert(field.clone(), ResolvedInput::Value(value));
                }
                Ok(ResolutionOutcome::Deferred) => {
                    inputs.insert(field.clone(), ResolvedInput::Deferred(expr.clone()));
                }
                Err(e) => errors.push(ValidationError::new(format!(
                    "step '{}' input '{field}': {e}",
                    step.id
                ))),
            }
        }

        errors.extend(validate_step_against_catalog(&step.id, &step.service, &step.action, &inputs, catalog, &step_lookup));

        resolved_steps.push(ResolvedStep {
            id: step.id.clone(),
            service: step.service.clone(),
            action: step.action.clone(),
            inputs,
            depends_on: step.depends_on.clone(),
            status: StepStatus::Pending,
            outputs: HashMap::new(),
            error: None,
        });
    }

    tracing::info!(workflow = %document.name, steps = resolved_steps.len(), errors = errors.len(), "plan produced");

    Ok(ExecutionPlan { resolved_steps, parameter_context: context, validation_errors: errors })
}

/// Fetch the Action Catalog from `client`, then prepare `yaml` against
/// it. A thin convenience over `prepare_execution` for callers that
/// don't already hold a `Catalog`.
///
/// # Errors
///
/// Returns `EngineError::Catalog` if the catalog fetch fails, otherwise
/// whatever `prepare_execution` returns.
pub async fn prepare_from_catalog(yaml: &str, context: ParameterContext, client: &CatalogClient) -> Result<ExecutionPlan, EngineError> {
    let catalog = client.get_service_catalog().await?;
    prepare_execution(yaml, context, &catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SystemParameters;
    use chrono::{TimeZone, Utc};
    use we_domain::User;

    fn catalog_with_send_message() -> Catalog {
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
                                    "required_fields": ["recipient_email"],
                                    "output_schema": {
                                        "type": "object",
                                        "properties": {"message_id": {"type": "string"}},
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

    fn context() -> ParameterContext {
        let user = User::new("a@b.com".to_string(), "A".to_string());
        let system = SystemParameters::seed(&user, "mock_oauth_token_valid", "UTC", Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap());
        let mut ctx = ParameterContext::new(crate::context::UserParameters::default(), system);
        ctx.user_parameters.0.insert("recipient_email".to_string(), serde_json::json!("recipient@example.com"));
        ctx
    }

    const SINGLE_STEP: &str = r#"
workflow:
  name: Send Report
  steps:
    - id: send_message
      service: gmail
      action: send_message
      inputs:
        recipient_email: "${user.recipient_email}"
"#;

    const UNKNOWN_SERVICE: &str = r#"
workflow:
  name: Broken
  steps:
    - id: step1
      service: nonexistent_service
      action: send_message
      inputs: {}
"#;

    #[test]
    fn single_step_plan_resolves_and_validates() {
        let plan = prepare_execution(SINGLE_STEP, context(), &catalog_with_send_message()).unwrap();
        assert!(plan.is_executable());
        assert_eq!(plan.resolved_steps.len(), 1);
        assert_eq!(plan.resolved_steps[0].service, "gmail");
        assert_eq!(plan.resolved_steps[0].action, "send_message");
    }

    #[test]
    fn unknown_service_yields_validation_error() {
        let plan = prepare_execution(UNKNOWN_SERVICE, context(), &catalog_with_send_message()).unwrap();
        assert!(!plan.is_executable());
        assert!(plan.validation_errors.iter().any(|e| e.message.contains("not found in catalog")));
    }

    #[test]
    fn token_and_email_propagate_into_system_parameters() {
        let plan = prepare_execution(SINGLE_STEP, context(), &catalog_with_send_message()).unwrap();
        assert_eq!(plan.parameter_context.system_parameters.oauth_token, "mock_oauth_token_valid");
        assert_eq!(plan.parameter_context.system_parameters.user_email, "a@b.com");
    }
}
