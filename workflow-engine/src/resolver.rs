//! Pure resolution of compiled `Expression` trees against a
//! `ParameterContext`.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::context::ParameterContext;
use crate::expression::{Expression, Ref, TemplatePart};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("user parameter '{0}' is required but was not supplied")]
    MissingUserParameter(String),
    #[error("system parameter '{0}' is not a recognized system field")]
    UnknownSystemParameter(String),
    #[error("step '{step_id}' has no output field '{field}'")]
    MissingStepOutputField { step_id: String, field: String },
}

/// The result of resolving one expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Resolved(Value),
    /// The expression references a step that has not completed yet; it
    /// must be retried once that step's outputs are recorded.
    Deferred,
}

/// Resolve `expr` against `context`.
///
/// # Errors
///
/// Returns `ResolutionError` if a required user parameter is missing, a
/// system reference names an unrecognized field, or a completed step's
/// output map lacks the referenced field.
pub fn resolve(expr: &Expression, context: &ParameterContext) -> Result<ResolutionOutcome, ResolutionError> {
    match expr {
        Expression::Literal(v) => Ok(ResolutionOutcome::Resolved(v.clone())),
        Expression::Ref(r) => resolve_ref(r, context),
        Expression::Array(items) => resolve_array(items, context),
        Expression::Object(fields) => resolve_object(fields, context),
        Expression::Template(parts) => resolve_template(parts, context),
    }
}

fn resolve_ref(r: &Ref, context: &ParameterContext) -> Result<ResolutionOutcome, ResolutionError> {
    match r {
        Ref::User { key } => match context.user_parameters.get(key) {
            Some(v) => Ok(ResolutionOutcome::Resolved(v.clone())),
            None => Err(ResolutionError::MissingUserParameter(key.clone())),
        },
        Ref::System { key } => match context.system_parameters.get(key) {
            Some(v) => Ok(ResolutionOutcome::Resolved(v)),
            None => Err(ResolutionError::UnknownSystemParameter(key.clone())),
        },
        Ref::Steps { step_id, field } => {
            if !context.step_outputs.has_step(step_id) {
                return Ok(ResolutionOutcome::Deferred);
            }
            match context.step_outputs.get(step_id, field) {
                Some(v) => Ok(ResolutionOutcome::Resolved(v.clone())),
                None => Err(ResolutionError::MissingStepOutputField {
                    step_id: step_id.clone(),
                    field: field.clone(),
                }),
            }
        }
    }
}

fn resolve_array(items: &[Expression], context: &ParameterContext) -> Result<ResolutionOutcome, ResolutionError> {
    let mut resolved = Vec::with_capacity(items.len());
    for item in items {
        match resolve(item, context)? {
            ResolutionOutcome::Resolved(v) => resolved.push(v),
            ResolutionOutcome::Deferred => return Ok(ResolutionOutcome::Deferred),
        }
    }
    Ok(ResolutionOutcome::Resolved(Value::Array(resolved)))
}

fn resolve_object(fields: &BTreeMap<String, Expression>, context: &ParameterContext) -> Result<ResolutionOutcome, ResolutionError> {
    let mut resolved = serde_json::Map::with_capacity(fields.len());
    for (key, expr) in fields {
        match resolve(expr, context)? {
            ResolutionOutcome::Resolved(v) => {
                resolved.insert(key.clone(), v);
            }
            ResolutionOutcome::Deferred => return Ok(ResolutionOutcome::Deferred),
        }
    }
    Ok(ResolutionOutcome::Resolved(Value::Object(resolved)))
}

fn resolve_template(parts: &[TemplatePart], context: &ParameterContext) -> Result<ResolutionOutcome, ResolutionError> {
    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(s) => out.push_str(s),
            TemplatePart::Ref(r) => match resolve_ref(r, context)? {
                ResolutionOutcome::Resolved(v) => out.push_str(&stringify(&v)),
                ResolutionOutcome::Deferred => return Ok(ResolutionOutcome::Deferred),
            },
        }
    }
    Ok(ResolutionOutcome::Resolved(Value::String(out)))
}

fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fill in `context`'s user parameters from each declared parameter's
/// default where the caller didn't supply one.
pub fn apply_user_parameter_defaults(
    declared: &std::collections::HashMap<String, crate::document::UserParameterSpec>,
    user_parameters: &mut crate::context::UserParameters,
) {
    for (name, spec) in declared {
        if user_parameters.get(name).is_none() {
            if let Some(default) = &spec.default {
                user_parameters.0.insert(name.clone(), default.clone());
            }
        }
    }
}

/// Every user parameter declared `required: true` must have a value by
/// preparation time, either supplied by the caller or filled in by
/// `apply_user_parameter_defaults`. Unlike a per-field resolution
/// failure (accumulated as a `ValidationError`), a missing required
/// parameter is checked up front and is fatal to preparation.
///
/// # Errors
///
/// Returns `ResolutionError::MissingUserParameter` for the first
/// required parameter found without a value.
pub fn check_required_user_parameters(
    declared: &std::collections::HashMap<String, crate::document::UserParameterSpec>,
    context: &ParameterContext,
) -> Result<(), ResolutionError> {
    for (name, spec) in declared {
        if spec.required && context.user_parameters.get(name).is_none() {
            return Err(ResolutionError::MissingUserParameter(name.clone()));
        }
    }
    Ok(())
}
