//! Cross-checks a parsed document's dependency graph and, given a
//! catalog, its step-to-function references.

use std::collections::{HashMap, HashSet};

use petgraph::algo;
use petgraph::graph::DiGraph;
use serde_json::Value;
use thiserror::Error;

use we_catalog_client::Catalog;

use crate::document::WorkflowDocument;
use crate::expression::Ref;
use crate::state::ResolvedInput;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub location: Option<String>,
    pub suggestion: Option<String>,
}

impl ValidationError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), location: None, suggestion: None }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Check that every `depends_on` entry names a declared step and that
/// the dependency graph is acyclic. Both checks accumulate: a document
/// can report an unknown dependency and a cycle in the same pass.
#[must_use]
pub fn validate_dependency_graph(document: &WorkflowDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let step_ids: HashSet<&str> = document.steps.iter().map(|s| s.id.as_str()).collect();

    let mut graph = DiGraph::<&str, ()>::new();
    let mut node_indices = HashMap::new();
    for step in &document.steps {
        let idx = graph.add_node(step.id.as_str());
        node_indices.insert(step.id.as_str(), idx);
    }

    for step in &document.steps {
        for dep in &step.depends_on {
            if !step_ids.contains(dep.as_str()) {
                let suggestion = find_similar(dep, &step_ids);
                errors.push(
                    ValidationError::new(format!("step '{}' depends on unknown step '{dep}'", step.id))
                        .with_location(format!("steps[{}].depends_on", step.id))
                        .with_suggestion(suggestion.map(|s| format!("did you mean '{s}'?")).unwrap_or_default()),
                );
                continue;
            }
            if let (Some(&from), Some(&to)) = (node_indices.get(dep.as_str()), node_indices.get(step.id.as_str())) {
                graph.add_edge(from, to, ());
            }
        }
    }

    if algo::is_cyclic_directed(&graph) {
        let sccs = algo::kosaraju_scc(&graph);
        let cycle: Vec<&str> = sccs
            .iter()
            .find(|scc| scc.len() > 1)
            .map(|scc| scc.iter().map(|&idx| graph[idx]).collect())
            .unwrap_or_default();
        errors.push(ValidationError::new(format!(
            "workflow dependency graph contains a cycle involving steps: {}",
            cycle.join(", ")
        )));
    }

    errors
}

fn find_similar<'a>(target: &str, candidates: &HashSet<&'a str>) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, strsim::levenshtein(target, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(c, _)| c)
}

/// Cross-check one step's `service.action` against the catalog, its
/// resolved inputs against the function's required fields, and any
/// `${steps.S.outputs.F}` reference among those inputs against the
/// referenced function's declared output schema.
///
/// A `Deferred` input satisfies a required field; only a missing field
/// or a JSON-null value is an error. `step_lookup` maps every declared
/// step id to its `(service, action)` pair, used to resolve the target
/// of a steps-scoped reference; a reference naming an id absent from
/// `step_lookup` is left to `validate_dependency_graph` to report.
#[must_use]
pub fn validate_step_against_catalog(
    step_id: &str,
    service: &str,
    action: &str,
    resolved_inputs: &HashMap<String, ResolvedInput>,
    catalog: &Catalog,
    step_lookup: &HashMap<String, (String, String)>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let Some(function) = catalog.find_function(service, action) else {
        if !catalog.has_service(service) {
            errors.push(
                ValidationError::new(format!("service '{service}' not found in catalog"))
                    .with_location(format!("steps[{step_id}].service")),
            );
        } else {
            errors.push(
                ValidationError::new(format!("function '{action}' not found in service '{service}'"))
                    .with_location(format!("steps[{step_id}].action")),
            );
        }
        return errors;
    };

    let concrete_inputs: HashMap<String, Value> = resolved_inputs
        .iter()
        .map(|(field, input)| {
            let placeholder = match input {
                ResolvedInput::Value(v) => v.clone(),
                // Deferred means "will have a value once its step
                // completes", which always satisfies a required field.
                ResolvedInput::Deferred(_) => Value::Bool(true),
            };
            (field.clone(), placeholder)
        })
        .collect();

    for missing in function.missing_required_fields(&concrete_inputs) {
        errors.push(
            ValidationError::new(format!("step '{step_id}' is missing required field '{missing}'"))
                .with_location(format!("steps[{step_id}].inputs.{missing}")),
        );
    }

    for (field, input) in resolved_inputs {
        let ResolvedInput::Deferred(expr) = input else { continue };
        for reference in expr.steps_refs() {
            let Ref::Steps { step_id: target_step, field: output_field } = reference else { continue };
            let Some((target_service, target_action)) = step_lookup.get(target_step) else { continue };
            let Some(target_function) = catalog.find_function(target_service, target_action) else { continue };
            if !target_function.declares_output_field(output_field) {
                errors.push(
                    ValidationError::new(format!(
                        "step '{step_id}' input '{field}' references '${{steps.{target_step}.outputs.{output_field}}}', which is not declared in the output schema of '{target_service}.{target_action}'"
                    ))
                    .with_location(format!("steps[{step_id}].inputs.{field}")),
                );
            }
        }
    }

    errors
}
