//! Declarative workflow execution engine.
//!
//! Parses a workflow document, resolves its `${...}` parameter
//! references against a layered context, validates it against a remote
//! Action Catalog, and dispatches its steps honouring their dependency
//! graph.

use std::time::Duration;

use we_catalog_client::CatalogClient;

pub mod context;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod expression;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod state;

pub use context::{ParameterContext, StepOutputs, SystemParameters, UserParameters};
pub use dispatcher::StepDispatcher;
pub use document::{
    AuthSpec, ExecutionConfig, ExecutionMode, OutputSpec, ServiceBinding, StepDeclaration,
    UserParameterSpec, WorkflowDocument,
};
pub use error::EngineError;
pub use expression::{Expression, ExpressionParseError, Ref, TemplatePart};
pub use parser::{parse_workflow_document, validate_dependency_graph, validate_step_against_catalog, ParseError, ValidationError};
pub use planner::{prepare_execution, prepare_from_catalog, ExecutionPlan};
pub use resolver::{resolve, ResolutionError, ResolutionOutcome};
pub use state::{dependencies_met, IllegalTransition, ResolvedInput, ResolvedStep, StepStatus};

/// Fetch the catalog, prepare `yaml` against it, and dispatch it in one
/// call: the end-to-end path a caller reaches for when it doesn't need
/// to inspect the plan between preparation and dispatch.
///
/// A plan that fails validation is never dispatched. A plan that
/// dispatches with one or more failed steps is still returned via
/// `Err(EngineError::Dispatch(..))`, summarizing every failing step id
/// and its error so a caller doesn't have to walk `resolved_steps`
/// itself just to learn that the run failed.
///
/// # Errors
///
/// Returns `EngineError::Parse`/`Resolution` from preparation,
/// `EngineError::Catalog` if the catalog fetch fails,
/// `EngineError::Validation` if the plan is not executable, or
/// `EngineError::Dispatch` if any step failed during dispatch.
pub async fn run_workflow(
    yaml: &str,
    context: ParameterContext,
    client: &CatalogClient,
    dispatcher: &StepDispatcher,
    mode: ExecutionMode,
    run_timeout: Option<Duration>,
) -> Result<ExecutionPlan, EngineError> {
    let mut plan = prepare_from_catalog(yaml, context, client).await?;
    if !plan.is_executable() {
        return Err(EngineError::Validation(plan.validation_errors));
    }

    dispatcher.dispatch(&mut plan, mode, run_timeout).await;

    let failures: Vec<String> = plan
        .resolved_steps
        .iter()
        .filter(|s| s.status == StepStatus::Failed)
        .map(|s| format!("{}: {}", s.id, s.error.clone().unwrap_or_default()))
        .collect();
    if !failures.is_empty() {
        return Err(EngineError::Dispatch(failures.join("; ")));
    }

    Ok(plan)
}
