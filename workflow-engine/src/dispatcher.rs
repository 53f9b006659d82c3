//! Dependency-aware step execution against the Action Catalog Service.
//!
//! Sequential mode awaits one action at a time. Parallel mode spawns a
//! worker per ready step, bounded by a semaphore, and the scheduler
//! loop below is the single writer of step status and `StepOutputs` —
//! workers only compute; they never touch the plan directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{info, warn};

use we_catalog_client::{CatalogClient, CatalogClientError};

use crate::document::ExecutionMode;
use crate::planner::ExecutionPlan;
use crate::resolver::{resolve, ResolutionOutcome};
use crate::state::{dependencies_met, ResolvedInput, StepStatus};

pub struct StepDispatcher {
    client: CatalogClient,
    max_workers: usize,
}

impl StepDispatcher {
    #[must_use]
    pub fn new(client: CatalogClient, max_workers: usize) -> Self {
        Self { client, max_workers: max_workers.max(1) }
    }

    /// Execute every step in `plan` honouring `depends_on` order, per
    /// `mode`, bounding the whole run by `run_timeout` if given.
    ///
    /// Mutates `plan.resolved_steps` status/outputs and
    /// `plan.parameter_context.step_outputs` in place. Returns `Ok(())`
    /// regardless of whether individual steps failed — per-step outcome
    /// lives in each `ResolvedStep`'s `status`/`error`.
    pub async fn dispatch(&self, plan: &mut ExecutionPlan, mode: ExecutionMode, run_timeout: Option<Duration>) {
        let deadline = run_timeout.map(|d| Instant::now() + d);
        match mode {
            ExecutionMode::Sequential => self.dispatch_sequential(plan, deadline).await,
            ExecutionMode::Parallel => self.dispatch_parallel(plan, deadline).await,
        }
    }

    async fn dispatch_sequential(&self, plan: &mut ExecutionPlan, deadline: Option<Instant>) {
        loop {
            let Some(step_id) = next_ready(plan) else { break };

            if let Some(d) = deadline {
                if Instant::now() >= d {
                    apply_timeout(plan);
                    return;
                }
            }

            let idx = index_of(plan, &step_id);
            let failed = self.execute_one(plan, idx).await;
            if failed {
                skip_remaining(plan);
                return;
            }
        }
    }

    async fn dispatch_parallel(&self, plan: &mut ExecutionPlan, deadline: Option<Instant>) {
        loop {
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    apply_timeout(plan);
                    return;
                }
            }

            let ready = ready_steps(plan);
            if ready.is_empty() {
                break;
            }

            let mut jobs = Vec::with_capacity(ready.len());
            for step_id in ready {
                let idx = index_of(plan, &step_id);
                match resolve_inputs_for_dispatch(&plan.resolved_steps[idx].inputs, plan) {
                    Ok(inputs) => {
                        let _ = plan.resolved_steps[idx].transition(StepStatus::Running);
                        jobs.push((
                            step_id,
                            plan.resolved_steps[idx].service.clone(),
                            plan.resolved_steps[idx].action.clone(),
                            inputs,
                        ));
                    }
                    Err(message) => {
                        let _ = plan.resolved_steps[idx].transition(StepStatus::Running);
                        plan.resolved_steps[idx].error = Some(message);
                        let _ = plan.resolved_steps[idx].transition(StepStatus::Failed);
                    }
                }
            }
            if jobs.is_empty() {
                continue;
            }

            let oauth_token = plan.parameter_context.system_parameters.oauth_token.clone();
            let semaphore = Arc::new(Semaphore::new(self.max_workers));
            let mut handles = Vec::with_capacity(jobs.len());
            for (step_id, service, action, inputs) in jobs {
                let client = self.client.clone();
                let token = oauth_token.clone();
                let permit = semaphore.clone();
                let handle = tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("dispatcher semaphore never closes early");
                    let result = client.execute_action(&service, &action, &inputs, &token).await;
                    (step_id, result)
                });
                handles.push(handle);
            }

            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let outcomes = await_round(handles, remaining).await;

            let mut any_failed = false;
            for (step_id, outcome) in outcomes {
                let idx = index_of(plan, &step_id);
                match outcome {
                    Some(Ok(response)) => {
                        plan.parameter_context.step_outputs.record(step_id.clone(), response.data.clone());
                        plan.resolved_steps[idx].outputs = response.data;
                        let _ = plan.resolved_steps[idx].transition(StepStatus::Completed);
                    }
                    Some(Err(e)) => {
                        warn!(step_id = %step_id, error = %e, "step execution failed");
                        plan.resolved_steps[idx].error = Some(e.to_string());
                        let _ = plan.resolved_steps[idx].transition(StepStatus::Failed);
                        any_failed = true;
                    }
                    None => {
                        plan.resolved_steps[idx].error = Some("timeout".to_string());
                        let _ = plan.resolved_steps[idx].transition(StepStatus::Failed);
                        any_failed = true;
                    }
                }
            }

            if any_failed {
                // In-flight work for this round has already completed above;
                // no further rounds are dispatched.
                return;
            }
        }
    }

    /// Re-resolve `step`'s inputs against the live context, invoke the
    /// action, and record the outcome. Returns `true` if the step
    /// failed.
    async fn execute_one(&self, plan: &mut ExecutionPlan, idx: usize) -> bool {
        let _ = plan.resolved_steps[idx].transition(StepStatus::Running);

        let inputs = match resolve_inputs_for_dispatch(&plan.resolved_steps[idx].inputs, plan) {
            Ok(inputs) => inputs,
            Err(message) => {
                plan.resolved_steps[idx].error = Some(message);
                let _ = plan.resolved_steps[idx].transition(StepStatus::Failed);
                return true;
            }
        };

        let service = plan.resolved_steps[idx].service.clone();
        let action = plan.resolved_steps[idx].action.clone();
        let oauth_token = plan.parameter_context.system_parameters.oauth_token.clone();
        let step_id = plan.resolved_steps[idx].id.clone();

        info!(step_id = %step_id, service = %service, action = %action, "dispatching step");

        match self.client.execute_action(&service, &action, &inputs, &oauth_token).await {
            Ok(response) => {
                plan.parameter_context.step_outputs.record(step_id, response.data.clone());
                plan.resolved_steps[idx].outputs = response.data;
                let _ = plan.resolved_steps[idx].transition(StepStatus::Completed);
                false
            }
            Err(e) => {
                warn!(step_id = %step_id, error = %e, "step execution failed");
                plan.resolved_steps[idx].error = Some(e.to_string());
                let _ = plan.resolved_steps[idx].transition(StepStatus::Failed);
                true
            }
        }
    }
}

/// Await every handle in `handles`, aborting and reporting `None` for
/// any still outstanding once `remaining` elapses.
async fn await_round(
    handles: Vec<tokio::task::JoinHandle<(String, Result<we_catalog_client::ActionResponse, CatalogClientError>)>>,
    remaining: Option<Duration>,
) -> Vec<(String, Option<Result<we_catalog_client::ActionResponse, CatalogClientError>>)> {
    let mut out = Vec::with_capacity(handles.len());
    let deadline = remaining.map(|d| Instant::now() + d);

    for handle in handles {
        let abort_handle = handle.abort_handle();
        let step_result = match deadline {
            None => handle.await.ok(),
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    abort_handle.abort();
                    None
                } else {
                    match tokio::time::timeout(d - now, handle).await {
                        Ok(joined) => joined.ok(),
                        Err(_) => {
                            abort_handle.abort();
                            None
                        }
                    }
                }
            }
        };
        match step_result {
            Some((step_id, result)) => out.push((step_id, Some(result))),
            None => {
                // The task was aborted before completion; we don't know
                // its step id here, so the caller's timeout path handles
                // marking remaining steps failed via `apply_timeout`.
            }
        }
    }
    out
}

fn resolve_inputs_for_dispatch(
    inputs: &HashMap<String, ResolvedInput>,
    plan: &ExecutionPlan,
) -> Result<HashMap<String, Value>, String> {
    let mut out = HashMap::with_capacity(inputs.len());
    for (field, input) in inputs {
        let value = match input {
            ResolvedInput::Value(v) => v.clone(),
            ResolvedInput::Deferred(expr) => match resolve(expr, &plan.parameter_context) {
                Ok(ResolutionOutcome::Resolved(v)) => v,
                Ok(ResolutionOutcome::Deferred) => {
                    return Err(format!("unresolved reference in field '{field}'"))
                }
                Err(e) => return Err(e.to_string()),
            },
        };
        out.insert(field.clone(), value);
    }
    Ok(out)
}

fn index_of(plan: &ExecutionPlan, step_id: &str) -> usize {
    plan.resolved_steps
        .iter()
        .position(|s| s.id == step_id)
        .expect("step id came from this plan's own resolved_steps")
}

fn next_ready(plan: &ExecutionPlan) -> Option<String> {
    let index: HashMap<String, crate::state::ResolvedStep> =
        plan.resolved_steps.iter().cloned().map(|s| (s.id.clone(), s)).collect();
    plan.resolved_steps
        .iter()
        .find(|s| s.status == StepStatus::Pending && dependencies_met(&s.depends_on, &index))
        .map(|s| s.id.clone())
}

fn ready_steps(plan: &ExecutionPlan) -> Vec<String> {
    let index: HashMap<String, crate::state::ResolvedStep> =
        plan.resolved_steps.iter().cloned().map(|s| (s.id.clone(), s)).collect();
    plan.resolved_steps
        .iter()
        .filter(|s| s.status == StepStatus::Pending && dependencies_met(&s.depends_on, &index))
        .map(|s| s.id.clone())
        .collect()
}

fn skip_remaining(plan: &mut ExecutionPlan) {
    for step in &mut plan.resolved_steps {
        if step.status == StepStatus::Pending {
            let _ = step.transition(StepStatus::Skipped);
        }
    }
}

fn apply_timeout(plan: &mut ExecutionPlan) {
    for step in &mut plan.resolved_steps {
        match step.status {
            StepStatus::Running => {
                step.error = Some("timeout".to_string());
                let _ = step.transition(StepStatus::Failed);
            }
            StepStatus::Pending => {
                let _ = step.transition(StepStatus::Skipped);
            }
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ParameterContext, SystemParameters, UserParameters};
    use crate::planner::prepare_execution;
    use chrono::{TimeZone, Utc};
    use we_domain::User;

    fn catalog() -> we_catalog_client::Catalog {
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
        let mut ctx = ParameterContext::new(UserParameters::default(), system);
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

    #[tokio::test]
    async fn sequential_dispatch_completes_single_step() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/execute")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"data":{"message_id":"m-1"},"error":""}"#)
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let mut plan = prepare_execution(SINGLE_STEP, context(), &catalog()).unwrap();
        assert!(plan.is_executable());

        let dispatcher = StepDispatcher::new(client, 4);
        dispatcher.dispatch(&mut plan, ExecutionMode::Sequential, None).await;

        assert_eq!(plan.resolved_steps[0].status, StepStatus::Completed);
        assert_eq!(plan.resolved_steps[0].outputs.get("message_id").unwrap(), "m-1");
    }

    #[tokio::test]
    async fn sequential_dispatch_records_remote_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/execute")
            .with_status(200)
            .with_body(r#"{"success":false,"data":{},"error":"invalid_token: rejected"}"#)
            .create_async()
            .await;

        let client = CatalogClient::new(server.url(), Duration::from_secs(5)).unwrap();
        let mut plan = prepare_execution(SINGLE_STEP, context(), &catalog()).unwrap();

        let dispatcher = StepDispatcher::new(client, 4);
        dispatcher.dispatch(&mut plan, ExecutionMode::Sequential, None).await;

        assert_eq!(plan.resolved_steps[0].status, StepStatus::Failed);
        assert!(plan.resolved_steps[0].error.as_ref().unwrap().contains("invalid_token"));
    }
}
