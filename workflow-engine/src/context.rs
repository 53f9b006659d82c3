//! The layered lookup environment (user / system / steps) that
//! expressions are resolved against.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use we_domain::User;

/// Values supplied by the caller under the `user.` scope.
#[derive(Debug, Clone, Default)]
pub struct UserParameters(pub HashMap<String, Value>);

impl UserParameters {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Values seeded by the engine itself at preparation time, under the
/// `system.` scope.
#[derive(Debug, Clone)]
pub struct SystemParameters {
    pub user_id: String,
    pub user_email: String,
    pub user_timezone: String,
    pub current_date: String,
    pub current_time: String,
    pub oauth_token: String,
}

impl SystemParameters {
    /// Seed system parameters from the caller-supplied identity, token,
    /// and timezone, using `now` as the engine clock reading.
    #[must_use]
    pub fn seed(user: &User, oauth_token: impl Into<String>, user_timezone: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id.to_string(),
            user_email: user.email.clone(),
            user_timezone: user_timezone.into(),
            current_date: now.format("%Y-%m-%d").to_string(),
            current_time: now.format("%H:%M:%S").to_string(),
            oauth_token: oauth_token.into(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "user_id" => Some(Value::String(self.user_id.clone())),
            "user_email" => Some(Value::String(self.user_email.clone())),
            "user_timezone" => Some(Value::String(self.user_timezone.clone())),
            "current_date" => Some(Value::String(self.current_date.clone())),
            "current_time" => Some(Value::String(self.current_time.clone())),
            "oauth_token" => Some(Value::String(self.oauth_token.clone())),
            _ => None,
        }
    }
}

/// `stepId -> {field -> value}`, grown monotonically as steps complete.
#[derive(Debug, Clone, Default)]
pub struct StepOutputs(pub HashMap<String, HashMap<String, Value>>);

impl StepOutputs {
    #[must_use]
    pub fn has_step(&self, step_id: &str) -> bool {
        self.0.contains_key(step_id)
    }

    #[must_use]
    pub fn get(&self, step_id: &str, field: &str) -> Option<&Value> {
        self.0.get(step_id).and_then(|outputs| outputs.get(field))
    }

    /// Record a completed step's outputs. Must be called at most once per
    /// step id; later calls would violate the monotonic-outputs
    /// invariant, so callers (the dispatcher) must guard against it.
    pub fn record(&mut self, step_id: impl Into<String>, outputs: HashMap<String, Value>) {
        self.0.insert(step_id.into(), outputs);
    }
}

/// The full layered context an expression is resolved against.
#[derive(Debug, Clone)]
pub struct ParameterContext {
    pub user_parameters: UserParameters,
    pub system_parameters: SystemParameters,
    pub step_outputs: StepOutputs,
}

impl ParameterContext {
    #[must_use]
    pub fn new(user_parameters: UserParameters, system_parameters: SystemParameters) -> Self {
        Self {
            user_parameters,
            system_parameters,
            step_outputs: StepOutputs::default(),
        }
    }
}
