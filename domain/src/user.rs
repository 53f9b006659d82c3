//! User identity as seen by the engine.
//!
//! The engine only consumes a `User` record handed to it by the host
//! application; authentication and profile management live upstream.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Minimal user identity forwarded into `SystemParameters` at prepare time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
}

impl User {
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            name: name.into(),
        }
    }
}
