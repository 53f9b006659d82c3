//! Shared identity types consumed by the workflow engine.
//!
//! Kept deliberately small: the engine treats user identity and dynamic
//! step payloads as opaque values it is handed, not a domain it owns.

pub mod ids;
pub mod user;

pub use ids::*;
pub use user::*;
