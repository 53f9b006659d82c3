//! Common utilities shared across the workflow engine workspace.
//!
//! Provides environment-driven configuration and telemetry setup.

pub mod config;
pub mod telemetry;

pub use config::EngineConfig;
pub use telemetry::init_tracing;
