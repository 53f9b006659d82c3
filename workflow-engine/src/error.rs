//! Top-level error type aggregating every stage of preparation and
//! dispatch.

use thiserror::Error;

use crate::parser::parser::ParseError;
use crate::parser::validator::ValidationError;
use crate::resolver::ResolutionError;
use we_catalog_client::CatalogClientError;
use we_workflow_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to parse workflow document: {0}")]
    Parse(#[from] ParseError),

    #[error("workflow failed validation with {} error(s): {}", .0.len(), join_messages(.0))]
    Validation(Vec<ValidationError>),

    #[error("failed to resolve parameter reference: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("action catalog client error: {0}")]
    Catalog(#[from] CatalogClientError),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("workflow store error: {0}")]
    Store(#[from] StoreError),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>().join("; ")
}
