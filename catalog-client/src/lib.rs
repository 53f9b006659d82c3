//! Action Catalog client and catalog/schema model.
//!
//! Fetches the provider/service/function directory and invokes a single
//! action against the remote Action Catalog Service.

pub mod client;
pub mod schema;

pub use client::{CatalogClient, CatalogClientError};
pub use schema::{ActionResponse, Catalog, Function, JsonSchema, Provider, Service, SchemaProperty};
