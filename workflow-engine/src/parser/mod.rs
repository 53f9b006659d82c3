//! YAML workflow document parser with structural validation.
//!
//! Parses the declarative workflow document format and validates its
//! structure: dependency references, DAG acyclicity, and catalog
//! cross-checks.

pub mod parser;
pub mod raw;
pub mod validator;

pub use parser::*;
pub use validator::*;
