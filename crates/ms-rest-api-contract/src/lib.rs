//! metascan REST API contract types and validation
//!
//! This crate defines the schema types exchanged with the metadata-scanning
//! backend. They are shared between the REST client, the mock client and the
//! console.

pub mod error;
pub mod types;
pub mod validation;

pub use error::*;
pub use types::*;
