//! Schema artifact handling for metascan
//!
//! Reconciles the artifact and scan-result shapes returned by the backend
//! into one [`Artifact`] list, and provides the result table with export.

pub mod artifact;
pub mod error;
pub mod export;
pub mod normalize;
pub mod result;
pub mod table;

pub use artifact::Artifact;
pub use error::{ExportError, ExportResult};
pub use export::{export_table, write_export, ExportFormat};
pub use normalize::{merge_listings, normalize_artifacts, ArtifactResponse};
pub use result::{artifact_type_label, flatten_scan_result, group_by_table};
pub use table::{Cell, Column, ResultTable, SortDirection};
