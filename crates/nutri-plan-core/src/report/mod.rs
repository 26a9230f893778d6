//! Report documents: rendering, parsing, migration and storage.
//!
//! Pipeline: Form fields → PatientReport → Renderer → Report Store
//!
//! Editing runs the other way: Report Store → data island → migration →
//! PatientReport.

mod document;
mod form;
mod migrate;
mod render;
mod store;

pub use document::*;
pub use form::*;
pub use migrate::*;
pub use render::*;
pub use store::*;

use thiserror::Error;

/// `id` attribute of the `<script>` element holding the embedded record.
pub const DATA_ISLAND_ID: &str = "patient-data";

/// Report errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Document has no embedded patient data")]
    MissingDataIsland,

    #[error("Malformed patient data: {0}")]
    Malformed(String),

    #[error("Unsupported schema version: {0}")]
    UnsupportedVersion(u64),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),
}

pub type ReportResult<T> = Result<T, ReportError>;
