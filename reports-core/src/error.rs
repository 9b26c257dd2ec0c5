//! Error types for reports-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading a repository descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Underlying I/O failure, annotated with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on load — includes file path and line context from serde_json.
    #[error("failed to parse descriptor at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Structural mismatch while mapping an in-memory JSON value.
    #[error("invalid descriptor: {0}")]
    Json(#[from] serde_json::Error),

    /// A report declared a `report_spec` other than `"1"` or `"2"`.
    #[error("report `{report}` declares unsupported report_spec `{spec}`")]
    UnsupportedReportSpec { report: String, spec: String },

    /// A v1 report is missing the `template` property.
    #[error("report `{report}` uses report_spec 1 but has no `template`")]
    MissingTemplate { report: String },
}

/// Convenience constructor for [`DescriptorError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DescriptorError {
    DescriptorError::Io {
        path: path.into(),
        source,
    }
}
