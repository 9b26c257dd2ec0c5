//! Error types for reports-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while binding or looking up renderer types.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `register` was called twice with the same key.
    #[error("The renderer {name} is already registered.")]
    AlreadyRegistered { name: String },

    /// No renderer is bound to the requested key.
    #[error("The renderer {name} does not exist.")]
    NotFound { name: String },
}

/// All errors that can arise while producing a report artifact.
///
/// Rendering assumes the definition passed validation; these are not
/// retried or downgraded.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (report body, summary or template context).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error.
    #[error("CSV writer error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip packaging error.
    #[error("zip packaging error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Workbook load/save error.
    #[error("workbook error: {0}")]
    Xlsx(String),

    /// Filesystem error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    /// A template-driven renderer was built without a template.
    #[error("`template` is required for {renderer} renderer")]
    MissingTemplate { renderer: &'static str },

    /// Template file name is not `<name>.<ext>.j2`.
    #[error("invalid template name: `{template}` (must be in the form <name>.<ext>.j2)")]
    InvalidTemplateName { template: String },

    /// Report data does not have the shape the format needs.
    #[error("malformed report data: {0}")]
    MalformedData(String),

    /// The HTML → PDF converter failed.
    #[error("PDF conversion failed: {0}")]
    Conversion(String),

    /// A blocking worker panicked or was cancelled.
    #[error("render worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Convenience constructor for [`RenderError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}
