//! Reports core library — definition value objects, descriptor loading, errors.
//!
//! Public API surface:
//! - [`types`] — accounts, report metadata and the definition tree
//! - [`error`] — [`DescriptorError`]
//! - [`descriptor`] — load / parse a repository descriptor

pub mod descriptor;
pub mod error;
pub mod types;

pub use error::DescriptorError;
pub use types::{
    Account, Choice, ParameterDefinition, RendererDefinition, Report, ReportDefinition,
    RepositoryDefinition,
};
