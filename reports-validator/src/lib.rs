//! # reports-validator
//!
//! Checks a loaded reports repository for everything that would make a
//! report unrunnable: missing readmes, entrypoints that do not map to a
//! package, unknown parameter or renderer types, duplicated ids.
//!
//! Call [`validate`] with a [`reports_renderer::RendererRegistry`] and a
//! [`reports_core::RepositoryDefinition`]; an empty result means valid.

pub mod validator;

pub use validator::{
    validate, validate_parameters, validate_renderer, validate_report, validate_repository_at,
    ALL_PARAM_TYPES, CHOICES_PARAM_TYPES,
};
