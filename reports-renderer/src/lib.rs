//! # reports-renderer
//!
//! Turns report data into a downloadable artifact: CSV, JSON, templated
//! text (Jinja2 syntax via Tera), PDF and Excel workbooks.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reports_core::types::{Account, Report};
//! use reports_renderer::{Renderer, RendererRegistry, ReportData};
//! use serde_json::{json, Map};
//! use std::path::Path;
//!
//! fn export(report: Report) -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = RendererRegistry::with_builtins()?;
//!     let renderer = registry.get_renderer(
//!         "csv",
//!         "production",
//!         "/srv/reports",
//!         Account::new("VA-000", "Vendor"),
//!         report,
//!         None,
//!         Map::new(),
//!     )?;
//!     let data = ReportData::from(vec![json!(["a", 1]), json!(["b", 2])]);
//!     let artifact = renderer.render(data, Path::new("/tmp/out"), None)?;
//!     println!("{}", artifact.display());
//!     Ok(())
//! }
//! ```

pub mod base;
pub mod context;
pub mod data;
pub mod error;
pub mod registry;
pub mod renderers;

pub use base::{Packaging, Renderer, RendererKind, SUMMARY_TITLE};
pub use context::RenderContext;
pub use data::{AsyncReportData, ReportData, RowIter, RowStream};
pub use error::{RegistryError, RenderError};
pub use registry::{RendererClass, RendererRegistry};
pub use renderers::{
    local_fetcher, CsvRenderer, Jinja2Renderer, JsonRenderer, LocalFetcher, PdfConverter, PdfJob,
    PdfRenderer, WeasyPrint, XlsxRenderer,
};
