//! Built-in output formats.

pub mod csv;
pub mod jinja2;
pub mod json;
pub mod pdf;
pub mod xlsx;

pub use self::csv::CsvRenderer;
pub use self::jinja2::Jinja2Renderer;
pub use self::json::JsonRenderer;
pub use self::pdf::{local_fetcher, LocalFetcher, PdfConverter, PdfJob, PdfRenderer, WeasyPrint};
pub use self::xlsx::XlsxRenderer;
