//! CSV renderer — `;`-delimited, every field quoted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::base::{ensure_extension, generate_offloaded, Renderer, RendererKind};
use crate::context::RenderContext;
use crate::data::{AsyncReportData, ReportData};
use crate::error::{io_err, RenderError};

/// Writes each row (an array of fields) as one CSV record.
///
/// Strings are written verbatim, `null` as an empty field, anything else as
/// its JSON text. A scalar row becomes a one-field record.
#[derive(Debug, Clone)]
pub struct CsvRenderer {
    context: RenderContext,
}

#[async_trait]
impl Renderer for CsvRenderer {
    fn context(&self) -> &RenderContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    fn generate_report(&self, data: ReportData, output_file: &Path) -> Result<PathBuf, RenderError> {
        let path = ensure_extension(output_file, "csv");
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .quote(b'"')
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .flexible(true)
            .from_path(&path)?;

        for row in data.into_rows()? {
            writer.write_record(row_fields(row))?;
        }
        writer.flush().map_err(|e| io_err(&path, e))?;
        Ok(path)
    }

    async fn generate_report_async(
        &self,
        data: AsyncReportData,
        output_file: &Path,
    ) -> Result<PathBuf, RenderError> {
        generate_offloaded(self, data, output_file).await
    }
}

impl RendererKind for CsvRenderer {
    const NAME: &'static str = "csv";

    fn from_context(context: RenderContext) -> Self {
        CsvRenderer { context }
    }
}

fn row_fields(row: Value) -> Vec<String> {
    match row {
        Value::Array(fields) => fields.into_iter().map(field_text).collect(),
        scalar => vec![field_text(scalar)],
    }
}

fn field_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
