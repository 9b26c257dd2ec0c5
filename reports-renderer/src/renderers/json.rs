//! JSON renderer — one document, or an array streamed element by element.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::base::{ensure_extension, generate_offloaded, Renderer, RendererKind};
use crate::context::RenderContext;
use crate::data::{AsyncReportData, ReportData};
use crate::error::{io_err, RenderError};

/// A materialized document is serialized as is. Lazily produced rows are
/// written one at a time into a JSON array, so only the current row is ever
/// held in memory; no rows gives `[]`.
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    context: RenderContext,
}

#[async_trait]
impl Renderer for JsonRenderer {
    fn context(&self) -> &RenderContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    fn generate_report(&self, data: ReportData, output_file: &Path) -> Result<PathBuf, RenderError> {
        let path = ensure_extension(output_file, "json");
        let file = File::create(&path).map_err(|e| io_err(&path, e))?;
        let mut writer = BufWriter::new(file);

        match data {
            ReportData::Document(document) => serde_json::to_writer(&mut writer, &document)?,
            ReportData::Rows(rows) => {
                writer.write_all(b"[").map_err(|e| io_err(&path, e))?;
                for (index, row) in rows.enumerate() {
                    if index > 0 {
                        writer.write_all(b", ").map_err(|e| io_err(&path, e))?;
                    }
                    serde_json::to_writer(&mut writer, &row)?;
                }
                writer.write_all(b"]").map_err(|e| io_err(&path, e))?;
            }
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

impl RendererKind for JsonRenderer {
    const NAME: &'static str = "json";

    fn from_context(context: RenderContext) -> Self {
        JsonRenderer { context }
    }
}
