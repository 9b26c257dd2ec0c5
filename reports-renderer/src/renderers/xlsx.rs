//! XLSX renderer — fills the `Data` sheet of a template workbook.
//!
//! The workbook carries its own execution metadata on an appended `Info`
//! sheet, so the artifact is delivered bare (no zip, no summary.json).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use umya_spreadsheet::{Cell, HorizontalAlignmentValues, Spreadsheet, VerticalAlignmentValues, Worksheet};

use reports_core::types::RendererDefinition;

use crate::base::{ensure_extension, generate_offloaded, Packaging, Renderer, RendererKind, SUMMARY_TITLE};
use crate::context::RenderContext;
use crate::data::{offload_rows, AsyncReportData, ReportData};
use crate::error::RenderError;

/// Sheet the rows are written to.
pub const DATA_SHEET: &str = "Data";
/// Sheet holding execution metadata.
pub const INFO_SHEET: &str = "Info";

const DEFAULT_START_ROW: u32 = 2;
const DEFAULT_START_COL: u32 = 1;
/// Sheet size limits of the XLSX format.
pub const MAX_ROWS: u32 = 1_048_576;
pub const MAX_COLS: u32 = 16_384;
const INFO_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct XlsxRenderer {
    context: RenderContext,
}

impl XlsxRenderer {
    fn start_position(&self) -> Result<(u32, u32), RenderError> {
        let position = |key: &str, default: u32, max: u32| match self.context.arg(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_u64()
                .filter(|v| (1..=u64::from(max)).contains(v))
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    RenderError::MalformedData(format!("`{key}` must be between 1 and {max}, got {value}"))
                }),
        };
        Ok((
            position("start_row", DEFAULT_START_ROW, MAX_ROWS)?,
            position("start_col", DEFAULT_START_COL, MAX_COLS)?,
        ))
    }

    fn write_workbook(
        &self,
        data: ReportData,
        output_file: &Path,
        start_time: DateTime<Utc>,
    ) -> Result<PathBuf, RenderError> {
        let template = self.context.template_or_err(Self::NAME)?;
        let mut book = read_workbook(&self.context.resolve(template))?;

        let (start_row, start_col) = self.start_position()?;
        let sheet = book.get_sheet_by_name_mut(DATA_SHEET).ok_or_else(|| {
            RenderError::MalformedData(format!("template `{template}` has no `{DATA_SHEET}` sheet"))
        })?;

        for (row_offset, row) in data.into_rows()?.enumerate() {
            let row_idx = cell_index(start_row, row_offset, MAX_ROWS, "row")?;
            let cells = match row {
                Value::Array(cells) => cells,
                scalar => vec![scalar],
            };
            for (col_offset, value) in cells.into_iter().enumerate() {
                let col_idx = cell_index(start_col, col_offset, MAX_COLS, "column")?;
                write_cell(sheet.get_cell_mut((col_idx, row_idx)), value);
            }
        }

        let info = book
            .new_sheet(INFO_SHEET)
            .map_err(|e| RenderError::Xlsx(e.to_string()))?;
        fill_info_sheet(info, &self.context, start_time)?;

        let path = ensure_extension(output_file, "xlsx");
        umya_spreadsheet::writer::xlsx::write(&book, &path)
            .map_err(|e| RenderError::Xlsx(format!("{}: {e}", path.display())))?;
        Ok(path)
    }

    fn validate_args(args: &Map<String, Value>) -> Vec<String> {
        let mut errors = Vec::new();
        for (key, max) in [("start_row", MAX_ROWS), ("start_col", MAX_COLS)] {
            match args.get(key) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) if n.is_i64() || n.is_u64() => {
                    if n.as_i64().map_or(false, |v| v < 1) {
                        errors.push(format!("`{key}` must be greater than 0."));
                    } else if n.as_u64().map_or(false, |v| v > u64::from(max)) {
                        errors.push(format!("`{key}` must be less than or equal to {max}."));
                    }
                }
                Some(_) => errors.push(format!("`{key}` must be integer.")),
            }
        }
        errors
    }
}

/// 1-based sheet index `start + offset`, bounded by `max`.
fn cell_index(start: u32, offset: usize, max: u32, axis: &str) -> Result<u32, RenderError> {
    u32::try_from(offset)
        .ok()
        .and_then(|offset| start.checked_add(offset))
        .filter(|index| *index <= max)
        .ok_or_else(|| {
            RenderError::MalformedData(format!(
                "{axis} {start} + {offset} is beyond the sheet limit of {max}"
            ))
        })
}

fn read_workbook(path: &Path) -> Result<Spreadsheet, RenderError> {
    umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| RenderError::Xlsx(format!("{}: {e}", path.display())))
}

fn write_cell(cell: &mut Cell, value: Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            cell.set_value_bool(b);
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                cell.set_value_number(f);
            }
            None => {
                cell.set_value(n.to_string());
            }
        },
        Value::String(s) => {
            cell.set_value(s);
        }
        other => {
            cell.set_value(other.to_string());
        }
    }
}

fn fill_info_sheet(
    sheet: &mut Worksheet,
    context: &RenderContext,
    start_time: DateTime<Utc>,
) -> Result<(), RenderError> {
    sheet.get_column_dimension_mut("A").set_width(50.0);
    sheet.get_column_dimension_mut("B").set_width(180.0);

    sheet.get_cell_mut("A1").set_value(SUMMARY_TITLE);
    sheet.add_merge_cells("A1:B1");
    let title = sheet.get_style_mut("A1");
    title.set_background_color("FF1565C0");
    title.get_font_mut().set_size(24.0);
    title.get_font_mut().get_color_mut().set_argb("FFFFFFFF");
    title
        .get_alignment_mut()
        .set_horizontal(HorizontalAlignmentValues::Center);
    title
        .get_alignment_mut()
        .set_vertical(VerticalAlignmentValues::Center);

    let parameters = {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(&context.report.values, &mut serializer)?;
        String::from_utf8_lossy(&buf).into_owned()
    };

    let rows = [
        ("Report Start time", start_time.format(INFO_TIME_FORMAT).to_string()),
        ("Report Finish time", Utc::now().format(INFO_TIME_FORMAT).to_string()),
        ("Account ID", context.account.id.clone()),
        ("Account Name", context.account.name.clone()),
        ("Report ID", context.report.id.clone()),
        ("Report Name", context.report.name.clone()),
        ("Runtime environment", context.environment.clone()),
        ("Report execution parameters", parameters),
    ];
    for (offset, (label, value)) in rows.into_iter().enumerate() {
        let row = offset as u32 + 2;
        sheet.get_cell_mut((1u32, row)).set_value(label);
        sheet.get_cell_mut((2u32, row)).set_value(value);
        for col in [1u32, 2] {
            let alignment = sheet.get_style_mut((col, row)).get_alignment_mut();
            alignment.set_horizontal(HorizontalAlignmentValues::Left);
            alignment.set_vertical(VerticalAlignmentValues::Top);
        }
    }
    sheet
        .get_style_mut("B9")
        .get_alignment_mut()
        .set_wrap_text(true);
    Ok(())
}

#[async_trait]
impl Renderer for XlsxRenderer {
    fn context(&self) -> &RenderContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    fn packaging(&self) -> Packaging {
        Packaging::Bare
    }

    fn generate_report(&self, data: ReportData, output_file: &Path) -> Result<PathBuf, RenderError> {
        self.write_workbook(data, output_file, Utc::now())
    }

    async fn generate_report_async(
        &self,
        data: AsyncReportData,
        output_file: &Path,
    ) -> Result<PathBuf, RenderError> {
        generate_offloaded(self, data, output_file).await
    }

    fn generate_standalone(
        &self,
        data: ReportData,
        output_file: &Path,
        start_time: DateTime<Utc>,
    ) -> Result<PathBuf, RenderError> {
        self.write_workbook(data, output_file, start_time)
    }

    async fn generate_standalone_async(
        &self,
        data: AsyncReportData,
        output_file: &Path,
        start_time: DateTime<Utc>,
    ) -> Result<PathBuf, RenderError> {
        let renderer = self.clone();
        let output_file = output_file.to_path_buf();
        offload_rows(data, move |data| renderer.write_workbook(data, &output_file, start_time)).await
    }
}

impl RendererKind for XlsxRenderer {
    const NAME: &'static str = "xlsx";

    fn from_context(context: RenderContext) -> Self {
        XlsxRenderer { context }
    }

    fn validate(definition: &RendererDefinition) -> Vec<String> {
        let Some(template) = definition.template.as_deref() else {
            return vec!["`template` is required for xlsx renderer.".to_string()];
        };
        let path = definition.root_path.join(template);
        if !path.is_file() {
            return vec![format!("template `{template}` not found.")];
        }

        let mut errors = Vec::new();
        if read_workbook(&path).is_err() {
            errors.push(format!("template `{template}` not valid or empty."));
        }
        if let Some(args) = &definition.args {
            errors.extend(Self::validate_args(args));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[rstest]
    #[case(json!({}), vec![])]
    #[case(json!({"start_row": 1, "start_col": 3}), vec![])]
    #[case(json!({"start_row": 0}), vec!["`start_row` must be greater than 0."])]
    #[case(json!({"start_col": -2}), vec!["`start_col` must be greater than 0."])]
    #[case(json!({"start_row": "2"}), vec!["`start_row` must be integer."])]
    #[case(json!({"start_col": 1.5}), vec!["`start_col` must be integer."])]
    #[case(json!({"start_row": 1_048_576, "start_col": 16_384}), vec![])]
    #[case(json!({"start_row": 1_048_577}), vec!["`start_row` must be less than or equal to 1048576."])]
    #[case(json!({"start_col": 4_294_967_295u64}), vec!["`start_col` must be less than or equal to 16384."])]
    #[case(json!({"start_row": 5_000_000_000u64}), vec!["`start_row` must be less than or equal to 1048576."])]
    #[case(
        json!({"start_row": "a", "start_col": 0}),
        vec!["`start_row` must be integer.", "`start_col` must be greater than 0."]
    )]
    fn args_validation(#[case] input: Value, #[case] expected: Vec<&str>) {
        assert_eq!(XlsxRenderer::validate_args(&args(input)), expected);
    }

    #[test]
    fn cell_index_is_bounded() {
        assert_eq!(cell_index(2, 3, MAX_ROWS, "row").expect("index"), 5);
        assert_eq!(cell_index(MAX_COLS, 0, MAX_COLS, "column").expect("index"), MAX_COLS);
        assert!(matches!(
            cell_index(MAX_COLS, 1, MAX_COLS, "column"),
            Err(RenderError::MalformedData(_))
        ));
        assert!(matches!(
            cell_index(u32::MAX, 1, MAX_COLS, "column"),
            Err(RenderError::MalformedData(_))
        ));
    }
}
