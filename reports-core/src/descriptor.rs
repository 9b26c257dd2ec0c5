//! Repository descriptor loading.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   reports.json            (repository descriptor)
//!   README.md               (repository readme, referenced by `readme_file`)
//!   reports/
//!     <local_id>/           (report package named by the entrypoint)
//! ```
//!
//! Two report shapes are accepted:
//! - `report_spec: "1"` — a single implicit xlsx renderer described by
//!   `template`, `start_row` and `start_col`;
//! - `report_spec: "2"` — an explicit `renderers` list.
//!
//! Only the mapping is done here; cross-field checks live in the validator.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{io_err, DescriptorError};
use crate::types::{ParameterDefinition, RendererDefinition, ReportDefinition, RepositoryDefinition};

/// File name of the descriptor at the repository root.
pub const REPOSITORY_DESCRIPTOR: &str = "reports.json";

/// Id given to the implicit renderer of a v1 report.
pub const DEFAULT_RENDERER_ID: &str = "xlsx";

// ---------------------------------------------------------------------------
// Raw document shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: String,
    readme_file: String,
    version: String,
    #[serde(default = "default_language")]
    language: String,
    reports: Vec<RawReport>,
}

fn default_language() -> String {
    "python".to_string()
}

#[derive(Debug, Deserialize)]
struct RawReport {
    name: String,
    readme_file: String,
    entrypoint: String,
    #[serde(default)]
    audience: Vec<String>,
    report_spec: String,
    #[serde(default)]
    parameters: Vec<ParameterDefinition>,
    // v1
    template: Option<String>,
    start_row: Option<Value>,
    start_col: Option<Value>,
    // v2
    #[serde(default)]
    renderers: Vec<RawRenderer>,
    #[allow(dead_code)]
    default_renderer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRenderer {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    description: String,
    #[serde(default)]
    default: bool,
    template: Option<String>,
    args: Option<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// Load / parse
// ---------------------------------------------------------------------------

/// `<root>/reports.json` — pure, no I/O.
pub fn descriptor_path_at(root: &Path) -> PathBuf {
    root.join(REPOSITORY_DESCRIPTOR)
}

/// Read and parse `<root>/reports.json`.
///
/// Returns `DescriptorError::Io` if the file is unreadable and
/// `DescriptorError::Parse` (with path + line context) if it is malformed.
pub fn load_repository_at(root: &Path) -> Result<RepositoryDefinition, DescriptorError> {
    let path = descriptor_path_at(root);
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let raw: RawRepository =
        serde_json::from_str(&contents).map_err(|e| DescriptorError::Parse { path, source: e })?;
    build_repository(root, raw)
}

/// Map an already-decoded descriptor document onto definitions rooted at `root`.
pub fn parse(root: &Path, data: Value) -> Result<RepositoryDefinition, DescriptorError> {
    let raw: RawRepository = serde_json::from_value(data)?;
    build_repository(root, raw)
}

fn build_repository(root: &Path, raw: RawRepository) -> Result<RepositoryDefinition, DescriptorError> {
    let reports = raw
        .reports
        .into_iter()
        .map(|report| build_report(root, report))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RepositoryDefinition {
        root_path: root.to_path_buf(),
        readme_file: raw.readme_file,
        name: raw.name,
        version: raw.version,
        language: raw.language,
        reports,
    })
}

fn build_report(root: &Path, raw: RawReport) -> Result<ReportDefinition, DescriptorError> {
    let renderers = match raw.report_spec.as_str() {
        "1" => {
            let template = raw.template.ok_or_else(|| DescriptorError::MissingTemplate {
                report: raw.name.clone(),
            })?;
            let mut args = Map::new();
            if let Some(start_row) = raw.start_row {
                args.insert("start_row".to_string(), start_row);
            }
            if let Some(start_col) = raw.start_col {
                args.insert("start_col".to_string(), start_col);
            }
            vec![RendererDefinition {
                root_path: root.to_path_buf(),
                id: DEFAULT_RENDERER_ID.to_string(),
                kind: "xlsx".to_string(),
                description: "Render report to Excel.".to_string(),
                default: true,
                template: Some(template),
                args: Some(args),
            }]
        }
        "2" => raw
            .renderers
            .into_iter()
            .map(|r| RendererDefinition {
                root_path: root.to_path_buf(),
                id: r.id,
                kind: r.kind,
                description: r.description,
                default: r.default,
                template: r.template,
                args: r.args,
            })
            .collect(),
        other => {
            return Err(DescriptorError::UnsupportedReportSpec {
                report: raw.name,
                spec: other.to_string(),
            })
        }
    };

    Ok(ReportDefinition::new(root, raw.name, raw.readme_file, raw.entrypoint)
        .with_audience(raw.audience)
        .with_report_spec(raw.report_spec)
        .with_renderers(renderers)
        .with_parameters(raw.parameters))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn v1_report() -> Value {
        json!({
            "name": "Sales v1",
            "readme_file": "reports/sales/README.md",
            "entrypoint": "reports.sales.entrypoint",
            "audience": ["vendor", "provider"],
            "report_spec": "1",
            "parameters": [
                {"id": "date", "type": "date_range", "name": "Date", "description": "Period", "required": true}
            ],
            "template": "reports/sales/template.xlsx",
            "start_row": 2,
            "start_col": 1
        })
    }

    fn v2_report() -> Value {
        json!({
            "name": "Sales v2",
            "readme_file": "reports/orders/README.md",
            "entrypoint": "reports.orders.entrypoint",
            "audience": ["vendor"],
            "report_spec": "2",
            "parameters": [
                {
                    "id": "status", "type": "checkbox", "name": "Status", "description": "Status",
                    "choices": [{"value": "approved", "label": "Approved"}]
                }
            ],
            "renderers": [
                {"id": "csv", "type": "csv", "description": "CSV", "default": true},
                {"id": "pdf", "type": "pdf", "description": "PDF", "template": "reports/orders/templates/report.html.j2",
                 "args": {"css_file": "reports/orders/templates/report.css"}}
            ],
            "default_renderer": "csv"
        })
    }

    fn repo(reports: Vec<Value>) -> Value {
        json!({
            "name": "Reports",
            "readme_file": "README.md",
            "version": "1.0.0",
            "reports": reports
        })
    }

    #[test]
    fn descriptor_path_is_correct() {
        assert!(descriptor_path_at(Path::new("/repo")).ends_with("reports.json"));
    }

    #[test]
    fn v1_report_gets_implicit_xlsx_renderer() {
        let def = parse(Path::new("/repo"), repo(vec![v1_report()])).expect("parse");
        let report = &def.reports[0];
        assert_eq!(report.renderers.len(), 1);
        let renderer = &report.renderers[0];
        assert_eq!(renderer.id, DEFAULT_RENDERER_ID);
        assert_eq!(renderer.kind, "xlsx");
        assert!(renderer.default);
        assert_eq!(renderer.template.as_deref(), Some("reports/sales/template.xlsx"));
        assert_eq!(renderer.arg("start_row"), Some(&json!(2)));
        assert_eq!(report.default_renderer(), Some("xlsx"));
        assert_eq!(def.language, "python");
    }

    #[test]
    fn v2_report_maps_explicit_renderers() {
        let def = parse(Path::new("/repo"), repo(vec![v2_report()])).expect("parse");
        let report = &def.reports[0];
        assert_eq!(report.local_id(), Some("orders"));
        assert_eq!(report.renderers.len(), 2);
        assert_eq!(report.renderers[1].root_path, PathBuf::from("/repo"));
        assert_eq!(report.default_renderer(), Some("csv"));
        assert!(report.parameters[0].is_choices());
    }

    #[rstest]
    #[case("3")]
    #[case("0")]
    #[case("v2")]
    fn unsupported_report_spec_is_rejected(#[case] spec: &str) {
        let mut report = v2_report();
        report["report_spec"] = json!(spec);
        let err = parse(Path::new("/repo"), repo(vec![report])).unwrap_err();
        assert!(
            matches!(&err, DescriptorError::UnsupportedReportSpec { spec: s, .. } if s == spec),
            "got: {err}"
        );
    }

    #[test]
    fn v1_without_template_is_rejected() {
        let mut report = v1_report();
        report.as_object_mut().expect("object").remove("template");
        let err = parse(Path::new("/repo"), repo(vec![report])).unwrap_err();
        assert!(matches!(err, DescriptorError::MissingTemplate { .. }));
    }

    #[test]
    fn missing_required_field_is_json_error() {
        let err = parse(Path::new("/repo"), json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, DescriptorError::Json(_)));
    }
}
