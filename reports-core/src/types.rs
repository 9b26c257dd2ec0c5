//! Definition value objects for a reports repository.
//!
//! All path fields use `PathBuf`. Definitions are built once per process
//! invocation by [`crate::descriptor`] (or by hand in tests) and are not
//! mutated after validation starts.

use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{io_err, DescriptorError};

// ---------------------------------------------------------------------------
// Execution context
// ---------------------------------------------------------------------------

/// The tenant that owns a report execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Metadata of one report execution.
///
/// `values` holds the parameter-name → value mappings chosen for this run,
/// in the order the caller supplied them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub values: Vec<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// One selectable option of a `choice` / `checkbox` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// A report input parameter.
///
/// A parameter that declares `choices` (even an empty list) is a choices
/// parameter; see [`ParameterDefinition::is_choices`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

impl ParameterDefinition {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            description: String::new(),
            id,
            kind: kind.into(),
            required: false,
            choices: None,
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn is_choices(&self) -> bool {
        self.choices.is_some()
    }

    /// `true` when no choice is declared (absent or empty list).
    pub fn has_no_choices(&self) -> bool {
        self.choices.as_ref().map_or(true, Vec::is_empty)
    }
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// Declaration of one output format available for a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererDefinition {
    /// Repository root; `template` and file args resolve against it.
    pub root_path: PathBuf,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

impl RendererDefinition {
    pub fn new(
        root_path: impl Into<PathBuf>,
        id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        let kind = kind.into();
        Self {
            root_path: root_path.into(),
            id: id.into(),
            description: format!("Render report to {kind}."),
            kind,
            default: false,
            template: None,
            args: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    /// Look up a single renderer option.
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.as_ref().and_then(|a| a.get(key))
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One report of a repository.
///
/// Build with [`ReportDefinition::new`] and the `with_*` methods; the default
/// renderer id is computed on first access and cached.
#[derive(Debug, Clone)]
pub struct ReportDefinition {
    pub root_path: PathBuf,
    pub name: String,
    pub readme_file: String,
    pub entrypoint: String,
    pub audience: Vec<String>,
    pub report_spec: String,
    pub renderers: Vec<RendererDefinition>,
    pub parameters: Vec<ParameterDefinition>,
    default_renderer: OnceCell<Option<String>>,
}

impl ReportDefinition {
    pub fn new(
        root_path: impl Into<PathBuf>,
        name: impl Into<String>,
        readme_file: impl Into<String>,
        entrypoint: impl Into<String>,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            name: name.into(),
            readme_file: readme_file.into(),
            entrypoint: entrypoint.into(),
            audience: Vec::new(),
            report_spec: "2".to_string(),
            renderers: Vec::new(),
            parameters: Vec::new(),
            default_renderer: OnceCell::new(),
        }
    }

    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_report_spec(mut self, spec: impl Into<String>) -> Self {
        self.report_spec = spec.into();
        self
    }

    pub fn with_renderers(mut self, renderers: Vec<RendererDefinition>) -> Self {
        self.renderers = renderers;
        self.default_renderer = OnceCell::new();
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterDefinition>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Second dot-separated token of the entrypoint, i.e. the report's
    /// implementation module. `None` with fewer than three tokens.
    pub fn local_id(&self) -> Option<&str> {
        let tokens: Vec<&str> = self.entrypoint.split('.').collect();
        if tokens.len() > 2 {
            Some(tokens[1])
        } else {
            None
        }
    }

    /// `local_id`, or an empty string when the entrypoint is too short.
    pub fn local_id_or_default(&self) -> &str {
        self.local_id().unwrap_or_default()
    }

    /// Id of the first renderer flagged as default.
    pub fn default_renderer(&self) -> Option<&str> {
        self.default_renderer
            .get_or_init(|| {
                self.renderers
                    .iter()
                    .find(|r| r.default)
                    .map(|r| r.id.clone())
            })
            .as_deref()
    }

    /// Contents of the report readme.
    pub fn description(&self) -> Result<String, DescriptorError> {
        let path = self.root_path.join(&self.readme_file);
        std::fs::read_to_string(&path).map_err(|e| io_err(path, e))
    }

    /// Parameters as plain JSON mappings.
    pub fn parameters_as_values(&self) -> Result<Vec<Value>, DescriptorError> {
        self.parameters
            .iter()
            .map(|p| serde_json::to_value(p).map_err(DescriptorError::from))
            .collect()
    }

    /// Renderers as plain JSON mappings.
    pub fn renderers_as_values(&self) -> Result<Vec<Value>, DescriptorError> {
        self.renderers
            .iter()
            .map(|r| serde_json::to_value(r).map_err(DescriptorError::from))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Root of a reports repository.
#[derive(Debug, Clone)]
pub struct RepositoryDefinition {
    pub root_path: PathBuf,
    pub readme_file: String,
    pub name: String,
    pub version: String,
    pub language: String,
    pub reports: Vec<ReportDefinition>,
}

impl RepositoryDefinition {
    pub fn new(
        root_path: impl Into<PathBuf>,
        readme_file: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            readme_file: readme_file.into(),
            name: name.into(),
            version: version.into(),
            language: "python".to_string(),
            reports: Vec::new(),
        }
    }

    pub fn with_reports(mut self, reports: Vec<ReportDefinition>) -> Self {
        self.reports = reports;
        self
    }

    /// Contents of the repository readme.
    pub fn description(&self) -> Result<String, DescriptorError> {
        let path = self.root_path.join(&self.readme_file);
        std::fs::read_to_string(&path).map_err(|e| io_err(path, e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn report(entrypoint: &str) -> ReportDefinition {
        ReportDefinition::new("/repo", "Report", "README.md", entrypoint)
    }

    #[test]
    fn local_id_is_second_token() {
        assert_eq!(report("reports.sales.entrypoint").local_id(), Some("sales"));
    }

    #[test]
    fn local_id_needs_three_tokens() {
        assert_eq!(report("reports.sales").local_id(), None);
        assert_eq!(report("entrypoint").local_id(), None);
        assert_eq!(report("reports.sales").local_id_or_default(), "");
    }

    #[test]
    fn default_renderer_picks_flagged_one() {
        let def = report("reports.sales.entrypoint").with_renderers(vec![
            RendererDefinition::new("/repo", "csv", "csv"),
            RendererDefinition::new("/repo", "json", "json").as_default(),
        ]);
        assert_eq!(def.default_renderer(), Some("json"));
    }

    #[test]
    fn default_renderer_none_without_flag() {
        let def = report("reports.sales.entrypoint")
            .with_renderers(vec![RendererDefinition::new("/repo", "csv", "csv")]);
        assert_eq!(def.default_renderer(), None);
    }

    #[test]
    fn with_renderers_resets_cached_default() {
        let def = report("reports.sales.entrypoint")
            .with_renderers(vec![RendererDefinition::new("/repo", "csv", "csv").as_default()]);
        assert_eq!(def.default_renderer(), Some("csv"));
        let def = def.with_renderers(vec![RendererDefinition::new("/repo", "pdf", "pdf").as_default()]);
        assert_eq!(def.default_renderer(), Some("pdf"));
    }

    #[test]
    fn parameter_choices_flags() {
        let plain = ParameterDefinition::new("p", "single_line");
        assert!(!plain.is_choices());
        assert!(plain.has_no_choices());

        let empty = ParameterDefinition::new("p", "choice").with_choices(vec![]);
        assert!(empty.is_choices());
        assert!(empty.has_no_choices());
    }

    #[test]
    fn parameter_serializes_type_key() {
        let p = ParameterDefinition::new("date", "date_range");
        let value = serde_json::to_value(&p).expect("serialize");
        assert_eq!(value["type"], json!("date_range"));
        assert!(value.get("choices").is_none());
    }

    #[test]
    fn renderers_as_values_keeps_args() {
        let mut args = Map::new();
        args.insert("start_row".into(), json!(3));
        let def = report("reports.sales.entrypoint").with_renderers(vec![
            RendererDefinition::new("/repo", "xlsx", "xlsx")
                .with_template("tpl.xlsx")
                .with_args(args),
        ]);
        let values = def.renderers_as_values().expect("values");
        assert_eq!(values[0]["args"]["start_row"], json!(3));
        assert_eq!(values[0]["template"], json!("tpl.xlsx"));
    }

    #[test]
    fn description_reads_readme() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("README.md"), "# Sales").expect("write");
        let repo = RepositoryDefinition::new(dir.path(), "README.md", "Repo", "1.0.0");
        assert_eq!(repo.description().expect("read"), "# Sales");
    }

    #[test]
    fn description_missing_readme_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let def = ReportDefinition::new(dir.path(), "R", "missing.md", "a.b.c");
        let err = def.description().unwrap_err();
        assert!(matches!(err, DescriptorError::Io { .. }));
        assert!(err.to_string().contains("missing.md"));
    }
}
