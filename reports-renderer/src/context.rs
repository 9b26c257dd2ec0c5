//! Render context — per-execution state shared by every renderer.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use reports_core::types::{Account, Report};

use crate::error::RenderError;

/// Execution context a renderer instance is built with.
///
/// Owned per render; renderers only read it (apart from
/// [`crate::Renderer::set_extra_context`]).
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Runtime environment label, e.g. `production`.
    pub environment: String,
    /// Base path for templates and assets.
    pub root_dir: PathBuf,
    pub account: Account,
    pub report: Report,
    /// Template path relative to `root_dir`.
    pub template: Option<String>,
    /// Format-specific options.
    pub args: Map<String, Value>,
    /// Caller-supplied mapping exposed to templates as `extra_context`.
    pub extra_context: Option<Value>,
}

impl RenderContext {
    pub fn new(
        environment: impl Into<String>,
        root_dir: impl Into<PathBuf>,
        account: Account,
        report: Report,
    ) -> Self {
        RenderContext {
            environment: environment.into(),
            root_dir: root_dir.into(),
            account,
            report,
            template: None,
            args: Map::new(),
            extra_context: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }

    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    /// Template path relative to `root_dir`, or `MissingTemplate`.
    pub fn template_or_err(&self, renderer: &'static str) -> Result<&str, RenderError> {
        self.template
            .as_deref()
            .ok_or(RenderError::MissingTemplate { renderer })
    }

    /// `root_dir/<relative>`.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root_dir.join(relative)
    }

    /// Uniform rendering payload `{account, report, data[, extra_context]}`.
    ///
    /// `extra_context` is only present when it is set and not empty.
    pub fn template_data(&self, data: Value) -> Result<Value, RenderError> {
        let payload = TemplateData {
            account: &self.account,
            report: &self.report,
            data,
            extra_context: self.extra_context.as_ref().filter(|v| !is_blank(v)),
        };
        Ok(serde_json::to_value(payload)?)
    }
}

#[derive(Serialize)]
struct TemplateData<'a> {
    account: &'a Account,
    report: &'a Report,
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_context: Option<&'a Value>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
