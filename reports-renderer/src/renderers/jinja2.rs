//! Templated text renderer (Tera, Jinja2 syntax).
//!
//! Templates are named `<name>.<ext>.j2`; `<ext>` becomes the extension of
//! the generated file. Only the requested template and the templates it
//! reaches through `{% include %}`, `{% extends %}` and `{% import %}` are
//! parsed; names resolve against the template's directory. Unrelated files
//! in that directory are never read.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tera::Tera;

use reports_core::types::RendererDefinition;

use crate::base::{ensure_extension, generate_offloaded, Renderer, RendererKind};
use crate::context::RenderContext;
use crate::data::{AsyncReportData, ReportData};
use crate::error::{io_err, RenderError};

/// Template suffix.
pub const TEMPLATE_SUFFIX: &str = "j2";

/// Template names (not paths) that get HTML/XML autoescaping.
const AUTOESCAPE_SUFFIXES: &[&str] = &[".html.j2", ".htm.j2", ".xml.j2"];

/// `{% include .. %}`, `{% extends .. %}` and `{% import .. %}` tags; the
/// `names` group is a single string literal or a `[..]` list of them.
static REFERENCE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{%-?\s*(?:include|extends|import)\s+(?P<names>\[[^\]]*\]|"[^"]*"|'[^']*'|`[^`]*`)"#)
        .expect("valid regex")
});

static STRING_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'|`([^`]+)`"#).expect("valid regex"));

#[derive(Debug, Clone)]
pub struct Jinja2Renderer {
    context: RenderContext,
}

impl Jinja2Renderer {
    /// Split `dir/sub/name.ext.j2` into (`dir/sub`, `name.ext.j2`).
    pub(crate) fn split_template(template: &str) -> (&str, &str) {
        template.rsplit_once('/').unwrap_or(("", template))
    }

    /// Directory of the template relative to the root (may be empty).
    pub(crate) fn template_dir(&self) -> Result<&str, RenderError> {
        let template = self.context.template_or_err(Self::NAME)?;
        Ok(Self::split_template(template).0)
    }

    /// Parse `name` and everything it references below `template_dir`.
    ///
    /// A referenced file that does not exist is skipped here; Tera reports
    /// it at render time unless the include is `ignore missing`.
    fn load_templates(template_dir: &Path, name: &str) -> Result<Tera, RenderError> {
        let mut sources = Vec::new();
        let mut seen = BTreeSet::new();
        let mut pending = vec![name.to_string()];

        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let path = template_dir.join(&current);
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(e) if current == name => return Err(io_err(&path, e)),
                Err(_) => {
                    tracing::debug!("referenced template not found: {}", path.display());
                    continue;
                }
            };
            pending.extend(referenced_templates(&source));
            sources.push((current, source));
        }

        let mut tera = Tera::default();
        tera.autoescape_on(AUTOESCAPE_SUFFIXES.to_vec());
        tera.add_raw_templates(sources)?;
        Ok(tera)
    }
}

/// Template names referenced by `source`, in order of appearance.
pub(crate) fn referenced_templates(source: &str) -> Vec<String> {
    REFERENCE_TAG
        .captures_iter(source)
        .flat_map(|tag| {
            STRING_LITERAL
                .captures_iter(&tag["names"])
                .filter_map(|lit| lit.iter().skip(1).flatten().next().map(|m| m.as_str().to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Output extension of a `<name>.<ext>.j2` template file name.
pub fn template_extension(template: &str) -> Option<&str> {
    let (_, name) = Jinja2Renderer::split_template(template);
    let mut tokens = name.rsplitn(3, '.');
    let suffix = tokens.next()?;
    let ext = tokens.next()?;
    let stem = tokens.next()?;
    if suffix != TEMPLATE_SUFFIX || ext.is_empty() || stem.is_empty() {
        return None;
    }
    Some(ext)
}

#[async_trait]
impl Renderer for Jinja2Renderer {
    fn context(&self) -> &RenderContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    fn generate_report(&self, data: ReportData, output_file: &Path) -> Result<PathBuf, RenderError> {
        let template = self.context.template_or_err(Self::NAME)?;
        let ext = template_extension(template).ok_or_else(|| RenderError::InvalidTemplateName {
            template: template.to_string(),
        })?;
        let (dir, name) = Self::split_template(template);
        let tera = Self::load_templates(&self.context.resolve(dir), name)?;

        let context = tera::Context::from_serialize(self.get_context(data.into_value())?)?;
        let path = ensure_extension(output_file, ext);
        let file = File::create(&path).map_err(|e| io_err(&path, e))?;
        let mut writer = BufWriter::new(file);
        tera.render_to(name, &context, &mut writer)?;
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

impl RendererKind for Jinja2Renderer {
    const NAME: &'static str = "jinja2";

    fn from_context(context: RenderContext) -> Self {
        Jinja2Renderer { context }
    }

    fn validate(definition: &RendererDefinition) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(template) = definition.template.as_deref() else {
            errors.push("`template` is required for jinja2 renderer.".to_string());
            return errors;
        };

        if !definition.root_path.join(template).is_file() {
            errors.push(format!("template `{template}` not found."));
        }
        if template_extension(template).is_none() {
            errors.push(format!(
                "invalid template name: `{template}` (must be in the form <name>.<ext>.j2)."
            ));
        }
        errors
    }
}
