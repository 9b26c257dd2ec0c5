//! PDF renderer — Jinja2 HTML body converted to PDF.
//!
//! The HTML is rendered into the scratch directory, so relative resource
//! URLs in it would resolve against that directory. Before conversion every
//! `src`/`href` attribute and CSS `url(...)` is rewritten by
//! [`local_fetcher`] to point below `<root_dir>/<template_dir>`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use reports_core::types::RendererDefinition;

use crate::base::{ensure_extension, generate_offloaded, Renderer, RendererKind};
use crate::context::RenderContext;
use crate::data::{AsyncReportData, ReportData};
use crate::error::{io_err, RenderError};
use crate::renderers::jinja2::Jinja2Renderer;

/// Environment variable naming the WeasyPrint executable.
pub const WEASYPRINT_BIN_ENV: &str = "REPORTS_WEASYPRINT_BIN";

static ATTR_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<prefix>\b(?:src|href)\s*=\s*["'])(?P<url>[^"']+)"#).expect("valid regex")
});

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<prefix>url\(\s*["']?)(?P<url>[^"')\s]+)"#).expect("valid regex")
});

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid regex"));

// ---------------------------------------------------------------------------
// URL resolution
// ---------------------------------------------------------------------------

/// Rewrite a `file://` URL so it resolves under `<root_dir>/<template_dir>`.
///
/// - non-`file://` URLs are returned unchanged;
/// - relative paths and paths under `cwd` are re-rooted at the template dir;
/// - a path under the template dir whose template segment got repeated is
///   collapsed to a single prefix.
pub fn local_fetcher(url: &str, root_dir: &Path, template_dir: &str, cwd: Option<&Path>) -> String {
    let Some(path) = url.strip_prefix("file://") else {
        return url.to_string();
    };

    let root = std::path::absolute(root_dir).unwrap_or_else(|_| root_dir.to_path_buf());
    let template_root = if template_dir.is_empty() {
        root
    } else {
        root.join(template_dir)
    };

    if let Some(cwd) = cwd {
        if let Ok(relative) = Path::new(path).strip_prefix(cwd) {
            return file_url(&template_root.join(relative));
        }
    }

    if !path.starts_with('/') {
        return file_url(&template_root.join(path));
    }

    if !template_dir.is_empty() {
        if let Ok(rest) = Path::new(path).strip_prefix(&template_root) {
            let mut rest = rest;
            while let Ok(inner) = rest.strip_prefix(template_dir) {
                rest = inner;
            }
            return file_url(&template_root.join(rest));
        }
    }

    url.to_string()
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Binds the inputs of [`local_fetcher`] for one render.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    root_dir: PathBuf,
    template_dir: String,
    cwd: Option<PathBuf>,
}

impl LocalFetcher {
    pub fn new(root_dir: impl Into<PathBuf>, template_dir: impl Into<String>, cwd: Option<PathBuf>) -> Self {
        LocalFetcher {
            root_dir: root_dir.into(),
            template_dir: template_dir.into(),
            cwd,
        }
    }

    pub fn fetch(&self, url: &str) -> String {
        local_fetcher(url, &self.root_dir, &self.template_dir, self.cwd.as_deref())
    }

    /// Base URL for anything the converter still has to resolve itself.
    pub fn base_url(&self) -> String {
        let base = self.fetch("file://.");
        format!("{}/", base.trim_end_matches("/."))
    }

    /// Resolve a URL as written in a document. Scheme-less references are
    /// treated as local files; fragments and other schemes are kept.
    fn resolve_reference(&self, reference: &str) -> String {
        if reference.starts_with('#') {
            return reference.to_string();
        }
        if SCHEME.is_match(reference) {
            return self.fetch(reference);
        }
        self.fetch(&format!("file://{reference}"))
    }

    /// Rewrite every resource reference in an HTML (or CSS) document.
    pub fn rewrite(&self, document: &str) -> String {
        let document = ATTR_URL.replace_all(document, |caps: &Captures| {
            format!("{}{}", &caps["prefix"], self.resolve_reference(&caps["url"]))
        });
        CSS_URL
            .replace_all(&document, |caps: &Captures| {
                format!("{}{}", &caps["prefix"], self.resolve_reference(&caps["url"]))
            })
            .into_owned()
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Inputs of one HTML → PDF conversion.
#[derive(Debug)]
pub struct PdfJob<'a> {
    pub html: &'a Path,
    pub output: &'a Path,
    pub stylesheets: &'a [PathBuf],
    pub base_url: &'a str,
}

/// HTML → PDF backend.
pub trait PdfConverter: Send + Sync {
    fn convert(&self, job: &PdfJob<'_>) -> Result<(), RenderError>;
}

/// Runs the `weasyprint` command line tool.
#[derive(Debug, Clone)]
pub struct WeasyPrint {
    program: PathBuf,
}

impl WeasyPrint {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        WeasyPrint {
            program: program.into(),
        }
    }

    /// Program from `REPORTS_WEASYPRINT_BIN`, else `weasyprint` on `PATH`.
    pub fn from_env() -> Self {
        let program = std::env::var_os(WEASYPRINT_BIN_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("weasyprint"));
        WeasyPrint::new(program)
    }
}

impl PdfConverter for WeasyPrint {
    fn convert(&self, job: &PdfJob<'_>) -> Result<(), RenderError> {
        let mut command = Command::new(&self.program);
        command
            .arg("--base-url")
            .arg(job.base_url)
            .arg("--encoding")
            .arg("utf-8");
        for stylesheet in job.stylesheets {
            command.arg("--stylesheet").arg(stylesheet);
        }
        command.arg(job.html).arg(job.output);

        tracing::debug!("running {:?}", command);
        let output = command.output().map_err(|e| io_err(&self.program, e))?;
        if !output.status.success() {
            return Err(RenderError::Conversion(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PdfRenderer
// ---------------------------------------------------------------------------

/// Composes a [`Jinja2Renderer`] for the HTML body.
#[derive(Clone)]
pub struct PdfRenderer {
    html: Jinja2Renderer,
    converter: Arc<dyn PdfConverter>,
}

impl PdfRenderer {
    pub fn with_converter(context: RenderContext, converter: Arc<dyn PdfConverter>) -> Self {
        PdfRenderer {
            html: Jinja2Renderer::from_context(context),
            converter,
        }
    }

    fn stylesheets(&self) -> Vec<PathBuf> {
        self.context()
            .arg("css_file")
            .and_then(|v| v.as_str())
            .filter(|css| !css.is_empty())
            .map(|css| vec![self.context().resolve(css)])
            .unwrap_or_default()
    }
}

#[async_trait]
impl Renderer for PdfRenderer {
    fn context(&self) -> &RenderContext {
        self.html.context()
    }

    fn context_mut(&mut self) -> &mut RenderContext {
        self.html.context_mut()
    }

    fn generate_report(&self, data: ReportData, output_file: &Path) -> Result<PathBuf, RenderError> {
        let pdf_file = ensure_extension(output_file, "pdf");
        let rendered = self.html.generate_report(data, output_file)?;
        let source = rendered.with_extension("temp");
        std::fs::rename(&rendered, &source).map_err(|e| io_err(&rendered, e))?;

        let cwd = match output_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => Some(dir.to_path_buf()),
            _ => std::env::current_dir().ok(),
        };
        let fetcher = LocalFetcher::new(&self.context().root_dir, self.html.template_dir()?, cwd);

        let html = std::fs::read_to_string(&source).map_err(|e| io_err(&source, e))?;
        std::fs::write(&source, fetcher.rewrite(&html)).map_err(|e| io_err(&source, e))?;

        let stylesheets = self.stylesheets();
        let base_url = fetcher.base_url();
        self.converter.convert(&PdfJob {
            html: &source,
            output: &pdf_file,
            stylesheets: &stylesheets,
            base_url: &base_url,
        })?;

        std::fs::remove_file(&source).map_err(|e| io_err(&source, e))?;
        Ok(pdf_file)
    }

    async fn generate_report_async(
        &self,
        data: AsyncReportData,
        output_file: &Path,
    ) -> Result<PathBuf, RenderError> {
        generate_offloaded(self, data, output_file).await
    }
}

impl RendererKind for PdfRenderer {
    const NAME: &'static str = "pdf";

    fn from_context(context: RenderContext) -> Self {
        PdfRenderer::with_converter(context, Arc::new(WeasyPrint::from_env()))
    }

    fn validate(definition: &RendererDefinition) -> Vec<String> {
        let mut errors = Jinja2Renderer::validate(definition);
        if let Some(css_file) = definition.arg("css_file").and_then(|v| v.as_str()) {
            if !css_file.is_empty() && !definition.root_path.join(css_file).is_file() {
                errors.push(format!("css_file `{css_file}` not found."));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.com/image.png", "https://example.com/image.png")]
    #[case("file://image.png", "file:///root_dir/template_dir/image.png")]
    #[case("file:///root_dir/template_dir/image.png", "file:///root_dir/template_dir/image.png")]
    #[case("file://images/image.png", "file:///root_dir/template_dir/images/image.png")]
    #[case(
        "file:///root_dir/template_dir/template_dir/image.png",
        "file:///root_dir/template_dir/image.png"
    )]
    #[case("file:///elsewhere/image.png", "file:///elsewhere/image.png")]
    fn local_fetcher_rewrites(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(local_fetcher(url, Path::new("/root_dir"), "template_dir", None), expected);
    }

    #[test]
    fn local_fetcher_reroots_scratch_dir() {
        let url = local_fetcher(
            "file:///tmp/report-xyz/images/logo.png",
            Path::new("/root_dir"),
            "template_dir",
            Some(Path::new("/tmp/report-xyz")),
        );
        assert_eq!(url, "file:///root_dir/template_dir/images/logo.png");
    }

    #[test]
    fn rewrite_touches_attributes_and_css_urls() {
        let fetcher = LocalFetcher::new("/root_dir", "tpl", Some(PathBuf::from("/tmp/s")));
        let html = r##"<img src="img/a.png"><a href="https://x.io/">x</a><a href="#top">t</a>
<style>body { background: url('bg.png'); }</style>"##;
        let out = fetcher.rewrite(html);
        assert!(out.contains(r#"src="file:///root_dir/tpl/img/a.png""#), "{out}");
        assert!(out.contains(r#"href="https://x.io/""#), "{out}");
        assert!(out.contains(r##"href="#top""##), "{out}");
        assert!(out.contains("url('file:///root_dir/tpl/bg.png')"), "{out}");
    }

    #[test]
    fn base_url_points_at_template_dir() {
        let fetcher = LocalFetcher::new("/root_dir", "tpl", None);
        assert_eq!(fetcher.base_url(), "file:///root_dir/tpl/");
    }
}
