//! Renderer contract — [`Renderer`], [`RendererKind`] and the packaging protocol.
//!
//! # Render protocol
//!
//! 1. Acquire a scratch directory (removed on every exit path).
//! 2. `generate_report` → `<scratch>/report.<ext>`.
//! 3. `generate_summary` → `<scratch>/summary.json`.
//! 4. `pack_files` → `<output>.zip` holding both files by basename.
//!
//! Renderers declaring [`Packaging::Bare`] skip 3–4: the artifact is
//! self-contained and is moved to the output path directly.
//!
//! The async protocol runs the same phases, each awaited before the next
//! starts, with blocking work on `spawn_blocking`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use reports_core::types::RendererDefinition;

use crate::context::RenderContext;
use crate::data::{offload, offload_rows, AsyncReportData, ReportData};
use crate::error::{io_err, RenderError};

/// Title of the execution summary.
pub const SUMMARY_TITLE: &str = "Report Execution Information";

/// How a renderer's artifact is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Packaging {
    /// Report + `summary.json` zipped together.
    #[default]
    Zip,
    /// The report file alone (the format carries its own metadata).
    Bare,
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// An output format bound to one execution context.
#[async_trait]
pub trait Renderer: Send + Sync {
    fn context(&self) -> &RenderContext;

    fn context_mut(&mut self) -> &mut RenderContext;

    /// Write the report body. `output_file` has no extension; the renderer
    /// picks one and returns the final path.
    fn generate_report(&self, data: ReportData, output_file: &Path) -> Result<PathBuf, RenderError>;

    /// Async counterpart of [`Renderer::generate_report`].
    async fn generate_report_async(
        &self,
        data: AsyncReportData,
        output_file: &Path,
    ) -> Result<PathBuf, RenderError>;

    fn packaging(&self) -> Packaging {
        Packaging::Zip
    }

    /// Produce a [`Packaging::Bare`] artifact. Renderers that embed execution
    /// metadata override this to receive the start time.
    fn generate_standalone(
        &self,
        data: ReportData,
        output_file: &Path,
        _start_time: DateTime<Utc>,
    ) -> Result<PathBuf, RenderError> {
        self.generate_report(data, output_file)
    }

    async fn generate_standalone_async(
        &self,
        data: AsyncReportData,
        output_file: &Path,
        _start_time: DateTime<Utc>,
    ) -> Result<PathBuf, RenderError> {
        self.generate_report_async(data, output_file).await
    }

    /// `{account, report, data[, extra_context]}`.
    fn get_context(&self, data: Value) -> Result<Value, RenderError> {
        self.context().template_data(data)
    }

    fn set_extra_context(&mut self, extra_context: Option<Value>) {
        self.context_mut().extra_context = extra_context;
    }

    fn generate_summary(
        &self,
        output_file: &Path,
        start_time: DateTime<Utc>,
    ) -> Result<PathBuf, RenderError> {
        write_summary(self.context(), output_file, start_time)
    }

    async fn generate_summary_async(
        &self,
        output_file: &Path,
        start_time: DateTime<Utc>,
    ) -> Result<PathBuf, RenderError> {
        let context = self.context().clone();
        let output_file = output_file.to_path_buf();
        offload(move || write_summary(&context, &output_file, start_time)).await
    }

    fn pack_files(
        &self,
        report_file: &Path,
        summary_file: &Path,
        output_file: &Path,
    ) -> Result<PathBuf, RenderError> {
        pack_files(report_file, summary_file, output_file)
    }

    async fn pack_files_async(
        &self,
        report_file: &Path,
        summary_file: &Path,
        output_file: &Path,
    ) -> Result<PathBuf, RenderError> {
        let report_file = report_file.to_path_buf();
        let summary_file = summary_file.to_path_buf();
        let output_file = output_file.to_path_buf();
        offload(move || pack_files(&report_file, &summary_file, &output_file)).await
    }

    /// Run the full protocol and return the artifact path.
    fn render(
        &self,
        data: ReportData,
        output_file: &Path,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<PathBuf, RenderError> {
        let start_time = start_time.unwrap_or_else(Utc::now);
        let scratch = ScratchDir::new()?;
        let report_path = scratch.path().join("report");

        let artifact = match self.packaging() {
            Packaging::Zip => {
                let report_file = self.generate_report(data, &report_path)?;
                tracing::debug!("report generated: {}", report_file.display());
                let summary_file =
                    self.generate_summary(&scratch.path().join("summary"), start_time)?;
                tracing::debug!("summary written: {}", summary_file.display());
                self.pack_files(&report_file, &summary_file, output_file)?
            }
            Packaging::Bare => {
                let report_file = self.generate_standalone(data, &report_path, start_time)?;
                persist(&report_file, output_file)?
            }
        };

        tracing::info!("report artifact ready: {}", artifact.display());
        Ok(artifact)
    }

    /// Async counterpart of [`Renderer::render`]. Phases never overlap.
    async fn render_async(
        &self,
        data: AsyncReportData,
        output_file: &Path,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<PathBuf, RenderError> {
        let start_time = start_time.unwrap_or_else(Utc::now);
        let scratch = ScratchDir::new()?;
        let report_path = scratch.path().join("report");

        let artifact = match self.packaging() {
            Packaging::Zip => {
                let report_file = self.generate_report_async(data, &report_path).await?;
                tracing::debug!("report generated: {}", report_file.display());
                let summary_file = self
                    .generate_summary_async(&scratch.path().join("summary"), start_time)
                    .await?;
                tracing::debug!("summary written: {}", summary_file.display());
                self.pack_files_async(&report_file, &summary_file, output_file)
                    .await?
            }
            Packaging::Bare => {
                let report_file = self
                    .generate_standalone_async(data, &report_path, start_time)
                    .await?;
                let output_file = output_file.to_path_buf();
                offload(move || persist(&report_file, &output_file)).await?
            }
        };

        tracing::info!("report artifact ready: {}", artifact.display());
        Ok(artifact)
    }
}

/// Construction and validation hooks of a concrete renderer type.
pub trait RendererKind: Renderer + Sized + 'static {
    /// Key the type is registered under by default.
    const NAME: &'static str;

    fn from_context(context: RenderContext) -> Self;

    /// Human-readable problems with `definition`; empty when valid.
    fn validate(_definition: &RendererDefinition) -> Vec<String> {
        Vec::new()
    }
}

/// Shared `generate_report_async` body: clone the renderer onto a blocking
/// worker and feed it the data.
pub(crate) async fn generate_offloaded<R>(
    renderer: &R,
    data: AsyncReportData,
    output_file: &Path,
) -> Result<PathBuf, RenderError>
where
    R: Renderer + Clone + 'static,
{
    let renderer = renderer.clone();
    let output_file = output_file.to_path_buf();
    offload_rows(data, move |data| renderer.generate_report(data, &output_file)).await
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Write the execution summary to `<output_file>.json`.
///
/// Keys are sorted and indented by four spaces. The finish time is taken
/// now, after the report body has been produced.
pub fn write_summary(
    context: &RenderContext,
    output_file: &Path,
    start_time: DateTime<Utc>,
) -> Result<PathBuf, RenderError> {
    let document = json!({
        "data": {
            "account_id": context.account.id,
            "account_name": context.account.name,
            "report_execution_parameters": context.report.values,
            "report_finish_time": iso_timestamp(Utc::now()),
            "report_id": context.report.id,
            "report_name": context.report.name,
            "report_start_time": iso_timestamp(start_time),
            "runtime_environment": context.environment,
        },
        "title": SUMMARY_TITLE,
    });

    let path = ensure_extension(output_file, "json");
    let file = File::create(&path).map_err(|e| io_err(&path, e))?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    document.serialize(&mut serializer)?;
    writer.flush().map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// RFC 3339, UTC offset spelled `+00:00`, microsecond precision.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

// ---------------------------------------------------------------------------
// Packaging
// ---------------------------------------------------------------------------

/// Zip `report_file` and `summary_file` (stored by basename) into
/// `output_file`, forcing a `.zip` extension.
pub fn pack_files(
    report_file: &Path,
    summary_file: &Path,
    output_file: &Path,
) -> Result<PathBuf, RenderError> {
    let path = ensure_extension(output_file, "zip");
    let file = File::create(&path).map_err(|e| io_err(&path, e))?;
    let mut archive = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in [report_file, summary_file] {
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        archive.start_file(name, options)?;
        let mut source = File::open(entry).map_err(|e| io_err(entry, e))?;
        std::io::copy(&mut source, &mut archive).map_err(|e| io_err(entry, e))?;
    }

    archive.finish()?;
    tracing::debug!("archive packed: {}", path.display());
    Ok(path)
}

/// Move a bare artifact to `output_file`, keeping the artifact's extension.
pub(crate) fn persist(report_file: &Path, output_file: &Path) -> Result<PathBuf, RenderError> {
    let target = match report_file.extension().and_then(|e| e.to_str()) {
        Some(ext) => ensure_extension(output_file, ext),
        None => output_file.to_path_buf(),
    };
    if std::fs::rename(report_file, &target).is_err() {
        // Scratch space may live on another filesystem.
        std::fs::copy(report_file, &target).map_err(|e| io_err(&target, e))?;
    }
    Ok(target)
}

/// `path` if it already ends in `.ext`, otherwise `path` with its extension
/// replaced (or added).
pub fn ensure_extension(path: &Path, ext: &str) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some(ext) {
        path.to_path_buf()
    } else {
        path.with_extension(ext)
    }
}

// ---------------------------------------------------------------------------
// Scratch directory
// ---------------------------------------------------------------------------

/// Temporary directory owned by one render call.
///
/// Removed on drop; a failed removal is logged and otherwise ignored.
pub(crate) struct ScratchDir(Option<TempDir>);

impl ScratchDir {
    pub(crate) fn new() -> Result<Self, RenderError> {
        let dir = tempfile::Builder::new()
            .prefix("report-")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        Ok(ScratchDir(Some(dir)))
    }

    pub(crate) fn path(&self) -> &Path {
        self.0.as_ref().map(TempDir::path).unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.0.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::debug!("scratch cleanup failed for {}: {e}", path.display());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reports_core::types::{Account, Report};
    use serde_json::Map;
    use std::io::Read;
    use tempfile::TempDir;

    fn make_context() -> RenderContext {
        let mut value = Map::new();
        value.insert("param_id".into(), json!("param_value"));
        RenderContext::new(
            "runtime",
            "/repo",
            Account::new("VA-000", "vendor account"),
            Report {
                id: "report_id".into(),
                name: "report name".into(),
                description: "report description".into(),
                values: vec![value],
            },
        )
    }

    #[test]
    fn ensure_extension_adds_or_keeps() {
        assert_eq!(ensure_extension(Path::new("/tmp/report"), "zip"), PathBuf::from("/tmp/report.zip"));
        assert_eq!(ensure_extension(Path::new("/tmp/report.zip"), "zip"), PathBuf::from("/tmp/report.zip"));
        assert_eq!(ensure_extension(Path::new("/tmp/report.csv"), "zip"), PathBuf::from("/tmp/report.zip"));
    }

    #[test]
    fn summary_contains_execution_metadata() {
        let dir = TempDir::new().expect("tempdir");
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = write_summary(&make_context(), &dir.path().join("summary"), start).expect("summary");
        assert_eq!(path, dir.path().join("summary.json"));

        let content = std::fs::read_to_string(&path).expect("read");
        let doc: Value = serde_json::from_str(&content).expect("json");
        assert_eq!(doc["title"], json!(SUMMARY_TITLE));
        assert_eq!(doc["data"]["account_id"], json!("VA-000"));
        assert_eq!(doc["data"]["report_id"], json!("report_id"));
        assert_eq!(doc["data"]["runtime_environment"], json!("runtime"));
        assert_eq!(doc["data"]["report_start_time"], json!("2024-01-02T03:04:05.000000+00:00"));
        assert_eq!(doc["data"]["report_execution_parameters"][0]["param_id"], json!("param_value"));

        let finish = doc["data"]["report_finish_time"].as_str().expect("finish");
        let finish = DateTime::parse_from_rfc3339(finish)
            .expect("rfc3339")
            .with_timezone(&Utc);
        assert!(finish >= start);
        assert!(content.contains("\n    \"data\""), "four-space indent expected:\n{content}");
    }

    #[test]
    fn pack_files_forces_zip_and_stores_basenames() {
        let dir = TempDir::new().expect("tempdir");
        let report = dir.path().join("report.csv");
        let summary = dir.path().join("summary.json");
        std::fs::write(&report, "\"a\"\n").expect("write");
        std::fs::write(&summary, "{}").expect("write");

        let out = pack_files(&report, &summary, &dir.path().join("out")).expect("pack");
        assert_eq!(out, dir.path().join("out.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&out).expect("open")).expect("zip");
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["report.csv", "summary.json"]);

        let mut content = String::new();
        archive
            .by_name("report.csv")
            .expect("entry")
            .read_to_string(&mut content)
            .expect("read");
        assert_eq!(content, "\"a\"\n");
    }

    #[test]
    fn persist_keeps_artifact_extension() {
        let dir = TempDir::new().expect("tempdir");
        let artifact = dir.path().join("report.xlsx");
        std::fs::write(&artifact, b"PK").expect("write");
        let out = persist(&artifact, &dir.path().join("final")).expect("persist");
        assert_eq!(out, dir.path().join("final.xlsx"));
        assert!(out.is_file());
    }

    #[test]
    fn scratch_dir_removed_on_drop() {
        let scratch = ScratchDir::new().expect("scratch");
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn scratch_dir_removal_failure_is_silent() {
        let scratch = ScratchDir::new().expect("scratch");
        std::fs::remove_dir_all(scratch.path()).expect("remove early");
        drop(scratch);
    }
}
