mod assemble;
mod assets;
mod diagnostics;
mod error;
mod format;
pub mod lint;
pub mod markup;
mod metrics;
mod render;
pub mod schema;
mod substitute;

use metrics::timed;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use assemble::{DEFAULT_DOCUMENT_TITLE, RenderedDocument, Stylesheet, assemble};
pub use assets::{Asset, AssetBundle, AssetKind, sample_record};
pub use diagnostics::DiagnosticsLog;
pub use error::{MarkupError, ReportError, Result, SchemaError, TypeMismatch};
pub use format::{
    escape_html, fmt_currency, fmt_decimal, fmt_int, fmt_integer, fmt_percent, format_value,
};
pub use lint::{ComplianceReport, LintOptions, PageCountMethod, lint, lint_html};
pub use metrics::CompileMetrics;
pub use render::{
    CommandEngine, DEFAULT_ENGINE_PROGRAM, DEFAULT_ENGINE_TIMEOUT, PdfEngine, PdfInspection,
    inspect_pdf_bytes, inspect_pdf_path,
};
pub use schema::{FieldKind, FieldValue, FormatCategory, RecordField, ReportRecord, normalize};
pub use substitute::{Template, cleanup_percentages, substitute, unresolved_tokens};

pub const DEFAULT_OUTPUT_DIR: &str = "out";
const FILE_STEM_PREFIX: &str = "calm_profile_report_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Everything one successful compile produced.
#[derive(Debug, Clone)]
pub struct CompiledReport {
    pub record: ReportRecord,
    pub document: RenderedDocument,
    pub compliance: ComplianceReport,
    pub metrics: CompileMetrics,
}

impl CompiledReport {
    pub fn report_id(&self) -> &str {
        self.record.text("report_id").unwrap_or(schema::DEFAULT_TEXT)
    }

    pub fn default_file_name(&self, format: OutputFormat) -> String {
        format!(
            "{FILE_STEM_PREFIX}{}.{}",
            file_stem_safe(self.report_id()),
            format.extension()
        )
    }
}

/// A compiled report written to disk.
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub report: CompiledReport,
    pub pdf: Option<PdfInspection>,
}

fn file_stem_safe(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem
    }
}

pub struct ReportCompiler {
    template: Template,
    stylesheet: Stylesheet,
    document_title: String,
    lint_options: LintOptions,
    diagnostics: Option<DiagnosticsLog>,
    engine: Arc<dyn PdfEngine>,
    output_dir: PathBuf,
}

#[derive(Clone)]
pub struct ReportCompilerBuilder {
    templates_dir: Option<PathBuf>,
    template: Option<String>,
    stylesheet: Option<String>,
    fail_on_warnings: bool,
    minify_stylesheet: bool,
    document_title: String,
    diagnostics_path: Option<PathBuf>,
    engine: Option<Arc<dyn PdfEngine>>,
    output_dir: PathBuf,
}

impl Default for ReportCompilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportCompilerBuilder {
    pub fn new() -> Self {
        Self {
            templates_dir: None,
            template: None,
            stylesheet: None,
            fail_on_warnings: false,
            minify_stylesheet: false,
            document_title: DEFAULT_DOCUMENT_TITLE.to_string(),
            diagnostics_path: None,
            engine: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }

    /// Directory holding `report_template.md` and `report.css`, replacing the embedded defaults.
    pub fn templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = Some(dir.into());
        self
    }

    pub fn template(mut self, markdown: impl Into<String>) -> Self {
        self.template = Some(markdown.into());
        self
    }

    pub fn stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheet = Some(css.into());
        self
    }

    pub fn fail_on_warnings(mut self, enabled: bool) -> Self {
        self.fail_on_warnings = enabled;
        self
    }

    pub fn minify_stylesheet(mut self, enabled: bool) -> Self {
        self.minify_stylesheet = enabled;
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.document_title = title.into();
        self
    }

    pub fn diagnostics_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.diagnostics_path = Some(path.into());
        self
    }

    pub fn engine(mut self, engine: Arc<dyn PdfEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn build(self) -> Result<ReportCompiler> {
        if self.document_title.trim().is_empty() {
            return Err(ReportError::InvalidConfiguration(
                "document_title must not be empty".to_string(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ReportError::InvalidConfiguration(
                "output_dir must not be empty".to_string(),
            ));
        }
        if self.template.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ReportError::InvalidConfiguration(
                "template override must not be empty".to_string(),
            ));
        }

        let mut bundle = match &self.templates_dir {
            Some(dir) if !dir.is_dir() => {
                return Err(ReportError::InvalidConfiguration(format!(
                    "templates_dir is not a directory: {}",
                    dir.display()
                )));
            }
            Some(dir) => AssetBundle::from_dir(dir)?,
            None => AssetBundle::embedded().clone(),
        };
        if let Some(markdown) = self.template {
            bundle.add(Asset::new("template override", AssetKind::Template, markdown));
        }
        if let Some(css) = self.stylesheet {
            bundle.add(Asset::new("stylesheet override", AssetKind::Stylesheet, css));
        }

        let template = bundle.template()?;
        let stylesheet = bundle.stylesheet(self.minify_stylesheet)?;
        let diagnostics = match self.diagnostics_path {
            Some(path) => Some(DiagnosticsLog::new(path)?),
            None => None,
        };
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(CommandEngine::default()));

        tracing::debug!(
            template = %template.name(),
            placeholders = template.placeholders().len(),
            engine = %engine.name(),
            "report compiler ready"
        );
        Ok(ReportCompiler {
            template,
            stylesheet,
            document_title: self.document_title,
            lint_options: LintOptions {
                fail_on_warnings: self.fail_on_warnings,
            },
            diagnostics,
            engine,
            output_dir: self.output_dir,
        })
    }
}

impl ReportCompiler {
    pub fn builder() -> ReportCompilerBuilder {
        ReportCompilerBuilder::new()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn lint_options(&self) -> LintOptions {
        self.lint_options
    }

    /// Normalize, substitute, transform, assemble and lint one record. Nothing is written.
    pub fn compile(&self, raw: &Value) -> Result<CompiledReport> {
        let outcome = self.compile_inner(raw);
        if let Some(log) = &self.diagnostics {
            match &outcome {
                Ok(report) => {
                    log.increment("compile.ok", 1);
                    log.increment("compile.warnings", report.compliance.warnings.len() as u64);
                }
                Err(err) => {
                    log.increment("compile.failed", 1);
                    log.log_event("compile.failed", json!({ "error": err.to_string() }));
                }
            }
        }
        outcome
    }

    fn compile_inner(&self, raw: &Value) -> Result<CompiledReport> {
        let mut metrics = CompileMetrics::default();

        let record = timed(&mut metrics.normalize_ms, || normalize(raw))?;
        let substituted = timed(&mut metrics.substitute_ms, || {
            substitute(&self.template, &record)
        })?;
        let body = timed(&mut metrics.markup_ms, || markup::to_html(&substituted))?;
        let document = timed(&mut metrics.assemble_ms, || {
            assemble(&body, &self.stylesheet, &self.document_title)
        });
        let compliance = timed(&mut metrics.lint_ms, || lint(&document));

        metrics.defaulted_fields = record.defaulted_fields().len();
        metrics.placeholders = self.template.placeholders().len();
        metrics.document_bytes = document.len();

        let report_id = record
            .text("report_id")
            .unwrap_or(schema::DEFAULT_TEXT)
            .to_string();
        self.log_compile(&report_id, &metrics, &compliance);

        if !compliance.is_success() {
            return Err(ReportError::Compliance {
                errors: compliance.errors,
                warnings: compliance.warnings,
            });
        }
        if !compliance.passes(&self.lint_options) {
            return Err(ReportError::Compliance {
                errors: compliance
                    .warnings
                    .iter()
                    .map(|w| format!("warning treated as error: {w}"))
                    .collect(),
                warnings: compliance.warnings,
            });
        }

        tracing::info!(
            report_id = %report_id,
            pages = compliance.page_count,
            warnings = compliance.warnings.len(),
            total_ms = metrics.total_ms(),
            "compiled report"
        );
        Ok(CompiledReport {
            record,
            document,
            compliance,
            metrics,
        })
    }

    fn log_compile(
        &self,
        report_id: &str,
        metrics: &CompileMetrics,
        compliance: &ComplianceReport,
    ) {
        let Some(log) = &self.diagnostics else {
            return;
        };
        for (stage, ms) in metrics.stages() {
            log.log_span_ms(stage, report_id, ms);
        }
        for warning in &compliance.warnings {
            log.log_event(
                "lint.warning",
                json!({ "report_id": report_id, "message": warning }),
            );
        }
        for error in &compliance.errors {
            log.log_event(
                "lint.error",
                json!({ "report_id": report_id, "message": error }),
            );
        }
        log.log_event(
            "compile.metrics",
            json!({ "report_id": report_id, "metrics": metrics }),
        );
    }

    fn output_path(
        &self,
        report: &CompiledReport,
        name: Option<&str>,
        format: OutputFormat,
    ) -> Result<PathBuf> {
        let file_name = match name {
            Some(name) => name.to_string(),
            None => report.default_file_name(format),
        };
        // Names are bare file names; anything that could climb out of output_dir is refused.
        let is_bare = !file_name.contains(['/', '\\'])
            && Path::new(&file_name).file_name() == Some(std::ffi::OsStr::new(&file_name));
        if !is_bare {
            return Err(ReportError::InvalidConfiguration(format!(
                "output name {file_name:?} must be a plain file name"
            )));
        }
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(file_name))
    }

    /// Compiles and writes the HTML document into the output directory.
    pub fn render_to_html(&self, raw: &Value, name: Option<&str>) -> Result<RenderedFile> {
        let report = self.compile(raw)?;
        let path = self.output_path(&report, name, OutputFormat::Html)?;
        std::fs::write(&path, report.document.as_str())?;
        tracing::info!(path = %path.display(), bytes = report.document.len(), "wrote html report");
        self.flush_diagnostics("render_to_html");
        Ok(RenderedFile {
            path,
            report,
            pdf: None,
        })
    }

    /// Compiles, then hands the document to the PDF engine. The engine never sees a
    /// document that failed the compliance gate.
    pub fn render_to_pdf(&self, raw: &Value, name: Option<&str>) -> Result<RenderedFile> {
        let mut report = self.compile(raw)?;
        let path = self.output_path(&report, name, OutputFormat::Pdf)?;

        let mut render_ms = 0.0;
        let rendered = timed(&mut render_ms, || {
            self.engine.render(report.document.as_str(), &path)
        });
        report.metrics.render_ms = Some(render_ms);
        if let Some(log) = &self.diagnostics {
            log.log_span_ms("render", report.report_id(), render_ms);
        }
        if let Err(err) = rendered {
            if let Some(log) = &self.diagnostics {
                log.increment("render.failed", 1);
            }
            self.flush_diagnostics("render_to_pdf");
            return Err(err);
        }

        let inspection = inspect_pdf_path(&path)?;
        if let Some(log) = &self.diagnostics {
            log.increment("render.ok", 1);
            log.log_event(
                "render.pdf",
                json!({
                    "report_id": report.report_id(),
                    "engine": self.engine.name(),
                    "pages": inspection.page_count,
                    "bytes": inspection.file_size_bytes,
                    "pdf_version": inspection.pdf_version,
                }),
            );
        }
        self.flush_diagnostics("render_to_pdf");
        Ok(RenderedFile {
            path,
            report,
            pdf: Some(inspection),
        })
    }

    pub fn render(
        &self,
        raw: &Value,
        name: Option<&str>,
        format: OutputFormat,
    ) -> Result<RenderedFile> {
        match format {
            OutputFormat::Html => self.render_to_html(raw, name),
            OutputFormat::Pdf => self.render_to_pdf(raw, name),
        }
    }

    // Records share only the immutable template and stylesheet; results keep input order.
    pub fn compile_many_parallel(&self, records: &[Value]) -> Vec<Result<CompiledReport>> {
        use rayon::prelude::*;

        let results: Vec<Result<CompiledReport>> =
            records.par_iter().map(|raw| self.compile(raw)).collect();
        self.flush_diagnostics("compile_many_parallel");
        results
    }

    fn flush_diagnostics(&self, context: &str) {
        if let Some(log) = &self.diagnostics {
            log.emit_summary(context);
            log.flush();
        }
    }
}
