use crate::error::ReportError;
use calm_report_contract::TARGET_PAGE_COUNT;
use lopdf::Document as LoDocument;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

pub const DEFAULT_ENGINE_PROGRAM: &str = "weasyprint";
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Turns a finished HTML document into a PDF file.
pub trait PdfEngine: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, html: &str, output: &Path) -> Result<(), ReportError>;
}

/// Runs an external HTML-to-PDF program. `{input}` and `{output}` inside arguments are
/// replaced with the temporary HTML path and the requested PDF path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_PROGRAM)
    }
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["{input}".to_string(), "{output}".to_string()],
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn expand_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

impl PdfEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn render(&self, html: &str, output: &Path) -> Result<(), ReportError> {
        let mut input = tempfile::Builder::new()
            .prefix("calm_report_")
            .suffix(".html")
            .tempfile()?;
        input.write_all(html.as_bytes())?;
        input.flush()?;

        // A file left at `output` by an earlier run must not pass as this run's result.
        match std::fs::remove_file(output) {
            Ok(()) => tracing::debug!(path = %output.display(), "removed previous engine output"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let args = self.expand_args(input.path(), output);
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                ReportError::RenderEngine(format!("failed to start {}: {err}", self.program))
            })?;

        let stderr_reader = child
            .stderr
            .take()
            .map(|stderr| std::thread::spawn(move || read_pipe_bounded(stderr, MAX_STDERR_BYTES)));

        let waited = child.wait_timeout(self.timeout);
        let status = match waited {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ReportError::RenderEngine(format!(
                    "{} timed out after {:.1}s",
                    self.program,
                    self.timeout.as_secs_f64()
                )))
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(err.into())
            }
        };
        // The child has exited or been reaped here, so the pipe is closed and the join returns.
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .and_then(Result::ok)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        let status = status?;

        if !status.success() {
            let detail = stderr.trim();
            return Err(ReportError::RenderEngine(if detail.is_empty() {
                format!("{} exited with {status}", self.program)
            } else {
                format!("{} exited with {status}: {detail}", self.program)
            }));
        }

        let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(ReportError::RenderEngine(format!(
                "{} produced no output at {}",
                self.program,
                output.display()
            )));
        }
        tracing::info!(
            engine = %self.program,
            bytes = written,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "rendered pdf"
        );
        Ok(())
    }
}

fn read_pipe_bounded<R: Read>(reader: R, limit: u64) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    reader.take(limit).read_to_end(&mut buffer)?;
    Ok(buffer)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspection {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
}

impl PdfInspection {
    pub fn matches_target(&self) -> bool {
        self.page_count == TARGET_PAGE_COUNT
    }
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspection, ReportError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| {
        ReportError::RenderEngine(format!("pdf output could not be parsed: {err}"))
    })?;
    let inspection = PdfInspection {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
    };
    if inspection.page_count == 0 {
        return Err(ReportError::RenderEngine("pdf output has no pages".to_string()));
    }
    if !inspection.matches_target() {
        tracing::warn!(
            pages = inspection.page_count,
            expected = TARGET_PAGE_COUNT,
            "rendered pdf page count differs from target"
        );
    }
    Ok(inspection)
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspection, ReportError> {
    let data = std::fs::read(path)?;
    inspect_pdf_bytes(&data)
}

#[cfg(test)]
pub(crate) mod test_pdf {
    use lopdf::{Document as LoDocument, Object as LoObject, Stream as LoStream, dictionary};

    pub fn pdf_with_pages(pages: usize) -> Vec<u8> {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let mut kids: Vec<LoObject> = Vec::new();
        for page in 0..pages {
            let content = format!("BT /F1 18 Tf 72 720 Td (page {}) Tj ET", page + 1).into_bytes();
            let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        };
        doc.objects.insert(pages_id, LoObject::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_pdf::pdf_with_pages;
    use super::*;

    #[test]
    fn inspect_reports_page_count() {
        let bytes = pdf_with_pages(12);
        let inspection = inspect_pdf_bytes(&bytes).expect("inspect");
        assert_eq!(inspection.page_count, 12);
        assert!(inspection.matches_target());
        assert!(!inspection.encrypted);
        assert_eq!(inspection.file_size_bytes, bytes.len());
    }

    #[test]
    fn off_target_page_count_is_not_an_error() {
        let inspection = inspect_pdf_bytes(&pdf_with_pages(3)).expect("inspect");
        assert!(!inspection.matches_target());
    }

    #[test]
    fn garbage_is_rejected() {
        let err = inspect_pdf_bytes(b"not a pdf").expect_err("garbage");
        assert!(matches!(err, ReportError::RenderEngine(_)));
    }

    #[test]
    fn arguments_expand_input_and_output() {
        let engine = CommandEngine::new("prog").args(["--in={input}", "{output}"]);
        let args = engine.expand_args(Path::new("/tmp/a.html"), Path::new("/tmp/b.pdf"));
        assert_eq!(args, vec!["--in=/tmp/a.html", "/tmp/b.pdf"]);
        assert_eq!(CommandEngine::default().program(), "weasyprint");
    }

    #[test]
    fn missing_program_is_a_render_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = CommandEngine::new("calm-report-no-such-engine");
        let err = engine
            .render("<p>x</p>", &dir.path().join("out.pdf"))
            .expect_err("missing program");
        assert!(err.to_string().contains("failed to start"));
    }

    #[cfg(unix)]
    #[test]
    fn command_engine_copies_through_shell() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.pdf");
        let engine =
            CommandEngine::new("sh").args(["-c", "cp \"$0\" \"$1\"", "{input}", "{output}"]);
        engine.render("<p>hello</p>", &output).expect("render");
        assert_eq!(std::fs::read_to_string(&output).expect("read"), "<p>hello</p>");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_reports_stderr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = CommandEngine::new("sh").args(["-c", "echo broken >&2; exit 3"]);
        let err = engine
            .render("<p>x</p>", &dir.path().join("out.pdf"))
            .expect_err("exit 3");
        let message = err.to_string();
        assert!(message.contains("broken"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn empty_output_is_a_render_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = CommandEngine::new("sh").args(["-c", "true"]);
        let err = engine
            .render("<p>x</p>", &dir.path().join("out.pdf"))
            .expect_err("no output");
        assert!(err.to_string().contains("produced no output"));
    }

    #[cfg(unix)]
    #[test]
    fn slow_engine_is_killed_on_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = CommandEngine::new("sh")
            .args(["-c", "exec sleep 5"])
            .timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = engine
            .render("<p>x</p>", &dir.path().join("out.pdf"))
            .expect_err("timeout");
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn stale_output_from_previous_run_is_not_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.pdf");
        std::fs::write(&output, b"%PDF-old-run").expect("seed");
        let engine = CommandEngine::new("sh").args(["-c", "true"]);
        let err = engine.render("<p>x</p>", &output).expect_err("stale file");
        assert!(err.to_string().contains("produced no output"), "{err}");
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn noisy_stderr_is_truncated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = CommandEngine::new("sh").args([
            "-c",
            "head -c 300000 /dev/zero | tr '\\0' x >&2; exit 3",
        ]);
        let err = engine
            .render("<p>x</p>", &dir.path().join("out.pdf"))
            .expect_err("non-zero exit");
        let message = err.to_string();
        assert!(message.contains("xxxx"), "{message}");
        assert!(message.len() <= MAX_STDERR_BYTES as usize + 200);
    }
}
