use calm_report::{CommandEngine, OutputFormat, ReportCompiler, ReportError, sample_record};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Html,
    Pdf,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Html => OutputFormat::Html,
            Format::Pdf => OutputFormat::Pdf,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "calm-report",
    version,
    about = "Compile a calm.profile diagnostic record into a checked report"
)]
struct Cli {
    /// JSON file holding the report record
    #[arg(long, value_name = "PATH", conflicts_with = "sample", required_unless_present = "sample")]
    data: Option<PathBuf>,
    /// Use the bundled sample record
    #[arg(long)]
    sample: bool,
    /// Output format
    #[arg(long, value_enum, default_value = "pdf")]
    format: Format,
    /// Output file name (default: calm_profile_report_<report_id>.<ext>)
    #[arg(long, value_name = "NAME")]
    output: Option<String>,
    /// Directory with report_template.md and report.css (default: bundled assets)
    #[arg(long, value_name = "DIR")]
    templates_dir: Option<PathBuf>,
    /// Directory the report is written to
    #[arg(long, value_name = "DIR", default_value = calm_report::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Treat compliance warnings as failures
    #[arg(long)]
    fail_on_warnings: bool,
    /// HTML-to-PDF program, called as `<engine> <input.html> <output.pdf>`
    #[arg(long, value_name = "PROGRAM", default_value = calm_report::DEFAULT_ENGINE_PROGRAM)]
    engine: String,
    /// Seconds before the PDF engine is killed
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = calm_report::DEFAULT_ENGINE_TIMEOUT.as_secs()
    )]
    engine_timeout: u64,
    /// Write JSON-lines diagnostics to this file
    #[arg(long, value_name = "PATH")]
    diagnostics_log: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_record(cli: &Cli) -> Result<Value, ReportError> {
    match &cli.data {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text).map_err(|err| {
                let path = path.display();
                ReportError::InvalidConfiguration(format!("{path} is not valid JSON: {err}"))
            })
        }
        None => sample_record(),
    }
}

fn run(cli: &Cli) -> Result<PathBuf, ReportError> {
    let record = load_record(cli)?;
    let engine = CommandEngine::new(cli.engine.clone())
        .timeout(Duration::from_secs(cli.engine_timeout));
    let mut builder = ReportCompiler::builder()
        .output_dir(&cli.output_dir)
        .fail_on_warnings(cli.fail_on_warnings)
        .engine(Arc::new(engine));
    if let Some(dir) = &cli.templates_dir {
        builder = builder.templates_dir(dir);
    }
    if let Some(path) = &cli.diagnostics_log {
        builder = builder.diagnostics_log(path);
    }
    let compiler = builder.build()?;
    let rendered = compiler.render(&record, cli.output.as_deref(), cli.format.into())?;
    for warning in &rendered.report.compliance.warnings {
        eprintln!("WARNING: {warning}");
    }
    Ok(rendered.path)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(&cli) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(ReportError::Compliance { errors, warnings }) => {
            for error in &errors {
                eprintln!("ERROR: {error}");
            }
            for warning in &warnings {
                eprintln!("WARNING: {warning}");
            }
            eprintln!("report not rendered: {} compliance error(s)", errors.len());
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::FAILURE
        }
    }
}
