use calm_report::{LintOptions, lint_html};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "calm-lint",
    version,
    about = "Check a rendered calm.profile report against the compliance contract"
)]
struct Cli {
    /// Path to the HTML document to check
    #[arg(value_name = "HTML")]
    html: PathBuf,
    /// Treat warnings as failures
    #[arg(long)]
    fail_on_warnings: bool,
    /// Print the full compliance report as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let html = match std::fs::read_to_string(&cli.html) {
        Ok(html) => html,
        Err(err) => {
            eprintln!("ERROR: cannot read {}: {err}", cli.html.display());
            return ExitCode::FAILURE;
        }
    };

    let report = lint_html(&html);
    let options = LintOptions {
        fail_on_warnings: cli.fail_on_warnings,
    };

    for error in &report.errors {
        eprintln!("ERROR: {error}");
    }
    for warning in &report.warnings {
        eprintln!("WARNING: {warning}");
    }
    if cli.json {
        match serde_json::to_string_pretty(&report.to_json()) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("ERROR: cannot serialize report: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    if report.passes(&options) {
        eprintln!(
            "compliance passed: {} page(s), {} warning(s)",
            report.page_count,
            report.warnings.len()
        );
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "compliance failed: {} error(s), {} warning(s)",
            report.errors.len(),
            report.warnings.len()
        );
        ExitCode::FAILURE
    }
}
