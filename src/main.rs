use std::io::{self, BufRead};
use std::process::ExitCode;

use anyhow::{Context, Result};
use log::info;

use invoice_importer::config::ImportConfig;
use invoice_importer::quickbooks::{HttpRequestProcessor, QbXmlSession};
use invoice_importer::report::Reporter;
use invoice_importer::{data, importer};

fn run(config: &ImportConfig) -> Result<()> {
    let headers = data::load_headers(&config.header_path).context("failed to load invoice headers")?;
    let lines = data::load_lines(&config.lines_path).context("failed to load invoice lines")?;
    info!("loaded {} invoices and {} lines", headers.len(), lines.len());

    let mut session = QbXmlSession::new(HttpRequestProcessor::new(&config.relay_url), config);
    let submission =
        importer::push_invoices(&mut session, &headers, &lines).context("failed to submit invoices")?;

    let mut reporter = Reporter::new(io::stdout().lock());
    let reported = reporter.report(&submission);

    // The log is written even when echoing to the console failed.
    if let Some(path) = reporter.write_error_log(&config.error_log_path)? {
        println!("Errors logged to {}", path.display());
    }

    let summary = reported?;
    info!("{} invoices created, {} failed", summary.created, summary.failed);

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = ImportConfig::default();
    let status = match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Unhandled error:");
            eprintln!("{:?}", err);
            ExitCode::FAILURE
        },
    };

    println!();
    println!("Execution complete. Press Enter to exit...");
    let _ = io::stdin().lock().read_line(&mut String::new());

    status
}
