mod ast;
mod cli;
mod config;
mod element;
mod errors;
mod interpreter;
mod label;
mod labelling;
mod parser;
mod policy;
mod vulnerability;

use crate::errors::{AnalyzerError, AnalyzerResult};
use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::fmt::time;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

fn init_tracing(level: Option<&str>) {
    let filter = level
        .map(EnvFilter::new)
        .unwrap_or_else(EnvFilter::from_default_env);

    // stdout carries only the JSON report; every log line goes to stderr.
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(time::UtcTime::rfc_3339());

    Registry::default().with(filter).with(fmt_layer).init();
}

fn run() -> AnalyzerResult<()> {
    let cli = Cli::parse();

    let config = config::Config::load(cli.config.as_deref())?;
    init_tracing(cli.log_level.as_deref().or(config.log_level.as_deref()));

    tracing::debug!("analyzing slice {}", cli.slice.display());

    let source = std::fs::read_to_string(&cli.slice)?;
    let patterns_json = std::fs::read_to_string(&cli.patterns)?;

    let module = parser::parse_slice(&source)?;
    let policy = policy::Policy::from_json(&patterns_json)?;

    let vulns = interpreter::analyze(&module, &policy);
    let report = vulns.to_report();

    let pretty = !cli.no_pretty && (cli.pretty || config.report.pretty);
    let rendered = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };

    println!("{rendered}");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if matches!(err, AnalyzerError::UnsupportedNode { .. }) {
                tracing::error!("discarding partial report: {err}");
            }
            ExitCode::FAILURE
        }
    }
}
