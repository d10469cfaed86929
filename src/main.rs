//! Main entry point for the disk report tool
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Env, Target};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::LevelFilter;

use diskreport::aggregator::ReportAggregator;
use diskreport::cli::args::Cli;
use diskreport::config::{self, AnalyzerConfig};
use diskreport::formats::{OutputDestination, OutputWriter};
use diskreport::observer::{AnalysisEvent, AnalysisObserver, LogObserver};
use diskreport::plugins::PluginRegistry;
use diskreport::publish::jsonl_index::validate_index_name;
use diskreport::publish::{JsonlIndex, Publisher};

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "DISKREPORT_LOG";

/// Logs every event and advances the progress bar once per finished target.
struct CliObserver {
    log: LogObserver,
    progress: Option<ProgressBar>,
}

impl AnalysisObserver for CliObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        self.log.on_event(event);
        if let (Some(bar), AnalysisEvent::ReportAssembled { target, .. }) = (&self.progress, event) {
            bar.set_message(target.clone());
            bar.inc(1);
        }
    }
}

fn progress_bar(len: usize) -> Option<ProgressBar> {
    if len < 2 || !std::io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    Some(bar)
}

/// Send log records to the log file, or to stderr when it cannot be opened.
fn init_logging(file: &Path, level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_env(Env::new().filter(LOG_ENV))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        });

    match OpenOptions::new().create(true).append(true).open(file) {
        Ok(handle) => {
            builder.target(Target::Pipe(Box::new(handle)));
        }
        Err(e) => {
            eprintln!(
                "Warning: cannot open log file {}: {}; logging to stderr",
                file.display(),
                e
            );
            builder.target(Target::Stderr);
        }
    }

    // Already initialised when embedded in tests
    let _ = builder.try_init();
}

fn list_plugins() {
    println!("Available plugins:");
    for plugin in PluginRegistry::with_builtin().plugins() {
        println!(
            "  {:<16} [{}] {}",
            plugin.name(),
            plugin.capability(),
            plugin.description()
        );
    }
}

fn load_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut config = config::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    if config.index.root.is_some() {
        validate_index_name(&config.index.name)?;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    init_logging(&config.logging.file, config.logging.level);
    if let Some(path) = &config.config_path {
        log::info!("Loaded configuration from {}", path.display());
    }
    log::info!("Starting analysis of {} targets", cli.targets.len());

    let progress = progress_bar(cli.targets.len());
    let observer = Arc::new(CliObserver {
        log: LogObserver,
        progress: progress.clone(),
    });
    let aggregator = ReportAggregator::new(config.analysis.clone(), observer.clone());
    let collection = aggregator.analyze_paths(&cli.targets);
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    for identifier in &collection.failed_to_open {
        eprintln!("Warning: could not open {}", identifier);
    }
    if collection.is_total_failure() {
        log::error!("No target could be analyzed");
        eprintln!("Error: no target could be analyzed");
        return Ok(ExitCode::from(1));
    }

    let destination = match &cli.output {
        Some(path) => OutputDestination::File(path.clone()),
        None => OutputDestination::Stdout,
    };
    OutputWriter::new(cli.format.into(), destination)
        .write_reports(&collection.reports)
        .context("failed to write reports")?;

    if let Some(root) = &config.index.root {
        let index = Arc::new(JsonlIndex::new(root));
        let publisher = Publisher::new(index, config.index.name.clone(), observer);
        let summary = publisher.publish_all(&collection.reports);
        log::info!(
            "Published {} reports to index {} ({} failed)",
            summary.indexed,
            publisher.index_name(),
            summary.failed.len()
        );
        for (document, message) in &summary.failed {
            eprintln!("Warning: could not index {}: {}", document, message);
        }
    }

    log::info!(
        "Analyzed {} of {} targets",
        collection.len(),
        cli.targets.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    // Usage errors exit with status 2 from clap
    let cli = Cli::parse();

    if cli.list_plugins {
        list_plugins();
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(2)
        }
    }
}
