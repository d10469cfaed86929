//! Command-line argument parsing for the disk report tool
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{resolve_jobs, timeout_from_secs, AnalyzerConfig};
use crate::formats::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "diskreport")]
#[command(about = "Forensic disk image report generator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Disk images or mounted filesystem trees to analyse
    #[arg(value_name = "TARGETS", required_unless_present = "list_plugins")]
    pub targets: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run plugins whose names match FILTER (glob, comma separated, given as -p=FILTER)
    #[arg(
        short,
        long,
        value_name = "FILTER",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "*"
    )]
    pub plugins: Option<String>,

    /// Partition index used for the filesystem detail
    #[arg(long, value_name = "N")]
    pub partition: Option<usize>,

    /// Skip the filesystem detail step
    #[arg(long)]
    pub skip_filesystem: bool,

    /// Skip the artifacts step
    #[arg(long)]
    pub skip_artifacts: bool,

    /// Number of targets analysed in parallel (0: one per CPU)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Time limit per extraction step in seconds (0: none)
    #[arg(long, value_name = "SECS")]
    pub step_timeout: Option<u64>,

    /// Time limit per plugin in seconds (0: none)
    #[arg(long, value_name = "SECS")]
    pub plugin_timeout: Option<u64>,

    /// Publish reports to a JSON-lines index under DIR
    #[arg(long, value_name = "DIR")]
    pub index_root: Option<PathBuf>,

    /// Index name
    #[arg(long, value_name = "NAME")]
    pub index_name: Option<String>,

    /// Log file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Enable verbose output (warnings, status messages)
    #[arg(short, long)]
    pub verbose: bool,

    /// List available plugins
    #[arg(short, long)]
    pub list_plugins: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormatArg {
    Text,
    Csv,
    Json,
    Jsonl,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut AnalyzerConfig) {
        let options = &mut config.analysis;
        if let Some(filter) = &self.plugins {
            options.plugin_filter = Some(filter.clone());
        }
        if let Some(index) = self.partition {
            options.partition_index = index;
        }
        if self.skip_filesystem {
            options.filesystem = false;
        }
        if self.skip_artifacts {
            options.artifacts = false;
        }
        if let Some(jobs) = self.jobs {
            options.jobs = resolve_jobs(jobs);
        }
        if let Some(secs) = self.step_timeout {
            options.step_timeout = timeout_from_secs(secs);
        }
        if let Some(secs) = self.plugin_timeout {
            options.plugin_timeout = timeout_from_secs(secs);
        }

        if let Some(root) = &self.index_root {
            config.index.root = Some(root.clone());
        }
        if let Some(name) = &self.index_name {
            config.index.name = name.clone();
        }

        if let Some(file) = &self.log_file {
            config.logging.file = file.clone();
        }
        if self.debug {
            config.logging.level = log::LevelFilter::Trace;
        } else if self.verbose {
            config.logging.level = log::LevelFilter::Debug;
        }
    }
}
