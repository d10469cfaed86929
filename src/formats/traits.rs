//! Output format traits for disk reports
use std::io::Write;
use std::path::PathBuf;

use crate::error::OutputError;
use crate::report::Report;

/// Trait for report formatters
pub trait ReportFormatter: Send + Sync {
    fn format_reports(&self, reports: &[Report]) -> Result<String, OutputError>;
}

/// Enum for output format types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
    Jsonl,
}

/// Enum for output destination
#[derive(Debug, Clone)]
pub enum OutputDestination {
    Stdout,
    File(PathBuf),
}

/// Output writer that combines format and destination
pub struct OutputWriter {
    formatter: Box<dyn ReportFormatter>,
    destination: OutputDestination,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, destination: OutputDestination) -> Self {
        let formatter: Box<dyn ReportFormatter> = match format {
            OutputFormat::Text => Box::new(crate::formats::text::TextFormatter),
            OutputFormat::Csv => Box::new(crate::formats::csv::CsvFormatter),
            OutputFormat::Json => Box::new(crate::formats::json::JsonFormatter),
            OutputFormat::Jsonl => Box::new(crate::formats::jsonl::JsonlFormatter),
        };

        Self {
            formatter,
            destination,
        }
    }

    /// Render reports without writing them anywhere
    pub fn render(&self, reports: &[Report]) -> Result<String, OutputError> {
        let mut content = self.formatter.format_reports(reports)?;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        Ok(content)
    }

    /// Write reports to the configured destination
    pub fn write_reports(&self, reports: &[Report]) -> Result<(), OutputError> {
        let content = self.render(reports)?;

        match &self.destination {
            OutputDestination::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(content.as_bytes())?;
                stdout.flush()?;
            }
            OutputDestination::File(path) => {
                std::fs::write(path, content)?;
            }
        }

        Ok(())
    }
}
