//! JSONL (JSON Lines) output formatter for disk reports
use crate::error::OutputError;
use crate::formats::traits::ReportFormatter;
use crate::report::Report;

/// JSONL formatter that outputs one report per line
pub struct JsonlFormatter;

impl ReportFormatter for JsonlFormatter {
    fn format_reports(&self, reports: &[Report]) -> Result<String, OutputError> {
        let mut output = String::new();

        for report in reports {
            let line = serde_json::to_string(report)?;
            output.push_str(&line);
            output.push('\n');
        }

        Ok(output)
    }
}
