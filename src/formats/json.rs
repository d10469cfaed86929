//! JSON output formatter for disk reports
use crate::error::OutputError;
use crate::formats::traits::ReportFormatter;
use crate::report::Report;

#[derive(serde::Serialize)]
struct OutputWrapper<'a> {
    tool: &'static str,
    version: &'static str,
    timestamp: String,
    count: usize,
    reports: &'a [Report],
}

/// JSON formatter that wraps all reports in one document with metadata
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format_reports(&self, reports: &[Report]) -> Result<String, OutputError> {
        let wrapper = OutputWrapper {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now().to_rfc3339(),
            count: reports.len(),
            reports,
        };

        let json = serde_json::to_string_pretty(&wrapper)?;
        Ok(json)
    }
}
