//! CSV output formatter for disk reports
use crate::error::OutputError;
use crate::formats::traits::ReportFormatter;
use crate::report::Report;
use csv::Writer;
use serde_json::Value;

/// CSV formatter writing one `disk,key,value` row per flattened report field
pub struct CsvFormatter;

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl ReportFormatter for CsvFormatter {
    fn format_reports(&self, reports: &[Report]) -> Result<String, OutputError> {
        let mut wtr = Writer::from_writer(vec![]);

        // Write header
        wtr.write_record(["disk", "key", "value"])?;

        // Write data rows
        for report in reports {
            for (key, value) in report.flatten()? {
                let value = cell(&value);
                wtr.write_record([report.identifier.as_str(), key.as_str(), value.as_str()])?;
            }
        }

        wtr.flush()?;
        let data = wtr.into_inner()?;
        Ok(String::from_utf8(data)?)
    }
}
