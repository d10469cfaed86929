//! Text (table) output formatter for disk reports
use std::fmt::Write;

use crate::error::OutputError;
use crate::formats::traits::ReportFormatter;
use crate::report::Report;
use prettytable::{Cell, Row, Table};

/// Text formatter that outputs a human-readable report per disk
pub struct TextFormatter;

fn header_cell(title: &str) -> Cell {
    Cell::new(title).style_spec("c")
}

fn partitions_table(report: &Report) -> Table {
    let mut table = Table::new();
    table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(vec![
        header_cell("#"),
        header_cell("OFFSET"),
        header_cell("SIZE"),
        header_cell("TYPE"),
        header_cell("FILESYSTEM"),
    ]));

    for (i, partition) in report.partitions.iter().enumerate() {
        table.add_row(Row::new(vec![
            Cell::new(&i.to_string()),
            Cell::new(&format!("0x{:x}", partition.offset)),
            Cell::new(&partition.size.to_string()),
            Cell::new(&partition.kind),
            Cell::new(&partition.filesystem),
        ]));
    }
    table
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn format_report(out: &mut String, report: &Report) -> std::fmt::Result {
    let info = &report.basic_info;
    writeln!(out, "=== Disk Analysis Report ===")?;
    writeln!(out, "Disk:          {}", info.disk_path)?;
    writeln!(out, "Analyzed at:   {}", report.analyzed_at.to_rfc3339())?;
    writeln!(out, "Hostname:      {}", info.hostname)?;
    writeln!(out, "OS type:       {}", info.os_type)?;
    writeln!(out, "OS version:    {}", info.os_version)?;
    writeln!(out, "Architecture:  {}", info.os_architecture)?;
    let users: Vec<String> = info.users.iter().map(|u| u.name.clone()).collect();
    writeln!(out, "Users:         {}", list_or_none(&users))?;

    writeln!(out)?;
    writeln!(out, "Partitions ({}):", report.partitions.len())?;
    if !report.partitions.is_empty() {
        write!(out, "{}", partitions_table(report))?;
    }

    if let Some(fs) = &report.filesystem {
        writeln!(out)?;
        writeln!(out, "Filesystem (partition {}):", fs.partition_index)?;
        writeln!(out, "  Type:        {}", fs.filesystem)?;
        writeln!(out, "  Serial:      {}", fs.volume_serial)?;
        writeln!(out, "  Files:       {}", fs.file_count)?;
    }

    if let Some(artifacts) = &report.artifacts {
        writeln!(out)?;
        writeln!(out, "Artifacts:")?;
        writeln!(
            out,
            "  Registry hives: {}",
            list_or_none(&artifacts.registry_hives)
        )?;
        writeln!(out, "  Log files:      {}", list_or_none(&artifacts.log_files))?;
    }

    if let Some(plugins) = &report.plugins {
        writeln!(out)?;
        writeln!(out, "Plugins ({}):", plugins.len())?;
        for (name, records) in plugins {
            writeln!(out, "  {:<16} {} records", name, records.len())?;
        }
    }

    if !report.failed_steps.is_empty() {
        writeln!(out)?;
        writeln!(out, "Failed steps:")?;
        for failed in &report.failed_steps {
            writeln!(out, "  {}: {}", failed.step, failed.message)?;
        }
    }
    Ok(())
}

impl ReportFormatter for TextFormatter {
    fn format_reports(&self, reports: &[Report]) -> Result<String, OutputError> {
        let mut output = String::new();
        for (i, report) in reports.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            // Writing into a String cannot fail
            let _ = format_report(&mut output, report);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Sections;
    use crate::target::Volume;
    use chrono::Utc;

    #[test]
    fn renders_sections_and_sentinels() {
        let sections = Sections {
            volumes: vec![Volume {
                index: 0,
                offset: 0x100000,
                size: 2048,
                kind: "Linux".to_string(),
                filesystem: None,
            }],
            ..Sections::default()
        };
        let report = Report::assemble("disk.img", sections, Utc::now());
        let out = TextFormatter.format_reports(&[report]).unwrap();

        assert!(out.starts_with("=== Disk Analysis Report ==="));
        assert!(out.contains("Hostname:      Unknown"));
        assert!(out.contains("Partitions (1):"));
        assert!(out.contains("0x100000"));
        assert!(!out.contains("Artifacts:"));
    }
}
