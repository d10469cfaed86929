//! Report data model and assembly
//!
//! Extraction steps hand over optional facts. [`Report::assemble`] is the one
//! place where missing values become the `"Unknown"` sentinel or an empty list,
//! so every report has the full shape regardless of what failed.
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{ArtifactFacts, BasicInfoFacts, FilesystemFacts};
use crate::plugins::PluginResults;
use crate::target::{User, Volume};

/// Sentinel for values that could not be determined.
pub const UNKNOWN: &str = "Unknown";

/// Extraction stages of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    BasicInfo,
    Partitions,
    FilesystemDetail,
    Artifacts,
    Plugins,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Step::BasicInfo => "basic-info",
            Step::Partitions => "partitions",
            Step::FilesystemDetail => "filesystem-detail",
            Step::Artifacts => "artifacts",
            Step::Plugins => "plugins",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub disk_path: String,
    pub hostname: String,
    pub os_version: String,
    pub os_type: String,
    pub os_architecture: String,
    pub users: Vec<User>,
}

impl BasicInfo {
    /// Basic info with every field set to the sentinel.
    pub fn unknown(disk_path: &str) -> Self {
        BasicInfo {
            disk_path: disk_path.to_string(),
            hostname: UNKNOWN.to_string(),
            os_version: UNKNOWN.to_string(),
            os_type: UNKNOWN.to_string(),
            os_architecture: UNKNOWN.to_string(),
            users: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub offset: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub filesystem: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemDetail {
    pub partition_index: usize,
    pub filesystem: String,
    pub volume_serial: String,
    pub file_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub registry_hives: Vec<String>,
    pub log_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedStep {
    pub step: Step,
    pub message: String,
}

/// Everything the aggregator collected for one target, before sentinels.
#[derive(Default)]
pub struct Sections {
    /// `None` when the basic-info step failed as a whole.
    pub basic_info: Option<BasicInfoFacts>,
    pub volumes: Vec<Volume>,
    pub filesystem: Option<FilesystemFacts>,
    /// `None` when the artifacts step was not run.
    pub artifacts: Option<ArtifactFacts>,
    /// `None` when the plugin pass was not run.
    pub plugins: Option<PluginResults>,
    pub failed_steps: Vec<FailedStep>,
}

/// The forensic report of one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub identifier: String,
    pub analyzed_at: DateTime<Utc>,
    pub basic_info: BasicInfo,
    pub partitions: Vec<PartitionRecord>,
    pub filesystem: Option<FilesystemDetail>,
    pub artifacts: Option<ArtifactSet>,
    pub plugins: Option<PluginResults>,
    pub failed_steps: Vec<FailedStep>,
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

impl Report {
    /// Build the report, substituting sentinels for everything missing.
    pub fn assemble(identifier: &str, sections: Sections, analyzed_at: DateTime<Utc>) -> Self {
        let basic_info = match sections.basic_info {
            Some(facts) => BasicInfo {
                disk_path: identifier.to_string(),
                hostname: or_unknown(facts.hostname),
                os_version: or_unknown(facts.os_version),
                os_type: or_unknown(facts.os_type),
                os_architecture: or_unknown(facts.architecture),
                users: facts.users.unwrap_or_default(),
            },
            None => BasicInfo::unknown(identifier),
        };

        let partitions = sections
            .volumes
            .into_iter()
            .map(|volume| PartitionRecord {
                offset: volume.offset,
                size: volume.size,
                kind: volume.kind,
                filesystem: or_unknown(volume.filesystem.map(|fs| fs.name)),
            })
            .collect();

        let filesystem = sections.filesystem.map(|facts| {
            let (name, serial) = match facts.filesystem {
                Some(fs) => (Some(fs.name), fs.serial),
                None => (None, None),
            };
            FilesystemDetail {
                partition_index: facts.partition_index,
                filesystem: or_unknown(name),
                volume_serial: or_unknown(serial),
                file_count: facts.file_count,
            }
        });

        let artifacts = sections.artifacts.map(|facts| ArtifactSet {
            registry_hives: facts
                .registry_hives
                .map(|set| set.into_iter().collect())
                .unwrap_or_default(),
            log_files: facts
                .log_files
                .map(|set| set.into_iter().collect())
                .unwrap_or_default(),
        });

        Report {
            identifier: identifier.to_string(),
            analyzed_at,
            basic_info,
            partitions,
            filesystem,
            artifacts,
            plugins: sections.plugins,
            failed_steps: sections.failed_steps,
        }
    }

    /// Flattened `dotted.key -> value` view of the report.
    pub fn flatten(&self) -> Result<BTreeMap<String, Value>, serde_json::Error> {
        Ok(flatten_value(&serde_json::to_value(self)?))
    }
}

/// Flatten nested objects and arrays into dotted keys.
///
/// Empty objects and arrays are kept as leaves so that empty sections remain
/// visible in the flattened form.
pub fn flatten_value(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(&mut out, String::new(), value);
    out
}

fn child_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn flatten_into(out: &mut BTreeMap<String, Value>, prefix: String, value: &Value) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(out, child_key(&prefix, key), child);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(out, child_key(&prefix, &i.to_string()), child);
            }
        }
        leaf => {
            out.insert(prefix, leaf.clone());
        }
    }
}
