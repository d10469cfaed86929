//! Extraction steps
//!
//! Each step reads one report section from a target. Steps return facts with
//! optional fields; turning those into sentinels is the report's job.
use std::collections::BTreeSet;

use crate::error::{StepError, TargetError};
use crate::target::{FilesystemInfo, ForensicTarget, User, Volume};

/// A single field that could not be read.
#[derive(Debug)]
pub struct FieldFailure {
    pub field: &'static str,
    pub error: TargetError,
}

/// Best-effort basic system facts.
#[derive(Debug, Default)]
pub struct BasicInfoFacts {
    pub hostname: Option<String>,
    pub os_type: Option<String>,
    pub os_version: Option<String>,
    pub architecture: Option<String>,
    pub users: Option<Vec<User>>,
    pub failures: Vec<FieldFailure>,
}

/// Filesystem facts of one selected volume.
#[derive(Debug)]
pub struct FilesystemFacts {
    pub partition_index: usize,
    pub filesystem: Option<FilesystemInfo>,
    pub file_count: u64,
}

/// Artifact names; a `None` list could not be enumerated.
#[derive(Debug, Default)]
pub struct ArtifactFacts {
    pub registry_hives: Option<BTreeSet<String>>,
    pub log_files: Option<BTreeSet<String>>,
    pub failures: Vec<FieldFailure>,
}

fn best_effort<T>(
    field: &'static str,
    lookup: Result<T, TargetError>,
    failures: &mut Vec<FieldFailure>,
) -> Option<T> {
    match lookup {
        Ok(value) => Some(value),
        Err(error) => {
            failures.push(FieldFailure { field, error });
            None
        }
    }
}

/// Hostname, OS, architecture and users.
///
/// Only an inaccessible target fails the step; every individual lookup
/// degrades to a recorded field failure.
pub fn basic_info(target: &dyn ForensicTarget) -> Result<BasicInfoFacts, StepError> {
    target.check_accessible()?;

    let mut failures = Vec::new();
    let hostname = best_effort("hostname", target.hostname(), &mut failures);
    let os_type = best_effort("os_type", target.os_type(), &mut failures);
    let os_version = best_effort("os_version", target.os_version(), &mut failures);
    let architecture = best_effort("os_architecture", target.architecture(), &mut failures);
    let users = best_effort("users", target.users(), &mut failures);

    Ok(BasicInfoFacts {
        hostname,
        os_type,
        os_version,
        architecture,
        users,
        failures,
    })
}

/// Volumes in enumeration order.
pub fn partitions(target: &dyn ForensicTarget) -> Result<Vec<Volume>, StepError> {
    Ok(target.volumes()?)
}

/// Filesystem identity and entry count of the volume at `index`.
pub fn filesystem_detail(
    target: &dyn ForensicTarget,
    index: usize,
) -> Result<FilesystemFacts, StepError> {
    let volumes = target.volumes()?;
    let volume = volumes.get(index).ok_or(StepError::OutOfRange {
        index,
        count: volumes.len(),
    })?;

    // Unreadable entries are left out of the count
    let file_count = target.entries(volume)?.filter(Result::is_ok).count() as u64;

    Ok(FilesystemFacts {
        partition_index: index,
        filesystem: volume.filesystem.clone(),
        file_count,
    })
}

/// Registry hive and log file names, each list best-effort.
pub fn artifacts(target: &dyn ForensicTarget) -> Result<ArtifactFacts, StepError> {
    let mut failures = Vec::new();
    let registry_hives = best_effort("registry_hives", target.registry_hives(), &mut failures)
        .map(|hives| hives.into_keys().collect());
    let log_files = best_effort("log_files", target.logs(), &mut failures)
        .map(|logs| logs.into_keys().collect());

    Ok(ArtifactFacts {
        registry_hives,
        log_files,
        failures,
    })
}
