//! Configuration
//!
//! Effective settings come from built-in defaults, then an optional TOML file,
//! then command-line flags (applied by the binary). Every field in the file is
//! optional.
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::Deserialize;

use crate::aggregator::AnalysisOptions;
use crate::error::ConfigError;
use crate::publish::jsonl_index::validate_index_name;
use crate::publish::DEFAULT_INDEX;

pub const DEFAULT_LOG_FILE: &str = "disk_analysis.log";

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub analysis: AnalysisOptions,
    pub logging: LoggingConfig,
    pub index: IndexConfig,
    /// File the settings were read from, if any.
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub file: PathBuf,
    pub level: LevelFilter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Publishing is enabled when a root is set.
    pub root: Option<PathBuf>,
    pub name: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            analysis: AnalysisOptions::default(),
            logging: LoggingConfig {
                file: PathBuf::from(DEFAULT_LOG_FILE),
                level: LevelFilter::Info,
            },
            index: IndexConfig {
                root: None,
                name: DEFAULT_INDEX.to_string(),
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    analysis: Option<RawAnalysisConfig>,
    logging: Option<RawLoggingConfig>,
    index: Option<RawIndexConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAnalysisConfig {
    partition_index: Option<usize>,
    filesystem: Option<bool>,
    artifacts: Option<bool>,
    plugins: Option<String>,
    step_timeout_secs: Option<u64>,
    plugin_timeout_secs: Option<u64>,
    jobs: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLoggingConfig {
    file: Option<PathBuf>,
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIndexConfig {
    enabled: Option<bool>,
    root: Option<PathBuf>,
    name: Option<String>,
}

/// Worker count for a requested `jobs` value; 0 means one per CPU.
pub fn resolve_jobs(jobs: usize) -> usize {
    if jobs == 0 {
        num_cpus::get().max(1)
    } else {
        jobs
    }
}

/// Timeout from a number of seconds; 0 disables the limit.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Load the effective configuration, reading `path` when given.
pub fn load(path: Option<&Path>) -> Result<AnalyzerConfig, ConfigError> {
    let mut config = AnalyzerConfig::default();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw = parse(path, &text)?;
        apply_raw_config(&mut config, raw)?;
        config.config_path = Some(path.to_path_buf());
    }
    Ok(config)
}

fn parse(path: &Path, text: &str) -> Result<RawConfig, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn apply_raw_config(config: &mut AnalyzerConfig, raw: RawConfig) -> Result<(), ConfigError> {
    if let Some(analysis) = raw.analysis {
        let options = &mut config.analysis;
        if let Some(index) = analysis.partition_index {
            options.partition_index = index;
        }
        if let Some(filesystem) = analysis.filesystem {
            options.filesystem = filesystem;
        }
        if let Some(artifacts) = analysis.artifacts {
            options.artifacts = artifacts;
        }
        if let Some(plugins) = analysis.plugins {
            options.plugin_filter = Some(plugins);
        }
        if let Some(secs) = analysis.step_timeout_secs {
            options.step_timeout = timeout_from_secs(secs);
        }
        if let Some(secs) = analysis.plugin_timeout_secs {
            options.plugin_timeout = timeout_from_secs(secs);
        }
        if let Some(jobs) = analysis.jobs {
            options.jobs = resolve_jobs(jobs);
        }
    }

    if let Some(logging) = raw.logging {
        if let Some(file) = logging.file {
            config.logging.file = file;
        }
        if let Some(level) = logging.level {
            config.logging.level = level
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", level)))?;
        }
    }

    if let Some(index) = raw.index {
        if let Some(name) = index.name {
            validate_index_name(&name).map_err(|e| ConfigError::Invalid(e.to_string()))?;
            config.index.name = name;
        }
        if let Some(root) = index.root {
            config.index.root = Some(root);
        }
        if index.enabled == Some(false) {
            config.index.root = None;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_str(text: &str) -> Result<AnalyzerConfig, ConfigError> {
        let mut config = AnalyzerConfig::default();
        apply_raw_config(&mut config, parse(Path::new("test.toml"), text)?)?;
        Ok(config)
    }

    #[test]
    fn empty_file_keeps_defaults() {
        assert_eq!(from_str("").unwrap(), AnalyzerConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let config = from_str(
            r#"
[analysis]
partition_index = 2
artifacts = false
plugins = "users,os_*"
step_timeout_secs = 30
plugin_timeout_secs = 0
jobs = 4

[logging]
file = "/tmp/analysis.log"
level = "debug"

[index]
root = "/srv/index"
name = "case-17"
"#,
        )
        .unwrap();

        assert_eq!(config.analysis.partition_index, 2);
        assert!(config.analysis.filesystem);
        assert!(!config.analysis.artifacts);
        assert_eq!(config.analysis.plugin_filter.as_deref(), Some("users,os_*"));
        assert_eq!(config.analysis.step_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.analysis.plugin_timeout, None);
        assert_eq!(config.analysis.jobs, 4);
        assert_eq!(config.logging.file, PathBuf::from("/tmp/analysis.log"));
        assert_eq!(config.logging.level, LevelFilter::Debug);
        assert_eq!(config.index.root, Some(PathBuf::from("/srv/index")));
        assert_eq!(config.index.name, "case-17");
    }

    #[test]
    fn disabled_index_clears_root() {
        let config = from_str("[index]\nroot = \"/srv\"\nenabled = false\n").unwrap();
        assert_eq!(config.index.root, None);
    }

    #[test]
    fn zero_jobs_means_one_per_cpu() {
        assert!(resolve_jobs(0) >= 1);
        assert_eq!(resolve_jobs(3), 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            from_str("[logging]\nlevel = \"loud\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            from_str("[index]\nname = \"Upper\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            from_str("[analysis]\nbogus = 1\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load(Some(Path::new("/nonexistent/diskreport.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
