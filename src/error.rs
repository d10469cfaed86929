//! Error types for target access, extraction steps, plugins, indexing and output
use std::io;
use std::time::Duration;

/// Errors raised by a forensic target backend.
#[derive(thiserror::Error, Debug)]
pub enum TargetError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The requested artefact does not exist on this target.
    #[error("not found: {0}")]
    NotFound(String),
    /// The backend cannot provide this information for this kind of target.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The image is not a recognisable disk image.
    #[error("corrupt image: {0}")]
    Corrupt(String),
}

/// Failure of a single extraction step.
#[derive(thiserror::Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("partition index {index} out of range ({count} volumes)")]
    OutOfRange { index: usize, count: usize },
    #[error("invalid plugin filter {0:?}")]
    InvalidFilter(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("aborted: {0}")]
    Aborted(String),
}

/// Failure of a single plugin invocation.
#[derive(thiserror::Error, Debug)]
pub enum PluginError {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("plugin failed: {0}")]
    Failed(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("aborted: {0}")]
    Aborted(String),
}

impl PluginError {
    /// Unsupported and not-found outcomes are expected when filtering across
    /// heterogeneous targets and are skipped with a warning.
    pub fn is_skip(&self) -> bool {
        matches!(self, PluginError::Unsupported(_) | PluginError::NotFound(_))
    }
}

impl From<TargetError> for PluginError {
    fn from(error: TargetError) -> Self {
        match error {
            TargetError::Unsupported(msg) => PluginError::Unsupported(msg),
            TargetError::NotFound(msg) => PluginError::NotFound(msg),
            other => PluginError::Failed(other.to_string()),
        }
    }
}

/// Errors raised by a document index.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error("invalid index name {0:?}")]
    InvalidName(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("index {0:?} is not available")]
    Unavailable(String),
}

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while rendering or writing reports.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV into_inner error: {0}")]
    CsvIntoInner(#[from] csv::IntoInnerError<csv::Writer<Vec<u8>>>),
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
