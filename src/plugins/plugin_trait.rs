//! Plugin system trait for disk image analysis
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::PluginError;
use crate::target::{Capability, ForensicTarget, TargetCapabilities};

/// One row of structured plugin output.
pub type Record = BTreeMap<String, serde_json::Value>;

/// Declared kind of a plugin's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Record,
    Text,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputKind::Record => write!(f, "record"),
            OutputKind::Text => write!(f, "text"),
        }
    }
}

/// Output from plugins
pub enum PluginOutput {
    Records(Vec<Record>),
    Text(String),
}

impl PluginOutput {
    pub fn kind(&self) -> OutputKind {
        match self {
            PluginOutput::Records(_) => OutputKind::Record,
            PluginOutput::Text(_) => OutputKind::Text,
        }
    }
}

/// Trait that all forensic plugins must implement
pub trait ForensicPlugin: Send + Sync {
    /// Get the name of the plugin
    fn name(&self) -> &str;

    /// Get a description of what the plugin does
    fn description(&self) -> &str;

    /// Capability the plugin is registered under
    fn capability(&self) -> Capability;

    /// Whether the plugin applies to a target with these capabilities
    fn supports(&self, capabilities: &TargetCapabilities) -> bool {
        capabilities.contains(self.capability())
    }

    /// Run the plugin against a target
    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError>;
}
