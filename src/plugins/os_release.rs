//! OS release plugin - dumps etc/os-release of Linux targets
use serde_json::Value;

use crate::error::PluginError;
use crate::plugins::plugin_trait::{ForensicPlugin, PluginOutput};
use crate::plugins::record;
use crate::target::mounted::{parse_os_release, OS_RELEASE_PATHS};
use crate::target::{Capability, ForensicTarget};

pub struct OsReleasePlugin;

impl ForensicPlugin for OsReleasePlugin {
    fn name(&self) -> &str {
        "os_release"
    }

    fn description(&self) -> &str {
        "Key/value pairs of etc/os-release"
    }

    fn capability(&self) -> Capability {
        Capability::Linux
    }

    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError> {
        let bytes = OS_RELEASE_PATHS
            .iter()
            .find_map(|path| target.read_file(path).ok())
            .ok_or_else(|| PluginError::NotFound("no os-release file".to_string()))?;

        let records = parse_os_release(&String::from_utf8_lossy(&bytes))
            .into_iter()
            .map(|(key, value)| record([("key", Value::from(key)), ("value", Value::from(value))]))
            .collect();

        Ok(PluginOutput::Records(records))
    }
}
