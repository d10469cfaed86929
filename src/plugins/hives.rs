//! Registry hives plugin - lists registry hive files of Windows targets
use serde_json::Value;

use crate::error::PluginError;
use crate::plugins::plugin_trait::{ForensicPlugin, PluginOutput};
use crate::plugins::record;
use crate::target::{Capability, ForensicTarget};

pub struct RegistryHivesPlugin;

impl ForensicPlugin for RegistryHivesPlugin {
    fn name(&self) -> &str {
        "registry_hives"
    }

    fn description(&self) -> &str {
        "List registry hive files"
    }

    fn capability(&self) -> Capability {
        Capability::Registry
    }

    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError> {
        let hives = target.registry_hives()?;
        if hives.is_empty() {
            return Err(PluginError::NotFound("no registry hives on target".to_string()));
        }

        let records = hives
            .into_iter()
            .map(|(name, hive)| {
                record([
                    ("name", Value::from(name)),
                    ("path", Value::from(hive.path)),
                    ("size", Value::from(hive.size)),
                ])
            })
            .collect();

        Ok(PluginOutput::Records(records))
    }
}
