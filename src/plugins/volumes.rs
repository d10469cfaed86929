//! Volumes plugin - partition table entries with boot sector identity
use serde_json::Value;

use crate::error::PluginError;
use crate::plugins::plugin_trait::{ForensicPlugin, PluginOutput};
use crate::plugins::record;
use crate::target::{Capability, ForensicTarget};

pub struct VolumesPlugin;

impl ForensicPlugin for VolumesPlugin {
    fn name(&self) -> &str {
        "volumes"
    }

    fn description(&self) -> &str {
        "Partition table entries with filesystem identity"
    }

    fn capability(&self) -> Capability {
        Capability::PartitionTable
    }

    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError> {
        let records = target
            .volumes()?
            .into_iter()
            .map(|volume| {
                let (fs_name, serial) = match volume.filesystem {
                    Some(fs) => (Value::from(fs.name), fs.serial.map(Value::from)),
                    None => (Value::Null, None),
                };
                record([
                    ("index", Value::from(volume.index)),
                    ("offset", Value::from(volume.offset)),
                    ("size", Value::from(volume.size)),
                    ("type", Value::from(volume.kind)),
                    ("filesystem", fs_name),
                    ("serial", serial.unwrap_or(Value::Null)),
                ])
            })
            .collect();

        Ok(PluginOutput::Records(records))
    }
}
