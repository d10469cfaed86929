//! Walkfs plugin - enumerates every filesystem entry of the first volume
//!
//! This is the most expensive built-in plugin: its cost grows with the number
//! of entries on the volume.
use serde_json::Value;

use crate::error::PluginError;
use crate::plugins::plugin_trait::{ForensicPlugin, PluginOutput};
use crate::plugins::record;
use crate::target::{Capability, ForensicTarget};

pub struct WalkFsPlugin;

impl ForensicPlugin for WalkFsPlugin {
    fn name(&self) -> &str {
        "walkfs"
    }

    fn description(&self) -> &str {
        "Walk all entries of the first volume"
    }

    fn capability(&self) -> Capability {
        Capability::Filesystem
    }

    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError> {
        let volumes = target.volumes()?;
        let volume = volumes
            .first()
            .ok_or_else(|| PluginError::NotFound("target has no volumes".to_string()))?;

        let mut records = Vec::new();
        for entry in target.entries(volume)? {
            let entry = entry?;
            records.push(record([
                ("path", Value::from(entry.path)),
                ("size", Value::from(entry.size)),
                ("kind", Value::from(if entry.is_dir { "dir" } else { "file" })),
            ]));
        }

        Ok(PluginOutput::Records(records))
    }
}
