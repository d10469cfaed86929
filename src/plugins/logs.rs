//! Logs plugin - lists log files of the target
use serde_json::Value;

use crate::error::PluginError;
use crate::plugins::plugin_trait::{ForensicPlugin, PluginOutput};
use crate::plugins::record;
use crate::target::{Capability, ForensicTarget};

pub struct LogsPlugin;

impl ForensicPlugin for LogsPlugin {
    fn name(&self) -> &str {
        "logs"
    }

    fn description(&self) -> &str {
        "List log files"
    }

    fn capability(&self) -> Capability {
        Capability::Logs
    }

    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError> {
        let records = target
            .logs()?
            .into_iter()
            .map(|(name, log)| {
                record([
                    ("name", Value::from(name)),
                    ("path", Value::from(log.path)),
                    ("size", Value::from(log.size)),
                ])
            })
            .collect();

        Ok(PluginOutput::Records(records))
    }
}
