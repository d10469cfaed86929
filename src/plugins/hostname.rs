//! Hostname plugin - prints the target hostname as plain text
use crate::error::PluginError;
use crate::plugins::plugin_trait::{ForensicPlugin, PluginOutput};
use crate::target::{Capability, ForensicTarget};

pub struct HostnamePlugin;

impl ForensicPlugin for HostnamePlugin {
    fn name(&self) -> &str {
        "hostname"
    }

    fn description(&self) -> &str {
        "Print the hostname (text output)"
    }

    fn capability(&self) -> Capability {
        Capability::Os
    }

    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError> {
        Ok(PluginOutput::Text(format!("hostname: {}", target.hostname()?)))
    }
}
