//! Users plugin - lists user accounts of the target
use serde_json::Value;

use crate::error::PluginError;
use crate::plugins::plugin_trait::{ForensicPlugin, PluginOutput};
use crate::plugins::record;
use crate::target::{Capability, ForensicTarget};

pub struct UsersPlugin;

impl ForensicPlugin for UsersPlugin {
    fn name(&self) -> &str {
        "users"
    }

    fn description(&self) -> &str {
        "List user accounts"
    }

    fn capability(&self) -> Capability {
        Capability::Users
    }

    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError> {
        let records = target
            .users()?
            .into_iter()
            .map(|user| {
                record([
                    ("name", Value::from(user.name)),
                    ("uid", user.uid.map(Value::from).unwrap_or(Value::Null)),
                    ("home", user.home.map(Value::from).unwrap_or(Value::Null)),
                    ("shell", user.shell.map(Value::from).unwrap_or(Value::Null)),
                ])
            })
            .collect();

        Ok(PluginOutput::Records(records))
    }
}
