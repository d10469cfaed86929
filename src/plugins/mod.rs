//! Plugin registry and executor
//!
//! Plugins are registered under the capability they need. Discovery selects
//! plugins by a glob-style name filter; execution checks each one against the
//! target's capabilities and keeps only record-shaped output.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::boundary;
use crate::error::{PluginError, StepError};
use crate::observer::{AnalysisEvent, AnalysisObserver};
use crate::target::{Capability, ForensicTarget};

pub mod hives;
pub mod hostname;
pub mod logs;
pub mod os_release;
pub mod plugin_trait;
pub mod users;
pub mod volumes;
pub mod walkfs;

pub use hives::RegistryHivesPlugin;
pub use hostname::HostnamePlugin;
pub use logs::LogsPlugin;
pub use os_release::OsReleasePlugin;
pub use users::UsersPlugin;
pub use volumes::VolumesPlugin;
pub use walkfs::WalkFsPlugin;

use plugin_trait::{ForensicPlugin, PluginOutput, Record};

/// Record results keyed by plugin name.
pub type PluginResults = BTreeMap<String, Vec<Record>>;

/// Build a record from field/value pairs.
pub fn record<const N: usize>(fields: [(&str, Value); N]) -> Record {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Compile a glob-style filter into an anchored regex.
///
/// `*` matches any run of characters, `?` a single character, and commas
/// separate alternatives (`users,os_*`).
pub fn compile_filter(filter: &str) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = filter
        .split(',')
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .map(|alt| {
            let mut pattern = String::new();
            for c in alt.chars() {
                match c {
                    '*' => pattern.push_str(".*"),
                    '?' => pattern.push('.'),
                    other => pattern.push_str(&regex::escape(&other.to_string())),
                }
            }
            pattern
        })
        .collect();

    if alternatives.is_empty() {
        // An empty filter matches nothing
        return Regex::new(r"^\b$");
    }
    Regex::new(&format!("^(?:{})$", alternatives.join("|")))
}

/// Typed plugin registry keyed by capability tag.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn ForensicPlugin>>,
    by_capability: BTreeMap<Capability, Vec<Arc<dyn ForensicPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in plugin.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(VolumesPlugin));
        registry.register(Arc::new(UsersPlugin));
        registry.register(Arc::new(OsReleasePlugin));
        registry.register(Arc::new(RegistryHivesPlugin));
        registry.register(Arc::new(LogsPlugin));
        registry.register(Arc::new(HostnamePlugin));
        registry.register(Arc::new(WalkFsPlugin));
        registry
    }

    /// Register a plugin, replacing any plugin with the same name.
    pub fn register(&mut self, plugin: Arc<dyn ForensicPlugin>) {
        let name = plugin.name().to_string();
        self.plugins.retain(|p| p.name() != name);
        for list in self.by_capability.values_mut() {
            list.retain(|p| p.name() != name);
        }

        self.by_capability
            .entry(plugin.capability())
            .or_default()
            .push(Arc::clone(&plugin));
        self.plugins.push(plugin);
    }

    /// All plugins in registration order.
    pub fn plugins(&self) -> &[Arc<dyn ForensicPlugin>] {
        &self.plugins
    }

    /// Plugins registered under one capability.
    pub fn for_capability(&self, capability: Capability) -> &[Arc<dyn ForensicPlugin>] {
        self.by_capability
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Plugins whose name matches the filter, in registration order.
    pub fn discover(&self, matcher: &Regex) -> Vec<Arc<dyn ForensicPlugin>> {
        self.plugins
            .iter()
            .filter(|p| matcher.is_match(p.name()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Run every compatible plugin matching `filter` against one target.
///
/// Unsupported and not-found outcomes are skipped with a warning, other
/// failures are reported as errors and skipped too. Only an invalid filter
/// fails the whole pass.
pub fn execute_plugins(
    target: &Arc<dyn ForensicTarget>,
    registry: &PluginRegistry,
    filter: &str,
    timeout: Option<Duration>,
    observer: &dyn AnalysisObserver,
) -> Result<PluginResults, StepError> {
    let matcher =
        compile_filter(filter).map_err(|e| StepError::InvalidFilter(format!("{}: {}", filter, e)))?;
    let identifier = target.identifier().to_string();
    let mut results = PluginResults::new();

    let discovered = registry.discover(&matcher);
    if discovered.is_empty() {
        observer.on_event(&AnalysisEvent::PluginsUnmatched {
            target: identifier,
            filter: filter.to_string(),
        });
        return Ok(results);
    }

    let capabilities = target.capabilities();
    for plugin in discovered {
        let name = plugin.name().to_string();

        if !plugin.supports(&capabilities) {
            let reason = PluginError::Unsupported(format!(
                "target lacks the {} capability",
                plugin.capability()
            ));
            observer.on_event(&AnalysisEvent::PluginSkipped {
                target: identifier.clone(),
                plugin: name,
                reason: reason.to_string(),
            });
            continue;
        }

        let worker_plugin = Arc::clone(&plugin);
        let worker_target = Arc::clone(target);
        let outcome = boundary::run_bounded(timeout, move || worker_plugin.run(&*worker_target))
            .unwrap_or_else(|interrupted| Err(interrupted.into()));

        match outcome {
            Ok(PluginOutput::Records(records)) => {
                observer.on_event(&AnalysisEvent::PluginCompleted {
                    target: identifier.clone(),
                    plugin: name.clone(),
                    records: records.len(),
                });
                results.insert(name, records);
            }
            Ok(other) => {
                observer.on_event(&AnalysisEvent::PluginOutputDiscarded {
                    target: identifier.clone(),
                    plugin: name,
                    kind: other.kind(),
                });
            }
            Err(e) if e.is_skip() => {
                observer.on_event(&AnalysisEvent::PluginSkipped {
                    target: identifier.clone(),
                    plugin: name,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                observer.on_event(&AnalysisEvent::PluginFailed {
                    target: identifier.clone(),
                    plugin: name,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_everything() {
        let re = compile_filter("*").unwrap();
        assert!(re.is_match("users"));
        assert!(re.is_match("registry_hives"));
    }

    #[test]
    fn glob_is_anchored_and_literal() {
        let re = compile_filter("os_*").unwrap();
        assert!(re.is_match("os_release"));
        assert!(!re.is_match("xos_release"));

        let re = compile_filter("log?").unwrap();
        assert!(re.is_match("logs"));
        assert!(!re.is_match("log"));

        // Regex metacharacters are taken literally
        let re = compile_filter("a.b").unwrap();
        assert!(re.is_match("a.b"));
        assert!(!re.is_match("axb"));
    }

    #[test]
    fn comma_separates_alternatives() {
        let re = compile_filter("users, walkfs").unwrap();
        assert!(re.is_match("users"));
        assert!(re.is_match("walkfs"));
        assert!(!re.is_match("logs"));
    }

    #[test]
    fn empty_filter_matches_nothing() {
        let re = compile_filter("").unwrap();
        assert!(!re.is_match("users"));
        assert!(!re.is_match(""));
    }

    #[test]
    fn builtin_registry_is_indexed_by_capability() {
        let registry = PluginRegistry::with_builtin();
        assert_eq!(registry.len(), 7);
        let names: Vec<&str> = registry
            .for_capability(Capability::Registry)
            .iter()
            .map(|p| p.name())
            .collect();
        assert_eq!(names, vec!["registry_hives"]);
        assert!(registry.for_capability(Capability::Windows).is_empty());
    }

    #[test]
    fn registering_twice_replaces() {
        let mut registry = PluginRegistry::with_builtin();
        registry.register(Arc::new(UsersPlugin));
        assert_eq!(registry.len(), 7);
        assert_eq!(registry.for_capability(Capability::Users).len(), 1);
        assert_eq!(registry.plugins().last().unwrap().name(), "users");
    }
}
