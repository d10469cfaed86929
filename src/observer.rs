//! Analysis events and the observers that receive them
//!
//! The aggregator and the publisher never log directly. They emit
//! [`AnalysisEvent`]s to an injected [`AnalysisObserver`], and the process
//! entry point decides where those end up.
use std::fmt;
use std::sync::Mutex;

use log::Level;

use crate::plugins::plugin_trait::OutputKind;
use crate::report::Step;

/// Something that happened while analysing or publishing.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    TargetOpened {
        target: String,
    },
    TargetOpenFailed {
        target: String,
        message: String,
    },
    StepCompleted {
        target: String,
        step: Step,
        summary: String,
    },
    StepFailed {
        target: String,
        step: Step,
        message: String,
    },
    /// A single field could not be read; the step continues with a sentinel.
    FieldUnavailable {
        target: String,
        step: Step,
        field: &'static str,
        message: String,
    },
    PluginsUnmatched {
        target: String,
        filter: String,
    },
    PluginSkipped {
        target: String,
        plugin: String,
        reason: String,
    },
    PluginFailed {
        target: String,
        plugin: String,
        message: String,
    },
    PluginCompleted {
        target: String,
        plugin: String,
        records: usize,
    },
    PluginOutputDiscarded {
        target: String,
        plugin: String,
        kind: OutputKind,
    },
    ReportAssembled {
        target: String,
        failed_steps: usize,
    },
    IndexCreated {
        index: String,
    },
    DocumentIndexed {
        index: String,
        document: String,
    },
    IndexWriteFailed {
        index: String,
        document: String,
        message: String,
    },
}

impl AnalysisEvent {
    pub fn level(&self) -> Level {
        match self {
            AnalysisEvent::TargetOpenFailed { .. }
            | AnalysisEvent::StepFailed { .. }
            | AnalysisEvent::PluginFailed { .. }
            | AnalysisEvent::IndexWriteFailed { .. } => Level::Error,
            AnalysisEvent::FieldUnavailable { .. }
            | AnalysisEvent::PluginsUnmatched { .. }
            | AnalysisEvent::PluginSkipped { .. } => Level::Warn,
            AnalysisEvent::PluginOutputDiscarded { .. } => Level::Debug,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for AnalysisEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisEvent::TargetOpened { target } => write!(f, "Opened target {}", target),
            AnalysisEvent::TargetOpenFailed { target, message } => {
                write!(f, "Failed to open target {}: {}", target, message)
            }
            AnalysisEvent::StepCompleted {
                target,
                step,
                summary,
            } => write!(f, "{}: {} done, {}", target, step, summary),
            AnalysisEvent::StepFailed {
                target,
                step,
                message,
            } => write!(f, "{}: {} failed: {}", target, step, message),
            AnalysisEvent::FieldUnavailable {
                target,
                step,
                field,
                message,
            } => write!(
                f,
                "{}: {} field {} unavailable, using sentinel: {}",
                target, step, field, message
            ),
            AnalysisEvent::PluginsUnmatched { target, filter } => {
                write!(f, "{}: no plugin matches filter {:?}", target, filter)
            }
            AnalysisEvent::PluginSkipped {
                target,
                plugin,
                reason,
            } => write!(f, "{}: skipping plugin {}: {}", target, plugin, reason),
            AnalysisEvent::PluginFailed {
                target,
                plugin,
                message,
            } => write!(f, "{}: plugin {} failed: {}", target, plugin, message),
            AnalysisEvent::PluginCompleted {
                target,
                plugin,
                records,
            } => write!(f, "{}: plugin {} produced {} records", target, plugin, records),
            AnalysisEvent::PluginOutputDiscarded {
                target,
                plugin,
                kind,
            } => write!(
                f,
                "{}: discarding {} output of plugin {}",
                target, kind, plugin
            ),
            AnalysisEvent::ReportAssembled {
                target,
                failed_steps,
            } => write!(
                f,
                "{}: report assembled ({} failed steps)",
                target, failed_steps
            ),
            AnalysisEvent::IndexCreated { index } => write!(f, "Created index {}", index),
            AnalysisEvent::DocumentIndexed { index, document } => {
                write!(f, "Indexed {} into {}", document, index)
            }
            AnalysisEvent::IndexWriteFailed {
                index,
                document,
                message,
            } => write!(f, "Failed to index {} into {}: {}", document, index, message),
        }
    }
}

/// Receiver of analysis events.
pub trait AnalysisObserver: Send + Sync {
    fn on_event(&self, event: &AnalysisEvent);
}

/// Forwards every event to the `log` facade at the event's level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl AnalysisObserver for LogObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        log::log!(event.level(), "{}", event);
    }
}

/// Keeps every event in memory, mostly for tests and embedding callers.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AnalysisEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalysisEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of recorded events at exactly `level`.
    pub fn count_at(&self, level: Level) -> usize {
        self.events().iter().filter(|e| e.level() == level).count()
    }
}

impl AnalysisObserver for RecordingObserver {
    fn on_event(&self, event: &AnalysisEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
