//! Report aggregation across targets
//!
//! For each opened target the aggregator runs basic-info, partitions, and the
//! optional filesystem, artifacts and plugin stages. Every stage sits behind
//! its own failure boundary: a failing stage contributes its default section
//! and the next stage runs regardless. A report is always produced for every
//! opened target.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;

use crate::boundary;
use crate::error::StepError;
use crate::extract::{self, ArtifactFacts, FieldFailure};
use crate::observer::{AnalysisEvent, AnalysisObserver};
use crate::plugins::{self, PluginRegistry, PluginResults};
use crate::report::{FailedStep, Report, Sections, Step};
use crate::target::{self, ForensicTarget};

/// What to run for each target.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Volume used for the filesystem-detail step.
    pub partition_index: usize,
    pub filesystem: bool,
    pub artifacts: bool,
    /// Plugin name filter; `None` disables the plugin pass.
    pub plugin_filter: Option<String>,
    pub step_timeout: Option<Duration>,
    pub plugin_timeout: Option<Duration>,
    /// Number of targets analysed concurrently.
    pub jobs: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            partition_index: 0,
            filesystem: true,
            artifacts: true,
            plugin_filter: None,
            step_timeout: None,
            plugin_timeout: None,
            jobs: 1,
        }
    }
}

/// Reports of one batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct ReportCollection {
    pub reports: Vec<Report>,
    /// Identifiers that could not be opened.
    pub failed_to_open: Vec<String>,
}

impl ReportCollection {
    /// True when no target could be analysed at all.
    pub fn is_total_failure(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

pub struct ReportAggregator {
    options: AnalysisOptions,
    registry: Arc<PluginRegistry>,
    observer: Arc<dyn AnalysisObserver>,
    cancelled: Arc<AtomicBool>,
}

impl ReportAggregator {
    /// Aggregator using the built-in plugin registry.
    pub fn new(options: AnalysisOptions, observer: Arc<dyn AnalysisObserver>) -> Self {
        ReportAggregator {
            options,
            registry: Arc::new(PluginRegistry::with_builtin()),
            observer,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Flag that stops new targets from being started once set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Open every identifier and analyse the ones that opened.
    pub fn analyze_paths(&self, identifiers: &[String]) -> ReportCollection {
        let (targets, failed_to_open) = target::open_all(identifiers, self.observer.as_ref());
        ReportCollection {
            reports: self.analyze_targets(&targets),
            failed_to_open,
        }
    }

    /// Analyse already opened targets, keeping their order.
    pub fn analyze_targets(&self, targets: &[Arc<dyn ForensicTarget>]) -> Vec<Report> {
        let jobs = self.options.jobs.clamp(1, targets.len().max(1));

        if jobs == 1 {
            let mut reports = Vec::with_capacity(targets.len());
            for target in targets {
                if self.is_cancelled() {
                    break;
                }
                reports.push(self.analyze_target(target));
            }
            return reports;
        }

        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<Report>>> = Mutex::new(vec![None; targets.len()]);

        thread::scope(|scope| {
            for _ in 0..jobs {
                scope.spawn(|| loop {
                    if self.is_cancelled() {
                        break;
                    }
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(target) = targets.get(i) else {
                        break;
                    };
                    let report = self.analyze_target(target);
                    let mut slots = slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    slots[i] = Some(report);
                });
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .into_iter()
            .flatten()
            .collect()
    }

    /// Run every enabled stage against one target and assemble its report.
    pub fn analyze_target(&self, target: &Arc<dyn ForensicTarget>) -> Report {
        let identifier = target.identifier().to_string();
        let mut sections = Sections::default();

        sections.basic_info = self.run_step(
            target,
            Step::BasicInfo,
            &mut sections.failed_steps,
            extract::basic_info,
        );
        if let Some(facts) = &sections.basic_info {
            self.report_field_failures(&identifier, Step::BasicInfo, &facts.failures);
            let users = facts.users.as_ref().map(Vec::len).unwrap_or(0);
            self.completed(
                &identifier,
                Step::BasicInfo,
                format!("{} users, {} unavailable fields", users, facts.failures.len()),
            );
        }

        if let Some(volumes) = self.run_step(
            target,
            Step::Partitions,
            &mut sections.failed_steps,
            extract::partitions,
        ) {
            self.completed(
                &identifier,
                Step::Partitions,
                format!("{} partitions", volumes.len()),
            );
            sections.volumes = volumes;
        }

        if self.options.filesystem {
            let index = self.options.partition_index;
            sections.filesystem = self.run_step(
                target,
                Step::FilesystemDetail,
                &mut sections.failed_steps,
                move |t| extract::filesystem_detail(t, index),
            );
            if let Some(facts) = &sections.filesystem {
                self.completed(
                    &identifier,
                    Step::FilesystemDetail,
                    format!("{} entries on partition {}", facts.file_count, index),
                );
            }
        }

        if self.options.artifacts {
            let facts = self.run_step(
                target,
                Step::Artifacts,
                &mut sections.failed_steps,
                extract::artifacts,
            );
            sections.artifacts = Some(match facts {
                Some(facts) => {
                    self.report_field_failures(&identifier, Step::Artifacts, &facts.failures);
                    self.completed(
                        &identifier,
                        Step::Artifacts,
                        format!(
                            "{} registry hives, {} log files",
                            facts.registry_hives.as_ref().map(|s| s.len()).unwrap_or(0),
                            facts.log_files.as_ref().map(|s| s.len()).unwrap_or(0)
                        ),
                    );
                    facts
                }
                None => ArtifactFacts::default(),
            });
        }

        if let Some(filter) = &self.options.plugin_filter {
            let results = match plugins::execute_plugins(
                target,
                &self.registry,
                filter,
                self.options.plugin_timeout,
                self.observer.as_ref(),
            ) {
                Ok(results) => {
                    self.completed(
                        &identifier,
                        Step::Plugins,
                        format!("{} plugin results", results.len()),
                    );
                    results
                }
                Err(e) => {
                    self.fail(&identifier, Step::Plugins, &mut sections.failed_steps, e);
                    PluginResults::new()
                }
            };
            sections.plugins = Some(results);
        }

        let report = Report::assemble(&identifier, sections, Utc::now());
        self.observer.on_event(&AnalysisEvent::ReportAssembled {
            target: identifier,
            failed_steps: report.failed_steps.len(),
        });
        report
    }

    /// Run one step behind the failure boundary.
    fn run_step<T, F>(
        &self,
        target: &Arc<dyn ForensicTarget>,
        step: Step,
        failed_steps: &mut Vec<FailedStep>,
        work: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ForensicTarget) -> Result<T, StepError> + Send + 'static,
    {
        let worker = Arc::clone(target);
        let outcome = boundary::run_bounded(self.options.step_timeout, move || work(&*worker))
            .unwrap_or_else(|interrupted| Err(interrupted.into()));

        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                self.fail(target.identifier(), step, failed_steps, e);
                None
            }
        }
    }

    fn fail(
        &self,
        identifier: &str,
        step: Step,
        failed_steps: &mut Vec<FailedStep>,
        error: StepError,
    ) {
        let message = error.to_string();
        self.observer.on_event(&AnalysisEvent::StepFailed {
            target: identifier.to_string(),
            step,
            message: message.clone(),
        });
        failed_steps.push(FailedStep { step, message });
    }

    fn completed(&self, identifier: &str, step: Step, summary: String) {
        self.observer.on_event(&AnalysisEvent::StepCompleted {
            target: identifier.to_string(),
            step,
            summary,
        });
    }

    fn report_field_failures(&self, identifier: &str, step: Step, failures: &[FieldFailure]) {
        for failure in failures {
            self.observer.on_event(&AnalysisEvent::FieldUnavailable {
                target: identifier.to_string(),
                step,
                field: failure.field,
                message: failure.error.to_string(),
            });
        }
    }
}
