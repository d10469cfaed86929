mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeOutcome, FakePlugin, FakeTarget};
use diskreport::aggregator::{AnalysisOptions, ReportAggregator};
use diskreport::observer::{AnalysisEvent, RecordingObserver};
use diskreport::plugins::PluginRegistry;
use diskreport::report::{Step, UNKNOWN};
use diskreport::target::{Capability, ForensicTarget};
use log::Level;

fn aggregator(options: AnalysisOptions) -> (ReportAggregator, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    (ReportAggregator::new(options, observer.clone()), observer)
}

#[test]
fn reports_follow_input_order() {
    let (aggregator, _) = aggregator(AnalysisOptions::default());
    let targets: Vec<Arc<dyn ForensicTarget>> = ["a.dd", "b.dd", "c.dd"]
        .iter()
        .map(|id| FakeTarget::new(id).arc())
        .collect();

    let reports = aggregator.analyze_targets(&targets);
    let ids: Vec<&str> = reports.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["a.dd", "b.dd", "c.dd"]);
}

#[test]
fn parallel_workers_keep_input_order() {
    let options = AnalysisOptions {
        jobs: 4,
        ..AnalysisOptions::default()
    };
    let (aggregator, _) = aggregator(options);
    let ids: Vec<String> = (0..10).map(|i| format!("disk{}.dd", i)).collect();
    let targets: Vec<Arc<dyn ForensicTarget>> =
        ids.iter().map(|id| FakeTarget::new(id).arc()).collect();

    let reports = aggregator.analyze_targets(&targets);
    let got: Vec<String> = reports.iter().map(|r| r.identifier.clone()).collect();
    assert_eq!(got, ids);
}

#[test]
fn unopenable_identifiers_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good");
    std::fs::create_dir(&good).unwrap();
    common::linux_tree(&good);
    let corrupt = dir.path().join("corrupt.dd");
    std::fs::write(&corrupt, vec![0u8; 4096]).unwrap();

    let identifiers = vec![
        dir.path().join("missing.dd").display().to_string(),
        good.display().to_string(),
        corrupt.display().to_string(),
    ];
    let (aggregator, observer) = aggregator(AnalysisOptions::default());
    let collection = aggregator.analyze_paths(&identifiers);

    assert_eq!(collection.len(), 1);
    assert_eq!(collection.reports[0].identifier, identifiers[1]);
    assert_eq!(collection.reports[0].basic_info.hostname, "web-01");
    assert_eq!(
        collection.failed_to_open,
        vec![identifiers[0].clone(), identifiers[2].clone()]
    );
    let open_failures = observer
        .events()
        .iter()
        .filter(|e| matches!(e, AnalysisEvent::TargetOpenFailed { .. }))
        .count();
    assert_eq!(open_failures, 2);
}

#[test]
fn all_targets_failing_is_a_total_failure() {
    let (aggregator, _) = aggregator(AnalysisOptions::default());
    let collection = aggregator.analyze_paths(&["/nonexistent/a.dd".to_string()]);
    assert!(collection.is_total_failure());
    assert!(collection.is_empty());
}

#[test]
fn failing_hostname_becomes_unknown() {
    let mut target = FakeTarget::new("a.dd");
    target.hostname = None;
    let (aggregator, observer) = aggregator(AnalysisOptions::default());

    let report = aggregator.analyze_target(&target.arc());
    assert_eq!(report.basic_info.hostname, UNKNOWN);
    assert_eq!(report.basic_info.os_type, "linux");
    assert_eq!(report.basic_info.os_architecture, "x86_64");
    assert_eq!(report.basic_info.users.len(), 2);
    assert!(report.failed_steps.is_empty());
    assert!(observer.events().iter().any(|e| matches!(
        e,
        AnalysisEvent::FieldUnavailable {
            field: "hostname",
            ..
        }
    )));
}

#[test]
fn inaccessible_target_keeps_full_report_shape() {
    let mut target = FakeTarget::new("a.dd");
    target.inaccessible = true;
    let (aggregator, _) = aggregator(AnalysisOptions::default());

    let report = aggregator.analyze_target(&target.arc());
    assert_eq!(report.basic_info.hostname, UNKNOWN);
    assert_eq!(report.basic_info.os_version, UNKNOWN);
    assert_eq!(report.failed_steps[0].step, Step::BasicInfo);
    // Later steps still ran
    assert_eq!(report.partitions.len(), 2);
    assert!(report.filesystem.is_some());
}

#[test]
fn host_a_with_two_volumes() {
    let (aggregator, _) = aggregator(AnalysisOptions::default());
    let report = aggregator.analyze_target(&FakeTarget::new("a.dd").arc());

    assert_eq!(report.basic_info.hostname, "HOST-A");
    assert_eq!(report.partitions.len(), 2);
    assert_eq!(report.partitions[0].offset, 1_048_576);
    assert_eq!(report.partitions[1].filesystem, "NtfsFilesystem");
    let fs = report.filesystem.unwrap();
    assert_eq!(fs.partition_index, 0);
    assert_eq!(fs.filesystem, "ExtFilesystem");
    assert_eq!(fs.volume_serial, "ABCD-1234");
    assert_eq!(fs.file_count, 3);
}

#[test]
fn empty_volume_list_fails_filesystem_detail() {
    let mut target = FakeTarget::new("a.dd");
    target.volumes.clear();
    let (aggregator, _) = aggregator(AnalysisOptions::default());

    let report = aggregator.analyze_target(&target.arc());
    assert!(report.partitions.is_empty());
    assert!(report.filesystem.is_none());
    assert_eq!(report.failed_steps.len(), 1);
    assert_eq!(report.failed_steps[0].step, Step::FilesystemDetail);
    assert!(report.failed_steps[0].message.contains("out of range"));
}

#[test]
fn panicking_step_is_contained() {
    let mut target = FakeTarget::new("a.dd");
    target.panic_on_volumes = true;
    let (aggregator, _) = aggregator(AnalysisOptions::default());

    let report = aggregator.analyze_target(&target.arc());
    assert_eq!(report.basic_info.hostname, "HOST-A");
    assert!(report.partitions.is_empty());
    let steps: Vec<Step> = report.failed_steps.iter().map(|f| f.step).collect();
    assert_eq!(steps, vec![Step::Partitions, Step::FilesystemDetail]);
    assert!(report.failed_steps[0].message.contains("volume table exploded"));
}

#[test]
fn no_artifacts_give_empty_lists() {
    let (aggregator, _) = aggregator(AnalysisOptions::default());
    let report = aggregator.analyze_target(&FakeTarget::new("a.dd").arc());
    let artifacts = report.artifacts.unwrap();
    assert!(artifacts.registry_hives.is_empty());
    assert!(artifacts.log_files.is_empty());
}

#[test]
fn skipped_steps_are_absent() {
    let options = AnalysisOptions {
        filesystem: false,
        artifacts: false,
        ..AnalysisOptions::default()
    };
    let (aggregator, _) = aggregator(options);
    let report = aggregator.analyze_target(&FakeTarget::new("a.dd").arc());
    assert!(report.filesystem.is_none());
    assert!(report.artifacts.is_none());
    assert!(report.plugins.is_none());
}

#[test]
fn repeated_analysis_is_identical_apart_from_timestamp() {
    let options = AnalysisOptions {
        plugin_filter: Some("*".to_string()),
        ..AnalysisOptions::default()
    };
    let (aggregator, _) = aggregator(options);
    let target = FakeTarget::new("a.dd").arc();

    let first = aggregator.analyze_target(&target);
    let mut second = aggregator.analyze_target(&target);
    second.analyzed_at = first.analyzed_at;
    assert_eq!(first, second);
}

fn five_plugins() -> (PluginRegistry, Vec<Arc<FakePlugin>>) {
    let plugins = vec![
        FakePlugin::new("os_info", Capability::Os, FakeOutcome::Records(1)),
        FakePlugin::new("linux_users", Capability::Linux, FakeOutcome::Records(2)),
        FakePlugin::new("accounts", Capability::Users, FakeOutcome::Records(3)),
        FakePlugin::new("hives", Capability::Registry, FakeOutcome::Records(1)),
        FakePlugin::new("evtx", Capability::Windows, FakeOutcome::Records(1)),
    ];
    let mut registry = PluginRegistry::new();
    for plugin in &plugins {
        registry.register(plugin.clone());
    }
    (registry, plugins)
}

#[test]
fn star_filter_runs_only_supported_plugins() {
    let (registry, plugins) = five_plugins();
    let options = AnalysisOptions {
        plugin_filter: Some("*".to_string()),
        ..AnalysisOptions::default()
    };
    let (aggregator, observer) = aggregator(options);
    let aggregator = aggregator.with_registry(registry);

    let report = aggregator.analyze_target(&FakeTarget::new("a.dd").arc());
    let results = report.plugins.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results["linux_users"].len(), 2);
    assert!(!results.contains_key("hives"));
    assert_eq!(observer.count_at(Level::Warn), 2);
    assert_eq!(plugins[3].runs.load(Ordering::SeqCst), 0);
}

#[test]
fn plugin_failures_and_text_output_are_left_out() {
    let mut registry = PluginRegistry::new();
    registry.register(FakePlugin::new("good", Capability::Os, FakeOutcome::Records(1)));
    registry.register(FakePlugin::new("text", Capability::Os, FakeOutcome::Text));
    registry.register(FakePlugin::new("absent", Capability::Os, FakeOutcome::NotFound));
    registry.register(FakePlugin::new("broken", Capability::Os, FakeOutcome::Fail));
    registry.register(FakePlugin::new("crash", Capability::Os, FakeOutcome::Panic));

    let options = AnalysisOptions {
        plugin_filter: Some("*".to_string()),
        ..AnalysisOptions::default()
    };
    let (aggregator, observer) = aggregator(options);
    let aggregator = aggregator.with_registry(registry);

    let report = aggregator.analyze_target(&FakeTarget::new("a.dd").arc());
    let results = report.plugins.unwrap();
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["good"]);
    assert!(report.failed_steps.is_empty());
    assert_eq!(observer.count_at(Level::Warn), 1);
    assert_eq!(observer.count_at(Level::Error), 2);
}

#[test]
fn slow_plugin_times_out() {
    let mut registry = PluginRegistry::new();
    registry.register(FakePlugin::new("slow", Capability::Os, FakeOutcome::Sleep(2000)));
    registry.register(FakePlugin::new("fast", Capability::Os, FakeOutcome::Records(1)));

    let options = AnalysisOptions {
        plugin_filter: Some("*".to_string()),
        plugin_timeout: Some(Duration::from_millis(50)),
        ..AnalysisOptions::default()
    };
    let (aggregator, observer) = aggregator(options);
    let aggregator = aggregator.with_registry(registry);

    let report = aggregator.analyze_target(&FakeTarget::new("a.dd").arc());
    let results = report.plugins.unwrap();
    assert!(results.contains_key("fast"));
    assert!(!results.contains_key("slow"));
    assert!(observer.events().iter().any(|e| matches!(
        e,
        AnalysisEvent::PluginFailed { plugin, .. } if plugin == "slow"
    )));
}

#[test]
fn unmatched_filter_yields_empty_results() {
    let options = AnalysisOptions {
        plugin_filter: Some("nothing_*".to_string()),
        ..AnalysisOptions::default()
    };
    let (aggregator, observer) = aggregator(options);
    let report = aggregator.analyze_target(&FakeTarget::new("a.dd").arc());
    assert_eq!(report.plugins, Some(Default::default()));
    assert!(observer
        .events()
        .iter()
        .any(|e| matches!(e, AnalysisEvent::PluginsUnmatched { .. })));
}

#[test]
fn cancellation_stops_new_targets() {
    let (aggregator, _) = aggregator(AnalysisOptions::default());
    aggregator.cancel();
    let targets = vec![FakeTarget::new("a.dd").arc(), FakeTarget::new("b.dd").arc()];
    assert!(aggregator.analyze_targets(&targets).is_empty());
    assert!(aggregator.cancel_handle().load(Ordering::SeqCst));
}
