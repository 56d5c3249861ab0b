//! Suite runner tests: definitions on disk, driven by the timed executor.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chaos_core::{
    load_definitions, render_suite_report_md, run_suite, ExperimentRegistry, ExperimentStatus,
    SuiteError, SuiteOptions, TimedExecutor,
};

fn write(dir: &Path, file: &str, content: &str) {
    std::fs::write(dir.join(file), content).expect("write definition");
}

fn sample_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "01_cpu.json",
        r#"{"name": "cpu-burn", "type": "cpu-stress", "parameters": {"cores": 2}, "duration_ms": 30000}"#,
    );
    write(
        dir.path(),
        "02_latency.json",
        r#"{"type": "network-latency", "parameters": {"delay_ms": 200}, "duration_ms": 10000}"#,
    );
    write(
        dir.path(),
        "03_pod.json",
        r#"{"type": "pod-failure", "parameters": {"fail_with": "no pods matched selector"}}"#,
    );
    write(dir.path(), "notes.txt", "not a definition");
    dir
}

fn registry() -> ExperimentRegistry {
    ExperimentRegistry::builder(Arc::new(TimedExecutor::new(Duration::from_secs(5)))).build()
}

#[test]
fn test_load_definitions_sorted_by_file_name() {
    let dir = sample_dir();
    let entries = load_definitions(dir.path(), false).expect("load");
    let names: Vec<String> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["cpu-burn", "02_latency", "03_pod"]);
    assert_eq!(entries[1].definition.kind, "network-latency");
}

#[test]
fn test_invalid_definition_aborts_or_is_skipped() {
    let dir = sample_dir();
    write(dir.path(), "00_broken.json", "{ not json");
    write(dir.path(), "04_untyped.json", r#"{"parameters": {}}"#);

    let err = load_definitions(dir.path(), false).unwrap_err();
    assert!(matches!(err, SuiteError::Parse { .. }));

    let entries = load_definitions(dir.path(), true).expect("load with skips");
    assert_eq!(entries.len(), 3);
}

#[test]
fn test_empty_directory_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(matches!(
        load_definitions(dir.path(), false),
        Err(SuiteError::Empty(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_sequential_suite_reports_every_experiment() {
    let dir = sample_dir();
    let entries = load_definitions(dir.path(), false).expect("load");
    let registry = registry();

    let options = SuiteOptions {
        pause: Duration::from_secs(2),
        ..SuiteOptions::default()
    };
    let report = run_suite(&registry, &entries, &options).await.expect("suite");

    assert_eq!(report.runs.len(), 3);
    assert_eq!(report.count(ExperimentStatus::Completed), 2);
    assert_eq!(report.count(ExperimentStatus::Failed), 1);
    assert!(!report.all_completed());

    let pod = &report.runs[2];
    assert_eq!(
        pod.experiment.failure_reason.as_deref(),
        Some("no pods matched selector")
    );
    assert!(report.runs.iter().all(|r| r.result.is_some()));

    let md = render_suite_report_md(&report);
    assert!(md.contains("| cpu-burn | cpu-stress | completed |"));
    assert!(md.contains("- `03_pod`: no pods matched selector"));
}

#[tokio::test(start_paused = true)]
async fn test_parallel_suite_overlaps_runs() {
    let dir = sample_dir();
    let entries = load_definitions(dir.path(), false).expect("load");
    let registry = registry();

    let before = tokio::time::Instant::now();
    let options = SuiteOptions {
        parallel: true,
        ..SuiteOptions::default()
    };
    let report = run_suite(&registry, &entries, &options).await.expect("suite");

    assert_eq!(report.runs.len(), 3);
    // Scheduling delay plus the longest window, not the sum of all windows.
    assert!(before.elapsed() < Duration::from_secs(40));
    assert_eq!(registry.list().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_only_filters_by_name() {
    let dir = sample_dir();
    let entries = load_definitions(dir.path(), false).expect("load");
    let registry = registry();

    let options = SuiteOptions {
        only: Some("cpu-burn".to_string()),
        ..SuiteOptions::default()
    };
    let report = run_suite(&registry, &entries, &options).await.expect("suite");
    assert_eq!(report.runs.len(), 1);
    assert!(report.all_completed());

    let options = SuiteOptions {
        only: Some("nope".to_string()),
        ..SuiteOptions::default()
    };
    assert!(matches!(
        run_suite(&registry, &entries, &options).await,
        Err(SuiteError::UnknownExperiment(name)) if name == "nope"
    ));
}
