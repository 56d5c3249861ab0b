use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::domain::ExperimentStatus;
use crate::suite::{SuiteReport, SuiteRun};

/// Render the markdown report for a finished suite.
pub fn render_suite_report_md(report: &SuiteReport) -> String {
    let mut out = String::new();
    out.push_str("# Chaos Suite Report\n\n");
    out.push_str(&format!(
        "Generated: {}\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    out.push_str("## Summary\n");
    out.push_str(&format!(
        "- experiments: {}\n- completed: {}\n- stopped: {}\n- failed: {}\n\n",
        report.runs.len(),
        report.count(ExperimentStatus::Completed),
        report.count(ExperimentStatus::Stopped),
        report.count(ExperimentStatus::Failed)
    ));

    out.push_str("## Experiments\n\n");
    out.push_str("| Name | Type | Status | Duration | Error rate | Latency (ms) | Availability |\n");
    out.push_str("|------|------|--------|----------|------------|--------------|--------------|\n");
    for run in &report.runs {
        out.push_str(&render_row(run));
    }

    let failures: Vec<&SuiteRun> = report
        .runs
        .iter()
        .filter(|r| r.experiment.failure_reason.is_some())
        .collect();
    if !failures.is_empty() {
        out.push_str("\n## Failures\n");
        for run in failures {
            out.push_str(&format!(
                "- `{}`: {}\n",
                run.name,
                run.experiment.failure_reason.as_deref().unwrap_or_default()
            ));
        }
    }
    out
}

fn render_row(run: &SuiteRun) -> String {
    let duration = run
        .experiment
        .duration()
        .map(|d| format!("{:.1}s", d.as_secs_f64()))
        .unwrap_or_else(|| "-".to_string());
    let metrics = run.result.as_ref().and_then(|r| r.metrics);
    let (error_rate, latency, availability) = match metrics {
        Some(m) => (
            format!("{:.2}%", m.error_rate),
            format!("{:.0}", m.latency_ms),
            format!("{:.2}%", m.availability),
        ),
        None => ("-".to_string(), "-".to_string(), "-".to_string()),
    };
    format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n",
        run.name,
        run.experiment.kind(),
        run.experiment.status,
        duration,
        error_rate,
        latency,
        availability
    )
}

/// Write `chaos_report_<timestamp>.md` into `dir`, creating it if needed.
/// Returns the written path.
pub fn write_suite_report_md(dir: &Path, report: &SuiteReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let path = dir.join(format!(
        "chaos_report_{}.md",
        report.generated_at.format("%Y%m%d_%H%M%S")
    ));
    let md = render_suite_report_md(report);
    std::fs::write(&path, md).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

/// Write the suite report as pretty JSON.
pub fn write_suite_report_json(path: &Path, report: &SuiteReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize suite report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
