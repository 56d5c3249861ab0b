//! Suite runner: load a directory of experiment definitions and drive each
//! one through the full lifecycle.
//!
//! Definitions are JSON files (`*.json`) holding one
//! [`ExperimentDefinition`] each, loaded in file-name order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chaos_state::ExperimentResult;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{Experiment, ExperimentDefinition, ExperimentStatus, RegistryError};
use crate::registry::ExperimentRegistry;

/// Errors produced while loading or running a suite.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid definition in {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: RegistryError,
    },

    #[error("no experiment definitions found in {0}")]
    Empty(PathBuf),

    #[error("no experiment named {0}")]
    UnknownExperiment(String),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result type for suite operations.
pub type SuiteResult<T> = std::result::Result<T, SuiteError>;

/// One definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteEntry {
    pub source: PathBuf,
    pub definition: ExperimentDefinition,
}

impl SuiteEntry {
    /// The definition's name, falling back to the file stem.
    pub fn name(&self) -> String {
        self.definition.name.clone().unwrap_or_else(|| {
            self.source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// Load every `*.json` definition in `dir`, sorted by file name.
///
/// With `continue_on_error`, unreadable or invalid files are logged and
/// skipped; otherwise the first one aborts the load.
pub fn load_definitions(dir: &Path, continue_on_error: bool) -> SuiteResult<Vec<SuiteEntry>> {
    let read_dir = std::fs::read_dir(dir).map_err(|source| SuiteError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| SuiteError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut entries = Vec::new();
    for path in paths {
        match load_definition(&path) {
            Ok(entry) => entries.push(entry),
            Err(e) if continue_on_error => {
                warn!(path = %path.display(), error = %e, "skipping experiment definition");
            }
            Err(e) => return Err(e),
        }
    }

    if entries.is_empty() {
        return Err(SuiteError::Empty(dir.to_path_buf()));
    }
    Ok(entries)
}

fn load_definition(path: &Path) -> SuiteResult<SuiteEntry> {
    let content = std::fs::read_to_string(path).map_err(|source| SuiteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let definition: ExperimentDefinition =
        serde_json::from_str(&content).map_err(|source| SuiteError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    definition.validate().map_err(|source| SuiteError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SuiteEntry {
        source: path.to_path_buf(),
        definition,
    })
}

/// How a suite is driven.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteOptions {
    /// Run all experiments at once instead of one after another.
    pub parallel: bool,
    /// Pause between sequential experiments.
    pub pause: Duration,
    /// Run only the experiment with this name.
    pub only: Option<String>,
}

/// Outcome of one experiment in a suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteRun {
    pub name: String,
    pub experiment: Experiment,
    pub result: Option<ExperimentResult>,
}

/// Everything a suite run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub generated_at: DateTime<Utc>,
    pub runs: Vec<SuiteRun>,
}

impl SuiteReport {
    /// Number of runs that ended in `status`.
    pub fn count(&self, status: ExperimentStatus) -> usize {
        self.runs
            .iter()
            .filter(|r| r.experiment.status == status)
            .count()
    }

    /// Every experiment completed.
    pub fn all_completed(&self) -> bool {
        self.runs
            .iter()
            .all(|r| r.experiment.status == ExperimentStatus::Completed)
    }
}

/// Drive `entries` through create → scheduled → start → terminal.
pub async fn run_suite(
    registry: &ExperimentRegistry,
    entries: &[SuiteEntry],
    options: &SuiteOptions,
) -> SuiteResult<SuiteReport> {
    let selected: Vec<&SuiteEntry> = match &options.only {
        Some(only) => {
            let matching: Vec<&SuiteEntry> = entries.iter().filter(|e| e.name() == *only).collect();
            if matching.is_empty() {
                return Err(SuiteError::UnknownExperiment(only.clone()));
            }
            matching
        }
        None => entries.iter().collect(),
    };

    info!(experiments = selected.len(), parallel = options.parallel, "running chaos suite");

    let runs = if options.parallel {
        join_all(selected.iter().map(|entry| run_entry(registry, entry)))
            .await
            .into_iter()
            .collect::<SuiteResult<Vec<_>>>()?
    } else {
        let mut runs = Vec::with_capacity(selected.len());
        for (i, entry) in selected.iter().enumerate() {
            if i > 0 && !options.pause.is_zero() {
                tokio::time::sleep(options.pause).await;
            }
            runs.push(run_entry(registry, entry).await?);
        }
        runs
    };

    Ok(SuiteReport {
        generated_at: Utc::now(),
        runs,
    })
}

async fn run_entry(registry: &ExperimentRegistry, entry: &SuiteEntry) -> SuiteResult<SuiteRun> {
    let name = entry.name();
    let created = registry.create(entry.definition.clone()).await?;
    let id = created.id;

    let admitted = registry
        .wait_for(id, |s| s != ExperimentStatus::Pending)
        .await?;
    if admitted.status == ExperimentStatus::Scheduled {
        match registry.start(id).await {
            Ok(_) => {}
            // Stopped or failed by someone else in between; report as-is.
            Err(RegistryError::InvalidTransition { current, .. }) if current.is_terminal() => {}
            Err(e) => return Err(e.into()),
        }
    }

    let experiment = registry.wait_for_terminal(id).await?;
    let result = match experiment.result_id {
        Some(result_id) => Some(registry.get_result(result_id).await?),
        None => None,
    };

    info!(experiment = %name, experiment_id = %id, status = %experiment.status, "suite experiment finished");
    Ok(SuiteRun {
        name,
        experiment,
        result,
    })
}
