use crate::error::Result;
use crate::features::RequestFeatureExtractor;
use crate::mapping::MappingTable;
use crate::record::FeatureRecord;
use crate::scheduler::{BoundedScheduler, OutcomeCallback, ScheduleSummary, TaskLauncher, TaskOutcome};
use pagegraph_core::PageGraph;
use pagegraph_core::query;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const GRAPH_EXTENSION: &str = "graphml";
pub const ARTIFACT_EXTENSION: &str = "json";
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Settings for one extraction run, built once from the command line.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub graph_dir: PathBuf,
    pub feature_dir: PathBuf,
    pub mapping_path: PathBuf,
    pub modified: bool,
    pub jobs: usize,
    pub timeout: Duration,
    pub tick: Duration,
}

impl ExtractionConfig {
    pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

    pub fn new(
        graph_dir: impl Into<PathBuf>,
        feature_dir: impl Into<PathBuf>,
        mapping_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            graph_dir: graph_dir.into(),
            feature_dir: feature_dir.into(),
            mapping_path: mapping_path.into(),
            modified: false,
            jobs: 1,
            timeout: Duration::from_secs(60),
            tick: Self::DEFAULT_TICK,
        }
    }

    pub fn with_modified(mut self, modified: bool) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn artifact_path(&self, graph_path: &Path) -> PathBuf {
        artifact_path(&self.feature_dir, graph_path)
    }
}

/// `<output_dir>/<stem>.json` for a graph file.
pub fn artifact_path(output_dir: &Path, graph_path: &Path) -> PathBuf {
    let mut name = graph_path
        .file_stem()
        .unwrap_or(graph_path.as_os_str())
        .to_os_string();
    name.push(".");
    name.push(ARTIFACT_EXTENSION);
    output_dir.join(name)
}

fn partial_path(output_dir: &Path, graph_path: &Path) -> PathBuf {
    let mut path = artifact_path(output_dir, graph_path).into_os_string();
    path.push(PARTIAL_SUFFIX);
    PathBuf::from(path)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Graph files under `<root_dir>/<site>/` that still need extracting: non-empty
/// and without an artifact in `output_dir`.
pub fn discover(root_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pending = Vec::new();
    for site_dir in sorted_entries(root_dir)? {
        if !site_dir.is_dir() {
            continue;
        }
        for path in sorted_entries(&site_dir)? {
            if path.extension().and_then(|e| e.to_str()) != Some(GRAPH_EXTENSION) {
                continue;
            }
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            if !metadata.is_file() || metadata.len() == 0 {
                debug!("Skipping empty graph {}", path.display());
                continue;
            }
            if artifact_path(output_dir, &path).exists() {
                continue;
            }
            pending.push(path);
        }
    }
    Ok(pending)
}

/// Writes the artifact for `graph_path`. The content lands in a `.partial`
/// sibling first and is renamed into place, so a killed task leaves no
/// artifact behind.
pub fn write_artifact<T: Serialize + ?Sized>(
    output_dir: &Path,
    graph_path: &Path,
    content: &T,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let partial = partial_path(output_dir, graph_path);
    let artifact = artifact_path(output_dir, graph_path);
    fs::write(&partial, serde_json::to_string_pretty(content)?)?;
    fs::rename(&partial, &artifact)?;
    Ok(artifact)
}

/// Removes a leftover `.partial` file of an interrupted task.
pub fn cleanup_partial(output_dir: &Path, graph_path: &Path) {
    remove_if_present(&partial_path(output_dir, graph_path));
}

/// Removes everything a timed-out task wrote, including an artifact it
/// renamed into place before it was killed.
pub fn discard_artifact(output_dir: &Path, graph_path: &Path) {
    cleanup_partial(output_dir, graph_path);
    remove_if_present(&artifact_path(output_dir, graph_path));
}

fn remove_if_present(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_file(path)
    {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Extracts the features of every request in one graph file and writes them
/// to its artifact.
pub fn run_one(config: &ExtractionConfig, mapping: &MappingTable, graph_path: &Path) -> Result<PathBuf> {
    debug!("Extracting features from {}", graph_path.display());

    let target_url = mapping.resolve_target_url(graph_path, config.modified);
    if target_url.is_none() {
        warn!(
            "No target URL for {}, page relative features will be null",
            graph_path.display()
        );
    }

    let pg = PageGraph::from_path(graph_path)?;
    let requests = query::requests(&pg, None);
    let extractor = RequestFeatureExtractor::new(&pg, target_url);
    let records: Vec<FeatureRecord> = extractor.extract_all(&requests);

    let artifact = write_artifact(&config.feature_dir, graph_path, &records)?;
    debug!(
        "Wrote {} feature records to {}",
        records.len(),
        artifact.display()
    );
    Ok(artifact)
}

/// Runs one task per graph file through the bounded scheduler. Timed-out
/// tasks leave no artifact.
pub async fn extract_corpus<L: TaskLauncher>(
    config: &ExtractionConfig,
    launcher: &L,
    paths: Vec<PathBuf>,
    progress: Option<OutcomeCallback>,
) -> ScheduleSummary {
    info!(
        "Extracting {} graphs with {} jobs (timeout {:?})",
        paths.len(),
        config.jobs,
        config.timeout
    );

    let feature_dir = config.feature_dir.clone();
    let callback: OutcomeCallback = Arc::new(move |outcome: &TaskOutcome| {
        if let TaskOutcome::TimedOut(path) = outcome {
            discard_artifact(&feature_dir, path);
        }
        if let Some(progress) = &progress {
            progress(outcome);
        }
    });

    let scheduler = BoundedScheduler::new(config.jobs, config.timeout)
        .with_tick(config.tick)
        .with_progress_callback(callback);
    let summary = scheduler.run(launcher, paths).await;

    info!(
        "Extraction finished: {} completed, {} failed, {} timed out",
        summary.completed.len(),
        summary.failed.len(),
        summary.timed_out.len()
    );
    summary
}
