use crate::error::{ExtractError, Result};
use futures::FutureExt;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub type OutcomeCallback = Arc<dyn Fn(&TaskOutcome) + Send + Sync>;

/// How a finished task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(PathBuf),
    Failed { path: PathBuf, reason: String },
    TimedOut(PathBuf),
}

impl TaskOutcome {
    pub fn path(&self) -> &Path {
        match self {
            TaskOutcome::Completed(path)
            | TaskOutcome::Failed { path, .. }
            | TaskOutcome::TimedOut(path) => path,
        }
    }
}

/// A running task the scheduler can poll and kill.
pub trait TaskHandle {
    /// Non-blocking: `None` while the task is still running.
    fn poll_exit(&mut self) -> Option<TaskExit>;

    /// Kills the task and resolves once it has stopped running.
    fn terminate(&mut self) -> impl Future<Output = ()> + Send;
}

/// Starts one isolated task per input path.
pub trait TaskLauncher {
    type Handle: TaskHandle;

    fn launch(&self, path: &Path) -> Result<Self::Handle>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub completed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub timed_out: Vec<PathBuf>,
    pub peak_in_flight: usize,
}

impl ScheduleSummary {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len() + self.timed_out.len()
    }

    fn record(&mut self, outcome: &TaskOutcome) {
        let path = outcome.path().to_path_buf();
        match outcome {
            TaskOutcome::Completed(_) => self.completed.push(path),
            TaskOutcome::Failed { .. } => self.failed.push(path),
            TaskOutcome::TimedOut(_) => self.timed_out.push(path),
        }
    }
}

struct RunningTask<H> {
    path: PathBuf,
    handle: H,
    started: Instant,
}

/// Runs at most `jobs` tasks at once from a FIFO queue and kills any task
/// that outlives `timeout`. Task state is polled every `tick`.
pub struct BoundedScheduler {
    jobs: usize,
    timeout: Duration,
    tick: Duration,
    progress_callback: Option<OutcomeCallback>,
}

impl BoundedScheduler {
    pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

    pub fn new(jobs: usize, timeout: Duration) -> Self {
        Self {
            jobs: jobs.max(1),
            timeout,
            tick: Self::DEFAULT_TICK,
            progress_callback: None,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_progress_callback(mut self, callback: OutcomeCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn finish(&self, summary: &mut ScheduleSummary, outcome: TaskOutcome) {
        summary.record(&outcome);
        if let Some(ref callback) = self.progress_callback {
            callback(&outcome);
        }
    }

    pub async fn run<L: TaskLauncher>(
        &self,
        launcher: &L,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> ScheduleSummary {
        let mut queue: VecDeque<PathBuf> = paths.into_iter().collect();
        let mut in_flight: Vec<RunningTask<L::Handle>> = Vec::with_capacity(self.jobs);
        let mut summary = ScheduleSummary::default();

        info!(
            "Scheduling {} tasks on {} slots (timeout {:?})",
            queue.len(),
            self.jobs,
            self.timeout
        );

        loop {
            while in_flight.len() < self.jobs {
                let Some(path) = queue.pop_front() else {
                    break;
                };
                match launcher.launch(&path) {
                    Ok(handle) => {
                        debug!("Started task for {}", path.display());
                        in_flight.push(RunningTask {
                            path,
                            handle,
                            started: Instant::now(),
                        });
                    }
                    Err(e) => {
                        warn!("Failed to start task for {}: {}", path.display(), e);
                        let reason = e.to_string();
                        self.finish(&mut summary, TaskOutcome::Failed { path, reason });
                    }
                }
            }
            summary.peak_in_flight = summary.peak_in_flight.max(in_flight.len());

            if in_flight.is_empty() && queue.is_empty() {
                break;
            }

            let mut finished = Vec::new();
            let mut i = 0;
            while i < in_flight.len() {
                let task = &mut in_flight[i];
                let outcome = if let Some(exit) = task.handle.poll_exit() {
                    match exit {
                        TaskExit::Success => TaskOutcome::Completed(task.path.clone()),
                        TaskExit::Failure(reason) => {
                            warn!("Task for {} failed: {}", task.path.display(), reason);
                            TaskOutcome::Failed {
                                path: task.path.clone(),
                                reason,
                            }
                        }
                    }
                } else if task.started.elapsed() > self.timeout {
                    warn!("Feature extraction timed out ({})", task.path.display());
                    // the slot stays taken until the task has really stopped
                    task.handle.terminate().await;
                    TaskOutcome::TimedOut(task.path.clone())
                } else {
                    i += 1;
                    continue;
                };
                in_flight.remove(i);
                finished.push(outcome);
            }

            let freed = !finished.is_empty();
            for outcome in finished {
                self.finish(&mut summary, outcome);
            }

            // Refill freed slots right away; otherwise wait for the next tick.
            if !(freed && !queue.is_empty()) {
                tokio::time::sleep(self.tick).await;
            }
        }

        summary
    }
}

// ============================================================================
// Process isolation
// ============================================================================

/// Runs each task as a child process: `<program> <args...> <path>`. A timed
/// out child is killed and reaped before its slot is reused.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-executes the running binary.
    pub fn current_exe(args: Vec<OsString>) -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?, args))
    }
}

pub struct ProcessHandle {
    child: Child,
}

impl TaskLauncher for ProcessLauncher {
    type Handle = ProcessHandle;

    fn launch(&self, path: &Path) -> Result<ProcessHandle> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractError::LaunchError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(ProcessHandle { child })
    }
}

impl TaskHandle for ProcessHandle {
    fn poll_exit(&mut self) -> Option<TaskExit> {
        match self.child.try_wait() {
            Ok(None) => None,
            Ok(Some(status)) if status.success() => Some(TaskExit::Success),
            Ok(Some(status)) => Some(TaskExit::Failure(format!("exited with {}", status))),
            Err(e) => Some(TaskExit::Failure(e.to_string())),
        }
    }

    async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!("Failed to kill task process: {}", e);
        }
        if let Err(e) = self.child.wait().await {
            warn!("Failed to reap task process: {}", e);
        }
    }
}

// ============================================================================
// In-process tasks
// ============================================================================

/// Runs each task as a tokio task. Termination aborts the task, which takes
/// effect at its next await point.
pub struct SpawnLauncher<F> {
    task: F,
}

impl<F> SpawnLauncher<F> {
    pub fn new(task: F) -> Self {
        Self { task }
    }
}

pub struct SpawnHandle {
    handle: JoinHandle<Result<()>>,
}

impl<F, Fut> TaskLauncher for SpawnLauncher<F>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    type Handle = SpawnHandle;

    fn launch(&self, path: &Path) -> Result<SpawnHandle> {
        Ok(SpawnHandle {
            handle: tokio::spawn((self.task)(path.to_path_buf())),
        })
    }
}

impl TaskHandle for SpawnHandle {
    fn poll_exit(&mut self) -> Option<TaskExit> {
        if !self.handle.is_finished() {
            return None;
        }
        match (&mut self.handle).now_or_never()? {
            Ok(Ok(())) => Some(TaskExit::Success),
            Ok(Err(e)) => Some(TaskExit::Failure(e.to_string())),
            Err(e) => Some(TaskExit::Failure(ExtractError::from(e).to_string())),
        }
    }

    async fn terminate(&mut self) {
        self.handle.abort();
        // resolves once the aborted task has been dropped
        let _ = (&mut self.handle).await;
    }
}
