//! Job creation and the worker pool.
//!
//! Jobs are created configuration-major, models in file-name order, and
//! pushed onto one shared channel followed by a `Stop` per worker. Workers
//! send finished records to a second channel that is drained after all of
//! them have joined, so the per-configuration trace files are assembled on
//! one thread and come out sorted by model key whatever the completion
//! order was.

use crate::configuration::Configuration;
use crate::job::{Job, SolutionHints};
use crate::report::{Progress, Reporter};
use crate::result::SolveResult;
use crate::runner::Runner;
use anyhow::{anyhow, Context, Result};
use bench_trace::{TraceRecord, TraceStore, TRACE_FILE_NAME};
use crossbeam_channel::{Receiver, Sender};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

enum Dispatch {
    Job(Box<Job>),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Executed,
    Skipped,
    Failed,
}

struct Completed {
    configuration: String,
    record: TraceRecord,
    outcome: Outcome,
}

/// Counters of a finished run plus the trace files it wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub trace_files: Vec<PathBuf>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.executed + self.skipped + self.failed
    }
}

pub struct Scheduler {
    runner: Box<dyn Runner>,
    result_path: PathBuf,
    configurations: Vec<Configuration>,
    reporter: Reporter,
    jobs: Vec<Job>,
    start: Instant,
}

impl Scheduler {
    /// The total-time budget of [`Scheduler::run`] counts from here.
    pub fn new(
        runner: Box<dyn Runner>,
        result_path: &Path,
        configurations: Vec<Configuration>,
        reporter: Reporter,
    ) -> Self {
        Self {
            runner,
            result_path: result_path.to_path_buf(),
            configurations,
            reporter,
            jobs: Vec::new(),
            start: Instant::now(),
        }
    }

    pub fn runner(&self) -> &dyn Runner {
        self.runner.as_ref()
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn num_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Model files in `model_path` (not recursive) with the runner's
    /// extension, sorted by file name. Symlinked models count.
    fn model_files(&self, model_path: &Path) -> Result<Vec<PathBuf>> {
        let extension = self.runner.model_extension();
        let mut models = Vec::new();
        for entry in walkdir::WalkDir::new(model_path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry
                .with_context(|| format!("failed to list models in {}", model_path.display()))?;
            let matches = entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some(extension);
            if matches {
                models.push(entry.into_path());
            }
        }
        Ok(models)
    }

    /// Builds the job list: every configuration against every model file,
    /// stopping once `max_jobs` jobs exist. Jobs whose model appears in
    /// `reference_file` carry its solution as hints. Returns the job count.
    pub fn create(
        &mut self,
        model_path: &Path,
        max_jobs: Option<usize>,
        max_time: u64,
        kill_time: u64,
        reference_file: Option<&Path>,
    ) -> Result<usize> {
        let models = self.model_files(model_path)?;
        let mut references = TraceStore::new();
        if let Some(path) = reference_file {
            references
                .load_reference_solutions(path)
                .with_context(|| format!("failed to load reference solutions {}", path.display()))?;
        }
        let max_jobs = max_jobs.unwrap_or(usize::MAX);

        let mut jobs = Vec::new();
        'configurations: for configuration in &self.configurations {
            let conf_dir = self.result_path.join(configuration.name());
            for model in &models {
                if jobs.len() >= max_jobs {
                    break 'configurations;
                }
                let name = model
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .ok_or_else(|| anyhow!("model path has no file name: {}", model.display()))?;
                let mut job = Job::new(
                    name.as_str(),
                    &conf_dir.join(&name),
                    model,
                    configuration.clone(),
                    max_time,
                    kill_time,
                )?;
                if let Some(reference) = references.get(&name) {
                    job.hints = SolutionHints::from_record(reference);
                }
                jobs.push(job);
            }
        }
        tracing::info!(
            jobs = jobs.len(),
            models = models.len(),
            configurations = self.configurations.len(),
            "jobs created"
        );
        self.jobs = jobs;
        Ok(self.jobs.len())
    }

    fn within_budget(&self, max_total: Option<Duration>) -> bool {
        match max_total {
            None => true,
            Some(max) => !max.is_zero() && self.start.elapsed() <= max,
        }
    }

    /// Runs one job, or takes the skip path when its directory already holds
    /// a finished trace or the budget is spent.
    fn resolve(&self, job: &Job, max_total: Option<Duration>) -> (SolveResult, Outcome) {
        let fresh = match job.init_workdir() {
            Ok(fresh) => fresh,
            Err(err) => {
                tracing::warn!(job = %job.name, error = %format!("{:#}", err), "job setup failed");
                return (SolveResult::quiet(job.fallback_record()), Outcome::Failed);
            }
        };
        if !fresh {
            tracing::debug!(job = %job.name, "already completed");
            return (SolveResult::quiet(job.recorded_result()), Outcome::Skipped);
        }
        if !self.within_budget(max_total) {
            tracing::debug!(job = %job.name, "total time budget exhausted");
            return (SolveResult::quiet(job.recorded_result()), Outcome::Skipped);
        }

        tracing::debug!(job = %job.name, command = ?self.runner.command(job), "running job");
        match self.runner.run(job) {
            Ok(result) => (result, Outcome::Executed),
            Err(err) => {
                tracing::warn!(job = %job.name, error = %format!("{:#}", err), "job failed");
                (SolveResult::quiet(job.fallback_record()), Outcome::Failed)
            }
        }
    }

    fn work(
        &self,
        worker: usize,
        queue: Receiver<Dispatch>,
        done: Sender<Completed>,
        pending: &AtomicUsize,
        max_total: Option<Duration>,
    ) {
        while let Ok(Dispatch::Job(job)) = queue.recv() {
            let jobs_left = pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            let (result, outcome) = self.resolve(&job, max_total);
            let progress = Progress {
                elapsed: self.start.elapsed(),
                jobs_left,
                worker,
            };
            self.reporter.print(&job, &result, &progress);
            let completed = Completed {
                configuration: job.configuration.name(),
                record: result.into_record(),
                outcome,
            };
            if done.send(completed).is_err() {
                tracing::warn!(worker, "result channel closed");
                break;
            }
        }
    }

    /// Runs every job on `num_workers` threads and writes one trace file per
    /// configuration to `<result>/<configuration>/trace.trc`. Once
    /// `max_total` has passed since [`Scheduler::new`], remaining jobs take
    /// the skip path; running engines are left to their own deadline.
    pub fn run(&self, num_workers: usize, max_total: Option<Duration>) -> Result<RunSummary> {
        let num_workers = num_workers.max(1);
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        for job in &self.jobs {
            queue_tx
                .send(Dispatch::Job(Box::new(job.clone())))
                .map_err(|_| anyhow!("job queue closed"))?;
        }
        for _ in 0..num_workers {
            queue_tx
                .send(Dispatch::Stop)
                .map_err(|_| anyhow!("job queue closed"))?;
        }
        drop(queue_tx);

        tracing::info!(
            jobs = self.jobs.len(),
            workers = num_workers,
            runner = self.runner.name(),
            "run started"
        );
        let pending = AtomicUsize::new(self.jobs.len());
        thread::scope(|scope| {
            for worker in 0..num_workers {
                let queue = queue_rx.clone();
                let done = done_tx.clone();
                let pending = &pending;
                scope.spawn(move || self.work(worker, queue, done, pending, max_total));
            }
        });
        drop(done_tx);

        let mut stores: BTreeMap<String, TraceStore> = self
            .configurations
            .iter()
            .map(|conf| (conf.name(), TraceStore::new()))
            .collect();
        let mut summary = RunSummary::default();
        for completed in done_rx.try_iter() {
            match completed.outcome {
                Outcome::Executed => summary.executed += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed => summary.failed += 1,
            }
            let store = stores.entry(completed.configuration).or_default();
            if store.merge(completed.record).is_err() {
                tracing::warn!("dropping record without key");
            }
        }

        for (name, store) in &stores {
            if store.is_empty() {
                continue;
            }
            let path = self.result_path.join(name).join(TRACE_FILE_NAME);
            store
                .write(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), records = store.len(), "trace written");
            summary.trace_files.push(path);
        }
        tracing::info!(
            executed = summary.executed,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_secs = self.start.elapsed().as_secs_f64(),
            "run finished"
        );
        Ok(summary)
    }
}
