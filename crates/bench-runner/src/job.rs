use crate::configuration::Configuration;
use anyhow::{anyhow, Context, Result};
use bench_trace::{has_complete_row, TraceRecord, TRACE_FILE_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Known solution of a model, taken from a reference solution file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionHints {
    pub model_status: Option<i64>,
    pub objective: Option<f64>,
    pub objective_estimate: Option<f64>,
}

impl SolutionHints {
    pub fn from_record(record: &TraceRecord) -> Self {
        Self {
            model_status: record.model_status,
            objective: record.objective_value,
            objective_estimate: record.objective_value_estimate,
        }
    }
}

/// One model solved under one configuration.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub workdir: PathBuf,
    pub model_file: PathBuf,
    pub configuration: Configuration,
    /// Solve time limit in seconds handed to the engine.
    pub max_time: u64,
    /// Grace period in seconds after `max_time` before the engine is killed.
    pub kill_time: u64,
    pub hints: SolutionHints,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        workdir: &Path,
        model_file: &Path,
        configuration: Configuration,
        max_time: u64,
        kill_time: u64,
    ) -> Result<Self> {
        let workdir = std::path::absolute(workdir)
            .with_context(|| format!("cannot resolve working directory {}", workdir.display()))?;
        Ok(Self {
            name: name.into(),
            workdir,
            model_file: model_file.to_path_buf(),
            configuration,
            max_time,
            kill_time,
            hints: SolutionHints::default(),
        })
    }

    /// File name of the model, e.g. `ex1221.gms`; the key of its trace record.
    pub fn filename(&self) -> String {
        self.model_file
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn trace_path(&self) -> PathBuf {
        self.workdir.join(TRACE_FILE_NAME)
    }

    /// Hard wall-clock bound for one engine invocation.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.max_time.saturating_add(self.kill_time))
    }

    /// The record reported when nothing usable was produced.
    pub fn fallback_record(&self) -> TraceRecord {
        TraceRecord::new(Some(&self.filename()))
    }

    /// Prepares the working directory. Returns `false` when it already holds
    /// a completed trace, i.e. there is nothing left to do. A directory left
    /// without one (e.g. by a killed run) is wiped and recreated. The model
    /// file is copied in whenever the directory is (re)created.
    pub fn init_workdir(&self) -> Result<bool> {
        if self.workdir.exists() {
            if has_complete_row(&self.trace_path()) {
                return Ok(false);
            }
            fs::remove_dir_all(&self.workdir).with_context(|| {
                format!("failed to clear stale working directory {}", self.workdir.display())
            })?;
        }
        fs::create_dir_all(&self.workdir).with_context(|| {
            format!("failed to create working directory {}", self.workdir.display())
        })?;
        let file_name = self
            .model_file
            .file_name()
            .ok_or_else(|| anyhow!("model path has no file name: {}", self.model_file.display()))?;
        fs::copy(&self.model_file, self.workdir.join(file_name)).with_context(|| {
            format!(
                "failed to copy {} into {}",
                self.model_file.display(),
                self.workdir.display()
            )
        })?;
        Ok(true)
    }

    /// The record left in the working directory by an earlier run, or the
    /// fallback record when there is none.
    pub fn recorded_result(&self) -> TraceRecord {
        let mut record = self.fallback_record();
        let path = self.trace_path();
        if path.exists() {
            if let Err(err) = record.load_trace_file(&path) {
                tracing::warn!(job = %self.name, error = %err, "unreadable trace left in working directory");
            }
        }
        record.input_file_name = Some(self.filename());
        record
    }
}
