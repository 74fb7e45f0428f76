//! Engine backends. Each backend knows how to turn a [`Job`] into an engine
//! invocation and how to recover a trace record from what the engine left
//! behind; the scheduler only sees the [`Runner`] trait.

mod direct;
mod jump;
pub mod process;
mod pyomo;

pub use direct::DirectRunner;
pub use jump::JumpRunner;
pub use pyomo::PyomoRunner;

use crate::job::Job;
use crate::result::SolveResult;
use anyhow::{Context, Result};
use bench_trace::{TraceRecord, MODEL_STATUS_ERROR_NO_SOLUTION, SOLVER_STATUS_FAILURE};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;

pub trait Runner: Send + Sync {
    /// Backend name, e.g. `direct`.
    fn name(&self) -> &str;
    /// Extension (without dot) of the model files this backend consumes.
    fn model_extension(&self) -> &str;
    fn engine_version(&self) -> Option<&str>;
    fn interface_version(&self) -> Option<&str>;
    /// The argument vector used to run `job`, for logging.
    fn command(&self, job: &Job) -> Vec<String>;
    /// Solves `job` in its working directory. Engine failures are folded
    /// into the returned record; only filesystem trouble is an error.
    fn run(&self, job: &Job) -> Result<SolveResult>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Direct,
    Jump,
    Pyomo,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(Backend::Direct),
            "jump" => Ok(Backend::Jump),
            "pyomo" => Ok(Backend::Pyomo),
            other => Err(anyhow::anyhow!("unknown interface: {}", other)),
        }
    }
}

/// Builds the runner for `backend`, probing engine and interface versions.
pub fn build_runner(backend: Backend, sysdir: &Path) -> Box<dyn Runner> {
    match backend {
        Backend::Direct => Box::new(DirectRunner::new(sysdir)),
        Backend::Jump => Box::new(JumpRunner::new(sysdir)),
        Backend::Pyomo => Box::new(PyomoRunner::new(sysdir)),
    }
}

/// First `major.minor.patch` token in `text`.
pub fn find_version(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() && (i == 0 || !bytes[i - 1].is_ascii_digit()) {
            let mut j = i;
            let mut groups = 0;
            loop {
                let start = j;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                if j == start {
                    break;
                }
                groups += 1;
                if groups == 3 || j >= bytes.len() || bytes[j] != b'.' {
                    break;
                }
                j += 1;
            }
            if groups == 3 {
                return Some(text[i..j].to_string());
            }
        }
        i += 1;
    }
    None
}

/// Runs a short version command and extracts a version from its stdout.
pub(crate) fn query_version(mut cmd: Command) -> Option<String> {
    let program = format!("{:?}", cmd.get_program());
    match cmd.output() {
        Ok(out) => {
            let version = find_version(&String::from_utf8_lossy(&out.stdout));
            if version.is_none() {
                tracing::warn!(program = %program, "no version found in command output");
            }
            version
        }
        Err(err) => {
            tracing::warn!(program = %program, error = %err, "version query failed");
            None
        }
    }
}

pub(crate) fn command_to_strings(cmd: &Command) -> Vec<String> {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().to_string())
        .collect()
}

/// Stores the engine's console output next to the job's other artifacts.
pub(crate) fn write_captured_output(job: &Job, stdout: &str, stderr: &str) -> Result<()> {
    let out = job.workdir.join("stdout.txt");
    fs::write(&out, stdout).with_context(|| format!("failed to write {}", out.display()))?;
    let err = job.workdir.join("stderr.txt");
    fs::write(&err, stderr).with_context(|| format!("failed to write {}", err.display()))?;
    Ok(())
}

/// Loads the engine trace at `engine_trace` onto the job's fallback record.
/// Without one the record keeps the failure statuses.
pub(crate) fn collect_record(job: &Job, engine_trace: &Path) -> TraceRecord {
    let mut record = job.fallback_record();
    if engine_trace.exists() {
        if let Err(err) = record.load_trace_file(engine_trace) {
            tracing::warn!(job = %job.name, error = %err, "engine trace unreadable");
            record.solver_status = Some(SOLVER_STATUS_FAILURE);
            record.model_status = Some(MODEL_STATUS_ERROR_NO_SOLUTION);
        }
    } else {
        tracing::debug!(job = %job.name, "engine left no trace file");
    }
    record
}

/// Stamps the job key and interface timing onto `record` and persists it as
/// the job's trace file, which marks the working directory as completed.
pub(crate) fn finish_record(
    job: &Job,
    mut record: TraceRecord,
    interface_time: Option<f64>,
) -> Result<TraceRecord> {
    record.input_file_name = Some(job.filename());
    if interface_time.is_some() {
        record.et_interface = interface_time;
    }
    record.update_interface_overhead();
    record
        .write(&job.trace_path())
        .with_context(|| format!("failed to write trace for {}", job.name))?;
    Ok(record)
}
