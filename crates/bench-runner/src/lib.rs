//! Benchmark scheduling: configurations, jobs, engine backends, the worker
//! pool and per-job reporting.

mod configuration;
mod job;
mod manifest;
pub mod report;
mod result;
pub mod runner;
mod scheduler;

pub use configuration::{
    load_configuration_file, parse_configuration_yaml, parse_option_string, Configuration,
};
pub use job::{Job, SolutionHints};
pub use manifest::{build_manifest, write_json_pretty, write_manifest, MANIFEST_FILE_NAME};
pub use report::{Column, Progress, Reporter, Severity, Verdict, DEFAULT_COLUMNS};
pub use result::SolveResult;
pub use runner::{build_runner, Backend, Runner};
pub use scheduler::{RunSummary, Scheduler};
