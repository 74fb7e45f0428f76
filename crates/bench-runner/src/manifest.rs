use crate::configuration::Configuration;
use crate::runner::Runner;
use anyhow::Result;
use bench_trace::fs::atomic_write_bytes;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Describes a benchmark run: backend, queried versions and limits, plus the
/// configurations keyed by the directory name their results land in.
pub fn build_manifest(
    runner: &dyn Runner,
    configurations: &[Configuration],
    max_time: u64,
    kill_time: u64,
    num_workers: usize,
    num_jobs: usize,
) -> Value {
    let configurations: Vec<Value> = configurations
        .iter()
        .map(|conf| {
            json!({
                "id": conf.id,
                "name": conf.name(),
                "options": conf
                    .engine_options()
                    .map(|(k, v)| json!([k, v]))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "schema_version": "bench_manifest_v1",
        "interface": runner.name(),
        "engine_version": runner.engine_version(),
        "interface_version": runner.interface_version(),
        "max_time": max_time,
        "kill_time": kill_time,
        "num_workers": num_workers,
        "num_jobs": num_jobs,
        "configurations": configurations,
        "runner_version": env!("CARGO_PKG_VERSION"),
        "created_at": Utc::now().to_rfc3339(),
    })
}

pub fn write_json_pretty(path: &Path, value: &Value) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)?;
    Ok(())
}

pub fn write_manifest(result_path: &Path, manifest: &Value) -> Result<()> {
    write_json_pretty(&result_path.join(MANIFEST_FILE_NAME), manifest)
}
