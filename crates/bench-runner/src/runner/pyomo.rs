use super::direct::engine_version;
use super::process::run_with_deadline;
use super::{command_to_strings, finish_record, query_version, write_captured_output, Runner};
use crate::job::Job;
use crate::result::SolveResult;
use anyhow::{Context, Result};
use bench_trace::TraceRecord;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const RESULT_FILE: &str = "pyomo_result.json";

/// Solves `.py` models through the Pyomo bridge. Each job gets a generated
/// driver script that solves the model and dumps problem statistics as JSON.
pub struct PyomoRunner {
    engine_version: Option<String>,
    interface_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PyomoResult {
    time_used: Option<f64>,
    tmpdir: Option<String>,
    number_of_constraints: Option<i64>,
    number_of_variables: Option<i64>,
    number_of_integer_variables: Option<i64>,
    number_of_nonzeros: Option<i64>,
    upper_bound: Option<f64>,
    lower_bound: Option<f64>,
}

impl PyomoRunner {
    pub fn new(sysdir: &Path) -> Self {
        let mut query = Command::new("python");
        query.args(["-c", "import pyomo.version as v; print(v.version)"]);
        Self {
            engine_version: engine_version(sysdir),
            interface_version: query_version(query),
        }
    }

    fn program_path(job: &Job) -> PathBuf {
        job.workdir.join(format!("pyomo_{}.py", job.name))
    }

    fn program(job: &Job) -> String {
        let mut options = String::new();
        for (key, value) in job.configuration.engine_options() {
            if key.eq_ignore_ascii_case("nodlim") {
                options.push_str(&format!(
                    "opt.options[\"add_options\"].append(\"GAMS_MODEL.{}={};\")\n",
                    key, value
                ));
            } else {
                options.push_str(&format!(
                    "opt.options[\"add_options\"].append(\"option {}={};\")\n",
                    key, value
                ));
            }
        }
        format!(
            r#"import json
import math
import os
import time
import pyomo.environ as pyo


def _num(value):
    try:
        value = float(value)
    except (TypeError, ValueError):
        return None
    return value if math.isfinite(value) else None


def _int(value):
    value = _num(value)
    return None if value is None else int(value)


opt = pyo.SolverFactory('gams')
opt.options["keepfiles"] = True
opt.options["add_options"] = []
{options}opt.options["add_options"].append("option reslim={max_time};")

m = getattr(__import__('{name}', fromlist=["m"]), "m")

time_used = time.time()
results = opt.solve(m)
time_used = time.time() - time_used

stats = results.problem
with open(os.path.join('{workdir}', '{result}'), 'w') as f:
    json.dump({{
        "time_used": time_used,
        "tmpdir": os.path.dirname(stats.name),
        "number_of_constraints": _int(stats.number_of_constraints),
        "number_of_variables": _int(stats.number_of_variables),
        "number_of_integer_variables": _int(stats.number_of_integer_variables),
        "number_of_nonzeros": _int(stats.number_of_nonzeros),
        "upper_bound": _num(stats.upper_bound),
        "lower_bound": _num(stats.lower_bound),
    }}, f)
"#,
            options = options,
            max_time = job.max_time,
            name = job.name,
            workdir = job.workdir.display(),
            result = RESULT_FILE,
        )
    }

    fn build_command(job: &Job) -> Command {
        let mut cmd = Command::new("python");
        cmd.arg(Self::program_path(job));
        cmd.current_dir(&job.workdir);
        cmd
    }
}

/// Builds the record from the driver's JSON dump: the engine trace in the
/// solver's temp directory when there is one, otherwise its listing file
/// plus the statistics Pyomo reported.
fn record_from_result(job: &Job, result: &PyomoResult) -> TraceRecord {
    let mut record = job.fallback_record();
    let tmpdir = result.tmpdir.as_deref().map(PathBuf::from);
    let engine_trace = tmpdir
        .as_ref()
        .map(|d| d.join("trace.trc"))
        .filter(|t| t.exists());
    if let Some(trace) = engine_trace {
        if let Err(err) = record.load_trace_file(&trace) {
            tracing::warn!(job = %job.name, error = %err, "pyomo engine trace unreadable");
        }
        return record;
    }

    if let Some(dir) = tmpdir.as_ref() {
        if let Err(err) = record.load_listing(&dir.join("output.lst")) {
            tracing::warn!(job = %job.name, error = %err, "pyomo listing unreadable");
        }
        if let Err(err) = fs::remove_dir_all(dir) {
            tracing::debug!(job = %job.name, dir = %dir.display(), error = %err, "pyomo temp dir not removed");
        }
    }
    record.number_of_equations = result.number_of_constraints;
    record.number_of_variables = result.number_of_variables;
    record.number_of_discrete_variables = result.number_of_integer_variables;
    record.number_of_non_zeros = result.number_of_nonzeros;
    if record.direction == Some(0) {
        record.objective_value = result.upper_bound;
        record.objective_value_estimate = result.lower_bound;
    } else {
        record.objective_value = result.lower_bound;
        record.objective_value_estimate = result.upper_bound;
    }
    record
}

impl Runner for PyomoRunner {
    fn name(&self) -> &str {
        "pyomo"
    }

    fn model_extension(&self) -> &str {
        "py"
    }

    fn engine_version(&self) -> Option<&str> {
        self.engine_version.as_deref()
    }

    fn interface_version(&self) -> Option<&str> {
        self.interface_version.as_deref()
    }

    fn command(&self, job: &Job) -> Vec<String> {
        command_to_strings(&Self::build_command(job))
    }

    fn run(&self, job: &Job) -> Result<SolveResult> {
        let program_path = Self::program_path(job);
        fs::write(&program_path, Self::program(job))
            .with_context(|| format!("failed to write {}", program_path.display()))?;

        let cmd = Self::build_command(job);
        tracing::debug!(job = %job.name, command = ?command_to_strings(&cmd), "starting python");
        let outcome = run_with_deadline(cmd, job.deadline());
        write_captured_output(job, &outcome.stdout, &outcome.stderr)?;

        let result_path = job.workdir.join(RESULT_FILE);
        let parsed = fs::read(&result_path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<PyomoResult>(&bytes).ok());
        let (record, time_used) = match parsed {
            Some(result) => (record_from_result(job, &result), result.time_used),
            None => (job.fallback_record(), None),
        };
        let record = finish_record(job, record, time_used)?;
        Ok(SolveResult::new(record, outcome.stdout, outcome.stderr))
    }
}
