use super::direct::engine_version;
use super::process::run_with_deadline;
use super::{
    collect_record, command_to_strings, finish_record, query_version, write_captured_output,
    Runner,
};
use crate::job::Job;
use crate::result::SolveResult;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const RESULT_FILE: &str = "jump_results.txt";

/// Solves `.jl` models through the JuMP bridge by generating a small Julia
/// driver per job.
pub struct JumpRunner {
    sysdir: PathBuf,
    engine_version: Option<String>,
    interface_version: Option<String>,
}

impl JumpRunner {
    pub fn new(sysdir: &Path) -> Self {
        let mut query = Command::new("julia");
        query.args(["-e", "using Pkg; Pkg.status(\"JuMP\")"]);
        Self {
            sysdir: sysdir.to_path_buf(),
            engine_version: engine_version(sysdir),
            interface_version: query_version(query),
        }
    }

    fn program_path(job: &Job) -> PathBuf {
        job.workdir.join(format!("jump_{}.jl", job.name))
    }

    fn program(&self, job: &Job) -> String {
        let workdir = job.workdir.display();
        let mut options = String::new();
        for (key, value) in job.configuration.engine_options() {
            options.push_str(&format!(
                "set_optimizer_attribute(m, \"{}\", \"{}\")\n",
                key, value
            ));
        }
        format!(
            r#"using JuMP
using GAMS

include(joinpath("{workdir}", "{name}.jl"))

JuMP.set_optimizer(m, GAMS.Optimizer)
set_optimizer_attribute(m, GAMS.SysDir(), "{sysdir}")
set_optimizer_attribute(m, GAMS.WorkDir(), "{workdir}")
set_optimizer_attribute(m, MOI.Silent(), true)
{options}set_optimizer_attribute(m, MOI.TimeLimitSec(), 1)
JuMP.optimize!(m)

set_optimizer_attribute(m, GAMS.Trace(), "trace.trc")
set_optimizer_attribute(m, GAMS.TraceOpt(), 5)
set_optimizer_attribute(m, MOI.TimeLimitSec(), {max_time})
time_used = @elapsed JuMP.optimize!(m)

open(joinpath("{workdir}", "{result}"), "w") do io
    write(io, "time_used " * string(time_used) * "\n")
end
"#,
            workdir = workdir,
            name = job.name,
            sysdir = self.sysdir.display(),
            options = options,
            max_time = job.max_time,
            result = RESULT_FILE,
        )
    }

    fn build_command(job: &Job) -> Command {
        let mut cmd = Command::new("julia");
        cmd.arg(Self::program_path(job));
        cmd.current_dir(&job.workdir);
        cmd
    }
}

/// Reads `time_used <seconds>` from the driver's result file.
fn read_time_used(path: &Path) -> Option<f64> {
    let text = fs::read_to_string(path).ok()?;
    text.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(' ')?;
        if key == "time_used" {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

impl Runner for JumpRunner {
    fn name(&self) -> &str {
        "jump"
    }

    fn model_extension(&self) -> &str {
        "jl"
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
        fs::write(&program_path, self.program(job))
            .with_context(|| format!("failed to write {}", program_path.display()))?;

        let cmd = Self::build_command(job);
        tracing::debug!(job = %job.name, command = ?command_to_strings(&cmd), "starting julia");
        let outcome = run_with_deadline(cmd, job.deadline());
        write_captured_output(job, &outcome.stdout, &outcome.stderr)?;

        let record = collect_record(job, &job.trace_path());
        let time_used = read_time_used(&job.workdir.join(RESULT_FILE));
        let record = finish_record(job, record, time_used)?;
        Ok(SolveResult::new(record, outcome.stdout, outcome.stderr))
    }
}
