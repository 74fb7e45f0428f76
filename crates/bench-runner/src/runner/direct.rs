use super::process::run_with_deadline;
use super::{
    collect_record, command_to_strings, finish_record, query_version, write_captured_output,
    Runner,
};
use crate::job::Job;
use crate::result::SolveResult;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Calls the engine executable on `.gms` models.
pub struct DirectRunner {
    sysdir: PathBuf,
    engine_version: Option<String>,
}

impl DirectRunner {
    pub fn new(sysdir: &Path) -> Self {
        let engine_version = engine_version(sysdir);
        Self {
            sysdir: sysdir.to_path_buf(),
            engine_version,
        }
    }

    fn build_command(&self, job: &Job) -> Command {
        let model = job.workdir.join(format!("{}.gms", job.name));
        let mut cmd = Command::new(self.sysdir.join("gams"));
        cmd.arg(model);
        cmd.args(["lo=2", "al=0", "ao=0"]);
        cmd.arg(format!("curdir={}", job.workdir.display()));
        cmd.args(["trace=trace.trc", "traceOpt=5"]);
        cmd.arg(format!("reslim={}", job.max_time));
        cmd.args(["solprint=off", "solvelink=5"]);
        for (key, value) in job.configuration.engine_options() {
            cmd.arg(format!("{}={}", key, value));
        }
        cmd.current_dir(&job.workdir);
        cmd.env("LD_LIBRARY_PATH", &self.sysdir);
        cmd
    }
}

/// Version reported by `gams audit`; also used by the bridge backends.
pub(crate) fn engine_version(sysdir: &Path) -> Option<String> {
    let mut cmd = Command::new(sysdir.join("gams"));
    cmd.args(["audit", "lo=3"]);
    cmd.env("LD_LIBRARY_PATH", sysdir);
    query_version(cmd)
}

impl Runner for DirectRunner {
    fn name(&self) -> &str {
        "direct"
    }

    fn model_extension(&self) -> &str {
        "gms"
    }

    fn engine_version(&self) -> Option<&str> {
        self.engine_version.as_deref()
    }

    fn interface_version(&self) -> Option<&str> {
        None
    }

    fn command(&self, job: &Job) -> Vec<String> {
        command_to_strings(&self.build_command(job))
    }

    fn run(&self, job: &Job) -> Result<SolveResult> {
        let cmd = self.build_command(job);
        tracing::debug!(job = %job.name, command = ?command_to_strings(&cmd), "starting engine");
        let outcome = run_with_deadline(cmd, job.deadline());
        write_captured_output(job, &outcome.stdout, &outcome.stderr)?;

        let record = collect_record(job, &job.trace_path());
        let record = finish_record(job, record, Some(outcome.elapsed.as_secs_f64()))?;
        Ok(SolveResult::new(record, outcome.stdout, outcome.stderr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;

    #[test]
    fn command_passes_limits_and_options() {
        let runner = DirectRunner {
            sysdir: PathBuf::from("/opt/gams"),
            engine_version: None,
        };
        let conf = Configuration::new(1).with_option("solver", "baron");
        let job = Job::new(
            "ex1221",
            Path::new("/tmp/res/1_baron/ex1221"),
            Path::new("/models/ex1221.gms"),
            conf,
            60,
            30,
        )
        .expect("job");
        let cmd = runner.command(&job);
        assert_eq!(cmd[0], "/opt/gams/gams");
        assert_eq!(cmd[1], "/tmp/res/1_baron/ex1221/ex1221.gms");
        assert!(cmd.contains(&"curdir=/tmp/res/1_baron/ex1221".to_string()));
        assert!(cmd.contains(&"traceOpt=5".to_string()));
        assert!(cmd.contains(&"reslim=60".to_string()));
        assert_eq!(cmd.last().map(String::as_str), Some("solver=baron"));
        assert!(!cmd.iter().any(|a| a.starts_with("id=")));
    }
}
