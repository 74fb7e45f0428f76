use anyhow::{anyhow, Result};
use bench_runner::{
    build_manifest, build_runner, load_configuration_file, parse_option_string, report,
    write_manifest, Backend, Configuration, Reporter, RunSummary, Scheduler,
};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bench", version, about = "Benchmark an optimization engine over a model testset")]
struct Cli {
    /// Testset whose models are solved.
    #[arg(long, value_enum, default_value = "minlplib")]
    testset: TestsetArg,
    /// Model directory, required with `--testset other`.
    #[arg(long)]
    modelpath: Option<PathBuf>,
    /// Result directory.
    #[arg(long, default_value = "latest")]
    result: PathBuf,
    /// Engine system directory.
    #[arg(long, default_value = "/opt/gams")]
    gams: PathBuf,
    /// Engine options, `k1=v1,k2=v2;k3=v3` with `;` between configurations.
    #[arg(long, default_value = "", conflicts_with = "config")]
    gamsopt: String,
    /// YAML file with a `configurations:` list.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Solve time limit per job in seconds.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    max_time: u64,
    /// Seconds after `--max-time` before the engine is killed.
    #[arg(long, default_value_t = 30)]
    kill_time: u64,
    /// Jobs solved in parallel.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    threads: u64,
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_jobs: Option<u64>,
    /// No new jobs are started after this many seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_total_time: Option<u64>,
    #[arg(long, value_enum, default_value = "direct")]
    interface: InterfaceArg,
    /// `|`-separated report columns.
    #[arg(long, default_value = report::DEFAULT_COLUMNS)]
    output: String,
    /// Continue without asking when the result directory exists.
    #[arg(long)]
    yes: bool,
    #[arg(long)]
    no_color: bool,
    /// Print only the run summary, as JSON; per-job report lines are off.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TestsetArg {
    #[value(name = "minlplib")]
    Minlplib,
    #[value(name = "princetonlib")]
    Princetonlib,
    #[value(name = "other")]
    Other,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InterfaceArg {
    #[value(name = "direct")]
    Direct,
    #[value(name = "jump")]
    Jump,
    #[value(name = "pyomo")]
    Pyomo,
}

impl From<InterfaceArg> for Backend {
    fn from(value: InterfaceArg) -> Self {
        match value {
            InterfaceArg::Direct => Backend::Direct,
            InterfaceArg::Jump => Backend::Jump,
            InterfaceArg::Pyomo => Backend::Pyomo,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let json_mode = cli.json;
    match run(cli) {
        Ok(Some(summary)) => {
            if json_mode {
                emit_json(&summary_to_json(&summary));
            } else {
                print_summary(&summary);
            }
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json!({
                    "ok": false,
                    "error": { "code": "run_failed", "message": format!("{:#}", err) },
                }));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

/// Asks before reusing an existing result directory. An empty answer or `y`
/// continues.
fn confirm_existing(result: &Path) -> Result<bool> {
    println!(
        "Result directory '{}' already exists. Continue? [y]/n",
        result.display()
    );
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "" | "y"))
}

fn load_configurations(cli: &Cli) -> Result<Vec<Configuration>> {
    match &cli.config {
        Some(path) => load_configuration_file(path),
        None => parse_option_string(&cli.gamsopt),
    }
}

/// Model directory and reference solution file for the chosen testset.
fn resolve_testset(cli: &Cli, extension: &str) -> Result<(PathBuf, Option<PathBuf>)> {
    let testsets = Path::new("testsets");
    match cli.testset {
        TestsetArg::Minlplib => Ok((
            testsets.join("minlplib").join(extension),
            Some(testsets.join("minlplib").join("minlplib.solu")),
        )),
        TestsetArg::Princetonlib => Ok((testsets.join("princetonlib").join(extension), None)),
        TestsetArg::Other => {
            let path = cli
                .modelpath
                .clone()
                .ok_or_else(|| anyhow!("--modelpath is required with --testset other"))?;
            if !path.is_dir() {
                return Err(anyhow!("model path not found: {}", path.display()));
            }
            Ok((path, None))
        }
    }
}

fn run(cli: Cli) -> Result<Option<RunSummary>> {
    if cli.result.exists() && !cli.yes && !confirm_existing(&cli.result)? {
        return Ok(None);
    }
    if !cli.gams.exists() {
        return Err(anyhow!("engine not found: {}", cli.gams.display()));
    }
    let configurations = load_configurations(&cli)?;
    // Report lines would interleave with the JSON summary on stdout.
    let reporter = if cli.json {
        Reporter::silent()
    } else {
        Reporter::new(report::parse_columns(&cli.output)?).with_color(!cli.no_color)
    };

    let runner = build_runner(cli.interface.into(), &cli.gams);
    let (model_path, reference_file) = resolve_testset(&cli, runner.model_extension())?;
    let mut scheduler = Scheduler::new(runner, &cli.result, configurations, reporter);
    let num_jobs = scheduler.create(
        &model_path,
        cli.max_jobs.map(|n| n as usize),
        cli.max_time,
        cli.kill_time,
        reference_file.as_deref(),
    )?;

    let manifest = build_manifest(
        scheduler.runner(),
        scheduler.configurations(),
        cli.max_time,
        cli.kill_time,
        cli.threads as usize,
        num_jobs,
    );
    write_manifest(&cli.result, &manifest)?;
    tracing::info!(result = %cli.result.display(), jobs = num_jobs, "manifest written");

    let summary = scheduler.run(
        cli.threads as usize,
        cli.max_total_time.map(Duration::from_secs),
    )?;
    Ok(Some(summary))
}

fn print_summary(summary: &RunSummary) {
    println!("executed: {}", summary.executed);
    println!("skipped: {}", summary.skipped);
    println!("failed: {}", summary.failed);
    for path in &summary.trace_files {
        println!("trace: {}", path.display());
    }
}

fn summary_to_json(summary: &RunSummary) -> Value {
    json!({
        "ok": true,
        "executed": summary.executed,
        "skipped": summary.skipped,
        "failed": summary.failed,
        "trace_files": summary
            .trace_files
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect::<Vec<_>>(),
    })
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\"}}}}"
        ),
    }
}
