//! One progress line per finished job.
//!
//! Classification is kept separate from rendering so the verdicts can be
//! tested (and reused) without caring about column widths or colors.

use crate::job::Job;
use crate::result::SolveResult;
use anyhow::{anyhow, Result};
use bench_trace::{MODEL_STATUS_INFEASIBLE, MODEL_STATUS_OPTIMAL};
use std::str::FromStr;
use std::time::Duration;

/// Absolute tolerance used when comparing objective values with references.
pub const OBJECTIVE_TOLERANCE: f64 = 1e-5;

const SOLVER_STATUS_NORMAL: i64 = 1;
const SOLVER_STATUS_ITERATION: i64 = 2;
const SOLVER_STATUS_RESOURCE: i64 = 3;
const SOLVER_STATUS_CAPABILITY: i64 = 6;
/// Model statuses that carry a primal solution.
const SOLUTION_STATUSES: [i64; 6] = [1, 2, 8, 15, 16, 17];

const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Failure,
    /// Nothing to judge.
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub tag: &'static str,
    pub severity: Severity,
}

impl Verdict {
    const fn new(tag: &'static str, severity: Severity) -> Self {
        Self { tag, severity }
    }

    const OK: Verdict = Verdict::new("ok", Severity::Success);
}

pub fn classify_status(result: &SolveResult) -> Verdict {
    if !result.stdout().is_empty() {
        return Verdict::new("stdout", Severity::Failure);
    }
    if !result.stderr().is_empty() {
        return Verdict::new("stderr", Severity::Failure);
    }
    match result.solver_status() {
        Some(SOLVER_STATUS_CAPABILITY) => Verdict::new("capability", Severity::Warning),
        Some(SOLVER_STATUS_ITERATION) => Verdict::new("maxiter", Severity::Warning),
        Some(SOLVER_STATUS_RESOURCE) => Verdict::new("maxtime", Severity::Warning),
        Some(SOLVER_STATUS_NORMAL) => match result.model_status() {
            Some(11..=14) => Verdict::new("fail", Severity::Failure),
            _ => Verdict::OK,
        },
        _ => Verdict::new("fail", Severity::Failure),
    }
}

/// Judges the elapsed time against the job's limits. A solver time beyond
/// `max_time` is a failure unless the solver itself reported hitting the
/// resource limit, in which case it is only a warning however long it took.
/// Without a solver time, an interface time beyond `max_time + kill_time`
/// means the engine had to be killed.
pub fn classify_time(job: &Job, result: &SolveResult) -> Verdict {
    let max_time = job.max_time as f64;
    let hard_limit = job.max_time.saturating_add(job.kill_time) as f64;
    if let Some(solver_time) = result.solver_time() {
        if solver_time > max_time && result.solver_status() != Some(SOLVER_STATUS_RESOURCE) {
            return Verdict::new("fail", Severity::Failure);
        }
        if solver_time > max_time {
            return Verdict::new("maxtime", Severity::Warning);
        }
    } else if let Some(interface_time) = result.et_interface() {
        if interface_time > hard_limit {
            return Verdict::new("maxtime", Severity::Failure);
        }
    }
    Verdict::OK
}

fn has_solution(result: &SolveResult) -> bool {
    result.solver_status() == Some(SOLVER_STATUS_NORMAL)
        && result
            .model_status()
            .map(|s| SOLUTION_STATUSES.contains(&s))
            .unwrap_or(false)
}

/// Compares the reported solution with the job's reference hints.
///
/// `status` wins over `primal`, which wins over `dual`.
pub fn classify_objective(job: &Job, result: &SolveResult) -> Verdict {
    let hints = &job.hints;
    if result.solver_status() == Some(SOLVER_STATUS_NORMAL) {
        if hints.model_status == Some(MODEL_STATUS_INFEASIBLE) && has_solution(result) {
            return Verdict::new("status", Severity::Failure);
        }
        if result.model_status() == Some(MODEL_STATUS_INFEASIBLE)
            && hints.model_status == Some(MODEL_STATUS_OPTIMAL)
        {
            return Verdict::new("status", Severity::Failure);
        }
    }
    if !has_solution(result) {
        return Verdict::new("na", Severity::Neutral);
    }

    let direction = result.direction();
    if let (Some(objective), Some(reference_bound)) = (result.objective(), hints.objective_estimate)
    {
        let worse = match direction {
            Some(0) => objective < reference_bound - OBJECTIVE_TOLERANCE,
            Some(1) => objective > reference_bound + OBJECTIVE_TOLERANCE,
            _ => false,
        };
        if worse {
            return Verdict::new("primal", Severity::Failure);
        }
    }
    if let (Some(estimate), Some(reference)) = (result.objective_estimate(), hints.objective) {
        let surpassed = match direction {
            Some(0) => estimate > reference + OBJECTIVE_TOLERANCE,
            Some(1) => estimate < reference - OBJECTIVE_TOLERANCE,
            _ => false,
        };
        if surpassed {
            return Verdict::new("dual", Severity::Warning);
        }
    }
    Verdict::OK
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Jobs,
    Name,
    Config,
    Model,
    Status,
    Objective,
    Time,
}

impl FromStr for Column {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "jobs" => Ok(Column::Jobs),
            "name" => Ok(Column::Name),
            "config" => Ok(Column::Config),
            "model" => Ok(Column::Model),
            "status" => Ok(Column::Status),
            "objective" => Ok(Column::Objective),
            "time" => Ok(Column::Time),
            other => Err(anyhow!("unknown output column: {}", other)),
        }
    }
}

pub const DEFAULT_COLUMNS: &str = "jobs|name|config|model|status|objective|time";

/// Parses a `|`-separated column list such as [`DEFAULT_COLUMNS`].
pub fn parse_columns(list: &str) -> Result<Vec<Column>> {
    list.split('|')
        .filter(|c| !c.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Where the scheduler was when a job finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub elapsed: Duration,
    pub jobs_left: usize,
    pub worker: usize,
}

/// Python-style `{: 9.3e}`: sign slot, three decimals, two-digit exponent.
fn sci(value: f64) -> String {
    let raw = format!("{:.3e}", value);
    let formatted = match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    };
    if value.is_sign_negative() {
        format!("{:>9}", formatted)
    } else {
        format!("{:>9}", format!(" {}", formatted))
    }
}

fn opt_int(value: Option<i64>, width: usize) -> String {
    match value {
        Some(v) => format!("{:>width$}", v, width = width),
        None => " ".repeat(width),
    }
}

fn opt_real(value: Option<f64>, width: usize, precision: usize) -> String {
    match value {
        Some(v) => format!("{:>width$.precision$}", v, width = width, precision = precision),
        None => " ".repeat(width),
    }
}

fn opt_sci(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:<10}", sci(v)),
        None => " ".repeat(10),
    }
}

#[derive(Debug, Clone)]
pub struct Reporter {
    columns: Vec<Column>,
    color: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self {
            columns: vec![
                Column::Jobs,
                Column::Name,
                Column::Config,
                Column::Model,
                Column::Status,
                Column::Objective,
                Column::Time,
            ],
            color: true,
        }
    }
}

impl Reporter {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn tag(&self, verdict: Verdict) -> String {
        let tag = format!("{:<10}", verdict.tag);
        if !self.color {
            return tag;
        }
        let color = match verdict.severity {
            Severity::Success => GREEN,
            Severity::Warning => YELLOW,
            Severity::Failure => RED,
            Severity::Neutral => return tag,
        };
        format!("{}{}{}", color, tag, RESET)
    }

    fn jobs_cell(progress: &Progress) -> String {
        format!(
            "{:>2} {:>4} {:>8.1}",
            progress.worker,
            progress.jobs_left,
            progress.elapsed.as_secs_f64()
        )
    }

    fn config_cell(job: &Job, result: &SolveResult) -> String {
        let solver: String = result.solver().unwrap_or("").chars().take(6).collect();
        format!("{} {:<6}", job.configuration.id, solver)
    }

    fn model_cell(result: &SolveResult) -> String {
        let direction = match result.direction() {
            Some(0) => "MIN",
            Some(1) => "MAX",
            _ => "   ",
        };
        format!(
            "{:<5} {} {} {} {}",
            result.model_type().unwrap_or(""),
            direction,
            opt_int(result.n_variables(), 8),
            opt_int(result.n_constraints(), 8),
            opt_int(result.n_nonzeros(), 8),
        )
    }

    fn status_cell(&self, result: &SolveResult) -> String {
        format!(
            "{} {} {}",
            opt_int(result.solver_status(), 2),
            opt_int(result.model_status(), 2),
            self.tag(classify_status(result))
        )
    }

    fn objective_cell(&self, job: &Job, result: &SolveResult) -> String {
        let verdict = classify_objective(job, result);
        if verdict.severity == Severity::Neutral || !has_solution(result) {
            return format!("{} {}", " ".repeat(43), self.tag(verdict));
        }
        let direction = result.direction();
        let estimate = result.objective_estimate();
        let objective = result.objective();
        let dual_gap = match (estimate, job.hints.objective, direction) {
            (Some(e), Some(r), Some(0)) => Some((e - r).max(0.0)),
            (Some(e), Some(r), Some(1)) => Some((r - e).max(0.0)),
            _ => None,
        };
        let primal_gap = match (objective, job.hints.objective_estimate, direction) {
            (Some(o), Some(r), Some(0)) => Some((r - o).max(0.0)),
            (Some(o), Some(r), Some(1)) => Some((o - r).max(0.0)),
            _ => None,
        };
        format!(
            "{} {} {} {} {}",
            opt_sci(estimate),
            opt_sci(dual_gap),
            opt_sci(objective),
            opt_sci(primal_gap),
            self.tag(verdict)
        )
    }

    fn time_cell(&self, job: &Job, result: &SolveResult) -> String {
        format!(
            "{} {} {}",
            opt_real(result.et_interface(), 8, 3),
            opt_real(result.solver_time(), 8, 3),
            self.tag(classify_time(job, result))
        )
    }

    /// Renders the report line for a finished job.
    pub fn format_line(&self, job: &Job, result: &SolveResult, progress: &Progress) -> String {
        let mut line = String::new();
        for column in &self.columns {
            let cell = match column {
                Column::Jobs => Self::jobs_cell(progress),
                Column::Name => format!("{:<35}", job.filename()),
                Column::Config => Self::config_cell(job, result),
                Column::Model => Self::model_cell(result),
                Column::Status => self.status_cell(result),
                Column::Objective => self.objective_cell(job, result),
                Column::Time => self.time_cell(job, result),
            };
            line.push_str(&cell);
            line.push_str(" │ ");
        }
        line
    }

    /// A reporter without columns; it prints nothing.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_silent(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn print(&self, job: &Job, result: &SolveResult, progress: &Progress) {
        if self.is_silent() {
            return;
        }
        println!("{}", self.format_line(job, result, progress));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use crate::job::SolutionHints;
    use bench_trace::TraceRecord;
    use std::path::Path;

    fn job(hints: SolutionHints) -> Job {
        let mut job = Job::new(
            "a",
            Path::new("/tmp/res/0/a"),
            Path::new("/models/a.gms"),
            Configuration::new(0),
            60,
            30,
        )
        .expect("job");
        job.hints = hints;
        job
    }

    fn solved(direction: i64, objective: f64, estimate: f64) -> TraceRecord {
        let mut rec = TraceRecord::new(Some("a.gms"));
        rec.solver_status = Some(1);
        rec.model_status = Some(1);
        rec.direction = Some(direction);
        rec.objective_value = Some(objective);
        rec.objective_value_estimate = Some(estimate);
        rec.solver_time = Some(1.0);
        rec
    }

    fn with_status(solver: i64, model: i64) -> SolveResult {
        let mut rec = TraceRecord::new(Some("a.gms"));
        rec.solver_status = Some(solver);
        rec.model_status = Some(model);
        SolveResult::quiet(rec)
    }

    #[test]
    fn status_precedence_follows_output_then_codes() {
        let rec = TraceRecord::new(Some("a.gms"));
        assert_eq!(classify_status(&SolveResult::new(rec.clone(), "x", "y")).tag, "stdout");
        assert_eq!(classify_status(&SolveResult::new(rec, "", "y")).tag, "stderr");
        assert_eq!(classify_status(&with_status(6, 1)).tag, "capability");
        assert_eq!(classify_status(&with_status(2, 1)).tag, "maxiter");
        assert_eq!(classify_status(&with_status(3, 1)).tag, "maxtime");
        assert_eq!(classify_status(&with_status(13, 12)).tag, "fail");
        assert_eq!(classify_status(&with_status(1, 13)).tag, "fail");
        let ok = classify_status(&with_status(1, 2));
        assert_eq!(ok, Verdict::OK);
    }

    #[test]
    fn time_verdicts_respect_limits() {
        let job = job(SolutionHints::default());
        let mut rec = solved(0, 1.0, 1.0);
        rec.solver_time = Some(61.0);
        assert_eq!(classify_time(&job, &SolveResult::quiet(rec.clone())).tag, "fail");
        rec.solver_status = Some(3);
        let verdict = classify_time(&job, &SolveResult::quiet(rec.clone()));
        assert_eq!(verdict, Verdict::new("maxtime", Severity::Warning));
        rec.solver_time = Some(95.0);
        let verdict = classify_time(&job, &SolveResult::quiet(rec.clone()));
        assert_eq!(verdict, Verdict::new("maxtime", Severity::Warning));
        rec.solver_status = Some(1);
        assert_eq!(classify_time(&job, &SolveResult::quiet(rec.clone())).tag, "fail");

        rec.solver_time = None;
        rec.et_interface = Some(91.0);
        let verdict = classify_time(&job, &SolveResult::quiet(rec.clone()));
        assert_eq!(verdict, Verdict::new("maxtime", Severity::Failure));
        rec.et_interface = Some(10.0);
        assert_eq!(classify_time(&job, &SolveResult::quiet(rec)), Verdict::OK);
    }

    #[test]
    fn objective_flags_dual_and_primal_against_reference() {
        let hints = SolutionHints {
            model_status: Some(1),
            objective: Some(10.5),
            objective_estimate: Some(10.5),
        };
        let job = job(hints);
        let within = SolveResult::quiet(solved(0, 10.500001, 10.499999));
        assert_eq!(classify_objective(&job, &within), Verdict::OK);

        let dual = SolveResult::quiet(solved(0, 10.6, 10.6));
        assert_eq!(classify_objective(&job, &dual).tag, "dual");

        let primal = SolveResult::quiet(solved(0, 10.0, 9.0));
        assert_eq!(classify_objective(&job, &primal).tag, "primal");

        let max_dual = SolveResult::quiet(solved(1, 10.0, 10.0));
        assert_eq!(classify_objective(&job, &max_dual).tag, "dual");
        let max_primal = SolveResult::quiet(solved(1, 11.0, 11.0));
        assert_eq!(classify_objective(&job, &max_primal).tag, "primal");
    }

    #[test]
    fn objective_flags_status_mismatch() {
        let infeasible_ref = job(SolutionHints {
            model_status: Some(4),
            ..SolutionHints::default()
        });
        let claims_solution = SolveResult::quiet(solved(0, 1.0, 1.0));
        assert_eq!(classify_objective(&infeasible_ref, &claims_solution).tag, "status");

        let optimal_ref = job(SolutionHints {
            model_status: Some(1),
            ..SolutionHints::default()
        });
        let claims_infeasible = with_status(1, 4);
        assert_eq!(classify_objective(&optimal_ref, &claims_infeasible).tag, "status");

        let failed = with_status(13, 12);
        assert_eq!(classify_objective(&optimal_ref, &failed).severity, Severity::Neutral);
    }

    #[test]
    fn sci_matches_python_exponent_style() {
        assert_eq!(sci(10.5), " 1.050e+01");
        assert_eq!(sci(-0.00123), "-1.230e-03");
        assert_eq!(sci(0.0), " 0.000e+00");
    }

    #[test]
    fn line_has_one_cell_per_column() {
        let reporter = Reporter::new(parse_columns(DEFAULT_COLUMNS).expect("columns"))
            .with_color(false);
        let job = job(SolutionHints::default());
        let mut rec = solved(0, 3.0, 3.0);
        rec.solver_name = Some("CONOPT4".to_string());
        rec.model_type = Some("NLP".to_string());
        let progress = Progress {
            elapsed: Duration::from_millis(1500),
            jobs_left: 7,
            worker: 2,
        };
        let line = reporter.format_line(&job, &SolveResult::quiet(rec), &progress);
        assert_eq!(line.matches(" │ ").count(), 7);
        assert!(line.starts_with(" 2    7      1.5 │ a.gms"));
        assert!(line.contains("0 CONOPT │ NLP   MIN"));
        assert!(!line.contains('\x1b'));
        assert!(parse_columns("jobs|bogus").is_err());
    }

    #[test]
    fn silent_reporter_renders_nothing() {
        let reporter = Reporter::silent();
        assert!(reporter.is_silent());
        assert!(!Reporter::default().is_silent());
        let progress = Progress {
            elapsed: Duration::from_secs(1),
            jobs_left: 0,
            worker: 0,
        };
        let result = SolveResult::quiet(solved(0, 1.0, 1.0));
        let line = reporter.format_line(&job(SolutionHints::default()), &result, &progress);
        assert!(line.is_empty());
        assert!(parse_columns("").expect("empty list").is_empty());
    }
}
