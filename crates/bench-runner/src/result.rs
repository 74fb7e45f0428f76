use bench_trace::TraceRecord;

/// The outcome of one job: its trace record plus whatever the engine
/// printed. Runners produce these, the scheduler synthesizes them for
/// skipped jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    record: TraceRecord,
    stdout: String,
    stderr: String,
}

impl SolveResult {
    pub fn new(record: TraceRecord, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            record,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// A result with no captured output.
    pub fn quiet(record: TraceRecord) -> Self {
        Self::new(record, "", "")
    }

    pub fn record(&self) -> &TraceRecord {
        &self.record
    }

    pub fn into_record(self) -> TraceRecord {
        self.record
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn name(&self) -> Option<&str> {
        self.record.input_file_name.as_deref()
    }

    pub fn solver_status(&self) -> Option<i64> {
        self.record.solver_status
    }

    pub fn model_status(&self) -> Option<i64> {
        self.record.model_status
    }

    pub fn model_type(&self) -> Option<&str> {
        self.record.model_type.as_deref()
    }

    pub fn direction(&self) -> Option<i64> {
        self.record.direction
    }

    pub fn solver(&self) -> Option<&str> {
        self.record.solver_name.as_deref()
    }

    pub fn n_variables(&self) -> Option<i64> {
        self.record.number_of_variables
    }

    pub fn n_constraints(&self) -> Option<i64> {
        self.record.number_of_equations
    }

    pub fn n_nonzeros(&self) -> Option<i64> {
        self.record.number_of_non_zeros
    }

    pub fn objective(&self) -> Option<f64> {
        self.record.objective_value.filter(|v| !v.is_nan())
    }

    pub fn objective_estimate(&self) -> Option<f64> {
        self.record.objective_value_estimate.filter(|v| !v.is_nan())
    }

    pub fn solver_time(&self) -> Option<f64> {
        self.record.solver_time.filter(|v| !v.is_nan())
    }

    pub fn et_interface(&self) -> Option<f64> {
        self.record.et_interface.filter(|v| !v.is_nan())
    }
}
