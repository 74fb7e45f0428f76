//! One row of solve statistics as found in an engine trace file.
//!
//! The column set and its order are fixed by [`TraceField::ALL`]; every
//! column is nullable and serializes as `NA` when absent.

use std::fmt;

/// Solver status written for a run that produced no usable output.
pub const SOLVER_STATUS_FAILURE: i64 = 13;
/// Model status written for a run that produced no usable output.
pub const MODEL_STATUS_ERROR_NO_SOLUTION: i64 = 12;

pub const MODEL_STATUS_OPTIMAL: i64 = 1;
pub const MODEL_STATUS_FEASIBLE: i64 = 2;
pub const MODEL_STATUS_INFEASIBLE: i64 = 4;

pub const NA: &str = "NA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TraceField {
    InputFileName,
    ModelType,
    SolverName,
    Nlp,
    Mip,
    JulianDate,
    Direction,
    NumberOfEquations,
    NumberOfVariables,
    NumberOfDiscreteVariables,
    NumberOfNonZeros,
    NumberOfNonlinearNonZeros,
    OptionFile,
    ModelStatus,
    SolverStatus,
    ObjectiveValue,
    ObjectiveValueEstimate,
    EtSolver,
    EtSolve,
    EtInterface,
    EtInterfaceOverhead,
    SolverTime,
    NumberOfIterations,
    NumberOfDomainViolations,
    NumberOfNodes,
}

impl TraceField {
    /// Declaration order; trace files are written in exactly this order.
    pub const ALL: [TraceField; 25] = [
        TraceField::InputFileName,
        TraceField::ModelType,
        TraceField::SolverName,
        TraceField::Nlp,
        TraceField::Mip,
        TraceField::JulianDate,
        TraceField::Direction,
        TraceField::NumberOfEquations,
        TraceField::NumberOfVariables,
        TraceField::NumberOfDiscreteVariables,
        TraceField::NumberOfNonZeros,
        TraceField::NumberOfNonlinearNonZeros,
        TraceField::OptionFile,
        TraceField::ModelStatus,
        TraceField::SolverStatus,
        TraceField::ObjectiveValue,
        TraceField::ObjectiveValueEstimate,
        TraceField::EtSolver,
        TraceField::EtSolve,
        TraceField::EtInterface,
        TraceField::EtInterfaceOverhead,
        TraceField::SolverTime,
        TraceField::NumberOfIterations,
        TraceField::NumberOfDomainViolations,
        TraceField::NumberOfNodes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TraceField::InputFileName => "InputFileName",
            TraceField::ModelType => "ModelType",
            TraceField::SolverName => "SolverName",
            TraceField::Nlp => "NLP",
            TraceField::Mip => "MIP",
            TraceField::JulianDate => "JulianDate",
            TraceField::Direction => "Direction",
            TraceField::NumberOfEquations => "NumberOfEquations",
            TraceField::NumberOfVariables => "NumberOfVariables",
            TraceField::NumberOfDiscreteVariables => "NumberOfDiscreteVariables",
            TraceField::NumberOfNonZeros => "NumberOfNonZeros",
            TraceField::NumberOfNonlinearNonZeros => "NumberOfNonlinearNonZeros",
            TraceField::OptionFile => "OptionFile",
            TraceField::ModelStatus => "ModelStatus",
            TraceField::SolverStatus => "SolverStatus",
            TraceField::ObjectiveValue => "ObjectiveValue",
            TraceField::ObjectiveValueEstimate => "ObjectiveValueEstimate",
            TraceField::EtSolver => "ETSolver",
            TraceField::EtSolve => "ETSolve",
            TraceField::EtInterface => "ETInterface",
            TraceField::EtInterfaceOverhead => "ETInterfaceOverhead",
            TraceField::SolverTime => "SolverTime",
            TraceField::NumberOfIterations => "NumberOfIterations",
            TraceField::NumberOfDomainViolations => "NumberOfDomainViolations",
            TraceField::NumberOfNodes => "NumberOfNodes",
        }
    }

    pub fn from_name(name: &str) -> Option<TraceField> {
        TraceField::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            TraceField::InputFileName
            | TraceField::ModelType
            | TraceField::SolverName
            | TraceField::Nlp
            | TraceField::Mip
            | TraceField::OptionFile => FieldKind::Text,
            TraceField::Direction
            | TraceField::NumberOfEquations
            | TraceField::NumberOfVariables
            | TraceField::NumberOfDiscreteVariables
            | TraceField::NumberOfNonZeros
            | TraceField::NumberOfNonlinearNonZeros
            | TraceField::ModelStatus
            | TraceField::SolverStatus
            | TraceField::NumberOfIterations
            | TraceField::NumberOfDomainViolations
            | TraceField::NumberOfNodes => FieldKind::Integer,
            TraceField::JulianDate
            | TraceField::ObjectiveValue
            | TraceField::ObjectiveValueEstimate
            | TraceField::EtSolver
            | TraceField::EtSolve
            | TraceField::EtInterface
            | TraceField::EtInterfaceOverhead
            | TraceField::SolverTime => FieldKind::Real,
        }
    }
}

impl fmt::Display for TraceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single trace cell after typed parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl TraceValue {
    /// Parses `raw` as a value of `kind`. Empty cells, `NA` and anything
    /// that does not parse as the declared type become `None`.
    pub fn parse(kind: FieldKind, raw: &str) -> Option<TraceValue> {
        let raw = raw.trim();
        if raw.is_empty() || raw == NA {
            return None;
        }
        match kind {
            FieldKind::Text => Some(TraceValue::Text(raw.to_string())),
            FieldKind::Integer => raw.parse::<i64>().ok().map(TraceValue::Integer),
            FieldKind::Real => raw.parse::<f64>().ok().map(TraceValue::Real),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            TraceValue::Text(s) => s.clone(),
            TraceValue::Integer(i) => i.to_string(),
            TraceValue::Real(r) if r.is_nan() => NA.to_string(),
            TraceValue::Real(r) => format!("{:?}", r),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub input_file_name: Option<String>,
    pub model_type: Option<String>,
    pub solver_name: Option<String>,
    pub nlp: Option<String>,
    pub mip: Option<String>,
    pub julian_date: Option<f64>,
    pub direction: Option<i64>,
    pub number_of_equations: Option<i64>,
    pub number_of_variables: Option<i64>,
    pub number_of_discrete_variables: Option<i64>,
    pub number_of_non_zeros: Option<i64>,
    pub number_of_nonlinear_non_zeros: Option<i64>,
    pub option_file: Option<String>,
    pub model_status: Option<i64>,
    pub solver_status: Option<i64>,
    pub objective_value: Option<f64>,
    pub objective_value_estimate: Option<f64>,
    pub et_solver: Option<f64>,
    pub et_solve: Option<f64>,
    pub et_interface: Option<f64>,
    pub et_interface_overhead: Option<f64>,
    pub solver_time: Option<f64>,
    pub number_of_iterations: Option<i64>,
    pub number_of_domain_violations: Option<i64>,
    pub number_of_nodes: Option<i64>,
}

impl TraceRecord {
    /// A record carrying the defaults a failed or not-yet-run solve reports:
    /// minimize, solver status 13, model status 12, zero solver time.
    pub fn new(input_file_name: Option<&str>) -> Self {
        let mut record = TraceRecord::empty();
        record.input_file_name = input_file_name.map(str::to_string);
        record.direction = Some(0);
        record.solver_status = Some(SOLVER_STATUS_FAILURE);
        record.model_status = Some(MODEL_STATUS_ERROR_NO_SOLUTION);
        record.solver_time = Some(0.0);
        record
    }

    /// A record with every field null.
    pub fn empty() -> Self {
        TraceRecord {
            input_file_name: None,
            model_type: None,
            solver_name: None,
            nlp: None,
            mip: None,
            julian_date: None,
            direction: None,
            number_of_equations: None,
            number_of_variables: None,
            number_of_discrete_variables: None,
            number_of_non_zeros: None,
            number_of_nonlinear_non_zeros: None,
            option_file: None,
            model_status: None,
            solver_status: None,
            objective_value: None,
            objective_value_estimate: None,
            et_solver: None,
            et_solve: None,
            et_interface: None,
            et_interface_overhead: None,
            solver_time: None,
            number_of_iterations: None,
            number_of_domain_violations: None,
            number_of_nodes: None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.input_file_name.as_deref()
    }

    pub fn get(&self, field: TraceField) -> Option<TraceValue> {
        let text = |v: &Option<String>| v.clone().map(TraceValue::Text);
        let int = |v: &Option<i64>| v.map(TraceValue::Integer);
        let real = |v: &Option<f64>| v.filter(|r| !r.is_nan()).map(TraceValue::Real);
        match field {
            TraceField::InputFileName => text(&self.input_file_name),
            TraceField::ModelType => text(&self.model_type),
            TraceField::SolverName => text(&self.solver_name),
            TraceField::Nlp => text(&self.nlp),
            TraceField::Mip => text(&self.mip),
            TraceField::JulianDate => real(&self.julian_date),
            TraceField::Direction => int(&self.direction),
            TraceField::NumberOfEquations => int(&self.number_of_equations),
            TraceField::NumberOfVariables => int(&self.number_of_variables),
            TraceField::NumberOfDiscreteVariables => int(&self.number_of_discrete_variables),
            TraceField::NumberOfNonZeros => int(&self.number_of_non_zeros),
            TraceField::NumberOfNonlinearNonZeros => int(&self.number_of_nonlinear_non_zeros),
            TraceField::OptionFile => text(&self.option_file),
            TraceField::ModelStatus => int(&self.model_status),
            TraceField::SolverStatus => int(&self.solver_status),
            TraceField::ObjectiveValue => real(&self.objective_value),
            TraceField::ObjectiveValueEstimate => real(&self.objective_value_estimate),
            TraceField::EtSolver => real(&self.et_solver),
            TraceField::EtSolve => real(&self.et_solve),
            TraceField::EtInterface => real(&self.et_interface),
            TraceField::EtInterfaceOverhead => real(&self.et_interface_overhead),
            TraceField::SolverTime => real(&self.solver_time),
            TraceField::NumberOfIterations => int(&self.number_of_iterations),
            TraceField::NumberOfDomainViolations => int(&self.number_of_domain_violations),
            TraceField::NumberOfNodes => int(&self.number_of_nodes),
        }
    }

    /// Stores `value` into `field`. A value whose type does not match the
    /// field's declared kind is stored as null.
    pub fn set(&mut self, field: TraceField, value: Option<TraceValue>) {
        let text = |v: Option<TraceValue>| match v {
            Some(TraceValue::Text(s)) => Some(s),
            _ => None,
        };
        let int = |v: Option<TraceValue>| match v {
            Some(TraceValue::Integer(i)) => Some(i),
            _ => None,
        };
        let real = |v: Option<TraceValue>| match v {
            Some(TraceValue::Real(r)) => Some(r),
            Some(TraceValue::Integer(i)) => Some(i as f64),
            _ => None,
        };
        match field {
            TraceField::InputFileName => self.input_file_name = text(value),
            TraceField::ModelType => self.model_type = text(value),
            TraceField::SolverName => self.solver_name = text(value),
            TraceField::Nlp => self.nlp = text(value),
            TraceField::Mip => self.mip = text(value),
            TraceField::JulianDate => self.julian_date = real(value),
            TraceField::Direction => self.direction = int(value),
            TraceField::NumberOfEquations => self.number_of_equations = int(value),
            TraceField::NumberOfVariables => self.number_of_variables = int(value),
            TraceField::NumberOfDiscreteVariables => {
                self.number_of_discrete_variables = int(value)
            }
            TraceField::NumberOfNonZeros => self.number_of_non_zeros = int(value),
            TraceField::NumberOfNonlinearNonZeros => {
                self.number_of_nonlinear_non_zeros = int(value)
            }
            TraceField::OptionFile => self.option_file = text(value),
            TraceField::ModelStatus => self.model_status = int(value),
            TraceField::SolverStatus => self.solver_status = int(value),
            TraceField::ObjectiveValue => self.objective_value = real(value),
            TraceField::ObjectiveValueEstimate => self.objective_value_estimate = real(value),
            TraceField::EtSolver => self.et_solver = real(value),
            TraceField::EtSolve => self.et_solve = real(value),
            TraceField::EtInterface => self.et_interface = real(value),
            TraceField::EtInterfaceOverhead => self.et_interface_overhead = real(value),
            TraceField::SolverTime => self.solver_time = real(value),
            TraceField::NumberOfIterations => self.number_of_iterations = int(value),
            TraceField::NumberOfDomainViolations => {
                self.number_of_domain_violations = int(value)
            }
            TraceField::NumberOfNodes => self.number_of_nodes = int(value),
        }
    }

    /// Parses a raw trace cell into `field`, coercing failures to null.
    pub fn set_raw(&mut self, field: TraceField, raw: &str) {
        self.set(field, TraceValue::parse(field.kind(), raw));
    }

    /// `ETInterface - SolverTime` when both are known.
    pub fn update_interface_overhead(&mut self) {
        if let (Some(interface), Some(solver)) = (self.et_interface, self.solver_time) {
            self.et_interface_overhead = Some(interface - solver);
        }
    }

    /// The comma-joined data line for this record, without newline.
    pub fn encode_row(&self) -> String {
        TraceField::ALL
            .iter()
            .map(|f| self.get(*f).map(|v| v.encode()).unwrap_or_else(|| NA.to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for TraceRecord {
    fn default() -> Self {
        TraceRecord::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_carries_failure_defaults() {
        let rec = TraceRecord::new(Some("a.gms"));
        assert_eq!(rec.key(), Some("a.gms"));
        assert_eq!(rec.direction, Some(0));
        assert_eq!(rec.solver_status, Some(13));
        assert_eq!(rec.model_status, Some(12));
        assert_eq!(rec.solver_time, Some(0.0));
        assert_eq!(rec.objective_value, None);
    }

    #[test]
    fn field_names_round_trip() {
        for field in TraceField::ALL {
            assert_eq!(TraceField::from_name(field.name()), Some(field));
        }
        assert_eq!(TraceField::from_name("ETIntOverhead"), None);
    }

    #[test]
    fn set_raw_coerces_bad_cells_to_null() {
        let mut rec = TraceRecord::new(Some("a.gms"));
        rec.set_raw(TraceField::SolverStatus, "1.5");
        rec.set_raw(TraceField::ObjectiveValue, "abc");
        rec.set_raw(TraceField::ModelType, "");
        rec.set_raw(TraceField::NumberOfNodes, " 42 ");
        assert_eq!(rec.solver_status, None);
        assert_eq!(rec.objective_value, None);
        assert_eq!(rec.model_type, None);
        assert_eq!(rec.number_of_nodes, Some(42));
    }

    #[test]
    fn encode_row_uses_na_for_null_and_nan() {
        let mut rec = TraceRecord::new(Some("a.gms"));
        rec.objective_value = Some(f64::NAN);
        rec.objective_value_estimate = Some(10.5);
        let row = rec.encode_row();
        let cells: Vec<&str> = row.split(',').collect();
        assert_eq!(cells.len(), TraceField::ALL.len());
        assert_eq!(cells[0], "a.gms");
        assert_eq!(cells[1], "NA");
        assert_eq!(cells[6], "0");
        assert_eq!(cells[13], "12");
        assert_eq!(cells[15], "NA");
        assert_eq!(cells[16], "10.5");
    }

    #[test]
    fn interface_overhead_needs_both_times() {
        let mut rec = TraceRecord::empty();
        rec.et_interface = Some(3.0);
        rec.update_interface_overhead();
        assert_eq!(rec.et_interface_overhead, None);
        rec.solver_time = Some(1.25);
        rec.update_interface_overhead();
        assert_eq!(rec.et_interface_overhead, Some(1.75));
    }
}
