//! Trace records, trace files and reference solutions for solver benchmarks.

mod error;
pub mod fs;
mod listing;
pub mod reader;
pub mod record;
mod store;

pub use error::{Result, TraceError};
pub use reader::{has_complete_row, parse_trace, read_trace_file, ParsedTrace, TraceLayout, TraceRow};
pub use record::{
    FieldKind, TraceField, TraceRecord, TraceValue, MODEL_STATUS_ERROR_NO_SOLUTION,
    MODEL_STATUS_FEASIBLE, MODEL_STATUS_INFEASIBLE, MODEL_STATUS_OPTIMAL, NA,
    SOLVER_STATUS_FAILURE,
};
pub use store::{header_block, TraceStore};

/// File name every working directory and result directory uses for its trace.
pub const TRACE_FILE_NAME: &str = "trace.trc";
