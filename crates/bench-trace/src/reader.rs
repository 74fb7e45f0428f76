//! Header-driven trace file reader.
//!
//! A trace file declares its columns in a comment block introduced by
//! `* Trace Record Definition` and closed by an empty `*` line. Data lines
//! are then read against that column table, either several comma-separated
//! cells per line (layout 3) or exactly one cell per line (layout 5, flagged
//! by header lines ending in a literal `\n`).

use crate::error::{Result, TraceError};
use crate::record::{TraceField, TraceRecord};
use std::fs;
use std::path::Path;

const DEFINITION_MARKER: &str = "Trace Record Definition";
const SKIPPED_MARKERS: [&str; 2] = ["GamsSolve", "GamsExit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLayout {
    /// Comma separated cells, one record per line.
    CommaSeparated,
    /// One cell per line.
    CellPerLine,
}

/// One data record as read from a file: the raw cells in file order,
/// already resolved against the declared header. Columns the reader does
/// not know are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRow {
    pub cells: Vec<(TraceField, String)>,
    /// False when the file ended before every declared column was seen.
    pub complete: bool,
}

impl TraceRow {
    /// Overlays every cell of this row onto `record`.
    pub fn apply_to(&self, record: &mut TraceRecord) {
        for (field, raw) in &self.cells {
            record.set_raw(*field, raw);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrace {
    pub header: Vec<String>,
    pub layout: TraceLayout,
    pub rows: Vec<TraceRow>,
}

pub fn parse_trace(text: &str) -> ParsedTrace {
    let mut header: Vec<String> = Vec::new();
    let mut columns: Vec<Option<TraceField>> = Vec::new();
    let mut layout = TraceLayout::CommaSeparated;
    let mut in_definition = false;
    let mut cursor = 0usize;
    let mut rows = Vec::new();
    let mut current: Option<TraceRow> = None;

    for line in text.lines() {
        if let Some(body) = line.strip_prefix('*') {
            if SKIPPED_MARKERS.iter().any(|m| line.contains(m)) {
                continue;
            }
            if line.contains(DEFINITION_MARKER) {
                in_definition = true;
                continue;
            }
            if !in_definition {
                continue;
            }
            let mut body = body.trim();
            if body.is_empty() {
                in_definition = false;
                cursor = 0;
                continue;
            }
            if let Some(rest) = body.strip_suffix("\\n") {
                layout = TraceLayout::CellPerLine;
                body = rest.trim_end();
            }
            body = body.trim_start_matches(',').trim_end_matches(',');
            for key in body.split(',') {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                columns.push(TraceField::from_name(key));
                header.push(key.to_string());
            }
            continue;
        }

        if columns.is_empty() {
            tracing::debug!("trace data line before any column definition, ignored");
            continue;
        }

        let cells: Vec<&str> = match layout {
            TraceLayout::CommaSeparated => {
                if line.trim().is_empty() {
                    continue;
                }
                line.split(',').collect()
            }
            TraceLayout::CellPerLine => vec![line],
        };

        for cell in cells {
            let row = current.get_or_insert_with(|| TraceRow {
                cells: Vec::with_capacity(columns.len()),
                complete: false,
            });
            if let Some(field) = columns[cursor] {
                row.cells.push((field, cell.trim().to_string()));
            }
            cursor += 1;
            if cursor == columns.len() {
                cursor = 0;
                if let Some(mut done) = current.take() {
                    done.complete = true;
                    rows.push(done);
                }
            }
        }
    }
    if let Some(partial) = current.take() {
        rows.push(partial);
    }

    ParsedTrace {
        header,
        layout,
        rows,
    }
}

pub fn read_trace_file(path: &Path) -> Result<ParsedTrace> {
    let text = fs::read_to_string(path).map_err(|e| TraceError::io(path, e))?;
    Ok(parse_trace(&text))
}

/// True when `path` exists and holds at least one complete data record.
pub fn has_complete_row(path: &Path) -> bool {
    match read_trace_file(path) {
        Ok(parsed) => parsed.rows.iter().any(|r| r.complete),
        Err(_) => false,
    }
}

impl TraceRecord {
    /// Overlays the contents of a trace file onto this record. When the
    /// file holds several rows they are applied in order, so the last one
    /// wins for every column it carries.
    pub fn load_trace_file(&mut self, path: &Path) -> Result<()> {
        let parsed = read_trace_file(path)?;
        for row in &parsed.rows {
            row.apply_to(self);
        }
        Ok(())
    }
}
