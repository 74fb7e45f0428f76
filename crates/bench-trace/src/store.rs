use crate::error::{Result, TraceError};
use crate::fs::atomic_write_bytes;
use crate::reader::read_trace_file;
use crate::record::{
    TraceField, TraceRecord, MODEL_STATUS_FEASIBLE, MODEL_STATUS_INFEASIBLE, MODEL_STATUS_OPTIMAL,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Renders the comment block that declares the column order.
pub fn header_block() -> String {
    let mut out = String::from("* Trace Record Definition\n");
    let last = TraceField::ALL.len() - 1;
    for (i, field) in TraceField::ALL.iter().enumerate() {
        out.push_str("* ");
        out.push_str(field.name());
        if i < last {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("*\n");
    out
}

impl TraceRecord {
    /// Writes this record alone, header included, replacing `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut out = header_block();
        out.push_str(&self.encode_row());
        out.push('\n');
        atomic_write_bytes(path, out.as_bytes())
    }
}

/// Trace records keyed by input file name. Iteration, and therefore the
/// written file, is in ascending key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceStore {
    records: BTreeMap<String, TraceRecord>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TraceRecord> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.values()
    }

    /// Inserts `record`, replacing any record with the same key. Records
    /// without a key are rejected.
    pub fn merge(&mut self, record: TraceRecord) -> std::result::Result<(), TraceRecord> {
        match record.input_file_name.clone() {
            Some(key) => {
                self.records.insert(key, record);
                Ok(())
            }
            None => Err(record),
        }
    }

    /// Folds a single engine-written trace file into one record and merges it.
    pub fn merge_trace_file(&mut self, path: &Path) -> Result<()> {
        let mut record = TraceRecord::new(None);
        record.load_trace_file(path)?;
        self.merge(record).map_err(|_| TraceError::MissingKey {
            path: path.to_path_buf(),
        })
    }

    /// Merges every data row of a (possibly multi-row) trace file as its
    /// own record. Returns the number of records merged.
    pub fn load_trace_file(&mut self, path: &Path) -> Result<usize> {
        let parsed = read_trace_file(path)?;
        let mut merged = 0;
        for row in &parsed.rows {
            let mut record = TraceRecord::new(None);
            row.apply_to(&mut record);
            if self.merge(record).is_ok() {
                merged += 1;
            } else {
                tracing::warn!(path = %path.display(), "trace row without InputFileName skipped");
            }
        }
        Ok(merged)
    }

    /// Loads a reference solution file. A missing file leaves the store
    /// untouched.
    pub fn load_reference_solutions(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let text = fs::read_to_string(path).map_err(|e| TraceError::io(path, e))?;
        for line in text.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                continue;
            }
            let name = tokens[1];
            let value = tokens.get(2).and_then(|v| v.parse::<f64>().ok());
            match tokens[0] {
                "=opt=" => {
                    let mut rec = TraceRecord::new(Some(name));
                    rec.model_status = Some(MODEL_STATUS_OPTIMAL);
                    rec.objective_value = value;
                    rec.objective_value_estimate = value;
                    self.records.insert(name.to_string(), rec);
                }
                "=inf=" => {
                    let mut rec = TraceRecord::new(Some(name));
                    rec.model_status = Some(MODEL_STATUS_INFEASIBLE);
                    self.records.insert(name.to_string(), rec);
                }
                "=best=" => {
                    let rec = self.records.entry(name.to_string()).or_insert_with(|| {
                        let mut rec = TraceRecord::new(Some(name));
                        rec.model_status = Some(MODEL_STATUS_FEASIBLE);
                        rec
                    });
                    rec.objective_value = value;
                }
                "=bestdual=" => {
                    let rec = self.records.entry(name.to_string()).or_insert_with(|| {
                        let mut rec = TraceRecord::new(Some(name));
                        rec.model_status = Some(MODEL_STATUS_FEASIBLE);
                        rec
                    });
                    rec.objective_value_estimate = value;
                }
                other => {
                    tracing::debug!(kind = other, "unknown reference solution entry ignored");
                }
            }
        }
        Ok(())
    }

    /// Writes the header followed by one row per record in key order.
    /// An empty store writes nothing.
    pub fn write(&self, path: &Path) -> Result<()> {
        if self.records.is_empty() {
            return Ok(());
        }
        let mut out = header_block();
        for record in self.records.values() {
            out.push_str(&record.encode_row());
            out.push('\n');
        }
        atomic_write_bytes(path, out.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "bench_trace_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    fn record(key: &str, objective: Option<f64>) -> TraceRecord {
        let mut rec = TraceRecord::new(Some(key));
        rec.objective_value = objective;
        rec.solver_status = Some(1);
        rec.model_status = Some(2);
        rec.model_type = Some("MINLP".to_string());
        rec.number_of_variables = Some(17);
        rec.et_interface = Some(0.125);
        rec
    }

    #[test]
    fn merge_is_last_write_wins() {
        let mut store = TraceStore::new();
        store.merge(record("a.gms", Some(1.0))).expect("keyed");
        store.merge(record("a.gms", Some(2.0))).expect("keyed");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a.gms").and_then(|r| r.objective_value), Some(2.0));
        assert!(store.merge(TraceRecord::new(None)).is_err());
    }

    #[test]
    fn write_then_reload_preserves_every_field() {
        let dir = scratch_dir("roundtrip");
        let path = dir.join("trace.trc");
        let mut store = TraceStore::new();
        store.merge(record("c.gms", Some(-1.5e-7))).expect("keyed");
        store.merge(record("a.gms", None)).expect("keyed");
        let mut nan = record("b.gms", Some(f64::NAN));
        nan.objective_value_estimate = Some(1e300);
        store.merge(nan).expect("keyed");
        store.write(&path).expect("write");

        let mut reloaded = TraceStore::new();
        assert_eq!(reloaded.load_trace_file(&path).expect("load"), 3);
        for field in TraceField::ALL {
            for key in ["a.gms", "c.gms"] {
                assert_eq!(
                    reloaded.get(key).expect("present").get(field),
                    store.get(key).expect("present").get(field),
                    "{} differs for {}",
                    field,
                    key
                );
            }
        }
        let b = reloaded.get("b.gms").expect("present");
        assert_eq!(b.objective_value, None);
        assert_eq!(b.objective_value_estimate, Some(1e300));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn written_rows_are_sorted_by_key() {
        let dir = scratch_dir("sorted");
        let path = dir.join("trace.trc");
        let mut store = TraceStore::new();
        for key in ["zeta.gms", "alpha.gms", "mid.gms", "beta.gms"] {
            store.merge(record(key, Some(1.0))).expect("keyed");
        }
        store.write(&path).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        let keys: Vec<&str> = text
            .lines()
            .filter(|l| !l.starts_with('*'))
            .map(|l| l.split(',').next().unwrap_or(""))
            .collect();
        assert_eq!(keys, vec!["alpha.gms", "beta.gms", "mid.gms", "zeta.gms"]);
        assert_eq!(
            text.lines().filter(|l| l.contains("Trace Record Definition")).count(),
            1
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn empty_store_writes_nothing() {
        let dir = scratch_dir("empty");
        let path = dir.join("trace.trc");
        TraceStore::new().write(&path).expect("noop");
        assert!(!path.exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn header_block_matches_declaration_order() {
        let header = header_block();
        let lines: Vec<&str> = header.lines().collect();
        assert_eq!(lines[0], "* Trace Record Definition");
        assert_eq!(lines[1], "* InputFileName,");
        assert_eq!(lines[25], "* NumberOfNodes");
        assert_eq!(lines[26], "*");
    }

    #[test]
    fn reference_solutions_cover_all_kinds() {
        let dir = scratch_dir("solu");
        let path = dir.join("lib.solu");
        fs::write(
            &path,
            "=opt= a 10.5\n=inf= b\n=best= c 3\n=bestdual= c 1\n=bestdual= d 7\n=opt= e\nbad\n=best= a 12\n",
        )
        .expect("write solu");
        let mut store = TraceStore::new();
        store.load_reference_solutions(&path).expect("load");

        let a = store.get("a").expect("a");
        assert_eq!(a.model_status, Some(1));
        assert_eq!(a.objective_value, Some(12.0));
        assert_eq!(a.objective_value_estimate, Some(10.5));
        assert_eq!(store.get("b").and_then(|r| r.model_status), Some(4));
        let c = store.get("c").expect("c");
        assert_eq!(c.model_status, Some(2));
        assert_eq!(c.objective_value, Some(3.0));
        assert_eq!(c.objective_value_estimate, Some(1.0));
        let d = store.get("d").expect("d");
        assert_eq!(d.objective_value, None);
        assert_eq!(d.objective_value_estimate, Some(7.0));
        assert_eq!(store.get("e").and_then(|r| r.objective_value), None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_reference_file_is_silent() {
        let mut store = TraceStore::new();
        store
            .load_reference_solutions(Path::new("/nonexistent/bench/file.solu"))
            .expect("missing file is fine");
        assert!(store.is_empty());
    }

    #[test]
    fn merge_trace_file_folds_engine_output() {
        let dir = scratch_dir("engine");
        let path = dir.join("trace.trc");
        fs::write(
            &path,
            "* Trace Record Definition\n* InputFileName,SolverName,SolverStatus,ModelStatus,SolverTime\n*\nx.gms,BARON,1,1,0.5\n",
        )
        .expect("write");
        let mut store = TraceStore::new();
        store.merge_trace_file(&path).expect("merge");
        let rec = store.get("x.gms").expect("merged");
        assert_eq!(rec.solver_name.as_deref(), Some("BARON"));
        assert_eq!(rec.solver_time, Some(0.5));
        assert_eq!(rec.direction, Some(0));
        let _ = fs::remove_dir_all(dir);
    }
}
