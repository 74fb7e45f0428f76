//! Fallback extraction of solve attributes from an engine listing file,
//! used when a bridge did not leave a trace file behind.

use crate::error::{Result, TraceError};
use crate::record::TraceRecord;
use std::fs;
use std::path::Path;

fn first_integer(line: &str) -> Option<&str> {
    let start = line.find(|c: char| c.is_ascii_digit())?;
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

impl TraceRecord {
    pub fn load_listing(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let text = fs::read_to_string(path).map_err(|e| TraceError::io(path, e))?;
        self.apply_listing(&text);
        Ok(())
    }

    pub fn apply_listing(&mut self, text: &str) {
        for line in text.lines() {
            if line.starts_with("**** SOLVER STATUS") {
                if let Some(code) = first_integer(line) {
                    self.solver_status = code.parse().ok();
                }
            }
            if line.starts_with("**** MODEL STATUS") {
                if let Some(code) = first_integer(line) {
                    self.model_status = code.parse().ok();
                }
            }
            if let Some(type_at) = line.find("TYPE") {
                if line[type_at..].contains("DIRECTION") {
                    let tokens: Vec<&str> = line.split_whitespace().collect();
                    if let Some(model_type) = tokens.get(1) {
                        self.model_type = Some(model_type.to_string());
                    }
                    match tokens.get(3).copied() {
                        Some("MINIMIZE") => self.direction = Some(0),
                        Some("MAXIMIZE") => self.direction = Some(1),
                        _ => {}
                    }
                }
            }
            if line.contains("RESOURCE USAGE, LIMIT") {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                self.solver_time = tokens.get(3).and_then(|t| t.parse().ok());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_sets_status_type_and_time() {
        let listing = "\
               S O L V E      S U M M A R Y

     MODEL   m                   OBJECTIVE  z
     TYPE    MINLP               DIRECTION  MAXIMIZE
     SOLVER  BARON               FROM LINE  42

**** SOLVER STATUS     1 Normal Completion
**** MODEL STATUS      8 Integer Solution
**** OBJECTIVE VALUE               12.0000

 RESOURCE USAGE, LIMIT          0.731      1000.000
";
        let mut rec = TraceRecord::new(Some("m.py"));
        rec.apply_listing(listing);
        assert_eq!(rec.solver_status, Some(1));
        assert_eq!(rec.model_status, Some(8));
        assert_eq!(rec.model_type.as_deref(), Some("MINLP"));
        assert_eq!(rec.direction, Some(1));
        assert_eq!(rec.solver_time, Some(0.731));
    }

    #[test]
    fn missing_listing_is_a_noop() {
        let mut rec = TraceRecord::new(Some("m.py"));
        rec.load_listing(Path::new("/nonexistent/output.lst"))
            .expect("missing listing is fine");
        assert_eq!(rec, TraceRecord::new(Some("m.py")));
    }
}
