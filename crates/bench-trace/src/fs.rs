use crate::error::{Result, TraceError};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| TraceError::io(path, e))
}

/// Writes `bytes` to a sibling temp file and renames it over `path`, so
/// readers never observe a half-written file.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}.{}", name, pid, ts));
    let mut file = fs::File::create(&tmp).map_err(|e| TraceError::io(&tmp, e))?;
    file.write_all(bytes).map_err(|e| TraceError::io(&tmp, e))?;
    file.sync_all().map_err(|e| TraceError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| TraceError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_file_and_leaves_no_temp_sibling() {
        let dir = std::env::temp_dir().join(format!(
            "bench_fs_atomic_{}_{}",
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        let path = dir.join("nested").join("trace.trc");
        atomic_write_bytes(&path, b"first\n").expect("first write");
        atomic_write_bytes(&path, b"second\n").expect("second write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second\n");
        let leftovers: Vec<_> = fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
        let _ = fs::remove_dir_all(dir);
    }
}
