use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines diagnostics sink shared by every compile of one compiler.
#[derive(Clone)]
pub struct DiagnosticsLog {
    inner: Arc<Mutex<DiagnosticsState>>,
}

struct DiagnosticsState {
    writer: BufWriter<File>,
    counters: BTreeMap<String, u64>,
}

impl std::fmt::Debug for DiagnosticsLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsLog").finish_non_exhaustive()
    }
}

impl DiagnosticsLog {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DiagnosticsState {
                writer: BufWriter::new(file),
                counters: BTreeMap::new(),
            })),
        })
    }

    /// Writes one `{"type": kind, ...fields}` line. Non-object `fields` land under `"data"`.
    pub fn log_event(&self, kind: &str, fields: Value) {
        let mut line = Map::new();
        line.insert("type".to_string(), Value::from(kind));
        match fields {
            Value::Object(map) => line.extend(map),
            Value::Null => {}
            other => {
                line.insert("data".to_string(), other);
            }
        }
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{}", Value::Object(line));
        }
    }

    pub fn log_span_ms(&self, name: &str, report_id: &str, ms: f64) {
        self.log_event(
            "diag.span",
            json!({ "name": name, "report_id": report_id, "unit": "ms", "ms": ms }),
        );
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    /// Writes the accumulated counters and resets them.
    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let counters = std::mem::take(&mut state.counters);
            let line = json!({
                "type": "diag.summary",
                "context": context,
                "counts": counters,
            });
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .expect("read log")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn events_and_summary_are_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("diag.jsonl");
        let log = DiagnosticsLog::new(&path).expect("log");
        log.log_event("lint.warning", json!({ "message": "table 1 missing header row" }));
        log.log_event("note", Value::from("free text"));
        log.log_span_ms("substitute", "r-1", 1.5);
        log.increment("compile.ok", 1);
        log.increment("compile.ok", 2);
        log.emit_summary("batch");
        log.emit_summary("empty");
        log.flush();

        let lines = lines(&path);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0]["type"], "lint.warning");
        assert_eq!(lines[0]["message"], "table 1 missing header row");
        assert_eq!(lines[1]["data"], "free text");
        assert_eq!(lines[2]["name"], "substitute");
        assert_eq!(lines[3]["counts"]["compile.ok"], 3);
        assert_eq!(lines[4]["counts"], json!({}));
    }

    #[test]
    fn clones_share_one_sink() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("diag.jsonl");
        let log = DiagnosticsLog::new(&path).expect("log");
        let other = log.clone();
        std::thread::spawn(move || other.increment("renders", 1))
            .join()
            .expect("join");
        log.increment("renders", 1);
        log.emit_summary("threads");
        log.flush();
        assert_eq!(lines(&path)[0]["counts"]["renders"], 2);
    }
}
