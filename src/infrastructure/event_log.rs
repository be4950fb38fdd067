use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_FILE: &str = "engine.log";

/// JSON-lines log under the workspace `logs/` directory. Logging never
/// propagates errors; a failed append is dropped.
#[derive(Debug)]
pub struct EventLog {
    logs_dir: PathBuf,
    guard: Mutex<()>,
}

impl EventLog {
    pub fn new(logs_dir: impl AsRef<Path>) -> Self {
        Self {
            logs_dir: logs_dir.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn info(&self, operation: &str, message: &str) {
        self.append("info", operation, message);
    }

    pub fn error(&self, operation: &str, message: &str) {
        self.append("error", operation, message);
    }

    fn append(&self, level: &str, operation: &str, message: &str) {
        let Ok(_guard) = self.guard.lock() else {
            return;
        };
        let path = self.logs_dir.join(LOG_FILE);
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "operation": operation,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn appends_json_lines() {
        let dir = tempfile::tempdir().expect("temp dir");
        let log = EventLog::new(dir.path());
        log.info("sync_alarms", "pass complete");
        log.error("reserve_alarm", "facility rejected request");

        let raw = fs::read_to_string(dir.path().join(LOG_FILE)).expect("log file");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("valid json line");
        assert_eq!(first["level"], "info");
        assert_eq!(first["operation"], "sync_alarms");
    }
}
