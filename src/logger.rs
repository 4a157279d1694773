use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::diff::diff_json;

pub enum MessageLogMode {
    Full,
    Diffed,
}

/// NDJSON record of API traffic, dispatched commands and telemetry snapshots.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_snapshot: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous_snapshot: None,
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, body: Option<&Value>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, path: &str, status: u16) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "path": path,
            "status": status,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, capability: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "capability": capability,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_snapshot(&mut self, snapshot: &Value) {
        let entry = match (&self.mode, &self.previous_snapshot) {
            (MessageLogMode::Diffed, Some(prev)) => {
                let mut changes = Vec::new();
                diff_json(prev, snapshot, "", &mut changes);
                let change_entries: Vec<Value> = changes
                    .iter()
                    .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                    .collect();
                json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "snapshot",
                    "changes": change_entries,
                })
            }
            (MessageLogMode::Diffed, None) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "snapshot",
                "full": true,
                "body": snapshot,
            }),
            (MessageLogMode::Full, _) => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "snapshot",
                "body": snapshot,
            }),
        };
        self.write_line(&entry);
        self.previous_snapshot = Some(snapshot.clone());
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
