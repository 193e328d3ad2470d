//! # Audit Logging
//!
//! Append-only JSONL record of every handled request: method, decision
//! (allow/deny/error), the affected path or invoked tool, and the request
//! duration. Disabled when no log file is configured. An audit write failure
//! is logged and never fails the request that produced it.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Failed to create audit log directory: {0}")]
    DirectoryCreation(String),
    #[error("Failed to open audit log: {0}")]
    Open(#[from] std::io::Error),
}

/// One audit log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: String,
    #[serde(rename = "reqId")]
    pub req_id: String,
    pub method: String,
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-request context carried from dispatch to the audit sink.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub req_id: String,
    pub method: String,
    pub start_time: SystemTime,
}

impl AuditContext {
    pub fn new(req_id: String, method: String) -> Self {
        Self {
            req_id,
            method,
            start_time: SystemTime::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().unwrap_or_default().as_millis() as u64
    }
}

/// Optional detail fields attached to an audit entry.
#[derive(Debug, Default)]
pub struct AuditDetails {
    pub tool: Option<String>,
    pub path: Option<String>,
}

/// Thread-safe append-only audit writer.
pub struct Auditor {
    log_file: Option<PathBuf>,
    writer: Mutex<Option<std::fs::File>>,
}

impl Auditor {
    /// Open the audit sink; `None` disables auditing entirely.
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, AuditError> {
        let writer = match &log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| AuditError::DirectoryCreation(e.to_string()))?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Mutex::new(Some(file))
            }
            None => Mutex::new(None),
        };

        Ok(Auditor { log_file, writer })
    }

    pub fn log_allow(&self, ctx: &AuditContext, details: AuditDetails) {
        self.write_entry(ctx, "allow", details, None);
    }

    pub fn log_deny(&self, ctx: &AuditContext, reason: &str, details: AuditDetails) {
        self.write_entry(ctx, "deny", details, Some(reason.to_string()));
    }

    pub fn log_error(&self, ctx: &AuditContext, error: &str, details: AuditDetails) {
        self.write_entry(ctx, "error", details, Some(error.to_string()));
    }

    fn write_entry(
        &self,
        ctx: &AuditContext,
        decision: &str,
        details: AuditDetails,
        error: Option<String>,
    ) {
        let entry = AuditEntry {
            ts: format_timestamp(ctx.start_time),
            req_id: ctx.req_id.clone(),
            method: ctx.method.clone(),
            decision: decision.to_string(),
            tool: details.tool,
            path: details.path,
            duration_ms: ctx.elapsed_ms(),
            error,
        };

        match serde_json::to_string(&entry) {
            Ok(json) => {
                debug!("audit: {}", json);
                if let Ok(mut writer_guard) = self.writer.lock() {
                    self.maybe_rotate(&mut writer_guard);
                    if let Some(ref mut writer) = *writer_guard {
                        if let Err(e) = writeln!(writer, "{}", json) {
                            error!("Failed to write audit log: {}", e);
                        } else if let Err(e) = writer.flush() {
                            error!("Failed to flush audit log: {}", e);
                        }
                    }
                } else {
                    error!("Failed to acquire audit log writer lock");
                }
            }
            Err(e) => error!("Failed to serialize audit entry: {}", e),
        }
    }

    fn maybe_rotate(&self, writer_guard: &mut Option<std::fs::File>) {
        const MAX_BYTES: u64 = 10 * 1024 * 1024;
        let Some(log_path) = self.log_file.as_ref() else {
            return;
        };
        let Some(writer) = writer_guard.as_ref() else {
            return;
        };
        if let Ok(meta) = writer.metadata() {
            if meta.len() < MAX_BYTES {
                return;
            }
        }
        *writer_guard = None;
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let stem = log_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audit");
        let ext = log_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("log");
        let rotated = log_path.with_file_name(format!("{}.{}.{}", stem, ts, ext));
        let _ = std::fs::rename(log_path, &rotated);
        if let Ok(new_file) = OpenOptions::new().create(true).append(true).open(log_path) {
            *writer_guard = Some(new_file);
        }
    }
}

/// RFC 3339 timestamp for audit lines.
fn format_timestamp(time: SystemTime) -> String {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => {
            let datetime = chrono::DateTime::<chrono::Utc>::from_timestamp(
                duration.as_secs() as i64,
                duration.subsec_nanos(),
            )
            .unwrap_or_default();
            datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
        }
        Err(_) => "1970-01-01T00:00:00.000Z".to_string(),
    }
}
