//! Structured output
//!
//! Two machine-readable surfaces: a single JSON envelope on stdout when
//! `--json` is set, and an NDJSON progress stream when `--events` is set.
//! Both are versioned independently of the CLI so GUI consumers can pin
//! against the schema rather than the binary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Version of the envelope and event schemas
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Envelope
// ============================================================================

/// The one-object-per-invocation result contract
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub schema_version: u32,
    pub cli_version: &'static str,
    pub command: String,
    pub run_id: String,
    pub timestamp_utc: DateTime<Utc>,
    /// False for fatal errors and for partial failures alike
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Non-null iff the run failed fatally; partial failures keep this
    /// null and describe themselves in `data`
    pub error: Option<ErrorObject>,
}

/// Structured error payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_key: Option<String>,
}

impl Envelope {
    pub fn ok(command: &str, run_id: &str, success: bool, data: Value) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            cli_version: env!("CARGO_PKG_VERSION"),
            command: command.to_string(),
            run_id: run_id.to_string(),
            timestamp_utc: Utc::now(),
            success,
            data: Some(data),
            error: None,
        }
    }

    pub fn fatal(command: &str, run_id: &str, error: ErrorObject) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            cli_version: env!("CARGO_PKG_VERSION"),
            command: command.to_string(),
            run_id: run_id.to_string(),
            timestamp_utc: Utc::now(),
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn print(&self) {
        // Envelope serialization cannot fail: every field is a plain value
        if let Ok(rendered) = serde_json::to_string_pretty(self) {
            println!("{rendered}");
        }
    }
}

/// Map a fatal error chain to the structured error payload
pub fn error_object(err: &anyhow::Error) -> ErrorObject {
    let code = error_code(err);
    let detail = err.chain().nth(1).map(std::string::ToString::to_string);
    ErrorObject {
        message: err.to_string(),
        detail,
        remediation: remediation(code).map(String::from),
        docs_key: Some(format!("errors/{code}")),
        code: code.to_string(),
    }
}

fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<engine::Error>() {
        return e.code();
    }
    if let Some(e) = err.downcast_ref::<manifest::Error>() {
        return e.code();
    }
    if let Some(e) = err.downcast_ref::<state::Error>() {
        return e.code();
    }
    if let Some(e) = err.downcast_ref::<restore::Error>() {
        return e.code();
    }
    if let Some(e) = err.downcast_ref::<std::io::Error>() {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            return "PermissionDenied";
        }
    }
    "InternalError"
}

fn remediation(code: &str) -> Option<&'static str> {
    match code {
        "ManifestNotFound" => Some("check the --manifest path and --manifests-root"),
        "ManifestParseError" => Some("fix the syntax error reported in the message"),
        "ManifestValidationError" => Some("the manifest must declare version 1 and an apps list"),
        "PlanNotFound" => Some("generate a plan first with 'forja plan'"),
        "DriverUnavailable" => Some("install the package-manager backend or pick another driver"),
        "PermissionDenied" => Some("re-run with sufficient privileges"),
        "SchemaIncompatible" => Some("this state file was written by a newer version"),
        _ => None,
    }
}

// ============================================================================
// NDJSON events
// ============================================================================

/// Streaming progress sink: one JSON object per line
///
/// The first event of a run is always `phase` and the last is always
/// `summary`; `item` and `artifact` events land in between. A disabled
/// sink swallows everything.
pub struct EventSink {
    writer: Option<Box<dyn Write>>,
}

impl EventSink {
    /// `None` disables the sink; `-` streams to stderr; anything else is
    /// a file path, truncated on open
    pub fn open(target: Option<&str>) -> anyhow::Result<Self> {
        let writer: Option<Box<dyn Write>> = match target {
            None => None,
            Some("-") => Some(Box::new(std::io::stderr())),
            Some(path) => Some(Box::new(File::create(Path::new(path))?)),
        };
        Ok(Self { writer })
    }

    pub fn phase(&mut self, name: &str) {
        self.emit("phase", json!({ "name": name }));
    }

    pub fn item(&mut self, fields: Value) {
        self.emit("item", fields);
    }

    pub fn artifact(&mut self, kind: &str, path: &Path) {
        self.emit("artifact", json!({ "kind": kind, "path": path.display().to_string() }));
    }

    pub fn summary(&mut self, fields: Value) {
        self.emit("summary", fields);
    }

    fn emit(&mut self, event: &str, mut fields: Value) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let mut line = json!({
            "version": SCHEMA_VERSION,
            "event": event,
            "timestamp": Utc::now(),
        });
        if let (Some(base), Some(extra)) = (line.as_object_mut(), fields.as_object_mut()) {
            base.append(extra);
        }
        // A broken pipe on the event stream must not fail the run
        if writeln!(writer, "{line}").is_err() {
            log::warn!("event stream write failed, disabling sink");
            self.writer = None;
        }
    }
}

// ============================================================================
// Exit codes
// ============================================================================

/// Exit code for a completed (non-fatal) run
pub fn completion_code(success: bool) -> i32 {
    if success { 0 } else { 2 }
}

/// Exit code for a fatal error
pub const FATAL_CODE: i32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_success_has_null_error() {
        let env = Envelope::ok("apply", "20250101-120000", true, json!({ "counts": {} }));
        let v: Value = serde_json::to_value(&env).unwrap();
        assert_eq!(v["schemaVersion"], 1);
        assert_eq!(v["command"], "apply");
        assert_eq!(v["success"], true);
        assert!(v["error"].is_null());
        assert!(v["data"].is_object());
    }

    #[test]
    fn partial_failure_keeps_error_null() {
        let env = Envelope::ok("apply", "r", false, json!({ "counts": { "failed": 1 } }));
        let v: Value = serde_json::to_value(&env).unwrap();
        assert_eq!(v["success"], false);
        assert!(v["error"].is_null());
        assert_eq!(completion_code(false), 2);
    }

    #[test]
    fn fatal_error_maps_code_and_remediation() {
        let err = anyhow::Error::from(engine::Error::PlanNotFound("p.json".into()));
        let obj = error_object(&err);
        assert_eq!(obj.code, "PlanNotFound");
        assert!(obj.remediation.unwrap().contains("forja plan"));
        assert_eq!(obj.docs_key.as_deref(), Some("errors/PlanNotFound"));
    }

    #[test]
    fn unknown_errors_fall_back_to_internal() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(error_object(&err).code, "InternalError");
    }

    #[test]
    fn events_stream_one_object_per_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("events.ndjson");
        let mut sink = EventSink::open(Some(path.to_str().unwrap())).unwrap();
        sink.phase("resolve");
        sink.item(json!({ "appId": "git", "status": "installed" }));
        sink.summary(json!({ "total": 1 }));
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "phase");
        assert_eq!(lines[1]["appId"], "git");
        assert_eq!(lines[2]["event"], "summary");
        assert_eq!(lines[0]["version"], 1);
    }

    #[test]
    fn disabled_sink_is_inert() {
        let mut sink = EventSink::open(None).unwrap();
        sink.phase("resolve");
        sink.summary(json!({}));
    }
}
