//! Child output handling
//!
//! Dapr binaries log either JSON objects (`--log-as-json`) or logfmt lines.
//! Each line is parsed, re-emitted through `tracing` at the child's level and
//! scanned once for the runtime version banner.

use crate::domain::ports::{OutputStream, ProcessOutputHandler};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl ChildLogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "fatal" | "panic" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One parsed line of child output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLogRecord {
    pub level: ChildLogLevel,
    pub message: String,
    pub scope: Option<String>,
    pub version: Option<String>,
}

impl ChildLogRecord {
    /// Parse a JSON or logfmt line; anything else becomes a plain record at `fallback`
    pub fn parse(line: &str, fallback: ChildLogLevel) -> Self {
        let trimmed = line.trim();
        let fields = if trimmed.starts_with('{') {
            parse_json_fields(trimmed)
        } else {
            parse_logfmt_fields(trimmed)
        };

        match fields {
            Some(fields) if fields.contains_key("msg") => {
                let message = fields.get("msg").cloned().unwrap_or_default();
                let version = fields
                    .get("ver")
                    .filter(|v| !v.is_empty() && v.as_str() != "unknown")
                    .cloned()
                    .or_else(|| version_from_banner(&message));
                Self {
                    level: fields
                        .get("level")
                        .and_then(|l| ChildLogLevel::parse(l))
                        .unwrap_or(fallback),
                    scope: fields.get("scope").cloned(),
                    version,
                    message,
                }
            }
            _ => Self {
                level: fallback,
                message: trimmed.to_string(),
                scope: None,
                version: version_from_banner(trimmed),
            },
        }
    }
}

/// Extract `X` from a `... -- version X -- ...` banner
pub fn version_from_banner(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("-- version ")?;
    let version = rest.split_whitespace().next()?;
    (!version.is_empty() && version != "--").then(|| version.to_string())
}

fn parse_json_fields(line: &str) -> Option<HashMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let object = value.as_object()?;
    Some(
        object
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect(),
    )
}

/// Parse `key=value key="quoted value"` pairs; `None` when no pair is found
fn parse_logfmt_fields(line: &str) -> Option<HashMap<String, String>> {
    let mut fields = HashMap::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        if key.is_empty() {
            break;
        }
        if chars.peek() != Some(&'=') {
            // Bare word: not logfmt
            return None;
        }
        chars.next();

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                match c {
                    _ if escaped => {
                        value.push(c);
                        escaped = false;
                    }
                    '\\' => escaped = true,
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        fields.insert(key, value);
    }

    (!fields.is_empty()).then_some(fields)
}

/// Re-logs child output and reports the first detected version
pub struct LoggingOutputHandler {
    process_name: String,
    version_tx: mpsc::UnboundedSender<String>,
    version_seen: AtomicBool,
}

impl LoggingOutputHandler {
    pub fn new(process_name: impl Into<String>, version_tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            process_name: process_name.into(),
            version_tx,
            version_seen: AtomicBool::new(false),
        }
    }
}

impl ProcessOutputHandler for LoggingOutputHandler {
    fn on_line(&self, stream: OutputStream, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let fallback = match stream {
            OutputStream::Stdout => ChildLogLevel::Info,
            OutputStream::Stderr => ChildLogLevel::Warn,
        };
        let record = ChildLogRecord::parse(line, fallback);
        let process = self.process_name.as_str();
        let scope = record.scope.as_deref().unwrap_or("");

        match record.level {
            ChildLogLevel::Debug => debug!(process, scope, "{}", record.message),
            ChildLogLevel::Info => info!(process, scope, "{}", record.message),
            ChildLogLevel::Warn => warn!(process, scope, "{}", record.message),
            ChildLogLevel::Error => error!(process, scope, "{}", record.message),
        }

        if let Some(version) = record.version {
            if !self.version_seen.swap(true, Ordering::SeqCst) {
                // Receiver is gone once the supervisor moved on to another generation
                let _ = self.version_tx.send(version);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_line() {
        let line = r#"{"app_id":"orders","level":"info","msg":"starting Dapr Runtime -- version 1.14.4 -- commit 8e5a1a5","scope":"dapr.runtime","type":"log","ver":"1.14.4"}"#;
        let record = ChildLogRecord::parse(line, ChildLogLevel::Info);

        assert_eq!(record.level, ChildLogLevel::Info);
        assert_eq!(record.scope.as_deref(), Some("dapr.runtime"));
        assert_eq!(record.version.as_deref(), Some("1.14.4"));
        assert!(record.message.starts_with("starting Dapr Runtime"));
    }

    #[test]
    fn test_parse_logfmt_line() {
        let line = r#"time="2024-05-01T10:00:00Z" level=warning msg="app channel is not \"ready\"" app_id=orders scope=dapr.runtime"#;
        let record = ChildLogRecord::parse(line, ChildLogLevel::Info);

        assert_eq!(record.level, ChildLogLevel::Warn);
        assert_eq!(record.message, "app channel is not \"ready\"");
        assert_eq!(record.scope.as_deref(), Some("dapr.runtime"));
        assert_eq!(record.version, None);
    }

    #[test]
    fn test_logfmt_banner_version() {
        let line = r#"level=info msg="starting Dapr Runtime -- version 1.13.0 -- commit abc" ver=unknown"#;
        let record = ChildLogRecord::parse(line, ChildLogLevel::Info);
        assert_eq!(record.version.as_deref(), Some("1.13.0"));
    }

    #[test]
    fn test_plain_line_uses_fallback() {
        let record = ChildLogRecord::parse("panic: something broke", ChildLogLevel::Warn);
        assert_eq!(record.level, ChildLogLevel::Warn);
        assert_eq!(record.message, "panic: something broke");
        assert_eq!(record.scope, None);
    }

    #[test]
    fn test_malformed_json_is_plain() {
        let record = ChildLogRecord::parse("{not json", ChildLogLevel::Info);
        assert_eq!(record.message, "{not json");
    }

    #[test]
    fn test_version_from_banner() {
        assert_eq!(
            version_from_banner("starting Placement Service -- version 1.14.1 -- commit x").as_deref(),
            Some("1.14.1")
        );
        assert_eq!(version_from_banner("no banner here"), None);
        assert_eq!(version_from_banner("-- version "), None);
    }

    #[test]
    fn test_handler_reports_version_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = LoggingOutputHandler::new("daprd", tx);

        handler.on_line(OutputStream::Stdout, "level=info msg=\"-- version 1.0.0 --\"");
        handler.on_line(OutputStream::Stdout, "level=info msg=\"-- version 2.0.0 --\"");
        handler.on_line(OutputStream::Stderr, "");

        assert_eq!(rx.try_recv().unwrap(), "1.0.0");
        assert!(rx.try_recv().is_err());
    }
}
