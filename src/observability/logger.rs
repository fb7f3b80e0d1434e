//! Structured JSON logger
//!
//! - One log line = one event
//! - Event name first, then severity, then fields in alphabetical order
//! - Synchronous, no buffering
//! - Events below the configured minimum severity are dropped

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::events::Event;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
enum Sink {
    /// stdout, stderr for ERROR and FATAL
    Console,
    /// Captured lines, for tests and embedding applications
    Memory(Arc<Mutex<Vec<String>>>),
}

/// A structured logger that outputs JSON lines
#[derive(Debug, Clone)]
pub struct Logger {
    min_severity: Severity,
    sink: Sink,
}

impl Default for Logger {
    fn default() -> Self {
        Self::console(Severity::Info)
    }
}

impl Logger {
    /// Logger writing to the process console
    pub fn console(min_severity: Severity) -> Self {
        Self {
            min_severity,
            sink: Sink::Console,
        }
    }

    /// Logger keeping every line in memory
    pub fn in_memory(min_severity: Severity) -> Self {
        Self {
            min_severity,
            sink: Sink::Memory(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Lines captured by an in-memory logger, in emission order
    pub fn captured(&self) -> Vec<String> {
        match &self.sink {
            Sink::Memory(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            Sink::Console => Vec::new(),
        }
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }

    /// Log an event with the given severity and fields
    pub fn log(&self, severity: Severity, event: Event, fields: &[(&str, &str)]) {
        if !self.enabled(severity) {
            return;
        }
        let line = format_line(severity, event.as_str(), fields);
        match &self.sink {
            Sink::Console if severity >= Severity::Error => {
                write_line(&mut io::stderr(), &line);
            }
            Sink::Console => write_line(&mut io::stdout(), &line),
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
        }
    }

    /// Log at TRACE level
    pub fn trace(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Error, event, fields);
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) {
    // One write per line
    let _ = writer.write_all(line.as_bytes());
    let _ = writer.write_all(b"\n");
    let _ = writer.flush();
}

/// Renders one JSON object; fields sorted by key
fn format_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(256);

    output.push('{');

    output.push_str("\"event\":\"");
    escape_json_string(&mut output, event);
    output.push('"');

    output.push_str(",\"severity\":\"");
    output.push_str(severity.as_str());
    output.push('"');

    let mut sorted_fields: Vec<_> = fields.iter().collect();
    sorted_fields.sort_by_key(|(k, _)| *k);

    for (key, value) in sorted_fields {
        output.push_str(",\"");
        escape_json_string(&mut output, key);
        output.push_str("\":\"");
        escape_json_string(&mut output, value);
        output.push('"');
    }

    output.push('}');
    output
}

/// Escape special characters for JSON strings
fn escape_json_string(output: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => {
                output.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => output.push(c),
        }
    }
}
