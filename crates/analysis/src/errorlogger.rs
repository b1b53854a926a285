//! Diagnostic reporting.
//!
//! Checks and the value-flow engine report findings through the
//! [`ErrorLogger`] trait. Bailout notices are reported at [`Severity::Debug`]
//! with a stable id (`valueFlowBailout`, `valueFlowBailoutIncompleteVar`);
//! they never affect analysis results and are only visible when debug output
//! is requested.

use std::fmt;

/// Message severity, ordered from chattiest to most serious.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Internal diagnostics: bailouts, pass tracing.
    Debug,
    /// Stylistic advice.
    Style,
    /// Portability concerns (platform dependent behaviour).
    Portability,
    /// Suspicious code that usually works.
    Warning,
    /// Code that is wrong.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Style => "style",
            Severity::Portability => "portability",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// One entry of a diagnostic call stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLocation {
    /// Source file path.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// Optional per-location annotation shown in error paths.
    pub info: String,
}

/// A diagnostic produced by the analysis or a check.
#[derive(Clone, Debug)]
pub struct ErrorMessage {
    /// Call stack, innermost location last.
    pub callstack: Vec<FileLocation>,
    /// Severity class.
    pub severity: Severity,
    /// Stable identifier, e.g. `valueFlowBailout` or `UnionZeroInit`.
    pub id: String,
    /// Human readable message.
    pub message: String,
}

impl ErrorMessage {
    /// Construct a message with a single location.
    pub fn new(
        location: FileLocation,
        severity: Severity,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ErrorMessage {
            callstack: vec![location],
            severity,
            id: id.into(),
            message: message.into(),
        }
    }

    /// Primary (innermost) location, if any.
    pub fn location(&self) -> Option<&FileLocation> {
        self.callstack.last()
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = self.location() {
            write!(f, "[{}:{}:{}]: ", loc.file, loc.line, loc.column)?;
        }
        write!(f, "({}) {} [{}]", self.severity, self.message, self.id)
    }
}

/// Sink for diagnostics. Appended to from a single analysis thread.
pub trait ErrorLogger {
    /// Report one diagnostic.
    fn report(&mut self, msg: ErrorMessage);
}

/// An [`ErrorLogger`] that collects every message. Used by tests and by the
/// CLI, which prints the collected messages after each unit.
#[derive(Debug, Default)]
pub struct CollectingLogger {
    /// All reported messages, in order.
    pub messages: Vec<ErrorMessage>,
}

impl CollectingLogger {
    /// New empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages at or above `severity`.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ErrorMessage> {
        self.messages.iter().filter(move |m| m.severity >= severity)
    }

    /// True if any message carries the given stable id.
    pub fn has_id(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }
}

impl ErrorLogger for CollectingLogger {
    fn report(&mut self, msg: ErrorMessage) {
        log::debug!("{msg}");
        self.messages.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_formatting() {
        let msg = ErrorMessage::new(
            FileLocation {
                file: "test.cpp".to_string(),
                line: 3,
                column: 14,
                info: String::new(),
            },
            Severity::Portability,
            "UnionZeroInit",
            "Zero initializing union 'u' is error-prone",
        );
        assert_eq!(
            msg.to_string(),
            "[test.cpp:3:14]: (portability) Zero initializing union 'u' is error-prone [UnionZeroInit]"
        );
    }

    #[test]
    fn collecting_logger_filters_by_severity() {
        let mut logger = CollectingLogger::new();
        let loc = FileLocation {
            file: "a.c".to_string(),
            line: 1,
            column: 1,
            info: String::new(),
        };
        logger.report(ErrorMessage::new(loc.clone(), Severity::Debug, "d", "dbg"));
        logger.report(ErrorMessage::new(loc, Severity::Error, "e", "err"));
        assert_eq!(logger.with_severity(Severity::Warning).count(), 1);
        assert!(logger.has_id("d"));
    }
}
