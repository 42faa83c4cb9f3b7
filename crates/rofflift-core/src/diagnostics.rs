//! Compiler-style diagnostics collected during a translation.

use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational; never affects the exit status.
    Warning,
    /// Counted; a non-zero count fails the file at the end.
    Error,
}

/// One located message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    /// Innermost macro being expanded when the message was raised.
    pub macro_name: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "\"{}\", line {}: {kind}: {}", self.file, self.line, self.message)?;
        if let Some(name) = &self.macro_name {
            write!(f, " [in macro .{name}]")?;
        }
        Ok(())
    }
}

/// Diagnostic sink for one file.
#[derive(Debug, Default)]
pub struct Diagnostics {
    file: String,
    entries: Vec<Diagnostic>,
    errors: usize,
    portability: bool,
}

impl Diagnostics {
    pub fn new(file: impl Into<String>, portability: bool) -> Self {
        Self {
            file: file.into(),
            portability,
            ..Self::default()
        }
    }

    pub fn warn(&mut self, line: usize, macro_name: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(file = %self.file, line, "warning: {message}");
        self.push(Severity::Warning, line, macro_name, message);
    }

    pub fn error(&mut self, line: usize, macro_name: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(file = %self.file, line, "error: {message}");
        self.errors += 1;
        self.push(Severity::Error, line, macro_name, message);
    }

    /// Portability notice, dropped unless portability warnings are enabled.
    pub fn portability(&mut self, line: usize, macro_name: Option<&str>, message: impl Into<String>) {
        if self.portability {
            self.warn(line, macro_name, message);
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    fn push(&mut self, severity: Severity, line: usize, macro_name: Option<&str>, message: String) {
        self.entries.push(Diagnostic {
            severity,
            file: self.file.clone(),
            line,
            macro_name: macro_name.map(str::to_owned),
            message,
        });
    }
}
