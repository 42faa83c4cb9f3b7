//! Colored terminal output utilities.

#[cfg(test)]
use std::cell::RefCell;

use console::{Style, Term};
use rofflift_core::{Diagnostic, Severity};

/// Terminal output formatter. Everything goes to stderr; stdout is reserved
/// for translated documents.
pub(crate) struct Output {
    term: Term,
    quiet: bool,
    green: Style,
    yellow: Style,
    red: Style,
    #[cfg(test)]
    captured: Option<RefCell<Vec<String>>>,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            quiet: false,
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            #[cfg(test)]
            captured: None,
        }
    }

    /// Output that records lines instead of writing them.
    #[cfg(test)]
    pub(crate) fn capturing() -> Self {
        Self {
            captured: Some(RefCell::default()),
            ..Self::new()
        }
    }

    #[cfg(test)]
    pub(crate) fn lines(&self) -> Vec<String> {
        self.captured
            .as_ref()
            .map(|c| c.borrow().clone())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn capture(&self, line: &str) -> bool {
        let Some(captured) = &self.captured else {
            return false;
        };
        captured.borrow_mut().push(line.to_owned());
        true
    }

    #[cfg(not(test))]
    fn capture(&self, _line: &str) -> bool {
        false
    }

    fn write_line(&self, line: &str) {
        if !self.capture(line) {
            let _ = self.term.write_line(line);
        }
    }

    /// Suppress warnings and progress messages.
    #[must_use]
    pub(crate) fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        if !self.quiet {
            self.write_line(msg);
        }
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        if !self.quiet {
            self.write_line(&self.green.apply_to(msg).to_string());
        }
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        if !self.quiet {
            self.write_line(&self.yellow.apply_to(msg).to_string());
        }
    }

    /// Print an error message (red). Never suppressed.
    pub(crate) fn error(&self, msg: &str) {
        self.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print one translation diagnostic in compiler style.
    pub(crate) fn diagnostic(&self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => self.warning(&diagnostic.to_string()),
            Severity::Error => self.error(&diagnostic.to_string()),
        }
    }
}
