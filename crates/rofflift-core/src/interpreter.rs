//! The interface every macro-package interpreter implements.
//!
//! Interpreters are kept in an ordered list, most recently activated first.
//! A request is offered to each in turn and the first one returning `true`
//! from [`Interpreter::interpret`] claims it.

use crate::document::Document;
use crate::error::LiftError;

/// Static facts about a macro package.
#[derive(Debug)]
pub struct Descriptor {
    pub name: &'static str,
    /// At most one exclusive package is active per document.
    pub exclusive: bool,
    /// Top-level element for documents in this package.
    pub toptag: &'static str,
    /// Names that user `.de` may not redefine.
    pub immutable: &'static [&'static str],
    /// Requests dropped silently.
    pub ignore: &'static [&'static str],
    /// Requests dropped with a portability warning.
    pub complain: &'static [&'static str],
    /// Requests that end the current paragraph.
    pub parabreak: &'static [&'static str],
    /// Requests that start a new section.
    pub sectionbreak: &'static [&'static str],
    /// Requests that close open (non-scoped) lists.
    pub listbreak: &'static [&'static str],
    /// List openers that only their explicit closer may end.
    pub scoped: &'static [&'static str],
    /// Predefined strings seeded on activation.
    pub translations: &'static [(&'static str, &'static str)],
    /// Standard macros that user wrapper macros may be reduced to.
    pub reducible: &'static [&'static str],
}

impl Descriptor {
    /// Descriptor with every table empty.
    pub const fn empty(name: &'static str) -> Self {
        Self {
            name,
            exclusive: false,
            toptag: "",
            immutable: &[],
            ignore: &[],
            complain: &[],
            parabreak: &[],
            sectionbreak: &[],
            listbreak: &[],
            scoped: &[],
            translations: &[],
            reducible: &[],
        }
    }
}

/// A parsed control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request or macro name without the control character.
    pub name: String,
    /// Arguments after string expansion and quote handling.
    pub args: Vec<String>,
    /// Remainder of the line after the name, unparsed.
    pub rest: String,
    /// The whole original line.
    pub line: String,
}

impl Request {
    /// Argument `i`, or the empty string.
    pub fn arg(&self, i: usize) -> &str {
        self.args.get(i).map_or("", String::as_str)
    }

    /// Arguments joined by single spaces.
    pub fn joined(&self) -> String {
        self.args.join(" ")
    }
}

pub trait Interpreter {
    fn descriptor(&self) -> &'static Descriptor;

    /// Handle `req`, returning `false` when the request is not ours.
    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError>;

    /// Rewrite the whole (escaped) source before interpretation starts.
    fn preprocess(&mut self, text: String) -> String {
        text
    }

    /// Rewrite the assembled body after interpretation.
    fn postprocess(&mut self, text: String) -> String {
        text
    }

    /// Close anything still open at end of input.
    fn wrap_up(&mut self, _doc: &mut Document) {}
}
