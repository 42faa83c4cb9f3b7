//! Troff macro interpretation engine that lifts manual pages and papers to
//! DocBook XML.
//!
//! A [`Lifter`] detects which macro package a source is written for (man,
//! mdoc, ms, me, mm, plus the pod2man, Tcl/Tk and www extensions), runs the
//! matching interpreters over the input, and assembles a DocBook 4.5 or 5
//! document. Structural problems are collected as [`Diagnostic`] values;
//! only conditions that make the translation pointless surface as a
//! [`LiftError`].
//!
//! # Architecture
//!
//! - [`interpreter`]: the [`Interpreter`] trait and the static
//!   [`Descriptor`] tables every macro package declares
//! - `troff`: the base request interpreter (strings, registers, macros,
//!   conditionals)
//! - [`dialects`]: one interpreter per macro package
//! - `synopsis` and `table`: speculative sub-parsers for synopsis sections
//!   and `tbl` blocks
//! - `postprocess` and `output`: link lifting, semantic hints and the
//!   final document wrapper
//!
//! # Example
//!
//! ```
//! use rofflift_core::{LiftSettings, Lifter};
//!
//! let source = ".TH FOO 1\n.SH NAME\nfoo \\- frobnicate\n.SH DESCRIPTION\nText.\n";
//! let mut lifter = Lifter::new(LiftSettings::default());
//! let output = lifter.translate("foo.1", source.as_bytes()).unwrap();
//! assert!(output.xml.contains("<refname>foo</refname>"));
//! ```

mod converter;
mod detect;
mod diagnostics;
pub mod dialects;
mod document;
mod error;
mod glyphs;
mod hints;
mod inline;
mod input;
pub mod interpreter;
mod lifter;
mod output;
mod postprocess;
mod settings;
mod synopsis;
mod table;
mod tables;
mod text;
mod tokenizer;
mod troff;

pub use converter::{BlockConverter, BlockKind, ConvertResult};
pub use detect::{Detection, detect};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use document::{Author, DisplayKind, Document, ListKind, Meta};
pub use error::LiftError;
pub use hints::{HintScope, SemanticHints, format_hint_comment, parse_hint_comment};
pub use interpreter::{Descriptor, Interpreter, Request};
pub use lifter::{LiftOutput, Lifter};
pub use settings::{DocBookVersion, LiftSettings};
