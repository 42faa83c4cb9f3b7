//! Recognition of synopsis sections: command lines and C prototypes.

pub mod command;
pub mod deformat;
pub mod display;
pub mod function;
pub mod node;

pub use display::{DisplayResult, parse_display};

/// Result of one speculative parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynopsisOutcome<T> {
    Parsed(T),
    /// The input is not of this kind; nothing was consumed.
    Declined,
    /// The input looked like this kind but could not be parsed; nothing was
    /// consumed.
    Failed(String),
}
