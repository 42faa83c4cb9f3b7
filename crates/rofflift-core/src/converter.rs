//! Converter hook for embedded equation and diagram blocks.
//!
//! Converters are registered on the [`Lifter`](crate::Lifter) and offered
//! each `.EQ`/`.EN` or `.PS`/`.PE` block in registration order. The first
//! converter returning something other than [`ConvertResult::PassThrough`]
//! decides the block's fate; when none does, the block is kept as a literal
//! display.

/// Kind of embedded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `eqn` source between `.EQ` and `.EN`.
    Equation,
    /// `pic` source between `.PS` and `.PE`.
    Diagram,
}

impl BlockKind {
    pub fn opener(self) -> &'static str {
        match self {
            Self::Equation => "EQ",
            Self::Diagram => "PS",
        }
    }

    pub fn closer(self) -> &'static str {
        match self {
            Self::Equation => "EN",
            Self::Diagram => "PE",
        }
    }
}

/// Result of converting a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertResult {
    /// Replace the block with this markup.
    Markup(String),
    /// The converter owns this kind of block but could not translate it.
    Failed(String),
    /// Not handled by this converter.
    PassThrough,
}

/// Translates embedded block source (unescaped text) into markup.
pub trait BlockConverter {
    fn convert(&mut self, kind: BlockKind, source: &str) -> ConvertResult;
}
