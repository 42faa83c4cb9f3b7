//! The remaining input as an explicit stack of work items.
//!
//! Macro expansion splices body lines in front of the rest of the input,
//! conditionals skip forward, and handlers push lines back; all of it goes
//! through [`InputStack`].

/// One unit of pending input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A line of troff text. `lineno` is set for lines read from the file.
    Line { text: String, lineno: Option<usize> },
    /// End of a macro body; pops the innermost argument frame and restores
    /// the invocation line number.
    Return { lineno: usize },
    /// Markup that is already rendered and goes straight to output.
    Markup(String),
    /// Paragraph break.
    Break,
}

/// LIFO stack of work items; the next item is the last element.
#[derive(Debug, Default)]
pub struct InputStack {
    items: Vec<WorkItem>,
}

impl InputStack {
    /// Stack holding the lines of `text`, numbered from 1.
    pub fn from_text(text: &str) -> Self {
        let mut items: Vec<WorkItem> = text
            .lines()
            .enumerate()
            .map(|(i, line)| WorkItem::Line {
                text: line.to_owned(),
                lineno: Some(i + 1),
            })
            .collect();
        items.reverse();
        Self { items }
    }

    pub fn pop(&mut self) -> Option<WorkItem> {
        self.items.pop()
    }

    pub fn push(&mut self, item: WorkItem) {
        self.items.push(item);
    }

    /// Push a synthetic line; it is the next item popped.
    pub fn push_line(&mut self, text: impl Into<String>) {
        self.items.push(WorkItem::Line {
            text: text.into(),
            lineno: None,
        });
    }

    /// Push several items so that they are popped in the given order.
    pub fn push_all(&mut self, items: impl IntoIterator<Item = WorkItem>) {
        let mut items: Vec<WorkItem> = items.into_iter().collect();
        items.reverse();
        self.items.append(&mut items);
    }

    /// Push lines so that they are popped in the given order.
    pub fn push_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_all(lines.into_iter().map(|text| WorkItem::Line {
            text: text.into(),
            lineno: None,
        }));
    }

    /// Text of the next item if it is a line.
    pub fn peek_line(&self) -> Option<&str> {
        match self.items.last() {
            Some(WorkItem::Line { text, .. }) => Some(text),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Drop everything up to and including the next return sentinel.
    ///
    /// Returns the sentinel's line number, or `None` when no sentinel was
    /// pending (the rest of the input is left alone in that case).
    pub fn unwind_macro(&mut self) -> Option<usize> {
        let pos = self
            .items
            .iter()
            .rposition(|item| matches!(item, WorkItem::Return { .. }))?;
        let lineno = match self.items[pos] {
            WorkItem::Return { lineno } => lineno,
            _ => 0,
        };
        self.items.truncate(pos);
        Some(lineno)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_of(item: Option<WorkItem>) -> Option<String> {
        match item {
            Some(WorkItem::Line { text, .. }) => Some(text),
            _ => None,
        }
    }

    #[test]
    fn test_lines_numbered_in_order() {
        let mut input = InputStack::from_text(".TH A 1\ntext\n");
        assert_eq!(
            input.pop(),
            Some(WorkItem::Line {
                text: ".TH A 1".to_owned(),
                lineno: Some(1)
            })
        );
        assert_eq!(text_of(input.pop()).as_deref(), Some("text"));
        assert!(input.is_empty());
    }

    #[test]
    fn test_push_lines_preserve_order() {
        let mut input = InputStack::from_text("tail");
        input.push_lines(["a", "b"]);
        assert_eq!(text_of(input.pop()).as_deref(), Some("a"));
        assert_eq!(text_of(input.pop()).as_deref(), Some("b"));
        assert_eq!(text_of(input.pop()).as_deref(), Some("tail"));
    }

    #[test]
    fn test_unwind_macro_stops_at_sentinel() {
        let mut input = InputStack::from_text("after");
        input.push(WorkItem::Return { lineno: 7 });
        input.push_lines(["body1", "body2"]);
        assert_eq!(input.unwind_macro(), Some(7));
        assert_eq!(text_of(input.pop()).as_deref(), Some("after"));
        assert_eq!(input.unwind_macro(), None);
    }
}
