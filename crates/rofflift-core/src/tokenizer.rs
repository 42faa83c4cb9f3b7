//! Line and token stream with pushback and checkpoint/rollback.
//!
//! The synopsis parsers try several hypotheses over the same block of lines.
//! [`LineTokenizer`] lets them consume lines or tokens, and then either commit
//! or [`unroll`](LineTokenizer::unroll) to a [`Checkpoint`] as though nothing
//! had been read.

use std::collections::VecDeque;

/// Token returned at the end of every tokenized line.
pub const NEWLINE: &str = "\n";

/// Transform applied to a line before it is split into tokens.
pub type Pretokenizer = fn(&str) -> String;

/// Saved tokenizer position.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    consumed: usize,
    tokens: VecDeque<String>,
    current: Option<String>,
    read: usize,
}

/// Line stack with a lazily tokenized view of the current line.
#[derive(Debug, Default)]
pub struct LineTokenizer {
    /// Remaining lines, next line last.
    lines: Vec<String>,
    /// Lines handed out since construction, oldest first.
    consumed: Vec<String>,
    /// Unread tokens of the current line (including its trailing newline).
    tokens: VecDeque<String>,
    /// Raw text of the line the tokens came from.
    current: Option<String>,
    /// Non-blank characters of `current` handed out as tokens.
    read: usize,
    pretokenizer: Option<Pretokenizer>,
}

impl LineTokenizer {
    /// Create a tokenizer over `lines` in reading order.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        lines.reverse();
        Self {
            lines,
            ..Self::default()
        }
    }

    /// Install a pretokenizer. The unread rest of the current line is
    /// re-tokenized at once.
    pub fn set_pretokenizer(&mut self, pretokenizer: Option<Pretokenizer>) {
        self.pretokenizer = pretokenizer;
        if self.tokens.is_empty() {
            return;
        }
        let Some(current) = self.current.clone() else {
            return;
        };
        let mut tokens = self.split(&current);
        let mut skip = self.read;
        while skip > 0 {
            let Some(front) = tokens.front_mut().filter(|t| t.as_str() != NEWLINE) else {
                break;
            };
            let len = front.chars().count();
            if len <= skip {
                tokens.pop_front();
                skip -= len;
            } else {
                *front = front.chars().skip(skip).collect();
                skip = 0;
            }
        }
        self.tokens = tokens;
    }

    /// Pop the next whole line, discarding unread tokens of the current one.
    pub fn pop_line(&mut self) -> Option<String> {
        self.tokens.clear();
        self.current = None;
        self.read = 0;
        let line = self.lines.pop()?;
        self.consumed.push(line.clone());
        Some(line)
    }

    /// Push a line back; the next [`pop_line`](Self::pop_line) returns it.
    pub fn push_line(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.consumed.last() == Some(&line) {
            self.consumed.pop();
        }
        self.lines.push(line);
    }

    /// Look at the next whole line without consuming it.
    pub fn peek_line(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    /// Whether any lines or tokens remain.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.tokens.is_empty()
    }

    /// Number of unread whole lines.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    /// Pop the next token, loading the next line when the current one is spent.
    pub fn token_pop(&mut self) -> Option<String> {
        if self.tokens.is_empty() {
            self.load_line()?;
        }
        let token = self.tokens.pop_front()?;
        if token != NEWLINE {
            self.read += token.chars().count();
        }
        Some(token)
    }

    /// Push a token back onto the front of the current line.
    pub fn token_push(&mut self, token: impl Into<String>) {
        let token = token.into();
        if token != NEWLINE {
            self.read = self.read.saturating_sub(token.chars().count());
        }
        self.tokens.push_front(token);
    }

    /// Look at the next token without consuming it.
    pub fn token_peek(&mut self) -> Option<&str> {
        if self.tokens.is_empty() {
            self.load_line()?;
        }
        self.tokens.front().map(String::as_str)
    }

    /// Whether the current line still has unread tokens (the newline counts).
    pub fn in_line(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Mark the current position.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            consumed: self.consumed.len(),
            tokens: self.tokens.clone(),
            current: self.current.clone(),
            read: self.read,
        }
    }

    /// Return to `checkpoint`, restoring every line consumed since.
    pub fn unroll(&mut self, checkpoint: Checkpoint) {
        while self.consumed.len() > checkpoint.consumed {
            if let Some(line) = self.consumed.pop() {
                self.lines.push(line);
            }
        }
        self.tokens = checkpoint.tokens;
        self.current = checkpoint.current;
        self.read = checkpoint.read;
    }

    /// Lines consumed since `checkpoint`, in reading order.
    pub fn consumed_since(&self, checkpoint: &Checkpoint) -> &[String] {
        &self.consumed[checkpoint.consumed.min(self.consumed.len())..]
    }

    fn load_line(&mut self) -> Option<()> {
        let line = self.lines.pop()?;
        self.consumed.push(line.clone());
        self.tokens = self.split(&line);
        self.current = Some(line);
        self.read = 0;
        Some(())
    }

    fn split(&self, line: &str) -> VecDeque<String> {
        let text = match self.pretokenizer {
            Some(transform) => transform(line),
            None => line.to_owned(),
        };
        let mut tokens: VecDeque<String> = text.split_whitespace().map(str::to_owned).collect();
        tokens.push_back(NEWLINE.to_owned());
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spaced_parens(line: &str) -> String {
        line.replace('(', " ( ").replace(')', " ) ")
    }

    #[test]
    fn test_push_line_is_lifo() {
        let mut tok = LineTokenizer::new(["one", "two"]);
        assert_eq!(tok.pop_line().as_deref(), Some("one"));
        tok.push_line("extra");
        assert_eq!(tok.peek_line(), Some("extra"));
        assert_eq!(tok.pop_line().as_deref(), Some("extra"));
        assert_eq!(tok.pop_line().as_deref(), Some("two"));
        assert_eq!(tok.pop_line(), None);
    }

    #[test]
    fn test_tokens_carry_newline_sentinel() {
        let mut tok = LineTokenizer::new(["a b", "c"]);
        let mut seen = Vec::new();
        while let Some(t) = tok.token_pop() {
            seen.push(t);
        }
        assert_eq!(seen, vec!["a", "b", "\n", "c", "\n"]);
    }

    #[test]
    fn test_checkpoint_unroll_restores_lines_and_tokens() {
        let mut tok = LineTokenizer::new(["a b", "c d", "e"]);
        assert_eq!(tok.token_pop().as_deref(), Some("a"));
        let mark = tok.checkpoint();
        assert_eq!(tok.token_pop().as_deref(), Some("b"));
        assert_eq!(tok.token_pop().as_deref(), Some("\n"));
        assert_eq!(tok.token_pop().as_deref(), Some("c"));
        assert_eq!(tok.pop_line().as_deref(), Some("e"));
        assert_eq!(tok.consumed_since(&mark), ["c d".to_owned(), "e".to_owned()]);
        tok.unroll(mark);
        assert_eq!(tok.token_pop().as_deref(), Some("b"));
        assert_eq!(tok.token_pop().as_deref(), Some("\n"));
        assert_eq!(tok.pop_line().as_deref(), Some("c d"));
        assert_eq!(tok.pop_line().as_deref(), Some("e"));
    }

    #[test]
    fn test_pretokenizer_retokenizes_current_line() {
        let mut tok = LineTokenizer::new(["f(x)"]);
        assert_eq!(tok.token_peek(), Some("f(x)"));
        tok.set_pretokenizer(Some(spaced_parens));
        assert_eq!(tok.token_pop().as_deref(), Some("f"));
        assert_eq!(tok.token_pop().as_deref(), Some("("));
    }

    #[test]
    fn test_pretokenizer_resplits_unread_rest_of_line() {
        let mut tok = LineTokenizer::new(["a f(x)", "next"]);
        assert_eq!(tok.token_pop().as_deref(), Some("a"));
        tok.set_pretokenizer(Some(spaced_parens));
        let rest: Vec<String> = std::iter::from_fn(|| tok.token_pop())
            .take_while(|t| t != NEWLINE)
            .collect();
        assert_eq!(rest, vec!["f", "(", "x", ")"]);
        assert_eq!(tok.token_pop().as_deref(), Some("next"));
    }

    #[test]
    fn test_removing_pretokenizer_rejoins_rest_of_line() {
        let mut tok = LineTokenizer::new(["f(x) y"]);
        tok.set_pretokenizer(Some(spaced_parens));
        assert_eq!(tok.token_pop().as_deref(), Some("f"));
        tok.set_pretokenizer(None);
        assert_eq!(tok.token_pop().as_deref(), Some("(x)"));
        assert_eq!(tok.token_pop().as_deref(), Some("y"));
        assert_eq!(tok.token_pop().as_deref(), Some(NEWLINE));
        assert_eq!(tok.token_pop(), None);
    }
}
