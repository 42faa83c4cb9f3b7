//! Troff numeric expressions and `.if` conditions.
//!
//! Evaluation is strictly left to right with no operator precedence, as in
//! troff. Input has already been XML-escaped, so `&lt;`, `&gt;` and `&amp;`
//! are accepted wherever `<`, `>` and `&` are.

use super::state::TroffState;
use crate::glyphs;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("unrecognized term in expression at `{0}`")]
    BadTerm(String),
    #[error("unbalanced parenthesis in expression")]
    Unbalanced,
    #[error("division by zero in expression")]
    DivideByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Min,
    Max,
}

/// Operator spellings, longest first.
const OPERATORS: &[(&str, Op)] = &[
    ("&lt;=", Op::Le),
    ("&gt;=", Op::Ge),
    ("&lt;?", Op::Min),
    ("&gt;?", Op::Max),
    ("&lt;", Op::Lt),
    ("&gt;", Op::Gt),
    ("&amp;", Op::And),
    ("<=", Op::Le),
    (">=", Op::Ge),
    ("<?", Op::Min),
    (">?", Op::Max),
    ("==", Op::Eq),
    ("+", Op::Add),
    ("-", Op::Sub),
    ("*", Op::Mul),
    ("/", Op::Div),
    ("%", Op::Rem),
    ("<", Op::Lt),
    (">", Op::Gt),
    ("=", Op::Eq),
    ("&", Op::And),
    (":", Op::Or),
];

/// Result of evaluating the guard of `.if`/`.ie`/`.while`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub value: bool,
    /// The statement following the guard, leading blanks removed.
    pub rest: String,
    /// Set when the guard could not be understood; `value` is then `true`.
    pub error: Option<ExprError>,
}

/// Evaluate a numeric expression.
pub fn eval_expr(state: &mut TroffState, expr: &str) -> Result<i64, ExprError> {
    let mut eval = Evaluator::new(state, expr);
    let value = eval.expr()?;
    if eval.pos < eval.chars.len() {
        return Err(ExprError::BadTerm(eval.remainder()));
    }
    Ok(value)
}

/// Evaluate the guard at the start of `text`.
pub fn eval_condition(state: &mut TroffState, text: &str) -> ConditionOutcome {
    let chars: Vec<char> = text.trim_start().chars().collect();
    let mut pos = 0;
    let negate = chars.first() == Some(&'!');
    if negate {
        pos += 1;
    }

    let (result, end) = match chars.get(pos).copied() {
        Some(c @ ('n' | 't' | 'o' | 'e' | 'v')) if is_boundary(&chars, pos + 1) => {
            (Ok(device_predicate(c)), pos + 1)
        }
        Some(c @ ('r' | 'd' | 'c' | 'm' | 'F' | 'S')) if is_blank(chars.get(pos + 1)) => {
            let mut start = pos + 1;
            while is_blank(chars.get(start)) {
                start += 1;
            }
            let mut end = start;
            while end < chars.len() && !chars[end].is_whitespace() {
                end += 1;
            }
            let name: String = chars[start..end].iter().collect();
            (Ok(existence_predicate(state, c, &name)), end)
        }
        Some(d) if is_string_delimiter(d) => string_comparison(state, &chars, pos),
        Some(_) => {
            let end = expression_extent(&chars, pos);
            let expr: String = chars[pos..end].iter().collect();
            (eval_expr(state, &expr).map(|v| v > 0), end)
        }
        None => (Err(ExprError::BadTerm(String::new())), pos),
    };

    let rest: String = chars[end.min(chars.len())..].iter().collect();
    let rest = rest.trim_start().to_owned();
    match result {
        Ok(value) => ConditionOutcome {
            value: value != negate,
            rest,
            error: None,
        },
        Err(error) => ConditionOutcome {
            value: true,
            rest,
            error: Some(error),
        },
    }
}

/// `n` (nroff mode) and `o` (odd page) hold; `t`, `e` and `v` do not.
fn device_predicate(c: char) -> bool {
    matches!(c, 'n' | 'o')
}

fn existence_predicate(state: &TroffState, kind: char, name: &str) -> bool {
    match kind {
        'r' => state.registers.contains_key(name),
        'd' => state.strings.contains_key(name) || state.macros.contains_key(name),
        'c' => {
            let glyph = name
                .strip_prefix("\\(")
                .or_else(|| name.strip_prefix("\\[").map(|n| n.trim_end_matches(']')))
                .unwrap_or(name);
            glyph.chars().count() == 1
                || glyphs::lookup(glyph).is_some()
                || state.glyph_defs.contains_key(glyph)
        }
        _ => false,
    }
}

fn string_comparison(state: &TroffState, chars: &[char], pos: usize) -> (Result<bool, ExprError>, usize) {
    let delim = chars[pos];
    let mut parts = Vec::with_capacity(2);
    let mut cursor = pos + 1;
    for _ in 0..2 {
        let start = cursor;
        while cursor < chars.len() && chars[cursor] != delim {
            cursor += 1;
        }
        if cursor >= chars.len() {
            let text: String = chars[pos..].iter().collect();
            return (Err(ExprError::BadTerm(text)), chars.len());
        }
        parts.push(chars[start..cursor].iter().collect::<String>());
        cursor += 1;
    }
    let left = state.expand_strings(&parts[0]);
    let right = state.expand_strings(&parts[1]);
    (Ok(left == right), cursor)
}

fn is_string_delimiter(c: char) -> bool {
    !(c.is_alphanumeric() || c.is_whitespace() || "()+-.\\!|&<>=".contains(c))
}

fn is_blank(c: Option<&char>) -> bool {
    c.is_some_and(|c| *c == ' ' || *c == '\t')
}

fn is_boundary(chars: &[char], pos: usize) -> bool {
    chars.get(pos).is_none_or(|c| c.is_whitespace() || *c == '\\')
}

/// Index where a numeric guard ends: the first blank outside parentheses and
/// delimited escape arguments.
fn expression_extent(chars: &[char], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '\\' if matches!(chars.get(i + 1), Some('w' | 'B')) => {
                if let Some(&delim) = chars.get(i + 2) {
                    let mut j = i + 3;
                    while j < chars.len() && chars[j] != delim {
                        j += 1;
                    }
                    i = j + 1;
                    continue;
                }
            }
            '\\' if matches!(chars.get(i + 1), Some('{')) => return i,
            c if c.is_whitespace() && depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    chars.len()
}

struct Evaluator<'a> {
    state: &'a mut TroffState,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Evaluator<'a> {
    fn new(state: &'a mut TroffState, expr: &str) -> Self {
        Self {
            state,
            chars: expr.chars().collect(),
            pos: 0,
        }
    }

    fn remainder(&self) -> String {
        self.chars[self.pos.min(self.chars.len())..].iter().collect()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_blanks(&mut self) {
        while self.peek().is_some_and(|c| c == ' ' || c == '\t') {
            self.pos += 1;
        }
    }

    fn expr(&mut self) -> Result<i64, ExprError> {
        let mut acc = self.term()?;
        loop {
            self.skip_blanks();
            let Some(op) = self.operator() else {
                break;
            };
            let rhs = self.term()?;
            acc = apply(op, acc, rhs)?;
        }
        Ok(acc)
    }

    fn operator(&mut self) -> Option<Op> {
        let rest = self.remainder();
        for (spelling, op) in OPERATORS {
            if rest.starts_with(spelling) {
                self.pos += spelling.chars().count();
                return Some(*op);
            }
        }
        None
    }

    fn term(&mut self) -> Result<i64, ExprError> {
        self.skip_blanks();
        match self.peek() {
            Some('!') => {
                self.pos += 1;
                Ok(i64::from(self.term()? <= 0))
            }
            Some('-') => {
                self.pos += 1;
                Ok(-self.term()?)
            }
            Some('+') => {
                self.pos += 1;
                self.term()
            }
            Some('(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.skip_blanks();
                if self.peek() != Some(')') {
                    return Err(ExprError::Unbalanced);
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => Ok(self.number()),
            Some('\\') => self.escape(),
            Some(c @ ('n' | 't' | 'o' | 'e' | 'v')) => {
                self.pos += 1;
                Ok(i64::from(device_predicate(c)))
            }
            _ => Err(ExprError::BadTerm(self.remainder())),
        }
    }

    fn number(&mut self) -> i64 {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if self.peek().is_some_and(|c| "icpPmMnvuf".contains(c)) {
            self.pos += 1;
        }
        #[allow(clippy::cast_possible_truncation)]
        text.parse::<f64>().map_or(0, |v| v.round() as i64)
    }

    fn escape(&mut self) -> Result<i64, ExprError> {
        match self.chars.get(self.pos + 1).copied() {
            Some('n') => {
                let chars = self.chars.clone();
                let (value, next) = self.state.read_register_ref(&chars, self.pos + 2);
                self.pos = next;
                Ok(value)
            }
            Some('w') => {
                let Some(delim) = self.chars.get(self.pos + 2).copied() else {
                    return Err(ExprError::BadTerm(self.remainder()));
                };
                let start = self.pos + 3;
                let mut end = start;
                while end < self.chars.len() && self.chars[end] != delim {
                    end += 1;
                }
                let text: String = self.chars[start..end.min(self.chars.len())].iter().collect();
                self.pos = (end + 1).min(self.chars.len());
                Ok(approximate_width(&text))
            }
            _ => Err(ExprError::BadTerm(self.remainder())),
        }
    }
}

fn apply(op: Op, lhs: i64, rhs: i64) -> Result<i64, ExprError> {
    Ok(match op {
        Op::Add => lhs.saturating_add(rhs),
        Op::Sub => lhs.saturating_sub(rhs),
        Op::Mul => lhs.saturating_mul(rhs),
        Op::Div => lhs.checked_div(rhs).ok_or(ExprError::DivideByZero)?,
        Op::Rem => lhs.checked_rem(rhs).ok_or(ExprError::DivideByZero)?,
        Op::And => i64::from(lhs > 0 && rhs > 0),
        Op::Or => i64::from(lhs > 0 || rhs > 0),
        Op::Eq => i64::from(lhs == rhs),
        Op::Lt => i64::from(lhs < rhs),
        Op::Gt => i64::from(lhs > rhs),
        Op::Le => i64::from(lhs <= rhs),
        Op::Ge => i64::from(lhs >= rhs),
        Op::Min => lhs.min(rhs),
        Op::Max => lhs.max(rhs),
    })
}

/// Width of text in character cells, ignoring escapes.
pub(crate) fn approximate_width(text: &str) -> i64 {
    let mut count = 0i64;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(expr: &str) -> Result<i64, ExprError> {
        eval_expr(&mut TroffState::new(), expr)
    }

    #[test]
    fn test_left_to_right_without_precedence() {
        assert_eq!(eval("1+2*3"), Ok(9));
        assert_eq!(eval("1+(2*3)"), Ok(7));
        assert_eq!(eval("7/2"), Ok(3));
        assert_eq!(eval("7%4"), Ok(3));
    }

    #[test]
    fn test_comparisons_plain_and_escaped() {
        assert_eq!(eval("3<4"), Ok(1));
        assert_eq!(eval("3&lt;4"), Ok(1));
        assert_eq!(eval("4&gt;=4"), Ok(1));
        assert_eq!(eval("5&lt;=4"), Ok(0));
        assert_eq!(eval("2==2"), Ok(1));
        assert_eq!(eval("2=3"), Ok(0));
        assert_eq!(eval("3&lt;?9"), Ok(3));
        assert_eq!(eval("3>?9"), Ok(9));
        assert_eq!(eval("1&amp;0"), Ok(0));
        assert_eq!(eval("1:0"), Ok(1));
    }

    #[test]
    fn test_units_and_negation() {
        assert_eq!(eval("2i"), Ok(2));
        assert_eq!(eval("-3+1"), Ok(-2));
        assert_eq!(eval("!0"), Ok(1));
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval("(1+2"), Err(ExprError::Unbalanced));
        assert_eq!(eval("1/0"), Err(ExprError::DivideByZero));
        assert!(matches!(eval("1+x"), Err(ExprError::BadTerm(_))));
    }

    #[test]
    fn test_register_terms() {
        let mut state = TroffState::new();
        state.set_register("a", 4, 1);
        assert_eq!(eval_expr(&mut state, r"\na*2"), Ok(8));
        assert_eq!(eval_expr(&mut state, r"\n+a"), Ok(5));
        assert_eq!(eval_expr(&mut state, r"\w'abc'"), Ok(3));
    }

    #[test]
    fn test_device_predicates() {
        let mut state = TroffState::new();
        let outcome = eval_condition(&mut state, "n .ds x y");
        assert!(outcome.value);
        assert_eq!(outcome.rest, ".ds x y");
        assert!(!eval_condition(&mut state, "t text").value);
        assert!(eval_condition(&mut state, "!t text").value);
    }

    #[test]
    fn test_existence_predicates() {
        let mut state = TroffState::new();
        state.strings.insert("Aq".to_owned(), "'".to_owned());
        assert!(eval_condition(&mut state, "d Aq yes").value);
        assert!(!eval_condition(&mut state, "d Zz yes").value);
        assert!(eval_condition(&mut state, "r .g yes").value);
        assert!(eval_condition(&mut state, r"c \(em yes").value);
    }

    #[test]
    fn test_string_comparison() {
        let mut state = TroffState::new();
        state.strings.insert("x".to_owned(), "abc".to_owned());
        let outcome = eval_condition(&mut state, r"'\*x'abc' .tm same");
        assert!(outcome.value);
        assert_eq!(outcome.rest, ".tm same");
        assert!(!eval_condition(&mut state, "'a'b' x").value);
    }

    #[test]
    fn test_numeric_guard_and_block_opener() {
        let mut state = TroffState::new();
        let outcome = eval_condition(&mut state, r"\n(.g&gt;0 \{\");
        assert!(outcome.value);
        assert_eq!(outcome.rest, r"\{\");
        let outcome = eval_condition(&mut state, r"0\{ body");
        assert!(!outcome.value);
        assert_eq!(outcome.rest, r"\{ body");
    }

    #[test]
    fn test_garbage_guard_is_truthy_with_error() {
        let mut state = TroffState::new();
        let outcome = eval_condition(&mut state, "1+q text");
        assert!(outcome.value);
        assert!(outcome.error.is_some());
        assert_eq!(outcome.rest, "text");
    }
}
