//! Strings, macros, registers and macro-argument frames.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Passes of string expansion before giving up on self-referencing strings.
const EXPANSION_PASSES: usize = 16;

/// Arguments of one macro invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroFrame {
    pub name: String,
    pub args: Vec<String>,
    /// Line of the invocation in the source file.
    pub lineno: usize,
}

/// A numeric register.
#[derive(Debug, Clone, Copy)]
pub enum Register {
    Value { value: i64, step: i64 },
    Computed(fn(&TroffState) -> i64),
}

/// Base interpreter state, created fresh for every file.
#[derive(Debug)]
pub struct TroffState {
    pub strings: HashMap<String, String>,
    pub macros: HashMap<String, Vec<String>>,
    pub registers: HashMap<String, Register>,
    /// Guard values pushed by `.ie` for the matching `.el`.
    pub ifstack: Vec<bool>,
    pub frames: Vec<MacroFrame>,
    /// Control characters (`.cc`, `.c2`).
    pub cc: char,
    pub c2: char,
    /// Default macro terminator name set by `.em`; `None` means `..`.
    pub end_token: Option<String>,
    /// User wrapper macro → standard macro it wraps.
    pub reductions: HashMap<String, String>,
    /// Glyphs defined with `.char`.
    pub glyph_defs: HashMap<String, String>,
    /// Fill mode (`.fi`) versus literal (`.nf`).
    pub fill: bool,
}

impl Default for TroffState {
    fn default() -> Self {
        Self::new()
    }
}

impl TroffState {
    pub fn new() -> Self {
        let mut state = Self {
            strings: HashMap::new(),
            macros: HashMap::new(),
            registers: HashMap::new(),
            ifstack: Vec::new(),
            frames: Vec::new(),
            cc: '.',
            c2: '\'',
            end_token: None,
            reductions: HashMap::new(),
            glyph_defs: HashMap::new(),
            fill: true,
        };
        state.seed_registers();
        state
    }

    fn seed_registers(&mut self) {
        let (year, month, day, weekday) = today();
        for (name, value) in [
            (".g", 1),
            (".H", 1),
            (".V", 1),
            (".x", 1),
            (".y", 23),
            (".Y", 0),
            (".l", 65),
            (".i", 0),
            (".s", 10),
            (".v", 1),
            ("yr", year - 1900),
            ("mo", month),
            ("dy", day),
            ("dw", weekday),
        ] {
            self.set_register(name, value, 0);
        }
        self.registers
            .insert(".$".to_owned(), Register::Computed(arg_count));
        self.registers
            .insert(".u".to_owned(), Register::Computed(|s| i64::from(s.fill)));
    }

    pub fn set_register(&mut self, name: &str, value: i64, step: i64) {
        self.registers
            .insert(name.to_owned(), Register::Value { value, step });
    }

    /// Current value of a register; unknown registers read as zero.
    pub fn register(&self, name: &str) -> i64 {
        match self.registers.get(name) {
            Some(Register::Value { value, .. }) => *value,
            Some(Register::Computed(f)) => f(self),
            None => 0,
        }
    }

    /// Apply auto-increment (`sign > 0`) or decrement and return the new value.
    pub fn step_register(&mut self, name: &str, sign: i64) -> i64 {
        if let Some(Register::Value { value, step }) = self.registers.get_mut(name) {
            *value += sign * *step;
            return *value;
        }
        self.register(name)
    }

    pub fn current_macro(&self) -> Option<&str> {
        self.frames.last().map(|f| f.name.as_str())
    }

    /// Replace string references and, inside a macro, argument references.
    pub fn expand_strings(&self, line: &str) -> String {
        if !line.contains("\\*") && !line.contains("\\$") {
            return line.to_owned();
        }
        let mut current = line.to_owned();
        for _ in 0..EXPANSION_PASSES {
            let next = self.expand_once(&current);
            if next == current {
                break;
            }
            current = next;
            if !current.contains("\\*") && !current.contains("\\$") {
                break;
            }
        }
        current
    }

    fn expand_once(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c != '\\' || i + 1 >= chars.len() {
                out.push(c);
                i += 1;
                continue;
            }
            match chars[i + 1] {
                '*' => {
                    let (name, next) = read_name(&chars, i + 2);
                    let name = name.split_whitespace().next().unwrap_or("").to_owned();
                    if let Some(value) = self.strings.get(&name) {
                        out.push_str(value);
                    } else {
                        tracing::debug!(name = %name, "undefined string expands to nothing");
                    }
                    i = next;
                }
                '$' => match self.macro_argument(&chars, i + 2) {
                    (Some(text), next) => {
                        out.push_str(&text);
                        i = next;
                    }
                    (None, _) => {
                        out.push_str("\\$");
                        i += 2;
                    }
                },
                '\\' => {
                    out.push_str("\\\\");
                    i += 2;
                }
                other => {
                    out.push('\\');
                    out.push(other);
                    i += 2;
                }
            }
        }
        out
    }

    /// Resolve `\$N`, `\$(NN`, `\$[NN]`, `\$*`, `\$@`, `\$0`.
    ///
    /// Returns `None` outside a macro body so the reference is kept.
    fn macro_argument(&self, chars: &[char], start: usize) -> (Option<String>, usize) {
        let Some(frame) = self.frames.last() else {
            return (None, start);
        };
        let Some(&c) = chars.get(start) else {
            return (Some(String::new()), start);
        };
        match c {
            '*' => (Some(frame.args.join(" ")), start + 1),
            '@' => {
                let quoted: Vec<String> = frame.args.iter().map(|a| format!("\"{a}\"")).collect();
                (Some(quoted.join(" ")), start + 1)
            }
            '0' => (Some(frame.name.clone()), start + 1),
            '(' | '[' => {
                let (name, next) = read_name(chars, start);
                let value = name
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|n| frame.args.get(n))
                    .cloned()
                    .unwrap_or_default();
                (Some(value), next)
            }
            d if d.is_ascii_digit() => {
                let n = d.to_digit(10).unwrap_or(0) as usize;
                let value = n
                    .checked_sub(1)
                    .and_then(|n| frame.args.get(n))
                    .cloned()
                    .unwrap_or_default();
                (Some(value), start + 1)
            }
            _ => (Some(String::new()), start),
        }
    }

    /// Replace `\n` register interpolations, applying auto-increments.
    pub fn interpolate_registers(&mut self, line: &str) -> String {
        if !line.contains("\\n") {
            return line.to_owned();
        }
        let chars: Vec<char> = line.chars().collect();
        let mut out = String::with_capacity(line.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '\\' && i + 1 < chars.len() {
                if chars[i + 1] == 'n' {
                    let (value, next) = self.read_register_ref(&chars, i + 2);
                    out.push_str(&value.to_string());
                    i = next;
                } else {
                    out.push(chars[i]);
                    out.push(chars[i + 1]);
                    i += 2;
                }
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        out
    }

    /// Read the register reference after `\n` starting at `start`.
    pub fn read_register_ref(&mut self, chars: &[char], start: usize) -> (i64, usize) {
        let (sign, start) = match chars.get(start) {
            Some('+') => (1, start + 1),
            Some('-') => (-1, start + 1),
            _ => (0, start),
        };
        let (name, next) = read_name(chars, start);
        let value = if sign == 0 {
            self.register(&name)
        } else {
            self.step_register(&name, sign)
        };
        (value, next)
    }
}

/// Read a troff name at `start`: `x`, `(xx` or `[name]`.
///
/// Returns the name and the index just past it.
pub fn read_name(chars: &[char], start: usize) -> (String, usize) {
    match chars.get(start) {
        Some('(') => {
            let name: String = chars.iter().skip(start + 1).take(2).collect();
            (name, (start + 3).min(chars.len()))
        }
        Some('[') => {
            let mut end = start + 1;
            while end < chars.len() && chars[end] != ']' {
                end += 1;
            }
            let name: String = chars[start + 1..end].iter().collect();
            (name, (end + 1).min(chars.len()))
        }
        Some(c) => (c.to_string(), start + 1),
        None => (String::new(), start),
    }
}

fn arg_count(state: &TroffState) -> i64 {
    state
        .frames
        .last()
        .map_or(0, |f| i64::try_from(f.args.len()).unwrap_or(i64::MAX))
}

/// Today's civil date as (year, month, day, weekday 1=Sunday).
fn today() -> (i64, i64, i64, i64) {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let days = i64::try_from(secs / 86_400).unwrap_or(0);
    let (y, m, d) = civil_from_days(days);
    let weekday = (days + 4).rem_euclid(7) + 1;
    (y, m, d, weekday)
}

/// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian calendar.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state_with_frame(args: &[&str]) -> TroffState {
        let mut state = TroffState::new();
        state.frames.push(MacroFrame {
            name: "Xx".to_owned(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            lineno: 3,
        });
        state
    }

    #[test]
    fn test_expand_string_forms() {
        let mut state = TroffState::new();
        state.strings.insert("x".to_owned(), "ex".to_owned());
        state.strings.insert("lq".to_owned(), "&ldquo;".to_owned());
        state.strings.insert("long".to_owned(), "LONG".to_owned());
        assert_eq!(
            state.expand_strings(r"a \*x b \*(lq c \*[long] d \*[nope]e"),
            "a ex b &ldquo; c LONG d e"
        );
    }

    #[test]
    fn test_nested_string_expansion() {
        let mut state = TroffState::new();
        state.strings.insert("a".to_owned(), r"[\*b]".to_owned());
        state.strings.insert("b".to_owned(), "B".to_owned());
        assert_eq!(state.expand_strings(r"\*a"), "[B]");
    }

    #[test]
    fn test_self_referencing_string_terminates() {
        let mut state = TroffState::new();
        state.strings.insert("r".to_owned(), r"x\*r".to_owned());
        let expanded = state.expand_strings(r"\*r");
        assert!(expanded.starts_with("xxxx"));
    }

    #[test]
    fn test_macro_arguments() {
        let state = state_with_frame(&["one", "two words"]);
        assert_eq!(state.expand_strings(r"<\$1|\$2|\$3>"), "<one|two words|>");
        assert_eq!(state.expand_strings(r"\$*"), "one two words");
        assert_eq!(state.expand_strings(r"\$@"), "\"one\" \"two words\"");
        assert_eq!(state.expand_strings(r"\$0 \$(02"), "Xx two words");
    }

    #[test]
    fn test_arguments_left_alone_outside_macros() {
        let state = TroffState::new();
        assert_eq!(state.expand_strings(r"cost \$1"), r"cost \$1");
    }

    #[test]
    fn test_register_interpolation_and_increment() {
        let mut state = TroffState::new();
        state.set_register("N", 5, 2);
        assert_eq!(state.interpolate_registers(r"n=\nN"), "n=5");
        assert_eq!(state.interpolate_registers(r"n=\n+N"), "n=7");
        assert_eq!(state.interpolate_registers(r"n=\n-N."), "n=5.");
        assert_eq!(state.interpolate_registers(r"\n[unset]"), "0");
    }

    #[test]
    fn test_computed_registers() {
        let mut state = state_with_frame(&["a", "b", "c"]);
        assert_eq!(state.register(".$"), 3);
        state.fill = false;
        assert_eq!(state.register(".u"), 0);
    }

    #[test]
    fn test_civil_from_days() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_723), (2024, 1, 1));
    }
}
