//! The base troff request interpreter.
//!
//! Sits at the bottom of every interpreter stack and implements the requests
//! common to all macro packages: strings, registers, macro definition,
//! conditionals, inclusion, fill mode and the character tables.

pub mod expr;
pub mod state;

use std::path::{Path, PathBuf};

use crate::dialects;
use crate::document::{DisplayKind, Document};
use crate::error::LiftError;
use crate::input::WorkItem;
use crate::interpreter::{Descriptor, Interpreter, Request};
use crate::text::{decode_latin1, escape_xml, is_comment, split_command};
use expr::{eval_condition, eval_expr};
use state::{MacroFrame, Register};

/// Nesting bound for macro expansion.
pub const MAX_MACRO_DEPTH: usize = 200;

pub static TROFF: Descriptor = Descriptor {
    ignore: &[
        "ad", "af", "bd", "blm", "ce", "cflags", "ch", "color", "cs", "cu", "defcolor", "ecr",
        "ecs", "ev", "fam", "fcolor", "fl", "fp", "fspecial", "ftr", "fzoom", "gcolor", "hc",
        "hla", "hlm", "hpf", "hw", "hy", "hym", "hys", "in", "it", "kern", "lc", "lf", "lg",
        "linetabs", "ll", "ls", "lsm", "lt", "mc", "mk", "na", "ne", "nh", "nm", "nn", "ns",
        "os", "pc", "pev", "pl", "pm", "pnr", "po", "ps", "ptr", "rj", "rs", "rt", "sizes",
        "special", "ss", "sv", "tc", "ti", "uf", "ul", "vs", "warn", "wh",
    ],
    complain: &["ec", "eo", "open", "opena", "close", "write", "output", "pso", "sy"],
    parabreak: &["bp", "sp"],
    ..Descriptor::empty("troff")
};

/// The base interpreter; its state lives in [`Document::troff`].
#[derive(Debug, Default)]
pub struct TroffInterpreter;

impl Interpreter for TroffInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &TROFF
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        match req.name.as_str() {
            "ds" | "ds1" => define_string(doc, req, false),
            "as" | "as1" => define_string(doc, req, true),
            "rm" => {
                for name in &req.args {
                    doc.troff.strings.remove(name);
                    doc.troff.macros.remove(name);
                    doc.troff.reductions.remove(name);
                }
            }
            "rn" => rename(doc, req.arg(0), req.arg(1), true),
            "als" => rename(doc, req.arg(1), req.arg(0), false),
            "nr" => set_number_register(doc, req),
            "rr" => {
                for name in &req.args {
                    doc.troff.registers.remove(name);
                }
            }
            "de" | "de1" => define_macro(doc, req, false),
            "am" | "am1" => define_macro(doc, req, true),
            "em" => doc.troff.end_token = Some(req.arg(0).to_owned()).filter(|t| !t.is_empty()),
            "ig" => ignore_block(doc, req.arg(0)),
            "if" => {
                let outcome = eval_condition(&mut doc.troff, &req.rest);
                if let Some(error) = &outcome.error {
                    doc.warn(format!("{error} in .if"));
                }
                conditional_body(doc, outcome.value, &outcome.rest);
            }
            "ie" => {
                let outcome = eval_condition(&mut doc.troff, &req.rest);
                if let Some(error) = &outcome.error {
                    doc.warn(format!("{error} in .ie"));
                }
                doc.troff.ifstack.push(outcome.value);
                conditional_body(doc, outcome.value, &outcome.rest);
            }
            "el" => {
                let taken = match doc.troff.ifstack.pop() {
                    Some(value) => !value,
                    None => {
                        doc.warn(".el without matching .ie");
                        false
                    }
                };
                conditional_body(doc, taken, &req.rest);
            }
            "while" => {
                doc.warn(".while loops are not interpreted");
                let outcome = eval_condition(&mut doc.troff, &req.rest);
                conditional_body(doc, false, &outcome.rest);
            }
            "return" => {
                if let Some(lineno) = doc.input.unwind_macro() {
                    doc.troff.frames.pop();
                    doc.lineno = lineno;
                }
            }
            "shift" => {
                let n = req.arg(0).parse::<usize>().unwrap_or(1);
                if let Some(frame) = doc.troff.frames.last_mut() {
                    let n = n.min(frame.args.len());
                    frame.args.drain(..n);
                }
            }
            "di" | "da" => divert(doc, req),
            "char" => define_glyph(doc, req),
            "nop" => doc.input.push_line(req.rest.clone()),
            "do" => {
                let line = format!("{}{}", doc.troff.cc, req.rest);
                doc.input.push_line(line);
            }
            "tm" | "tm1" | "tmc" => doc.warn(req.rest.trim().to_owned()),
            "ab" => {
                return Err(LiftError::Aborted {
                    message: req.rest.trim().to_owned(),
                });
            }
            "ex" | "nx" => while doc.input.pop().is_some() {},
            "cc" => doc.troff.cc = req.arg(0).chars().next().unwrap_or('.'),
            "c2" => doc.troff.c2 = req.arg(0).chars().next().unwrap_or('\''),
            "so" => source_file(doc, req.arg(0)),
            "mso" => source_macro_package(doc, req.arg(0)),
            "tr" => translate_chars(doc, &req.rest),
            "ta" => set_tabs(doc, req),
            "ft" => doc.font_request(req.arg(0)),
            "nf" => {
                if doc.in_display() {
                    doc.troff.fill = false;
                } else {
                    doc.begin_display(DisplayKind::Literal, "nf");
                }
            }
            "fi" => {
                if doc.display_opener() == Some("nf") {
                    doc.end_display();
                } else if !doc.in_display() {
                    doc.troff.fill = true;
                }
            }
            "br" => {}
            "sp" => {
                if doc.fill() {
                    doc.paragraph_break();
                } else {
                    let n = req.arg(0).parse::<usize>().unwrap_or(1).clamp(1, 10);
                    for _ in 0..n {
                        doc.text_line("");
                    }
                }
            }
            "bp" => doc.paragraph_break(),
            "tl" => three_part_title(doc, &req.rest),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn define_string(doc: &mut Document, req: &Request, append: bool) {
    let rest = req.rest.trim_start();
    let (name, value) = match rest.split_once([' ', '\t']) {
        Some((name, value)) => (name, value.trim_start()),
        None => (rest, ""),
    };
    if name.is_empty() {
        doc.warn("string definition without a name");
        return;
    }
    let value = value.strip_prefix('"').unwrap_or(value).to_owned();
    if append {
        doc.troff
            .strings
            .entry(name.to_owned())
            .or_default()
            .push_str(&value);
    } else {
        doc.troff.strings.insert(name.to_owned(), value);
    }
}

fn rename(doc: &mut Document, from: &str, to: &str, remove: bool) {
    if from.is_empty() || to.is_empty() {
        doc.warn("rename needs two names");
        return;
    }
    let troff = &mut doc.troff;
    if let Some(body) = troff.macros.get(from).cloned() {
        troff.macros.insert(to.to_owned(), body);
        if remove {
            troff.macros.remove(from);
        }
    }
    if let Some(value) = troff.strings.get(from).cloned() {
        troff.strings.insert(to.to_owned(), value);
        if remove {
            troff.strings.remove(from);
        }
    }
    if let Some(target) = troff.reductions.get(from).cloned() {
        troff.reductions.insert(to.to_owned(), target);
    }
}

fn set_number_register(doc: &mut Document, req: &Request) {
    let name = req.arg(0);
    if name.is_empty() {
        return;
    }
    let raw = req.arg(1);
    let (sign, expr) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => (0, raw),
    };
    let value = match eval_expr(&mut doc.troff, expr) {
        Ok(value) => value,
        Err(error) => {
            doc.warn(format!("{error} in .nr {name}"));
            0
        }
    };
    let value = match sign {
        0 => value,
        s => doc.troff.register(name) + s * value,
    };
    let step = req.arg(2).parse::<i64>().unwrap_or_else(|_| {
        match doc.troff.registers.get(name) {
            Some(Register::Value { step, .. }) => *step,
            _ => 0,
        }
    });
    doc.troff.set_register(name, value, step);
}

/// Whether `line` ends a macro body with terminator `end` (`.` for `..`).
fn is_terminator(line: &str, cc: char, end: &str) -> bool {
    let Some(body) = line.strip_prefix(cc) else {
        return false;
    };
    let body = body.trim_start_matches([' ', '\t']);
    let Some(after) = body.strip_prefix(end) else {
        return false;
    };
    after.is_empty() || after.starts_with([' ', '\t']) || after.starts_with("\\\"")
}

/// Collapse one level of backslash doubling.
fn collapse_backslashes(line: &str) -> String {
    line.replace("\\\\", "\\")
}

fn define_macro(doc: &mut Document, req: &Request, append: bool) {
    let name = req.arg(0).to_owned();
    let end = match req.arg(1) {
        "" => doc.troff.end_token.clone().unwrap_or_else(|| ".".to_owned()),
        explicit => explicit.to_owned(),
    };
    let mut body = Vec::new();
    let mut terminated = false;
    while let Some(line) = doc.next_raw_line() {
        if is_terminator(&line, doc.troff.cc, &end) {
            terminated = true;
            break;
        }
        body.push(collapse_backslashes(&line));
    }
    if !terminated {
        doc.warn(format!("macro .{name} is not terminated"));
    }
    if name.is_empty() {
        doc.warn("macro definition without a name");
        return;
    }
    if doc.is_immutable(&name) {
        doc.warn(format!("ignoring redefinition of .{name}"));
        return;
    }
    tracing::debug!(name = %name, lines = body.len(), "macro defined");
    if append {
        doc.troff.macros.entry(name.clone()).or_default().extend(body);
    } else {
        doc.troff.macros.insert(name.clone(), body);
    }
    reduce_wrapper(doc, &name);
}

/// Record `name` as a wrapper of a standard macro when its only significant
/// request is one of the active packages' reducible macros.
fn reduce_wrapper(doc: &mut Document, name: &str) {
    doc.troff.reductions.remove(name);
    let Some(body) = doc.troff.macros.get(name) else {
        return;
    };
    let (cc, c2) = (doc.troff.cc, doc.troff.c2);
    let mut significant = body
        .iter()
        .filter(|line| !line.trim().is_empty() && !is_comment(line))
        .map(|line| split_command(line, cc, c2).map(|(cmd, _)| cmd))
        .filter(|cmd| cmd.as_deref().is_none_or(|c| !doc.is_ignored(c)));
    let (Some(Some(only)), None) = (significant.next(), significant.next()) else {
        return;
    };
    let reducible = doc
        .active
        .iter()
        .any(|d| d.reducible.contains(&only.as_str()));
    if reducible && only != name {
        tracing::debug!(wrapper = %name, target = %only, "macro reduced");
        doc.troff.reductions.insert(name.to_owned(), only);
    }
}

/// Expand a user-defined macro in place.
pub fn invoke_macro(doc: &mut Document, req: &Request) {
    if doc.troff.frames.len() >= MAX_MACRO_DEPTH {
        doc.error(format!("macro .{} nested too deeply", req.name));
        return;
    }
    let Some(body) = doc.troff.macros.get(&req.name).cloned() else {
        return;
    };
    doc.troff.frames.push(MacroFrame {
        name: req.name.clone(),
        args: req.args.clone(),
        lineno: doc.lineno,
    });
    doc.input.push(WorkItem::Return { lineno: doc.lineno });
    doc.input.push_lines(body);
}

fn ignore_block(doc: &mut Document, end: &str) {
    let end = if end.is_empty() { "." } else { end };
    while let Some(line) = doc.next_raw_line() {
        if is_terminator(&line, doc.troff.cc, end) {
            return;
        }
        doc.emit_comment(&line);
    }
    doc.warn("unterminated .ig");
}

fn brace_balance(line: &str) -> isize {
    let opens = line.matches("\\{").count();
    let closes = line.matches("\\}").count();
    opens.cast_signed() - closes.cast_signed()
}

/// Run or skip the statement governed by a conditional.
fn conditional_body(doc: &mut Document, taken: bool, rest: &str) {
    let rest = rest.trim_start();
    if let Some(block) = rest.strip_prefix("\\{") {
        if taken {
            let block = block.trim_start();
            let block = block.strip_prefix("\\\"").map_or(block, |_| "");
            if !block.trim().is_empty() {
                doc.input.push_line(block.to_owned());
            }
            return;
        }
        let mut depth = 1 + brace_balance(block);
        while depth > 0 {
            let Some(line) = doc.next_raw_line() else {
                doc.warn("unterminated conditional block");
                return;
            };
            depth += brace_balance(&line);
        }
        return;
    }
    if taken && !rest.is_empty() {
        doc.input.push_line(rest.to_owned());
    }
}

fn divert(doc: &mut Document, req: &Request) {
    let name = req.arg(0).to_owned();
    if name.is_empty() {
        return;
    }
    let mut body = Vec::new();
    while let Some(line) = doc.next_raw_line() {
        if split_command(&line, doc.troff.cc, doc.troff.c2)
            .is_some_and(|(cmd, rest)| (cmd == "di" || cmd == "da") && rest.trim().is_empty())
        {
            break;
        }
        body.push(line);
    }
    let entry = doc.troff.macros.entry(name).or_default();
    if req.name == "di" {
        entry.clear();
    }
    entry.extend(body);
}

fn define_glyph(doc: &mut Document, req: &Request) {
    let rest = req.rest.trim_start();
    let (name, def) = rest.split_once([' ', '\t']).unwrap_or((rest, ""));
    let name = name
        .strip_prefix("\\(")
        .or_else(|| {
            name.strip_prefix("\\[")
                .map(|n| n.trim_end_matches(']'))
        })
        .unwrap_or(name);
    if name.is_empty() {
        return;
    }
    let def = def.trim_start();
    let def = def.strip_prefix('"').unwrap_or(def);
    let rendered = doc.render_isolated(def);
    doc.troff.glyph_defs.insert(name.to_owned(), rendered);
}

/// Candidate paths for `file` in `dirs`, the file's own directory first.
fn search(doc: &Document, file: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let path = Path::new(file);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    doc.source_dir
        .iter()
        .chain(dirs)
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())
}

/// Whether included text is only requests and comments.
fn is_markup_only(text: &str, cc: char, c2: char) -> bool {
    text.lines()
        .all(|line| line.trim().is_empty() || line.starts_with(cc) || line.starts_with(c2))
}

fn source_file(doc: &mut Document, file: &str) {
    if file.is_empty() {
        doc.warn(".so without a file name");
        return;
    }
    if let Some(dialect) = dialects::package_dialect(file) {
        doc.pending_activation.push(dialect);
        return;
    }
    let dirs = doc.settings.include_dirs.clone();
    let Some(path) = search(doc, file, &dirs) else {
        doc.warn(format!("cannot find included file {file}, referencing it instead"));
        let markup = doc.add_inclusion(file);
        doc.close_para();
        doc.emit_markup(&markup);
        return;
    };
    let text = match std::fs::read(&path) {
        Ok(bytes) => decode_latin1(&bytes),
        Err(error) => {
            doc.warn(format!("cannot read {}: {error}", path.display()));
            return;
        }
    };
    if is_markup_only(&text, doc.troff.cc, doc.troff.c2) {
        tracing::debug!(file = %path.display(), "splicing included macro file");
        doc.input.push_lines(text.lines().map(escape_xml));
    } else {
        tracing::debug!(file = %path.display(), "referencing included text file");
        let markup = doc.add_inclusion(file);
        doc.close_para();
        doc.emit_markup(&markup);
    }
}

fn source_macro_package(doc: &mut Document, file: &str) {
    if let Some(dialect) = dialects::package_dialect(file) {
        doc.pending_activation.push(dialect);
        return;
    }
    let dirs = doc.settings.macro_dirs.clone();
    let candidates = [file.to_owned(), format!("{file}.tmac"), format!("tmac.{file}")];
    let Some(path) = candidates.iter().find_map(|c| search(doc, c, &dirs)) else {
        doc.warn(format!("cannot find macro package {file}"));
        return;
    };
    match std::fs::read(&path) {
        Ok(bytes) => {
            let text = decode_latin1(&bytes);
            doc.input.push_lines(text.lines().map(escape_xml));
        }
        Err(error) => doc.warn(format!("cannot read {}: {error}", path.display())),
    }
}

/// Split `.tr` operands into units: a logical character or a glyph escape.
fn tr_units(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut units = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let start = i;
        if chars[i] == '\\' {
            i = match chars.get(i + 1) {
                Some('(') => i + 4,
                Some('[') => chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map_or(chars.len(), |p| i + p + 1),
                Some(_) => i + 2,
                None => i + 1,
            };
        } else if chars[i] == '&' {
            i = chars[i..]
                .iter()
                .position(|c| *c == ';')
                .map_or(i + 1, |p| i + p + 1);
        } else {
            i += 1;
        }
        let i_end = i.min(chars.len());
        units.push(chars[start..i_end].iter().collect());
        i = i_end;
    }
    units
}

fn translate_chars(doc: &mut Document, rest: &str) {
    let units = tr_units(rest.trim());
    for pair in units.chunks(2) {
        let from = crate::text::unescape_xml(&pair[0]);
        let mut from_chars = from.chars();
        let (Some(from), None) = (from_chars.next(), from_chars.next()) else {
            doc.warn(format!("cannot translate {}", pair[0]));
            continue;
        };
        let to = match pair.get(1) {
            Some(unit) => doc.render_isolated(unit),
            None => " ".to_owned(),
        };
        let from = match from {
            '<' | '>' | '&' => {
                doc.warn("cannot translate markup characters");
                continue;
            }
            c => c,
        };
        doc.set_translation(from, to);
    }
}

fn set_tabs(doc: &mut Document, req: &Request) {
    let mut stops = Vec::new();
    let mut last = 0usize;
    for arg in &req.args {
        let (relative, spec) = match arg.strip_prefix('+') {
            Some(s) => (true, s),
            None => (false, arg.as_str()),
        };
        let digits: String = spec
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let Ok(value) = digits.parse::<f64>() else {
            continue;
        };
        let scale = match spec[digits.len()..].chars().next() {
            Some('i') => 10.0,
            Some('c') => 4.0,
            Some('P') => 1.7,
            _ => 1.0,
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let column = (value * scale).round() as usize;
        let stop = if relative { last + column } else { column };
        stops.push(stop);
        last = stop;
    }
    doc.set_tabstops(stops);
}

fn three_part_title(doc: &mut Document, rest: &str) {
    let rest = rest.trim();
    let Some(delim) = rest.chars().next() else {
        return;
    };
    let parts: Vec<&str> = rest[delim.len_utf8()..]
        .split(delim)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if !parts.is_empty() {
        doc.text_line(&parts.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::SemanticHints;
    use crate::input::InputStack;
    use crate::settings::LiftSettings;
    use crate::text::parse_args;
    use pretty_assertions::assert_eq;

    fn doc_with(input: &str) -> Document {
        let mut doc = Document::new("t", LiftSettings::default(), SemanticHints::new());
        doc.input = InputStack::from_text(input);
        doc
    }

    fn request(line: &str) -> Request {
        let (name, rest) = split_command(line, '.', '\'').unwrap_or_default();
        Request {
            args: parse_args(rest),
            rest: rest.to_owned(),
            name,
            line: line.to_owned(),
        }
    }

    fn run(doc: &mut Document, line: &str) -> bool {
        TroffInterpreter
            .interpret(doc, &request(line))
            .unwrap_or(false)
    }

    fn remaining_lines(doc: &mut Document) -> Vec<String> {
        std::iter::from_fn(|| doc.next_raw_line()).collect()
    }

    #[test]
    fn test_define_and_append_strings() {
        let mut doc = doc_with("");
        run(&mut doc, r#".ds Q "quoted value"#);
        run(&mut doc, ".as Q  more");
        assert_eq!(doc.troff.strings["Q"], "quoted valuemore");
    }

    #[test]
    fn test_macro_definition_collapses_backslashes() {
        let mut doc = doc_with("\\\\fB\\\\$1\\\\fR\n..\nafter");
        run(&mut doc, ".de Xx");
        assert_eq!(doc.troff.macros["Xx"], vec![r"\fB\$1\fR"]);
        assert_eq!(remaining_lines(&mut doc), vec!["after"]);
    }

    #[test]
    fn test_custom_and_global_terminators() {
        let mut doc = doc_with("body\n.END\n");
        run(&mut doc, ".de Yy END");
        assert_eq!(doc.troff.macros["Yy"], vec!["body"]);

        let mut doc = doc_with("one\n..\ntwo\n.stop\n");
        run(&mut doc, ".em stop");
        run(&mut doc, ".de Zz");
        assert_eq!(doc.troff.macros["Zz"], vec!["one", "..", "two"]);
    }

    #[test]
    fn test_immutable_macros_are_not_redefined() {
        static PKG: Descriptor = Descriptor {
            immutable: &["SH"],
            ..Descriptor::empty("pkg")
        };
        let mut doc = doc_with("junk\n..\n");
        doc.active.push(&PKG);
        run(&mut doc, ".de SH");
        assert!(!doc.troff.macros.contains_key("SH"));
        assert_eq!(doc.diag.entries().len(), 1);
    }

    #[test]
    fn test_wrapper_macro_reduction() {
        static PKG: Descriptor = Descriptor {
            reducible: &["SH"],
            ..Descriptor::empty("pkg")
        };
        let mut doc = doc_with(".\\\" section wrapper\n.SH \"\\\\$1\"\n..\n");
        doc.active.push(&PKG);
        run(&mut doc, ".de Sh");
        assert_eq!(doc.troff.reductions.get("Sh").map(String::as_str), Some("SH"));
    }

    #[test]
    fn test_invocation_binds_arguments_and_returns() {
        let mut doc = doc_with("next");
        doc.troff.macros.insert("Mm".to_owned(), vec![r"<\$1>".to_owned()]);
        doc.lineno = 7;
        invoke_macro(&mut doc, &request(".Mm first second"));
        let line = doc.next_line();
        assert_eq!(line.as_deref(), Some("<first>"));
        assert_eq!(doc.next_raw_line().as_deref(), Some("next"));
        assert!(doc.troff.frames.is_empty());
    }

    #[test]
    fn test_recursion_is_bounded() {
        let mut doc = doc_with("");
        doc.troff.macros.insert("R".to_owned(), vec![".R".to_owned()]);
        for _ in 0..=MAX_MACRO_DEPTH {
            invoke_macro(&mut doc, &request(".R"));
            let _ = doc.next_raw_line();
        }
        assert_eq!(doc.diag.error_count(), 1);
    }

    #[test]
    fn test_if_single_line_and_block_skip() {
        let mut doc = doc_with("skipped \\{ nested\nalso \\}\n\\}\nkept");
        run(&mut doc, r".if n .ds x yes");
        assert_eq!(remaining_lines(&mut doc)[0], ".ds x yes");

        let mut doc = doc_with("skipped \\{ nested\nalso \\}\n\\}\nkept");
        run(&mut doc, r".if t \{\");
        assert_eq!(remaining_lines(&mut doc), vec!["kept"]);
    }

    #[test]
    fn test_ie_el_takes_exactly_one_arm() {
        let mut doc = doc_with("");
        run(&mut doc, ".ie 1 first");
        run(&mut doc, ".el second");
        assert_eq!(remaining_lines(&mut doc), vec!["first"]);

        run(&mut doc, ".ie 0 first");
        run(&mut doc, ".el second");
        assert_eq!(remaining_lines(&mut doc), vec!["second"]);
    }

    #[test]
    fn test_el_without_ie_warns_and_skips() {
        let mut doc = doc_with("");
        run(&mut doc, ".el text");
        assert!(remaining_lines(&mut doc).is_empty());
        assert_eq!(doc.diag.entries().len(), 1);
    }

    #[test]
    fn test_number_registers() {
        let mut doc = doc_with("");
        run(&mut doc, ".nr N 3 2");
        run(&mut doc, ".nr N +4");
        assert_eq!(doc.troff.register("N"), 7);
        assert_eq!(doc.troff.interpolate_registers(r"\n+N"), "9");
    }

    #[test]
    fn test_return_and_shift() {
        let mut doc = doc_with("outer");
        doc.troff
            .macros
            .insert("Mm".to_owned(), vec!["a".to_owned(), "b".to_owned()]);
        invoke_macro(&mut doc, &request(".Mm x y z"));
        run(&mut doc, ".shift 2");
        assert_eq!(doc.troff.frames[0].args, vec!["z"]);
        run(&mut doc, ".return");
        assert!(doc.troff.frames.is_empty());
        assert_eq!(remaining_lines(&mut doc), vec!["outer"]);
    }

    #[test]
    fn test_abort_is_fatal() {
        let mut doc = doc_with("");
        let result = TroffInterpreter.interpret(&mut doc, &request(".ab giving up"));
        assert!(matches!(result, Err(LiftError::Aborted { message }) if message == "giving up"));
    }

    #[test]
    fn test_so_splices_macro_files_and_references_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("defs.tmac"), ".ds V 1.0\n").unwrap();
        std::fs::write(dir.path().join("body.man"), "Some prose.\n").unwrap();
        let mut doc = doc_with("");
        doc.source_dir = Some(dir.path().to_path_buf());
        run(&mut doc, ".so defs.tmac");
        assert_eq!(remaining_lines(&mut doc), vec![".ds V 1.0"]);
        run(&mut doc, ".so body.man");
        assert_eq!(doc.finish(), vec!["&body;"]);
        assert_eq!(doc.inclusions()[0].href, "body.xml");
    }

    #[test]
    fn test_mso_of_known_package_requests_activation() {
        let mut doc = doc_with("");
        run(&mut doc, ".mso www.tmac");
        assert_eq!(doc.pending_activation, vec!["www"]);
    }

    #[test]
    fn test_tr_and_tabs() {
        let mut doc = doc_with("");
        run(&mut doc, r".tr ~\(em");
        doc.text_line("a~b");
        run(&mut doc, ".ta 4 +4");
        run(&mut doc, ".nf");
        doc.text_line("x\ty\tz");
        run(&mut doc, ".fi");
        assert_eq!(
            doc.finish().join("\n"),
            "<para>a&mdash;b</para>\n<literallayout remap='nf'>x   y   z</literallayout>"
        );
    }

    #[test]
    fn test_unknown_requests_are_declined() {
        let mut doc = doc_with("");
        assert!(!run(&mut doc, ".SH NAME"));
    }
}
