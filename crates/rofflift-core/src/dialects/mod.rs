//! Macro-package interpreters and the registry that creates them.

pub mod man;
pub mod mdoc;
pub mod me;
pub mod mm;
pub mod ms;
pub mod pod2man;
pub mod tkman;
pub mod www;

use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Document, ListKind};
use crate::hints::HintScope;
use crate::inline::plain_text;
use crate::interpreter::{Descriptor, Interpreter};
use crate::synopsis::deformat::deformat;
use crate::synopsis::parse_display;
use crate::text::{escape_attr, split_command, strip_tags};
use crate::troff::{TROFF, TroffInterpreter};

/// Indented-paragraph tags that mean a bulleted item.
const BULLETS: &[&str] = &["\\(bu", "\\[bu]", "*", "-", "o", "\\(em", "\\-", "&#8226;"];

/// Separator between names and purpose on a NAME line.
static NAME_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:\\-|\\\(em|\\\[em\]|\\\(en|&#8212;|\s-)\s+").unwrap()
});

/// Interpreter for a macro package file name given to `.so` or `.mso`.
pub fn package_dialect(file: &str) -> Option<&'static str> {
    let base = file.rsplit('/').next().unwrap_or(file);
    let base = base.strip_prefix("tmac.").unwrap_or(base);
    let stem = base.strip_suffix(".tmac").unwrap_or(base);
    match stem {
        "an" | "man" | "andoc" => Some("man"),
        "doc" | "mdoc" => Some("mdoc"),
        "s" | "ms" => Some("ms"),
        "e" | "me" => Some("me"),
        "m" | "mm" => Some("mm"),
        "www" => Some("www"),
        "man.macros" => Some("tkman"),
        _ => None,
    }
}

fn descriptor(name: &str) -> Option<&'static Descriptor> {
    Some(match name {
        "troff" => &TROFF,
        "man" => &man::MAN,
        "mdoc" => &mdoc::MDOC,
        "ms" => &ms::MS,
        "me" => &me::ME,
        "mm" => &mm::MM,
        "pod2man" => &pod2man::POD2MAN,
        "tkman" => &tkman::TKMAN,
        "www" => &www::WWW,
        _ => return None,
    })
}

/// Whether `name` is an exclusive (document-defining) package.
pub fn is_exclusive(name: &str) -> bool {
    descriptor(name).is_some_and(|d| d.exclusive)
}

/// Create a fresh interpreter for the package called `name`.
pub fn create(name: &str) -> Option<Box<dyn Interpreter>> {
    Some(match name {
        "troff" => Box::new(TroffInterpreter),
        "man" => Box::new(man::ManInterpreter::default()),
        "mdoc" => Box::new(mdoc::MdocInterpreter::default()),
        "ms" => Box::new(ms::MsInterpreter::default()),
        "me" => Box::new(me::MeInterpreter::default()),
        "mm" => Box::new(mm::MmInterpreter::default()),
        "pod2man" => Box::new(pod2man::Pod2ManInterpreter),
        "tkman" => Box::new(tkman::TkManInterpreter),
        "www" => Box::new(www::WwwInterpreter),
        _ => return None,
    })
}

/// Emit text in alternating fonts, as `.BR` and friends do.
pub(crate) fn alternate_fonts(doc: &mut Document, args: &[String], fonts: [&str; 2]) {
    if args.is_empty() {
        return;
    }
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        line.push_str("\\f");
        line.push_str(fonts[i % 2]);
        line.push_str(arg);
    }
    line.push_str("\\fR");
    doc.text_line(&line);
}

/// Emit `args` in font `font`, or the next input line when there are none.
pub(crate) fn font_line(doc: &mut Document, args: &[String], font: &str) {
    if args.is_empty() {
        if doc.next_is_command() {
            return;
        }
        if let Some(line) = doc.next_line() {
            doc.text_line(&format!("\\f{font}{line}\\fR"));
        }
        return;
    }
    doc.text_line(&format!("\\f{font}{}\\fR", args.join(" ")));
}

/// Split a NAME-section line into names and purpose.
pub(crate) fn parse_name_line(text: &str) -> Option<(Vec<String>, String)> {
    let (names, purpose) = match NAME_SEPARATOR.find(text) {
        Some(m) => (&text[..m.start()], &text[m.end()..]),
        None => return None,
    };
    let names: Vec<String> = names
        .split(',')
        .map(|n| strip_tags(&plain_text(n)).trim().to_owned())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return None;
    }
    Some((names, purpose.trim().to_owned()))
}

/// Emit a `refnamediv` and remember the names as commands or functions.
pub(crate) fn emit_namediv(doc: &mut Document, names: &[String], purpose: &str) {
    let tag = match doc.meta.volnum.as_deref().and_then(|v| v.chars().next()) {
        Some('1' | '6' | '8') => Some("command"),
        Some('2' | '3') => Some("function"),
        _ => None,
    };
    let mut markup = String::from("<refnamediv>");
    doc.meta.names.extend(names.iter().cloned());
    for name in names {
        markup.push_str(&format!("<refname>{name}</refname>"));
        if let Some(tag) = tag
            && doc.hints.get(name).is_none()
        {
            doc.hints.set(HintScope::Local, name, tag);
        }
    }
    let purpose = doc.render_isolated(purpose);
    markup.push_str(&format!("<refpurpose>{purpose}</refpurpose></refnamediv>"));
    doc.close_para();
    doc.emit_markup(&markup);
}

/// Non-blank text lines up to the next control line.
pub(crate) fn gather_lines(doc: &mut Document) -> Vec<String> {
    let mut lines = Vec::new();
    while !doc.next_is_command() {
        let Some(line) = doc.next_line() else {
            break;
        };
        if !line.trim().is_empty() {
            lines.push(line.trim().to_owned());
        }
    }
    lines
}

/// Gather the text lines of a NAME section up to the next control line.
pub(crate) fn gather_name_text(doc: &mut Document) -> String {
    gather_lines(doc).join(" ")
}

/// Heading text from the arguments, or the following text lines.
pub(crate) fn heading_text(doc: &mut Document, args: &[String]) -> String {
    if args.is_empty() {
        gather_lines(doc).join(" ")
    } else {
        args.join(" ")
    }
}

/// Kind of list an indented-paragraph tag implies.
pub(crate) fn ip_kind(tag: &str) -> ListKind {
    let plain = plain_text(tag);
    let plain = plain.trim();
    if BULLETS.contains(&tag.trim()) || plain == "\u{2022}" || plain == "\u{b7}" {
        return ListKind::Itemized;
    }
    let number = plain.trim_end_matches(['.', ')']).trim_start_matches('(');
    let numeric = !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    if numeric && (number.len() < plain.len() || plain.len() <= 2) {
        return ListKind::Ordered;
    }
    ListKind::Variable
}

/// `.IP tag` and its relatives: continue or start a list of the kind the
/// tag implies. An empty tag is an indented paragraph.
pub(crate) fn indented_paragraph(doc: &mut Document, tag: &str, command: &str) {
    if tag.trim().is_empty() {
        match doc.top_list() {
            Some((cmd, _)) if cmd == command || cmd == "TP" || cmd == "RS" => {
                doc.paragraph_break();
            }
            _ => {
                doc.begin_list(command, ListKind::Blockquote);
                doc.begin_item(None);
            }
        }
        return;
    }
    let kind = ip_kind(tag);
    match doc.top_list() {
        Some((cmd, current)) if cmd == command && current == kind => {}
        Some((cmd, _)) if cmd == command || cmd == "TP" => {
            doc.end_list();
            doc.begin_list(command, kind);
        }
        _ => doc.begin_list(command, kind),
    }
    if kind == ListKind::Variable {
        let term = doc.render_isolated(tag);
        doc.begin_item(Some(&term));
    } else {
        doc.begin_item(None);
    }
}

/// Handle a NAME section body, falling back to the page title.
pub(crate) fn name_section(doc: &mut Document, text: &str) {
    match parse_name_line(text) {
        Some((names, purpose)) => emit_namediv(doc, &names, &purpose),
        None => {
            doc.warn("NAME section has no name/purpose separator");
            let name = doc.meta.title.clone().unwrap_or_else(|| doc.name.clone());
            emit_namediv(doc, &[name.to_lowercase()], text);
        }
    }
}

/// Translate a synopsis section body through the synopsis parsers.
///
/// Reads raw lines up to the next request in `stop`. When nothing in them
/// reads as a command or function synopsis the lines are pushed back for
/// ordinary interpretation and `false` is returned.
pub(crate) fn lift_synopsis(doc: &mut Document, stop: &[&str]) -> bool {
    let mut lines = Vec::new();
    loop {
        let at_stop = doc
            .input
            .peek_line()
            .is_none_or(|line| is_request(doc, line, stop));
        if at_stop {
            break;
        }
        let Some(line) = doc.next_raw_line() else {
            break;
        };
        lines.push(line);
    }
    let result = deformat(doc, &lines).map(|plain| {
        let names = doc.meta.names.clone();
        parse_display(&plain, &names, &doc.hints)
    });
    let Some(result) = result.filter(|r| r.found) else {
        tracing::debug!(lines = lines.len(), "synopsis left to ordinary interpretation");
        doc.input.push_lines(lines);
        return false;
    };
    for warning in &result.warnings {
        doc.warn(format!("synopsis not parsed: {warning}"));
    }
    for (name, tag) in &result.learned {
        if doc.hints.get(name).is_none() {
            doc.hints.set(HintScope::Local, name, tag);
        }
    }
    doc.close_para();
    for markup in &result.markup {
        doc.emit_markup(markup);
    }
    true
}

/// Whether `line` is a control line naming one of `names`.
pub(crate) fn is_request(doc: &Document, line: &str, names: &[&str]) -> bool {
    split_command(line, doc.troff.cc, doc.troff.c2)
        .is_some_and(|(cmd, _)| names.contains(&cmd.as_str()))
}

/// Emit an inline `ulink` (or DocBook 5 `link`) around `text`.
pub(crate) fn link_markup(doc: &Document, url: &str, text: &str) -> String {
    let text = if text.trim().is_empty() { url } else { text };
    if doc.is_docbook5() {
        format!("<link xlink:href='{}'>{text}</link>", escape_attr(url))
    } else {
        format!("<ulink url='{}'>{text}</ulink>", escape_attr(url))
    }
}

/// Emit an index term.
pub(crate) fn index_term(doc: &mut Document, terms: &[String]) {
    let mut terms = terms.iter().map(|t| doc.render_isolated(t)).filter(|t| !t.is_empty());
    let Some(primary) = terms.next() else {
        return;
    };
    let mut markup = format!("<indexterm><primary>{primary}</primary>");
    if let Some(secondary) = terms.next() {
        markup.push_str(&format!("<secondary>{secondary}</secondary>"));
    }
    markup.push_str("</indexterm>");
    if doc.in_para() {
        doc.push_close(&markup);
    } else {
        doc.emit_markup(&markup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_package_dialects() {
        assert_eq!(package_dialect("an.tmac"), Some("man"));
        assert_eq!(package_dialect("/usr/share/groff/tmac/doc.tmac"), Some("mdoc"));
        assert_eq!(package_dialect("tmac.s"), Some("ms"));
        assert_eq!(package_dialect("man.macros"), Some("tkman"));
        assert_eq!(package_dialect("defs.tmac"), None);
    }

    #[test]
    fn test_exclusive_packages() {
        assert!(is_exclusive("man"));
        assert!(is_exclusive("ms"));
        assert!(!is_exclusive("www"));
        assert!(!is_exclusive("troff"));
        assert!(create("nroff").is_none());
    }

    #[test]
    fn test_parse_name_line() {
        assert_eq!(
            parse_name_line(r"foo \- does a thing"),
            Some((vec!["foo".to_owned()], "does a thing".to_owned()))
        );
        assert_eq!(
            parse_name_line(r"\fBls\fR, dir \(em list files"),
            Some((vec!["ls".to_owned(), "dir".to_owned()], "list files".to_owned()))
        );
        assert_eq!(parse_name_line("no separator here"), None);
    }
}
