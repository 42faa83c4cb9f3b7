//! Reduce a captured synopsis block of troff source to plain text lines.

use crate::document::Document;
use crate::inline::plain_text;
use crate::text::{is_comment, parse_args, split_command};

/// Plain text lines of `lines`, joined the way fill mode would join them.
///
/// Font macros contribute their arguments, break requests end a line, and
/// the groff `.SY`/`.OP`/`.YS` synopsis macros are spelled out. Returns
/// `None` when the block uses a request this reduction does not understand.
pub fn deformat(doc: &Document, lines: &[String]) -> Option<Vec<String>> {
    let (cc, c2) = (doc.troff.cc, doc.troff.c2);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut fill = true;

    let flush = |current: &mut String, out: &mut Vec<String>| {
        let line = current.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            out.push(line);
        }
        current.clear();
    };
    let append = |current: &mut String, text: &str| {
        if !current.is_empty() && !current.ends_with(' ') {
            current.push(' ');
        }
        current.push_str(text);
    };

    for raw in lines {
        if is_comment(raw) {
            continue;
        }
        let line = doc.troff.expand_strings(raw);
        let Some((name, rest)) = split_command(&line, cc, c2) else {
            if line.trim().is_empty() {
                flush(&mut current, &mut out);
                out.push(String::new());
                continue;
            }
            append(&mut current, plain_text(&line).trim());
            if !fill {
                flush(&mut current, &mut out);
            }
            continue;
        };
        let args = parse_args(rest);
        match name.as_str() {
            "B" | "I" | "SM" | "SB" | "R" => append(&mut current, &plain_text(&args.join(" "))),
            "BR" | "BI" | "IB" | "IR" | "RB" | "RI" => {
                append(&mut current, &plain_text(&args.concat()));
            }
            "br" | "sp" | "PP" | "LP" | "P" | "HP" | "TP" | "IP" | "in" | "ti" | "ne" | "Sp" => {
                flush(&mut current, &mut out);
                continue;
            }
            "nf" | "EX" | "Vb" => {
                flush(&mut current, &mut out);
                fill = false;
                continue;
            }
            "fi" | "EE" | "Ve" => {
                flush(&mut current, &mut out);
                fill = true;
                continue;
            }
            "SY" => {
                flush(&mut current, &mut out);
                append(&mut current, &plain_text(&args.join(" ")));
                continue;
            }
            "OP" => {
                let inner = plain_text(&args.join(" "));
                append(&mut current, &format!("[{inner}]"));
                continue;
            }
            "YS" => {
                flush(&mut current, &mut out);
                continue;
            }
            "ad" | "na" | "hy" | "nh" | "ft" | "PD" | "RS" | "RE" | "ta" | "DT" | "ll" | "ps"
            | "vs" | "ce" | "fam" | "IX" | "ie" | "el" | "if" => continue,
            _ => return None,
        }
        if !fill {
            flush(&mut current, &mut out);
        }
    }
    flush(&mut current, &mut out);
    while out.last().is_some_and(String::is_empty) {
        out.pop();
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::SemanticHints;
    use crate::settings::LiftSettings;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_owned).collect()
    }

    #[test]
    fn test_fill_mode_joins_until_break() {
        let doc = Document::new("t", LiftSettings::default(), SemanticHints::new());
        let out = deformat(
            &doc,
            &lines(".B tar\n[\\fB\\-cxtf\\fR]\n.I file\n\\&...\n.br\n.B tar\n\\-\\-help"),
        )
        .unwrap();
        assert_eq!(out, vec!["tar [-cxtf] file ...", "tar --help"]);
    }

    #[test]
    fn test_no_fill_keeps_lines() {
        let doc = Document::new("t", LiftSettings::default(), SemanticHints::new());
        let out = deformat(
            &doc,
            &lines(
                ".nf\n.B #include &lt;stdio.h&gt;\n.sp\n.BI \"int printf(const char *\" format \", ...);\"\n.fi",
            ),
        )
        .unwrap();
        assert_eq!(
            out,
            vec!["#include &lt;stdio.h&gt;", "int printf(const char *format, ...);"]
        );
    }

    #[test]
    fn test_groff_synopsis_macros() {
        let doc = Document::new("t", LiftSettings::default(), SemanticHints::new());
        let out = deformat(&doc, &lines(".SY grep\n.OP \\-i\n.I pattern\n.YS")).unwrap();
        assert_eq!(out, vec!["grep [-i] pattern"]);
    }

    #[test]
    fn test_unknown_request_declines() {
        let doc = Document::new("t", LiftSettings::default(), SemanticHints::new());
        assert_eq!(deformat(&doc, &lines(".TS\nl l\n.TE")), None);
    }
}
