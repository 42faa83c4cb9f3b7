//! The `ms` macro package.

use crate::dialects::{gather_lines, heading_text, indented_paragraph};
use crate::document::{Author, DisplayKind, Document, ListKind};
use crate::error::LiftError;
use crate::interpreter::{Descriptor, Interpreter, Request};
use crate::text::strip_tags;

pub static MS: Descriptor = Descriptor {
    name: "ms",
    exclusive: true,
    toptag: "article",
    immutable: &[
        "AB", "AE", "AI", "AU", "B", "DE", "DS", "FE", "FS", "I", "IP", "LP", "NH", "PP", "QP",
        "R", "RE", "RS", "SH", "TL",
    ],
    ignore: &[
        "1C", "2C", "BT", "CT", "EF", "EH", "HM", "KE", "KF", "KS", "LG", "MC", "NL", "OF", "OH",
        "P1", "PT", "PX", "RP", "SM", "TA", "TM",
    ],
    complain: &["BX"],
    parabreak: &["LP", "PP", "QP", "XP"],
    sectionbreak: &["NH", "SH"],
    listbreak: &["LP", "PP", "QP", "XP", "NH", "SH"],
    scoped: &["RS"],
    translations: &[
        ("Q", "&#8220;"),
        ("U", "&#8221;"),
        ("-", "&#8212;"),
        ("*", ""),
    ],
    reducible: &["B", "I", "IP", "LP", "NH", "PP", "R", "SH"],
};

#[derive(Debug, Default)]
pub struct MsInterpreter {
    in_abstract: bool,
}

impl Interpreter for MsInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &MS
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        match req.name.as_str() {
            "TL" => {
                let title = gather_lines(doc).join(" ");
                let title = doc.render_isolated(&title);
                doc.meta.title = (!title.trim().is_empty()).then_some(title);
            }
            "AU" => {
                let lines = gather_lines(doc);
                for line in lines {
                    let name = doc.render_isolated(&line);
                    doc.meta.authors.push(Author {
                        name,
                        affiliation: None,
                    });
                }
            }
            "AI" => {
                let lines = gather_lines(doc);
                let affiliation = doc.render_isolated(&lines.join(", "));
                for author in doc.meta.authors.iter_mut().filter(|a| a.affiliation.is_none()) {
                    author.affiliation = Some(affiliation.clone());
                }
            }
            "ND" | "DA" => {
                let date = req.joined();
                doc.meta.date = (!date.trim().is_empty()).then(|| doc.render_isolated(&date));
            }
            "AB" => {
                doc.close_para();
                doc.begin_diversion();
                self.in_abstract = true;
            }
            "AE" => self.end_abstract(doc),
            "NH" => {
                let depth = req.arg(0).parse::<usize>().unwrap_or(1).max(1);
                heading(doc, depth);
            }
            "SH" => {
                let depth = req.arg(0).parse::<usize>().unwrap_or(1).max(1);
                heading(doc, depth);
            }
            "PP" | "LP" | "XP" => doc.paragraph_break(),
            "QP" => {
                doc.begin_list("QP", ListKind::Blockquote);
                doc.begin_item(None);
            }
            "IP" => indented_paragraph(doc, req.arg(0), "IP"),
            "RS" => {
                doc.begin_list("RS", ListKind::Blockquote);
                doc.begin_item(None);
            }
            "RE" => {
                if !doc.end_list_by("RS") {
                    doc.warn(".RE without matching .RS");
                }
            }
            "DS" | "ID" | "LD" | "CD" | "BD" => {
                doc.begin_display(DisplayKind::Literal, &req.name);
            }
            "DE" => {
                if !doc.end_display() {
                    doc.warn(".DE without display");
                }
            }
            "FS" => doc.begin_footnote(),
            "FE" => doc.end_footnote(),
            "B" => ms_font(doc, &req.args, "B"),
            "I" | "UL" => ms_font(doc, &req.args, "I"),
            "R" => ms_font(doc, &req.args, "R"),
            "BI" => ms_font(doc, &req.args, "BI"),
            "CW" => ms_font(doc, &req.args, "CW"),
            "XS" => skip_to(doc, "XE"),
            "[" => skip_to(doc, "]"),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn wrap_up(&mut self, doc: &mut Document) {
        if self.in_abstract {
            doc.warn(".AB without .AE");
            self.end_abstract(doc);
        }
    }
}

impl MsInterpreter {
    fn end_abstract(&mut self, doc: &mut Document) {
        if !std::mem::take(&mut self.in_abstract) {
            doc.warn(".AE without .AB");
            return;
        }
        let lines = doc.end_diversion();
        let body = lines.join("\n");
        if body.trim().is_empty() {
            return;
        }
        let body = if body.starts_with("<para") {
            body
        } else {
            format!("<para>{body}</para>")
        };
        doc.meta.abstract_paras.push(body);
    }
}

/// `.NH`/`.SH`: the heading is the text up to the next request.
fn heading(doc: &mut Document, depth: usize) {
    let title = heading_text(doc, &[]);
    let title = doc.render_isolated(&title);
    if strip_tags(&title).trim().is_empty() {
        doc.warn("heading without text");
    }
    doc.push_section(depth, &title);
}

/// ms font macros: `.B word [after [before]]`, or a font change when bare.
fn ms_font(doc: &mut Document, args: &[String], font: &str) {
    let Some(word) = args.first() else {
        doc.font_request(font);
        return;
    };
    let after = args.get(1).map_or("", String::as_str);
    let before = args.get(2).map_or("", String::as_str);
    doc.text_line(&format!("{before}\\f{font}{word}\\fR{after}"));
}

/// Drop lines up to and including the request `end`.
fn skip_to(doc: &mut Document, end: &str) {
    while let Some(line) = doc.next_raw_line() {
        if super::is_request(doc, &line, &[end]) {
            return;
        }
    }
    doc.warn(format!("missing .{end}"));
}

#[cfg(test)]
mod tests {
    use crate::lifter::Lifter;
    use crate::settings::LiftSettings;

    fn lift(source: &str) -> String {
        let mut lifter = Lifter::new(LiftSettings::default());
        match lifter.translate("paper.ms", source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}: {:?}", lifter.diagnostics()),
        }
    }

    #[test]
    fn test_front_matter() {
        let xml = lift(".TL\nOn Lifting\n.AU\nA. Writer\n.AI\nSome Lab\n.AB\nWe lift.\n.AE\n.NH\nIntroduction\n.PP\nBody.\n");
        assert!(xml.contains("<article id='on-lifting'>"));
        assert!(xml.contains("<title>On Lifting</title>"));
        assert!(xml.contains("<othername>A. Writer</othername><affiliation><orgname>Some Lab</orgname></affiliation>"));
        assert!(xml.contains("<abstract>\n<para>We lift.</para>\n</abstract>"));
        assert!(xml.contains("<sect1 id='introduction'><title>Introduction</title>\n<para>Body.</para>"));
    }

    #[test]
    fn test_nested_headings_and_lists() {
        let xml = lift(".TL\nT\n.NH 1\nOne\n.NH 2\nTwo\n.IP 1.\nFirst\n.IP 2.\nSecond\n.LP\nAfter.\n");
        assert!(xml.contains("<sect2 id='two'><title>Two</title>"));
        assert!(xml.contains("<orderedlist remap='IP'>"));
        assert!(xml.contains("</sect2>\n</sect1>"));
        assert!(xml.contains("<para>After.</para>"));
    }

    #[test]
    fn test_display_and_footnote() {
        let xml = lift(".TL\nT\n.PP\nText\\**\n.FS\nThe note.\n.FE\n.DS\na  b\n.DE\n");
        assert!(xml.contains("<footnote><para>The note.</para></footnote>"));
        assert!(xml.contains("<literallayout remap='DS'>a  b</literallayout>"));
    }
}
