//! The `man` macro package (including the groff extensions).

use crate::dialects::{
    alternate_fonts, font_line, gather_name_text, indented_paragraph, index_term, is_request,
    lift_synopsis, link_markup, name_section,
};
use crate::document::{DisplayKind, Document, ListKind};
use crate::error::LiftError;
use crate::inline::plain_text;
use crate::interpreter::{Descriptor, Interpreter, Request};
use crate::synopsis::deformat::deformat;
use crate::synopsis::parse_display;
use crate::text::{escape_attr, parse_args, split_command, strip_tags};

pub static MAN: Descriptor = Descriptor {
    name: "man",
    exclusive: true,
    toptag: "refentry",
    immutable: &[
        "B", "BI", "BR", "I", "IB", "IP", "IR", "LP", "P", "PP", "RB", "RE", "RI", "RS", "SH",
        "SS", "TH", "TP",
    ],
    ignore: &["AT", "DT", "PD", "UC", "UN", "hw", "ne"],
    complain: &[],
    parabreak: &["HP", "LP", "P", "PP"],
    sectionbreak: &["SH", "SS"],
    listbreak: &["HP", "LP", "P", "PP", "SH", "SS"],
    scoped: &["RS"],
    translations: &[
        ("R", "&#174;"),
        ("Tm", "&#8482;"),
        ("lq", "&#8220;"),
        ("rq", "&#8221;"),
    ],
    reducible: &[
        "B", "BI", "BR", "I", "IB", "IP", "IR", "LP", "P", "PP", "RB", "RI", "SH", "SS", "TP",
    ],
};

/// Requests that end a man section.
const SECTION_ENDS: &[&str] = &["SH", "SS"];

#[derive(Debug, Default)]
pub struct ManInterpreter;

impl Interpreter for ManInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &MAN
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        match req.name.as_str() {
            "TH" => title_header(doc, req),
            "SH" => section(doc, req, 1),
            "SS" => section(doc, req, 2),
            "PP" | "LP" | "P" | "HP" => doc.paragraph_break(),
            "TP" => {
                if doc.top_list().is_some_and(|(cmd, _)| cmd == "IP") {
                    doc.end_list();
                }
                if doc.top_list().is_none_or(|(cmd, _)| cmd != "TP") {
                    doc.begin_list("TP", ListKind::Variable);
                }
                doc.begin_item(None);
            }
            "TQ" => {
                if !doc.add_term() {
                    doc.warn(".TQ without a preceding tagged paragraph");
                }
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
            "B" | "SB" => font_line(doc, &req.args, "B"),
            "I" => font_line(doc, &req.args, "I"),
            "SM" => font_line(doc, &req.args, "R"),
            "BI" => alternate_fonts(doc, &req.args, ["B", "I"]),
            "BR" => alternate_fonts(doc, &req.args, ["B", "R"]),
            "IB" => alternate_fonts(doc, &req.args, ["I", "B"]),
            "IR" => alternate_fonts(doc, &req.args, ["I", "R"]),
            "RB" => alternate_fonts(doc, &req.args, ["R", "B"]),
            "RI" => alternate_fonts(doc, &req.args, ["R", "I"]),
            "SY" => synopsis_block(doc, req),
            "OP" => {
                let mut text = format!("[\\fB{}\\fR", req.arg(0));
                if !req.arg(1).is_empty() {
                    text.push_str(&format!(" \\fI{}\\fR", req.args[1..].join(" ")));
                }
                text.push(']');
                doc.text_line(&text);
            }
            "YS" => doc.paragraph_break(),
            "UR" => link_block(doc, req.arg(0), "UE", false),
            "MT" => link_block(doc, req.arg(0), "ME", true),
            "UE" | "ME" => doc.warn(format!(".{} without opening macro", req.name)),
            "EX" => doc.begin_display(DisplayKind::Program, "EX"),
            "EE" => {
                if !doc.end_display() {
                    doc.warn(".EE without .EX");
                }
            }
            "IX" => index_term(doc, &req.args),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn title_header(doc: &mut Document, req: &Request) {
    let field = |i: usize| {
        let value = strip_tags(&plain_text(req.arg(i)));
        let value = value.trim().to_owned();
        (!value.is_empty()).then_some(value)
    };
    doc.meta.title = field(0);
    doc.meta.volnum = field(1);
    doc.meta.date = field(2);
    doc.meta.source = field(3);
    doc.meta.manual = field(4);
    if doc.meta.title.is_none() {
        doc.warn(".TH without a title");
    }
}

/// Section title from the arguments, or from the next line when there are
/// none.
fn section_title(doc: &mut Document, req: &Request) -> String {
    if !req.args.is_empty() {
        return req.joined();
    }
    if doc.next_is_command() {
        if let Some(line) = doc.next_line()
            && let Some((_, rest)) = split_command(&line, doc.troff.cc, doc.troff.c2)
        {
            return parse_args(rest).join(" ");
        }
        return String::new();
    }
    doc.next_line().unwrap_or_default()
}

fn section(doc: &mut Document, req: &Request, depth: usize) {
    let title = section_title(doc, req);
    let plain = strip_tags(&plain_text(&title)).trim().to_uppercase();
    if depth == 1 && doc.is_refentry() {
        match plain.as_str() {
            "NAME" | "NAMN" | "NOM" | "NOMBRE" => {
                doc.pop_sections(1);
                let text = gather_name_text(doc);
                name_section(doc, &text);
                return;
            }
            "SYNOPSIS" | "SYNTAX" | "SYNOPSE" | "SINOPSIS" => {
                let rendered = doc.render_isolated(&title);
                doc.push_synopsis_section(&rendered);
                lift_synopsis(doc, SECTION_ENDS);
                return;
            }
            _ => {}
        }
    }
    let rendered = doc.render_isolated(&title);
    doc.push_section(depth, &rendered);
}

/// `.SY` outside a synopsis section: try the command parser on the block.
fn synopsis_block(doc: &mut Document, req: &Request) {
    let mut lines = vec![req.line.clone()];
    let mut closed = false;
    while let Some(line) = doc.next_raw_line() {
        let end = is_request(doc, &line, &["YS"]);
        let stop = is_request(doc, &line, &["SY", "SH", "SS"]);
        if stop {
            doc.input.push_line(line);
            break;
        }
        lines.push(line);
        if end {
            closed = true;
            break;
        }
    }
    let parsed = deformat(doc, &lines).map(|plain| {
        let names = doc.meta.names.clone();
        parse_display(&plain, &names, &doc.hints)
    });
    if let Some(result) = parsed.filter(|r| r.found) {
        doc.close_para();
        for markup in &result.markup {
            doc.emit_markup(markup);
        }
        return;
    }
    if !closed {
        doc.warn(".SY without .YS");
    }
    doc.paragraph_break();
    doc.text_line(&format!("\\fB{}\\fR", req.joined()));
    doc.input.push_lines(lines.into_iter().skip(1));
}

/// `.UR url` … `.UE` and `.MT addr` … `.ME`.
fn link_block(doc: &mut Document, target: &str, end: &str, mail: bool) {
    let target = strip_tags(&plain_text(target));
    let mut text = Vec::new();
    let mut tail = String::new();
    loop {
        let at_end = doc.input.peek_line().map(|line| {
            (
                is_request(doc, line, &[end]),
                crate::text::is_command(line, doc.troff.cc, doc.troff.c2),
            )
        });
        match at_end {
            Some((true, _)) => {
                if let Some(line) = doc.next_line()
                    && let Some((_, rest)) = split_command(&line, doc.troff.cc, doc.troff.c2)
                {
                    tail = parse_args(rest).join(" ");
                }
                break;
            }
            Some((false, false)) => {
                if let Some(line) = doc.next_line() {
                    text.push(doc.render_isolated(line.trim()));
                }
            }
            Some((false, true)) => break,
            None => {
                doc.warn(format!("missing .{end}"));
                break;
            }
        }
    }
    let text = text.join(" ");
    let markup = if mail {
        if text.is_empty() || text == target {
            format!("<email>{target}</email>")
        } else {
            link_markup(doc, &format!("mailto:{}", escape_attr(&target)), &text)
        }
    } else {
        link_markup(doc, &target, &text)
    };
    doc.text_line(&format!("{markup}{tail}"));
}

#[cfg(test)]
mod tests {
    use crate::lifter::Lifter;
    use crate::settings::LiftSettings;

    fn lift(source: &str) -> String {
        let mut lifter = Lifter::new(LiftSettings::default());
        match lifter.translate("frob.1", source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}: {:?}", lifter.diagnostics()),
        }
    }

    #[test]
    fn test_name_section_and_refmeta() {
        let xml = lift(".TH FROB 1 2024-01-01 \"frob 1.0\" \"User Commands\"\n.SH NAME\nfrob \\- twiddle bits\n.SH DESCRIPTION\nText.\n");
        assert!(xml.contains("<refentrytitle>FROB</refentrytitle>"));
        assert!(xml.contains("<manvolnum>1</manvolnum>"));
        assert!(xml.contains(
            "<refnamediv><refname>frob</refname><refpurpose>twiddle bits</refpurpose></refnamediv>"
        ));
        assert!(xml.contains("<refsect1 id='description'><title>DESCRIPTION</title>\n<para>Text.</para>"));
    }

    #[test]
    fn test_synopsis_section_is_parsed() {
        let xml = lift(".TH FROB 1\n.SH NAME\nfrob \\- twiddle\n.SH SYNOPSIS\n.B frob\n[\\fB\\-v\\fR]\n.I file\n\\&...\n.SH DESCRIPTION\nText.\n");
        assert!(xml.contains("<refsynopsisdiv id='synopsis'><title>SYNOPSIS</title>"));
        assert!(xml.contains("<cmdsynopsis>\n<command>frob</command>"));
        assert!(xml.contains("<arg choice='opt'><option>-v</option></arg>"));
        assert!(xml.contains("<arg choice='plain' rep='repeat'><replaceable>file</replaceable></arg>"));
    }

    #[test]
    fn test_tagged_and_indented_lists() {
        let xml = lift(".TH FROB 1\n.SH OPTIONS\n.TP\n.B \\-v\n.TQ\n.B \\-\\-verbose\nVerbose.\n.IP \\(bu 4\nOne\n.IP \\(bu\nTwo\n.PP\nAfter.\n");
        assert!(xml.contains(
            "<varlistentry>\n<term><emphasis role='strong' remap='B'>-v</emphasis></term>"
        ) || xml.contains("<term><option remap='B'>-v</option></term>"));
        assert!(xml.contains("<itemizedlist remap='IP'>"));
        assert!(xml.contains("<para>After.</para>"));
        assert_eq!(xml.matches("<listitem>").count(), xml.matches("</listitem>").count());
    }

    #[test]
    fn test_relative_indent_and_url() {
        let xml = lift(".TH FROB 1\n.SH SEE ALSO\n.RS\nIndented.\n.RE\n.UR https://example.org\nthe site\n.UE .\n");
        assert!(xml.contains("<blockquote remap='RS'>\n<para>Indented.</para>\n</blockquote>"));
        assert!(xml.contains("<ulink url='https://example.org'>the site</ulink>."));
    }

    #[test]
    fn test_example_display() {
        let xml = lift(".TH FROB 1\n.SH EXAMPLES\n.EX\nfrob \\-v a\n.EE\n");
        assert!(xml.contains("<programlisting remap='EX'>frob -v a</programlisting>"));
    }
}
