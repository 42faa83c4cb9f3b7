//! Extension macros emitted by Perl's `Pod::Man`.

use crate::dialects::{heading_text, indented_paragraph, index_term};
use crate::document::{DisplayKind, Document};
use crate::error::LiftError;
use crate::interpreter::{Descriptor, Interpreter, Request};

pub static POD2MAN: Descriptor = Descriptor {
    immutable: &["IX", "Ip", "Sh", "Sp", "Vb", "Ve"],
    translations: &[
        ("--", "&#8212;"),
        ("PI", "&#960;"),
        ("C+", "C++"),
        ("C`", "&#8220;"),
        ("C'", "&#8221;"),
        ("L\"", "&#8220;"),
        ("R\"", "&#8221;"),
        ("Aq", "'"),
    ],
    ..Descriptor::empty("pod2man")
};

/// First line of the accent-mark boilerplate in the generated preamble.
const BOILERPLATE_START: &str = "Fear.  Run.  Save yourself.";

#[derive(Debug)]
pub struct Pod2ManInterpreter;

impl Interpreter for Pod2ManInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &POD2MAN
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        match req.name.as_str() {
            "Vb" => doc.begin_display(DisplayKind::Literal, "Vb"),
            "Ve" => {
                if !doc.end_display() {
                    doc.warn(".Ve without .Vb");
                }
            }
            "Sp" => {
                if doc.in_display() {
                    doc.text_line("");
                } else {
                    doc.paragraph_break();
                }
            }
            "IX" => {
                // `.IX Title` and `.IX Header` duplicate the page structure.
                if !matches!(req.arg(0), "Title" | "Header" | "Name") {
                    index_term(doc, req.args.get(1..).unwrap_or_default());
                }
            }
            "Sh" => {
                let title = heading_text(doc, &req.args);
                let title = doc.render_isolated(&title);
                doc.push_section(2, &title);
            }
            "Ip" => indented_paragraph(doc, req.arg(0), "IP"),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Drop the accent-mark definitions, which only make sense to troff.
    fn preprocess(&mut self, text: String) -> String {
        let Some(start) = text.find(BOILERPLATE_START) else {
            return text;
        };
        let line_start = text[..start].rfind('\n').map_or(0, |p| p + 1);
        let Some(rm) = text[start..].find("\n.rm #[") else {
            return text;
        };
        let end = start + rm + 1;
        let end = text[end..].find('\n').map_or(text.len(), |p| end + p + 1);
        tracing::debug!(bytes = end - line_start, "dropped Pod::Man accent preamble");
        format!("{}{}", &text[..line_start], &text[end..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifter::Lifter;
    use crate::settings::LiftSettings;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_preamble_is_dropped() {
        let text = ".\\\" Fear.  Run.  Save yourself.  No user-serviceable parts.\n.if n \\{\\\n.ds #H 0\n.\\}\n.rm #[ #] #H #V #F C\n.TH FOO 1\n".to_owned();
        assert_eq!(Pod2ManInterpreter.preprocess(text), ".TH FOO 1\n");
    }

    #[test]
    fn test_verbatim_and_index() {
        let source = ".\\\" Automatically generated by Pod::Man 4.14\n.de Vb\n.ft CW\n.nf\n..\n.TH FOO 1\n.SH NAME\nfoo \\- frobnicate\n.SH DESCRIPTION\n.IX Header \"DESCRIPTION\"\nSee\n.IX Item \"frobbing\"\n.Vb 1\n\\&  foo \\-x\n.Ve\n";
        let mut lifter = Lifter::new(LiftSettings::default());
        let xml = match lifter.translate("foo.1", source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}"),
        };
        assert!(xml.contains("<literallayout remap='Vb'>  foo -x</literallayout>"));
        assert!(xml.contains("<indexterm><primary>frobbing</primary></indexterm>"));
        assert!(!xml.contains("<primary>DESCRIPTION</primary>"));
    }
}
