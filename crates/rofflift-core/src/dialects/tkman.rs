//! The Tcl/Tk `man.macros` extensions to `man`.

use crate::dialects::{gather_lines, is_request};
use crate::document::{DisplayKind, Document, ListKind};
use crate::error::LiftError;
use crate::interpreter::{Descriptor, Interpreter, Request};

pub static TKMAN: Descriptor = Descriptor {
    immutable: &["AP", "AS", "BE", "BS", "CE", "CS", "DE", "DS", "OP", "SE", "SO", "VE", "VS"],
    ignore: &["AS", "BE", "BS", "VE", "VS"],
    ..Descriptor::empty("tkman")
};

#[derive(Debug)]
pub struct TkManInterpreter;

impl Interpreter for TkManInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &TKMAN
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        match req.name.as_str() {
            "AP" => {
                let mut term = format!("\\fI{}\\fR \\fB{}\\fR", req.arg(0), req.arg(1));
                if !req.arg(2).is_empty() {
                    term.push_str(&format!(" ({})", req.arg(2)));
                }
                tagged_item(doc, "AP", &term);
            }
            "OP" if req.args.len() == 3 => {
                let fields = [
                    ("Command-Line Name", req.arg(0)),
                    ("Database Name", req.arg(1)),
                    ("Database Class", req.arg(2)),
                ];
                let terms: Vec<String> = fields
                    .iter()
                    .map(|(label, value)| format!("{label}: \\fB{value}\\fR"))
                    .collect();
                let terms: Vec<String> = terms.iter().map(|t| doc.render_isolated(t)).collect();
                open_list(doc, "OP");
                doc.begin_item(Some(&terms.join("</term><term>")));
            }
            "CS" => doc.begin_display(DisplayKind::Program, "CS"),
            "CE" => {
                if !doc.end_display() {
                    doc.warn(".CE without .CS");
                }
            }
            "DS" => doc.begin_display(DisplayKind::Literal, "DS"),
            "DE" => {
                if !doc.end_display() {
                    doc.warn(".DE without .DS");
                }
            }
            "SO" => standard_options(doc, req.arg(0)),
            "SE" => doc.warn(".SE without .SO"),
            "QW" => {
                let text = format!("&#8220;{}&#8221;{}", req.arg(0), req.arg(1));
                doc.text_line(&text);
            }
            "PQ" => {
                let text = format!("(&#8220;{}&#8221;{}){}", req.arg(0), req.arg(1), req.arg(2));
                doc.text_line(&text);
            }
            "QR" => {
                let text = format!(
                    "&#8220;{}&#8221;&#8211;&#8220;{}&#8221;{}",
                    req.arg(0),
                    req.arg(1),
                    req.arg(2)
                );
                doc.text_line(&text);
            }
            "MT" if req.args.is_empty() => doc.text_line("&#8220;&#8221;"),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn open_list(doc: &mut Document, command: &str) {
    if doc.top_list().is_none_or(|(cmd, _)| cmd != command) {
        doc.begin_list(command, ListKind::Variable);
    }
}

fn tagged_item(doc: &mut Document, command: &str, term: &str) {
    let term = doc.render_isolated(term);
    open_list(doc, command);
    doc.begin_item(Some(&term));
}

/// `.SO` … `.SE`: the standard options a widget supports, as a section.
fn standard_options(doc: &mut Document, page: &str) {
    doc.push_section(1, "STANDARD OPTIONS");
    let mut options = Vec::new();
    loop {
        options.extend(gather_lines(doc).into_iter().flat_map(|line| {
            line.split(['\t', ' '])
                .filter(|w| !w.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        }));
        let Some(line) = doc.next_raw_line() else {
            doc.warn(".SO without .SE");
            break;
        };
        if is_request(doc, &line, &["SE"]) {
            break;
        }
    }
    let page = if page.is_empty() { "options" } else { page };
    let mut markup = String::from("<simplelist type='vert'>");
    for option in &options {
        let option = doc.render_isolated(option);
        markup.push_str(&format!("<member><option>{option}</option></member>"));
    }
    markup.push_str("</simplelist>");
    doc.emit_markup(&format!("<para>{markup}</para>"));
    doc.emit_markup(&format!(
        "<para>See the <citerefentry><refentrytitle>{page}</refentrytitle></citerefentry> manual entry for details on the standard options.</para>"
    ));
}

#[cfg(test)]
mod tests {
    use crate::lifter::Lifter;
    use crate::settings::LiftSettings;

    fn lift(source: &str) -> String {
        let mut lifter = Lifter::new(LiftSettings::default());
        match lifter.translate("button.n", source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}: {:?}", lifter.diagnostics()),
        }
    }

    #[test]
    fn test_argument_list_and_code() {
        let xml = lift(".so man.macros\n.TH button n\n.SH NAME\nbutton \\- make a button\n.SH ARGUMENTS\n.AP Tcl_Interp *interp in\nInterpreter.\n.CS\nbutton .b\n.CE\n");
        assert!(xml.contains("<variablelist remap='AP'>"));
        assert!(xml.contains("<emphasis remap='I'>Tcl_Interp</emphasis>"));
        assert!(xml.contains("<programlisting remap='CS'>button .b</programlisting>"));
    }

    #[test]
    fn test_standard_options() {
        let xml = lift(".so man.macros\n.TH button n\n.SH NAME\nbutton \\- make a button\n.SO\n\\-background\t\\-font\n.SE\n.SH DESCRIPTION\nText.\n");
        assert!(xml.contains("<refsect1 id='standard-options'><title>STANDARD OPTIONS</title>"));
        assert!(xml.contains("<member><option>-background</option></member><member><option>-font</option></member>"));
    }
}
