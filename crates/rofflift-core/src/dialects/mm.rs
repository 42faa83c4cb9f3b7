//! The `mm` memorandum macros.

use crate::dialects::{alternate_fonts, gather_lines, heading_text};
use crate::document::{Author, DisplayKind, Document, ListKind};
use crate::error::LiftError;
use crate::interpreter::{Descriptor, Interpreter, Request};

pub static MM: Descriptor = Descriptor {
    name: "mm",
    exclusive: true,
    toptag: "article",
    immutable: &[
        "AL", "AS", "AE", "AU", "B", "BL", "DE", "DL", "DS", "FE", "FS", "H", "HU", "I", "LE",
        "LI", "ML", "P", "R", "RL", "TL", "VL",
    ],
    ignore: &[
        "AV", "AVL", "COVEND", "COVER", "EF", "EH", "EPIC", "FC", "FD", "HC", "HM", "LC", "MT",
        "NE", "NS", "OF", "OH", "OP", "PF", "PGFORM", "PH", "PM", "RP", "SA", "SG", "SK", "SP",
        "TC", "WC",
    ],
    complain: &[],
    parabreak: &["P"],
    sectionbreak: &["H", "HU"],
    listbreak: &["H", "HU"],
    scoped: &[],
    translations: &[("BU", "&#8226;"), ("EM", "&#8212;"), ("F", "")],
    reducible: &["B", "H", "HU", "I", "LI", "P", "R"],
};

#[derive(Debug, Default)]
pub struct MmInterpreter {
    in_abstract: bool,
}

impl Interpreter for MmInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &MM
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        match req.name.as_str() {
            "TL" => {
                let title = gather_lines(doc).join(" ");
                let title = doc.render_isolated(&title);
                doc.meta.title = (!title.trim().is_empty()).then_some(title);
            }
            "AU" => {
                if let Some(name) = req.args.first().filter(|n| !n.trim().is_empty()) {
                    let name = doc.render_isolated(name);
                    doc.meta.authors.push(Author {
                        name,
                        affiliation: None,
                    });
                }
            }
            "AF" => {
                let company = doc.render_isolated(&req.joined());
                for author in &mut doc.meta.authors {
                    author.affiliation.get_or_insert_with(|| company.clone());
                }
            }
            "ND" => {
                let date = req.joined();
                doc.meta.date = (!date.trim().is_empty()).then(|| doc.render_isolated(&date));
            }
            "AS" => {
                doc.close_para();
                doc.begin_diversion();
                self.in_abstract = true;
            }
            "AE" => self.end_abstract(doc),
            "H" => {
                let depth = req.arg(0).parse::<usize>().unwrap_or(1).max(1);
                let title = heading_text(doc, req.args.get(1..2).unwrap_or_default());
                let mut title = doc.render_isolated(&title);
                title.push_str(&doc.render_isolated(req.arg(2)));
                doc.push_section(depth, &title);
            }
            "HU" => {
                let depth = if doc.section_depth() > 0 { 2 } else { 1 };
                let title = heading_text(doc, &req.args);
                let title = doc.render_isolated(&title);
                doc.push_section(depth, &title);
            }
            "P" => doc.paragraph_break(),
            "AL" => {
                let numeration = match req.arg(0) {
                    "a" => " numeration='loweralpha'",
                    "A" => " numeration='upperalpha'",
                    "i" => " numeration='lowerroman'",
                    "I" => " numeration='upperroman'",
                    _ => "",
                };
                doc.begin_list_with("AL", ListKind::Ordered, numeration);
            }
            "RL" | "LB" => doc.begin_list(&req.name, ListKind::Ordered),
            "BL" => doc.begin_list_with("BL", ListKind::Itemized, " mark='bullet'"),
            "DL" => doc.begin_list_with("DL", ListKind::Itemized, " mark='dash'"),
            "ML" => doc.begin_list("ML", ListKind::Itemized),
            "VL" => doc.begin_list("VL", ListKind::Variable),
            "LI" => match doc.top_list() {
                Some((_, ListKind::Variable)) => {
                    let term = doc.render_isolated(&req.joined());
                    doc.begin_item(Some(&term));
                }
                Some(_) => doc.begin_item(None),
                None => {
                    doc.warn(".LI outside a list");
                    doc.paragraph_break();
                }
            },
            "LE" => {
                if doc.list_depth() == 0 {
                    doc.warn(".LE without list");
                } else {
                    doc.end_list();
                }
            }
            "DS" | "DF" => doc.begin_display(DisplayKind::Literal, &req.name),
            "DE" => {
                if !doc.end_display() {
                    doc.warn(".DE without display");
                }
            }
            "FS" | "RS" => doc.begin_footnote(),
            "FE" | "RF" => doc.end_footnote(),
            "TB" => {
                let title = doc.render_isolated(&req.joined());
                doc.table_title = Some(title);
            }
            "FG" | "EC" | "EX" => {
                let caption = doc.render_isolated(&req.joined());
                doc.paragraph_break();
                doc.emit_markup(&format!("<para remap='{}'>{caption}</para>", req.name));
            }
            "B" => mm_font(doc, &req.args, ["B", "R"]),
            "I" => mm_font(doc, &req.args, ["I", "R"]),
            "R" => doc.font_request("R"),
            "BI" => alternate_fonts(doc, &req.args, ["B", "I"]),
            "BR" => alternate_fonts(doc, &req.args, ["B", "R"]),
            "IB" => alternate_fonts(doc, &req.args, ["I", "B"]),
            "IR" => alternate_fonts(doc, &req.args, ["I", "R"]),
            "RB" => alternate_fonts(doc, &req.args, ["R", "B"]),
            "RI" => alternate_fonts(doc, &req.args, ["R", "I"]),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn wrap_up(&mut self, doc: &mut Document) {
        if self.in_abstract {
            doc.warn(".AS without .AE");
            self.end_abstract(doc);
        }
    }
}

impl MmInterpreter {
    fn end_abstract(&mut self, doc: &mut Document) {
        if !std::mem::take(&mut self.in_abstract) {
            doc.warn(".AE without .AS");
            return;
        }
        let body = doc.end_diversion().join("\n");
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

/// `.B`/`.I` alternate with roman when given arguments.
fn mm_font(doc: &mut Document, args: &[String], fonts: [&str; 2]) {
    if args.is_empty() {
        doc.font_request(fonts[0]);
    } else {
        alternate_fonts(doc, args, fonts);
    }
}

#[cfg(test)]
mod tests {
    use crate::lifter::Lifter;
    use crate::settings::LiftSettings;
    use pretty_assertions::assert_eq;

    fn lift(source: &str) -> String {
        let mut lifter = Lifter::new(LiftSettings::default());
        match lifter.translate("memo.mm", source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}: {:?}", lifter.diagnostics()),
        }
    }

    #[test]
    fn test_memo_front_and_headings() {
        let xml = lift(".TL\nQuarterly Plan\n.AU \"Pat Doe\" PD\n.AF \"Acme Labs\"\n.MT 4\n.H 1 \"Goals\"\n.P\nShip it.\n.H 2 \"Details\"\n.P\nMore.\n");
        assert!(xml.contains("<title>Quarterly Plan</title>"));
        assert!(xml.contains("<othername>Pat Doe</othername><affiliation><orgname>Acme Labs</orgname></affiliation>"));
        assert!(xml.contains("<sect1 id='goals'><title>Goals</title>"));
        assert!(xml.contains("<sect2 id='details'><title>Details</title>\n<para>More.</para>"));
    }

    #[test]
    fn test_lists() {
        let xml = lift(".H 1 \"Lists\"\n.AL a\n.LI\nFirst\n.LI\nSecond\n.LE\n.VL 10\n.LI term\nDefinition\n.LE\n");
        assert!(xml.contains("<orderedlist numeration='loweralpha' remap='AL'>"));
        assert!(xml.contains("<varlistentry><term>term</term>"));
        assert_eq!(xml.matches("<listitem>").count(), 3);
    }
}
