//! The groff `www` hypertext macros.

use crate::dialects::link_markup;
use crate::document::{Document, ListKind};
use crate::error::LiftError;
use crate::inline::plain_text;
use crate::interpreter::{Descriptor, Interpreter, Request};
use crate::text::{escape_attr, slugify, strip_tags};

pub static WWW: Descriptor = Descriptor {
    immutable: &["FTP", "MTO", "URL"],
    ignore: &[
        "BCL", "BGIMG", "DC", "HTL", "HTML", "HTMLINDEX", "HX", "JOBNAME", "LINKSTYLE", "LK",
        "NHR", "NOLINKS",
    ],
    ..Descriptor::empty("www")
};

#[derive(Debug)]
pub struct WwwInterpreter;

impl Interpreter for WwwInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &WWW
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        match req.name.as_str() {
            "URL" | "FTP" => {
                let url = strip_tags(&plain_text(req.arg(0)));
                let text = doc.render_isolated(req.arg(1));
                let markup = link_markup(doc, &url, &text);
                doc.text_line(&format!("{markup}{}", req.arg(2)));
            }
            "MTO" => {
                let address = strip_tags(&plain_text(req.arg(0)));
                let text = doc.render_isolated(req.arg(1));
                let markup = if text.is_empty() || text == address {
                    format!("<email>{address}</email>")
                } else {
                    link_markup(doc, &format!("mailto:{}", escape_attr(&address)), &text)
                };
                doc.text_line(&format!("{markup}{}", req.arg(2)));
            }
            "HR" => doc.paragraph_break(),
            "TAG" => {
                let id = slugify(req.arg(0));
                let markup = format!("<anchor id='{id}'/>");
                if doc.in_para() {
                    doc.push_close(&markup);
                } else {
                    doc.emit_markup(&markup);
                }
            }
            "IMG" | "PIMG" | "MPIMG" => {
                let file = req
                    .args
                    .iter()
                    .find(|a| !matches!(a.as_str(), "-l" | "-r" | "-c" | "-L" | "-R"))
                    .map_or("", String::as_str);
                if file.is_empty() {
                    doc.warn(format!(".{} without a file", req.name));
                } else {
                    doc.close_para();
                    doc.emit_markup(&format!(
                        "<mediaobject><imageobject><imagedata fileref='{}'/></imageobject></mediaobject>",
                        escape_attr(file)
                    ));
                }
            }
            "ULS" => doc.begin_list("ULS", ListKind::Itemized),
            "OLS" => doc.begin_list("OLS", ListKind::Ordered),
            "ULE" | "OLE" => {
                let opener = if req.name == "ULE" { "ULS" } else { "OLS" };
                if !doc.end_list_by(opener) {
                    doc.warn(format!(".{} without .{opener}", req.name));
                }
            }
            "LI" if doc.top_list().is_some_and(|(cmd, _)| cmd == "ULS" || cmd == "OLS") => {
                doc.begin_item(None);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::lifter::Lifter;
    use crate::settings::{DocBookVersion, LiftSettings};

    fn lift(source: &str, settings: LiftSettings) -> String {
        let mut lifter = Lifter::new(settings);
        match lifter.translate("page.1", source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}: {:?}", lifter.diagnostics()),
        }
    }

    const PAGE: &str = ".TH PAGE 1\n.SH NAME\npage \\- a page\n.SH SEE ALSO\nVisit\n.URL https://example.org \"the site\" .\nor mail\n.MTO bugs@example.org\n";

    #[test]
    fn test_links() {
        let xml = lift(PAGE, LiftSettings::default());
        assert!(xml.contains("<ulink url='https://example.org'>the site</ulink>."));
        assert!(xml.contains("<email>bugs@example.org</email>"));
    }

    #[test]
    fn test_links_in_docbook5() {
        let settings = LiftSettings {
            docbook: DocBookVersion::V5,
            ..LiftSettings::default()
        };
        let xml = lift(PAGE, settings);
        assert!(xml.contains("<link xlink:href='https://example.org'>the site</link>."));
    }
}
