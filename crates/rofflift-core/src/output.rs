//! Final document assembly: declaration, DOCTYPE, front matter and body.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::Document;
use crate::error::LiftError;
use crate::glyphs;
use crate::text::escape_attr;

static ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<[A-Za-z][\w:-]*) id='").unwrap());

const DOCBOOK4_PUBLIC: &str = "-//OASIS//DTD DocBook XML V4.5//EN";
const DOCBOOK4_SYSTEM: &str = "http://www.oasis-open.org/docbook/xml/4.5/docbookx.dtd";
const DOCBOOK5_NS: &str = "http://docbook.org/ns/docbook";

/// Internal DTD subset lines for used entities and inclusions.
fn internal_subset(doc: &Document) -> Vec<String> {
    let mut decls = Vec::new();
    if doc.is_docbook5() {
        for name in doc.entities() {
            let codepoint = glyphs::by_entity(name).map_or(0xFFFD, |g| g.codepoint);
            decls.push(format!("<!ENTITY {name} \"&#x{codepoint:04X};\">"));
        }
    } else {
        for inclusion in doc.inclusions() {
            decls.push(format!(
                "<!ENTITY {} SYSTEM '{}'>",
                inclusion.entity,
                escape_attr(&inclusion.href)
            ));
        }
    }
    decls
}

fn doctype(doc: &Document, toptag: &str) -> Option<String> {
    let subset = internal_subset(doc);
    let subset = if subset.is_empty() {
        String::new()
    } else {
        format!(" [\n{}\n]", subset.join("\n"))
    };
    if doc.is_docbook5() {
        return (!subset.is_empty()).then(|| format!("<!DOCTYPE {toptag}{subset}>"));
    }
    Some(format!(
        "<!DOCTYPE {toptag} PUBLIC \"{DOCBOOK4_PUBLIC}\" \"{DOCBOOK4_SYSTEM}\"{subset}>"
    ))
}

fn refmeta(doc: &Document) -> String {
    let meta = &doc.meta;
    let mut out = String::from("<refmeta>\n");
    let title = meta.title.clone().unwrap_or_else(|| doc.name.clone());
    out.push_str(&format!("<refentrytitle>{title}</refentrytitle>\n"));
    if let Some(volnum) = &meta.volnum {
        out.push_str(&format!("<manvolnum>{volnum}</manvolnum>\n"));
    }
    for (class, value) in [
        ("date", &meta.date),
        ("source", &meta.source),
        ("manual", &meta.manual),
    ] {
        if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
            out.push_str(&format!("<refmiscinfo class='{class}'>{value}</refmiscinfo>\n"));
        }
    }
    out.push_str("</refmeta>");
    out
}

fn article_info(doc: &Document) -> Option<String> {
    let meta = &doc.meta;
    if meta.title.is_none() && meta.authors.is_empty() && meta.date.is_none() {
        return None;
    }
    let tag = if doc.is_docbook5() { "info" } else { "articleinfo" };
    let mut out = format!("<{tag}>\n");
    if let Some(title) = &meta.title {
        out.push_str(&format!("<title>{title}</title>\n"));
    }
    if !meta.authors.is_empty() {
        out.push_str("<authorgroup>\n");
        for author in &meta.authors {
            out.push_str("<author>");
            if doc.is_docbook5() {
                out.push_str(&format!("<personname>{}</personname>", author.name));
            } else {
                out.push_str(&format!("<othername>{}</othername>", author.name));
            }
            if let Some(affiliation) = &author.affiliation {
                out.push_str(&format!(
                    "<affiliation><orgname>{affiliation}</orgname></affiliation>"
                ));
            }
            out.push_str("</author>\n");
        }
        out.push_str("</authorgroup>\n");
    }
    if let Some(date) = &meta.date {
        out.push_str(&format!("<date>{date}</date>\n"));
    }
    if !meta.abstract_paras.is_empty() {
        out.push_str("<abstract>\n");
        for para in &meta.abstract_paras {
            out.push_str(para);
            out.push('\n');
        }
        out.push_str("</abstract>\n");
    }
    out.push_str(&format!("</{tag}>"));
    Some(out)
}

/// Assemble the complete XML document around `body`.
pub fn assemble(doc: &Document, body: &str) -> String {
    let toptag = doc.toptag();
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    if let Some(doctype) = doctype(doc, toptag) {
        out.push_str(&doctype);
        out.push('\n');
    }

    let id = crate::text::slugify(doc.meta.title.as_deref().unwrap_or(&doc.name));
    if doc.is_docbook5() {
        out.push_str(&format!(
            "<{toptag} xmlns='{DOCBOOK5_NS}' xmlns:xlink='http://www.w3.org/1999/xlink' \
             xmlns:xi='http://www.w3.org/2001/XInclude' version='5.0' xml:id='{id}'>\n"
        ));
    } else {
        out.push_str(&format!("<{toptag} id='{id}'>\n"));
    }

    if doc.is_refentry() {
        out.push_str(&refmeta(doc));
        out.push('\n');
    } else if let Some(info) = article_info(doc) {
        out.push_str(&info);
        out.push('\n');
    }

    if doc.is_docbook5() {
        out.push_str(&ID_ATTR.replace_all(body, "$1 xml:id='"));
    } else {
        out.push_str(body);
    }
    if !body.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("</{toptag}>\n"));

    let fired: Vec<&str> = doc.fired.iter().copied().collect();
    out.push_str(&format!(
        "<!-- Converted by rofflift {} from {}: {} -->\n",
        env!("CARGO_PKG_VERSION"),
        doc.name.replace("--", "- -"),
        fired.join(", ")
    ));
    out
}

/// Re-decode the assembled document using the first encoding that fits.
///
/// The source was read as Latin-1, so each input byte is one char below
/// U+0100. Those bytes are reinterpreted in each candidate encoding;
/// characters produced during translation are kept as character references.
pub fn encode(xml: &str, encodings: &[String]) -> Result<String, LiftError> {
    let mut bytes = Vec::with_capacity(xml.len());
    let mut refs: Vec<(usize, u32)> = Vec::new();
    for c in xml.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(b) => bytes.push(b),
            Err(_) => refs.push((bytes.len(), u32::from(c))),
        }
    }
    let splice = |decoded: Vec<(usize, String)>| -> String {
        let mut out = String::with_capacity(xml.len());
        let mut pending = refs.iter().peekable();
        for (offset, piece) in decoded {
            while let Some((_, codepoint)) = pending.next_if(|(at, _)| *at <= offset) {
                out.push_str(&format!("&#x{codepoint:X};"));
            }
            out.push_str(&piece);
        }
        for (_, codepoint) in pending {
            out.push_str(&format!("&#x{codepoint:X};"));
        }
        out
    };

    for encoding in encodings {
        let decoded = match encoding.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => decode_utf8_pieces(&bytes),
            "iso-8859-1" | "latin-1" | "latin1" => Some(
                bytes
                    .iter()
                    .enumerate()
                    .map(|(i, b)| (i, char::from(*b).to_string()))
                    .collect(),
            ),
            "ascii" | "us-ascii" => bytes.iter().all(u8::is_ascii).then(|| {
                bytes
                    .iter()
                    .enumerate()
                    .map(|(i, b)| (i, char::from(*b).to_string()))
                    .collect()
            }),
            other => {
                tracing::warn!(encoding = other, "unsupported output encoding skipped");
                None
            }
        };
        if let Some(decoded) = decoded {
            tracing::debug!(encoding = %encoding, "output decoded");
            return Ok(splice(decoded));
        }
    }
    Err(LiftError::Decode {
        tried: encodings.to_vec(),
    })
}

/// Decode UTF-8, returning each char with the byte offset it starts at.
fn decode_utf8_pieces(bytes: &[u8]) -> Option<Vec<(usize, String)>> {
    let text = std::str::from_utf8(bytes).ok()?;
    Some(
        text.char_indices()
            .map(|(i, c)| (i, c.to_string()))
            .collect(),
    )
}
