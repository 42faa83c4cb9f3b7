//! The `me` macro package.

use crate::dialects::{heading_text, indented_paragraph, is_request};
use crate::document::{DisplayKind, Document, ListKind};
use crate::error::LiftError;
use crate::interpreter::{Descriptor, Interpreter, Request};

pub static ME: Descriptor = Descriptor {
    name: "me",
    exclusive: true,
    toptag: "article",
    immutable: &[
        "(b", "(f", "(l", "(q", ")b", ")f", ")l", ")q", "b", "bu", "i", "ip", "lp", "np", "pp",
        "r", "sh", "uh",
    ],
    ignore: &[
        "++", "1c", "2c", "ba", "bc", "bl", "ef", "eh", "ep", "fo", "he", "hl", "hx", "ix", "ld",
        "lo", "m1", "m2", "m3", "m4", "n1", "n2", "of", "oh", "pa", "re", "ro", "sk", "sz", "th",
        "tp", "xp",
    ],
    complain: &["bx"],
    parabreak: &["lp", "pp"],
    sectionbreak: &["sh", "uh", "+c", "$c"],
    listbreak: &["lp", "pp", "sh", "uh", "+c", "$c"],
    scoped: &["(q"],
    translations: &[
        ("-", "&#8212;"),
        ("{", ""),
        ("}", ""),
        ("*", ""),
    ],
    reducible: &["b", "i", "ip", "lp", "pp", "r", "sh", "uh"],
};

/// Blocks opened with `.(x` and closed with `.)x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Quote,
    Display,
    Footnote,
    Keep,
}

#[derive(Debug, Default)]
pub struct MeInterpreter {
    blocks: Vec<(char, Block)>,
}

impl Interpreter for MeInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &ME
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        let name = req.name.as_str();
        match name {
            "sh" => {
                let depth = req.arg(0).parse::<usize>().unwrap_or(1).max(1);
                let args = req.args.get(1..).unwrap_or_default();
                heading(doc, depth, args);
            }
            "uh" | "+c" | "$c" => heading(doc, 1, &req.args),
            "pp" | "lp" => doc.paragraph_break(),
            "ip" => indented_paragraph(doc, req.arg(0), "ip"),
            "np" => list_item(doc, "np", ListKind::Ordered),
            "bu" => list_item(doc, "bu", ListKind::Itemized),
            "b" => me_font(doc, &req.args, "B"),
            "i" | "u" => me_font(doc, &req.args, "I"),
            "r" => me_font(doc, &req.args, "R"),
            "bi" => me_font(doc, &req.args, "BI"),
            "q" => {
                let after = req.arg(1);
                doc.text_line(&format!("&#8220;{}&#8221;{after}", req.arg(0)));
            }
            "tl" if doc.meta.title.is_none() && doc.section_depth() == 0 => {
                if !title_line(doc, &req.rest) {
                    return Ok(false);
                }
            }
            "(x" => skip_block(doc, ")x"),
            "(d" => skip_block(doc, ")d"),
            _ if name.len() == 2 && name.starts_with('(') => self.open_block(doc, name),
            _ if name.len() == 2 && name.starts_with(')') => self.close_block(doc, name),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn wrap_up(&mut self, doc: &mut Document) {
        while let Some((letter, _)) = self.blocks.last().copied() {
            doc.warn(format!("unclosed .({letter}"));
            self.close_block(doc, &format!("){letter}"));
        }
    }
}

impl MeInterpreter {
    fn open_block(&mut self, doc: &mut Document, name: &str) {
        let letter = name.chars().nth(1).unwrap_or(' ');
        let block = match letter {
            'q' => {
                doc.begin_list("(q", ListKind::Blockquote);
                doc.begin_item(None);
                Block::Quote
            }
            'l' => {
                doc.begin_display(DisplayKind::Literal, "(l");
                Block::Display
            }
            'f' => {
                doc.begin_footnote();
                Block::Footnote
            }
            'b' | 'z' | 'c' => {
                doc.paragraph_break();
                Block::Keep
            }
            other => {
                doc.warn(format!("unknown block .({other}"));
                Block::Keep
            }
        };
        self.blocks.push((letter, block));
    }

    fn close_block(&mut self, doc: &mut Document, name: &str) {
        let letter = name.chars().nth(1).unwrap_or(' ');
        let Some(at) = self.blocks.iter().rposition(|(l, _)| *l == letter) else {
            doc.warn(format!(".){letter} without .({letter}"));
            return;
        };
        for (_, block) in self.blocks.drain(at..).rev() {
            match block {
                Block::Quote => {
                    doc.end_list_by("(q");
                }
                Block::Display => {
                    doc.end_display();
                }
                Block::Footnote => doc.end_footnote(),
                Block::Keep => doc.paragraph_break(),
            }
        }
    }
}

fn heading(doc: &mut Document, depth: usize, args: &[String]) {
    let title = heading_text(doc, args);
    let title = doc.render_isolated(&title);
    doc.push_section(depth, &title);
}

/// A `.tl 'left'center'right'` ahead of the first section names the paper.
fn title_line(doc: &mut Document, rest: &str) -> bool {
    let rest = rest.trim();
    let Some(delim) = rest.chars().next() else {
        return false;
    };
    let parts: Vec<&str> = rest[delim.len_utf8()..].split(delim).map(str::trim).collect();
    let title = parts
        .get(1)
        .filter(|c| !c.is_empty())
        .or_else(|| parts.iter().find(|p| !p.is_empty()));
    let Some(title) = title else {
        return false;
    };
    let title = doc.render_isolated(title);
    doc.meta.title = Some(title);
    true
}

/// `.np` and `.bu`: an item of a numbered or bulleted list.
fn list_item(doc: &mut Document, command: &str, kind: ListKind) {
    match doc.top_list() {
        Some((cmd, _)) if cmd == command => {}
        Some((cmd, _)) if cmd == "np" || cmd == "bu" || cmd == "ip" => {
            doc.end_list();
            doc.begin_list(command, kind);
        }
        _ => doc.begin_list(command, kind),
    }
    doc.begin_item(None);
}

/// me font macros: `.b word [after]`, or a font change when bare.
fn me_font(doc: &mut Document, args: &[String], font: &str) {
    let Some(word) = args.first() else {
        doc.font_request(font);
        return;
    };
    let after = args.get(1).map_or("", String::as_str);
    doc.text_line(&format!("\\f{font}{word}\\fR{after}"));
}

fn skip_block(doc: &mut Document, end: &str) {
    while let Some(line) = doc.next_raw_line() {
        if is_request(doc, &line, &[end]) {
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
        match lifter.translate("notes.me", source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}: {:?}", lifter.diagnostics()),
        }
    }

    #[test]
    fn test_sections_and_lists() {
        let xml = lift(".sh 1 \"Getting Started\"\n.pp\nIntro.\n.np\nFirst\n.np\nSecond\n.bu\nDot\n.pp\nDone.\n");
        assert!(xml.contains("<sect1 id='getting-started'><title>Getting Started</title>"));
        assert!(xml.contains("<orderedlist remap='np'>"));
        assert!(xml.contains("<itemizedlist remap='bu'>"));
        assert!(xml.contains("<para>Done.</para>"));
    }

    #[test]
    fn test_blocks() {
        let xml = lift(".pp\nText\n.(q\nQuoted.\n.)q\n.(l\nx  y\n.)l\n.(x\nindex entry\n.)x\n");
        assert!(xml.contains("<blockquote remap='(q'>\n<para>Quoted.</para>\n</blockquote>"));
        assert!(xml.contains("<literallayout remap='(l'>x  y</literallayout>"));
        assert!(!xml.contains("index entry"));
    }

    #[test]
    fn test_title_line_names_the_paper() {
        let xml = lift(".tl ''A Short Paper''\n.sh 1 Intro\n.pp\nText.\n");
        assert!(xml.contains("<articleinfo>\n<title>A Short Paper</title>"));
    }
}
