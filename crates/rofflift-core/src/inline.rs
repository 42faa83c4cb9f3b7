//! Inline escape translation: fonts, special glyphs and spacing escapes.
//!
//! Text arrives XML-escaped, so `\(<=` is seen as `\(&lt;=` and `\&` as
//! `\&amp;`; escape names are read one logical character at a time.
//! Register interpolation (`\n`) and the motion escapes (`\s`, `\h`, `\v`)
//! are left in place for the emitter.

use crate::document::Document;
use crate::glyphs;
use crate::text::{escape_xml, unescape_xml};
use crate::troff::expr::approximate_width;

/// A troff font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Font {
    #[default]
    Roman,
    Bold,
    Italic,
    BoldItalic,
    Constant,
    ConstantBold,
    ConstantItalic,
}

impl Font {
    /// Font for a troff font name or position; `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "R" | "1" | "CR" | "TR" | "HR" => Self::Roman,
            "B" | "3" | "TB" | "HB" => Self::Bold,
            "I" | "2" | "TI" | "HI" => Self::Italic,
            "BI" | "4" | "TBI" | "HBI" => Self::BoldItalic,
            "CW" | "C" | "L" | "CO" => Self::Constant,
            "CB" | "CWB" => Self::ConstantBold,
            "CI" | "CWI" => Self::ConstantItalic,
            _ => return None,
        })
    }

    fn open_tag(self) -> &'static str {
        match self {
            Self::Roman => "",
            Self::Bold => "<emphasis role='strong' remap='B'>",
            Self::Italic => "<emphasis remap='I'>",
            Self::BoldItalic => "<emphasis role='strong' remap='BI'>",
            Self::Constant => "<literal remap='CW'>",
            Self::ConstantBold => "<literal remap='CB'>",
            Self::ConstantItalic => "<literal remap='CI'>",
        }
    }

    fn close_tag(self) -> &'static str {
        match self {
            Self::Roman => "",
            Self::Bold | Self::Italic | Self::BoldItalic => "</emphasis>",
            Self::Constant | Self::ConstantBold | Self::ConstantItalic => "</literal>",
        }
    }
}

/// Current and previous font, and whether the current one has been opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontState {
    pub current: Font,
    pub previous: Font,
    open: bool,
}

/// Escapes whose delimited argument is dropped with them.
const DELIMITED_DROPS: &[char] = &[
    'A', 'B', 'D', 'H', 'L', 'R', 'S', 'X', 'Z', 'b', 'l', 'o', 'x',
];

/// Escapes whose name argument is dropped with them.
const NAMED_DROPS: &[char] = &['F', 'O', 'V', 'Y', 'g', 'k', 'm', 'M', '$'];

impl Document {
    /// Translate the inline escapes of one line of (escaped) troff text.
    pub fn render_inline(&mut self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len() + 16);
        if self.font.current != Font::Roman && !self.font.open && !text.trim().is_empty() {
            out.push_str(self.font.current.open_tag());
            self.font.open = true;
        }
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c != '\\' {
                out.push(c);
                i += 1;
                continue;
            }
            let Some(&e) = chars.get(i + 1) else {
                break;
            };
            i += 2;
            match e {
                'f' => {
                    let (name, next) = read_escape_name(&chars, i);
                    i = next;
                    self.apply_font_name(&name, &mut out);
                }
                '(' | '[' => {
                    let (name, next) = read_escape_name(&chars, i - 1);
                    i = next;
                    out.push_str(&self.glyph_markup(&name));
                }
                'C' => {
                    let (name, next) = read_delimited(&chars, i);
                    i = next;
                    out.push_str(&self.glyph_markup(&unescape_xml(&name)));
                }
                'N' => {
                    let (number, next) = read_delimited(&chars, i);
                    i = next;
                    match number.trim().parse::<u32>() {
                        Ok(n) => out.push_str(&format!("&#{n};")),
                        Err(_) => self.warn(format!("bad \\N argument `{number}`")),
                    }
                }
                '&' => {
                    // `\&` arrives as `\&amp;`.
                    if chars[i..].starts_with(&['a', 'm', 'p', ';']) {
                        i += 4;
                    }
                }
                '"' | '#' => break,
                '|' | '^' | '%' | ':' | 'c' | ',' | '/' | '{' | '}' | 'a' | 'E' | 'p' | 'r'
                | 'd' | 'u' | 'z' => {}
                ' ' | '~' => out.push_str("&#160;"),
                '0' => out.push(' '),
                '-' => out.push('-'),
                'e' | '\\' => out.push_str("&#92;"),
                '\'' => out.push('\''),
                '`' => out.push('`'),
                '.' => out.push('.'),
                't' => out.push('\t'),
                'n' | 's' | 'h' | 'v' => {
                    out.push('\\');
                    out.push(e);
                }
                'w' => {
                    let (measured, next) = read_delimited(&chars, i);
                    i = next;
                    let width = approximate_width(&unescape_xml(&measured));
                    out.push_str(&width.to_string());
                }
                d if DELIMITED_DROPS.contains(&d) => {
                    i = read_delimited(&chars, i).1;
                }
                d if NAMED_DROPS.contains(&d) => {
                    i = read_escape_name(&chars, i).1;
                }
                other => out.push(other),
            }
        }
        out
    }

    /// Render text as a self-contained fragment with its fonts closed.
    pub fn render_isolated(&mut self, text: &str) -> String {
        let saved = std::mem::take(&mut self.font);
        let mut out = self.render_inline(text);
        out.push_str(&self.take_font_close());
        self.font = saved;
        let out = self.troff.interpolate_registers(&out);
        crate::document::strip_motions(&out)
    }

    /// Closing tag for the open font, resetting to roman.
    pub(crate) fn take_font_close(&mut self) -> String {
        let close = if self.font.open {
            self.font.current.close_tag()
        } else {
            ""
        };
        self.font = FontState::default();
        close.to_owned()
    }

    /// `.ft`: switch font for following text.
    pub fn font_request(&mut self, name: &str) {
        let close = if self.font.open {
            self.font.current.close_tag()
        } else {
            ""
        };
        if !close.is_empty() {
            self.push_close(close);
        }
        self.font.open = false;
        let target = match name {
            "" | "P" => Some(self.font.previous),
            other => Font::from_name(other),
        };
        match target {
            Some(font) => {
                self.font.previous = self.font.current;
                self.font.current = font;
            }
            None => self.warn(format!("unknown font {name}")),
        }
    }

    fn apply_font_name(&mut self, name: &str, out: &mut String) {
        let target = match name {
            "" | "P" => self.font.previous,
            other => match Font::from_name(other) {
                Some(font) => font,
                None => {
                    self.warn(format!("unknown font {other}"));
                    return;
                }
            },
        };
        if self.font.open {
            out.push_str(self.font.current.close_tag());
            self.font.open = false;
        }
        self.font.previous = self.font.current;
        self.font.current = target;
        if target != Font::Roman {
            out.push_str(target.open_tag());
            self.font.open = true;
        }
    }

    fn glyph_markup(&mut self, name: &str) -> String {
        if let Some(hex) = name.strip_prefix('u')
            && !hex.is_empty()
            && hex.chars().all(|c| c.is_ascii_hexdigit() || c == '_')
        {
            let first = hex.split('_').next().unwrap_or(hex);
            return format!("&#x{first};");
        }
        if let Some(def) = self.troff.glyph_defs.get(name) {
            return def.clone();
        }
        if let Some(glyph) = glyphs::lookup(name) {
            return match glyph.entity {
                Some(entity) => {
                    self.record_entity(entity);
                    format!("&{entity};")
                }
                None => char::from_u32(glyph.codepoint)
                    .map(|c| escape_xml(&c.to_string()))
                    .unwrap_or_default(),
            };
        }
        if name.chars().count() == 1 {
            return escape_xml(name);
        }
        self.warn(format!("unknown glyph \\[{name}]"));
        escape_xml(name)
    }
}

/// One character of escaped text, turning `&lt;` `&gt;` `&amp;` back into one char.
fn read_logical(chars: &[char], i: usize) -> Option<(char, usize)> {
    let c = *chars.get(i)?;
    if c == '&' {
        for (entity, plain) in [("lt;", '<'), ("gt;", '>'), ("amp;", '&')] {
            let entity: Vec<char> = entity.chars().collect();
            if chars[i + 1..].starts_with(&entity) {
                return Some((plain, i + 1 + entity.len()));
            }
        }
    }
    Some((c, i + 1))
}

/// Read an escape name at `i`: `x`, `(xx` or `[name]`, unescaped.
pub(crate) fn read_escape_name(chars: &[char], i: usize) -> (String, usize) {
    match chars.get(i) {
        Some('(') => {
            let mut name = String::new();
            let mut pos = i + 1;
            for _ in 0..2 {
                match read_logical(chars, pos) {
                    Some((c, next)) => {
                        name.push(c);
                        pos = next;
                    }
                    None => break,
                }
            }
            (name, pos)
        }
        Some('[') => {
            let mut end = i + 1;
            while end < chars.len() && chars[end] != ']' {
                end += 1;
            }
            let raw: String = chars[i + 1..end].iter().collect();
            (unescape_xml(&raw), (end + 1).min(chars.len()))
        }
        Some(_) => match read_logical(chars, i) {
            Some((c, next)) => (c.to_string(), next),
            None => (String::new(), i),
        },
        None => (String::new(), i),
    }
}

/// Read a delimited argument such as `'text'` at `i`.
fn read_delimited(chars: &[char], i: usize) -> (String, usize) {
    let Some(&delim) = chars.get(i) else {
        return (String::new(), i);
    };
    let mut end = i + 1;
    while end < chars.len() && chars[end] != delim {
        end += 1;
    }
    let text: String = chars[(i + 1).min(chars.len())..end].iter().collect();
    (text, (end + 1).min(chars.len()))
}

/// Strip every escape from a line, keeping its plain text (already escaped).
pub fn plain_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let Some(&e) = chars.get(i + 1) else {
            break;
        };
        i += 2;
        match e {
            'f' | 'n' | 'F' | 'k' | 'm' | 'M' | 'g' | 'Y' | 'V' | '*' | '$' => {
                if e == 'n' && matches!(chars.get(i), Some('+' | '-')) {
                    i += 1;
                }
                i = read_escape_name(&chars, i).1;
            }
            '(' | '[' => {
                let (name, next) = read_escape_name(&chars, i - 1);
                i = next;
                match glyphs::lookup(&name) {
                    Some(glyph) => {
                        if let Some(c) = char::from_u32(glyph.codepoint) {
                            out.push_str(&escape_xml(&c.to_string()));
                        }
                    }
                    None => out.push_str(&escape_xml(&name)),
                }
            }
            's' => {
                if matches!(chars.get(i), Some('+' | '-')) {
                    i += 1;
                }
                if chars.get(i).is_some_and(char::is_ascii_digit) {
                    i += 1;
                } else {
                    i = read_escape_name(&chars, i).1;
                }
            }
            '&' => {
                if chars[i..].starts_with(&['a', 'm', 'p', ';']) {
                    i += 4;
                }
            }
            '"' | '#' => break,
            '-' => out.push('-'),
            'e' | '\\' => out.push('\\'),
            ' ' | '~' | '0' => out.push(' '),
            '|' | '^' | '%' | ':' | 'c' | ',' | '/' | '{' | '}' | 'a' | 'E' | 'p' | 'r' | 'd'
            | 'u' | 'z' => {}
            d if DELIMITED_DROPS.contains(&d) || matches!(d, 'h' | 'v' | 'w' | 'N' | 'C') => {
                i = read_delimited(&chars, i).1;
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::SemanticHints;
    use crate::settings::LiftSettings;
    use pretty_assertions::assert_eq;

    fn doc() -> Document {
        Document::new("t", LiftSettings::default(), SemanticHints::new())
    }

    #[test]
    fn test_font_escapes() {
        let mut doc = doc();
        assert_eq!(
            doc.render_inline(r"\fBbold\fR and \fIital\fP \f(CWcode\fR"),
            "<emphasis role='strong' remap='B'>bold</emphasis> and \
             <emphasis remap='I'>ital</emphasis> <literal remap='CW'>code</literal>"
        );
    }

    #[test]
    fn test_font_previous_restores() {
        let mut doc = doc();
        assert_eq!(
            doc.render_inline(r"\fBa\fIb\fPc\fR"),
            "<emphasis role='strong' remap='B'>a</emphasis><emphasis remap='I'>b</emphasis>\
             <emphasis role='strong' remap='B'>c</emphasis>"
        );
    }

    #[test]
    fn test_font_spanning_lines_is_closed_on_request() {
        let mut doc = doc();
        assert_eq!(doc.render_inline(r"\fBstart"), "<emphasis role='strong' remap='B'>start");
        assert_eq!(doc.take_font_close(), "</emphasis>");
    }

    #[test]
    fn test_glyphs_and_entities() {
        let mut doc = doc();
        assert_eq!(
            doc.render_inline(r"a\(emb \(&lt;= \[u00E9] \N'65' \[bu]"),
            "a&mdash;b &le; &#x00E9; &#65; &bull;"
        );
        assert!(doc.entities().contains("mdash"));
        assert!(doc.entities().contains("le"));
    }

    #[test]
    fn test_spacing_escapes() {
        let mut doc = doc();
        assert_eq!(doc.render_inline(r"\&amp;.x a\-b c\e d\ e f\|g\c"), ".x a-b c&#92; d&#160;e fg");
    }

    #[test]
    fn test_width_escape_becomes_estimate() {
        let mut doc = doc();
        assert_eq!(doc.render_inline(r"indent \w'abc'n"), "indent 3n");
        assert_eq!(doc.render_inline(r"\w'a&amp;b'"), "3");
    }

    #[test]
    fn test_motions_left_for_emitter() {
        let mut doc = doc();
        assert_eq!(doc.render_inline(r"\s-1SMALL\s0 \nx"), r"\s-1SMALL\s0 \nx");
    }

    #[test]
    fn test_comment_escape_truncates() {
        let mut doc = doc();
        assert_eq!(doc.render_inline(r#"text \" comment"#), "text ");
    }

    #[test]
    fn test_render_isolated_keeps_outer_font() {
        let mut doc = doc();
        let _ = doc.render_inline(r"\fB");
        assert_eq!(
            doc.render_isolated(r"\fIx"),
            "<emphasis remap='I'>x</emphasis>"
        );
        assert_eq!(doc.font.current, Font::Bold);
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(plain_text(r"\fB\-v\fR, \fI\-\-verbose\fP\(em\s-1x\s0"), "-v, --verbose\u{2014}x");
    }
}
