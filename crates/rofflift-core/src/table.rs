//! `tbl` regions (`.TS` … `.TE`) rendered as CALS tables.

use crate::document::Document;

/// Column key letters after modifiers are stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Left,
    Right,
    Center,
    Numeric,
    Alpha,
    /// Horizontal span from the column to the left.
    Span,
    /// Vertical span from the row above.
    Vertical,
    /// Horizontal rule in place of data.
    Rule,
}

impl Key {
    fn from_char(c: char) -> Option<Self> {
        Some(match c.to_ascii_lowercase() {
            'l' => Self::Left,
            'r' => Self::Right,
            'c' => Self::Center,
            'n' => Self::Numeric,
            'a' => Self::Alpha,
            's' => Self::Span,
            '^' => Self::Vertical,
            '_' | '-' | '=' => Self::Rule,
            _ => return None,
        })
    }

    fn align(self) -> Option<&'static str> {
        match self {
            Self::Right | Self::Numeric => Some("right"),
            Self::Center => Some("center"),
            _ => None,
        }
    }

}

type FormatRow = Vec<Key>;

#[derive(Debug, Default)]
struct Options {
    tab: Option<char>,
    frame: bool,
}

fn parse_options(line: &str) -> Options {
    let mut options = Options::default();
    let lower = line.to_ascii_lowercase();
    if let Some(at) = lower.find("tab(") {
        options.tab = line[at + 4..].chars().next().filter(|c| *c != ')');
    }
    options.frame = ["box", "allbox", "frame", "doublebox", "doubleframe"]
        .iter()
        .any(|word| {
            lower
                .split(|c: char| !c.is_ascii_alphabetic())
                .any(|w| w == *word)
        });
    options
}

/// Parse a format specification line; commas separate rows.
fn parse_format_line(line: &str) -> Vec<FormatRow> {
    line.trim_end()
        .trim_end_matches('.')
        .split(',')
        .map(parse_format_row)
        .filter(|row| !row.is_empty())
        .collect()
}

fn parse_format_row(spec: &str) -> FormatRow {
    let chars: Vec<char> = spec.chars().collect();
    let mut keys = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            'f' | 'F' => match chars.get(i) {
                Some('(') => i += 3,
                Some('[') => {
                    while i < chars.len() && chars[i] != ']' {
                        i += 1;
                    }
                    i += 1;
                }
                Some(_) => i += 1,
                None => {}
            },
            'w' | 'W' => {
                if chars.get(i) == Some(&'(') {
                    while i < chars.len() && chars[i] != ')' {
                        i += 1;
                    }
                    i += 1;
                } else {
                    while chars.get(i).is_some_and(char::is_ascii_digit) {
                        i += 1;
                    }
                }
            }
            'p' | 'P' | 'v' | 'V' => {
                if matches!(chars.get(i), Some('+' | '-')) {
                    i += 1;
                }
                while chars.get(i).is_some_and(char::is_ascii_digit) {
                    i += 1;
                }
            }
            other => {
                if let Some(key) = Key::from_char(other) {
                    keys.push(key);
                }
            }
        }
    }
    keys
}

#[derive(Debug)]
struct Cell {
    text: String,
    start: usize,
    end: usize,
    morerows: usize,
    align: Option<&'static str>,
    /// Follows a vertically spanned column, so needs an explicit position.
    positioned: bool,
}

#[derive(Debug, Default)]
struct Row {
    cells: Vec<Cell>,
    rowsep: bool,
}

/// Split one data line into cells, reading `T{ … T}` blocks from `lines`.
fn read_cells<'a>(
    first: &str,
    lines: &mut impl Iterator<Item = &'a String>,
    tab: char,
) -> Vec<String> {
    let mut cells = Vec::new();
    let mut line = first.to_owned();
    loop {
        let mut parts: Vec<String> = line.split(tab).map(str::to_owned).collect();
        let opens_block = parts.last().is_some_and(|p| p.trim() == "T{");
        if !opens_block {
            cells.extend(parts);
            return cells;
        }
        parts.pop();
        cells.extend(parts);
        let mut text = Vec::new();
        let mut rest = None;
        for next in lines.by_ref() {
            if let Some(after) = next.strip_prefix("T}") {
                rest = Some(after.to_owned());
                break;
            }
            if !next.starts_with('.') && !next.starts_with('\'') {
                text.push(next.trim().to_owned());
            }
        }
        cells.push(text.join(" "));
        match rest {
            Some(after) if !after.is_empty() => {
                line = after.strip_prefix(tab).unwrap_or(&after).to_owned();
            }
            _ => return cells,
        }
    }
}

/// Key of `column`, replicating the last column rightward.
fn key_at(format: &FormatRow, column: usize) -> Key {
    format
        .get(column)
        .or_else(|| format.last())
        .copied()
        .unwrap_or(Key::Left)
}

/// Number of leading rows covered by the format lines before the last one
/// without a `^` marker.
fn header_from_formats(formats: &[FormatRow]) -> usize {
    formats
        .iter()
        .rposition(|row| !row.contains(&Key::Vertical))
        .unwrap_or(0)
}

fn render_row(row: &Row) -> String {
    let mut out = if row.rowsep {
        String::from("<row rowsep='1'>")
    } else {
        String::from("<row>")
    };
    for cell in &row.cells {
        out.push_str("<entry");
        if cell.positioned && cell.end == cell.start {
            out.push_str(&format!(" colname='c{}'", cell.start + 1));
        }
        if let Some(align) = cell.align {
            out.push_str(&format!(" align='{align}'"));
        }
        if cell.end > cell.start {
            out.push_str(&format!(
                " namest='c{}' nameend='c{}'",
                cell.start + 1,
                cell.end + 1
            ));
        }
        if cell.morerows > 0 {
            out.push_str(&format!(" morerows='{}'", cell.morerows));
        }
        if cell.text.is_empty() {
            out.push_str("/>");
        } else {
            out.push_str(&format!(">{}</entry>", cell.text));
        }
    }
    out.push_str("</row>");
    out
}

/// Render the lines between `.TS` and `.TE`.
///
/// `explicit_header` is set by `.TS H`; the rows before `.TH` then form the
/// header. Otherwise a `=` rule after the first rows marks it, and failing
/// that the format lines before the last one without a `^` marker do.
pub fn render_table(doc: &mut Document, lines: &[String], explicit_header: bool) {
    let mut lines = lines.iter().filter(|l| !crate::text::is_comment(l)).peekable();
    let mut options = Options::default();
    if lines.peek().is_some_and(|l| l.trim_end().ends_with(';'))
        && let Some(line) = lines.next()
    {
        options = parse_options(line);
    }
    let tab = options.tab.unwrap_or('\t');

    let mut formats: Vec<FormatRow> = Vec::new();
    for line in lines.by_ref() {
        formats.extend(parse_format_line(line));
        if line.trim_end().ends_with('.') {
            break;
        }
    }
    if formats.is_empty() {
        doc.warn("table has no column format");
        formats.push(vec![Key::Left]);
    }
    let format_header = header_from_formats(&formats);

    let mut rows: Vec<Row> = Vec::new();
    let mut row_formats: Vec<FormatRow> = Vec::new();
    let mut format_base = 0;
    let mut header_rows: Option<usize> = None;
    let mut separators = 0;
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        match trimmed {
            ".TH" => {
                if explicit_header {
                    header_rows = Some(rows.len());
                }
                continue;
            }
            ".T&amp;" | ".T&" => {
                let mut extra = Vec::new();
                for line in lines.by_ref() {
                    extra.extend(parse_format_line(line));
                    if line.trim_end().ends_with('.') {
                        break;
                    }
                }
                if !extra.is_empty() {
                    formats = extra;
                    format_base = rows.len();
                }
                continue;
            }
            "_" | "=" | "-" => {
                separators += 1;
                if trimmed == "=" && separators == 1 && header_rows.is_none() && (1..=3).contains(&rows.len())
                {
                    header_rows = Some(rows.len());
                } else if let Some(last) = rows.last_mut() {
                    last.rowsep = true;
                }
                continue;
            }
            _ => {}
        }
        if line.starts_with('.') || line.starts_with('\'') {
            continue;
        }
        let format_row = formats
            .get(rows.len() - format_base)
            .or_else(|| formats.last())
            .cloned()
            .unwrap_or_default();
        let cells = read_cells(line, &mut lines, tab);
        rows.push(build_row(doc, &cells, &format_row));
        row_formats.push(format_row);
    }
    if rows.is_empty() {
        doc.warn("table has no rows");
        return;
    }

    let cols = row_formats
        .iter()
        .map(Vec::len)
        .chain(rows.iter().map(|r| r.cells.last().map_or(0, |c| c.end + 1)))
        .max()
        .unwrap_or(1)
        .max(1);
    apply_vertical_spans(&mut rows, &row_formats);

    let header = header_rows
        .unwrap_or(format_header)
        .min(rows.len().saturating_sub(1));

    let mut markup = Vec::new();
    let frame = if options.frame { "all" } else { "none" };
    let title = doc.table_title.take();
    let tag = if title.is_some() { "table" } else { "informaltable" };
    match &title {
        Some(title) => markup.push(format!(
            "<table remap='TS' frame='{frame}'><title>{title}</title>"
        )),
        None => markup.push(format!("<informaltable remap='TS' frame='{frame}'>")),
    }
    markup.push(format!("<tgroup cols='{cols}'>"));
    for col in 1..=cols {
        markup.push(format!("<colspec colname='c{col}'/>"));
    }
    if header > 0 {
        markup.push("<thead>".to_owned());
        markup.extend(rows[..header].iter().map(render_row));
        markup.push("</thead>".to_owned());
    }
    markup.push("<tbody>".to_owned());
    markup.extend(rows[header..].iter().map(render_row));
    markup.push("</tbody>".to_owned());
    markup.push("</tgroup>".to_owned());
    markup.push(format!("</{tag}>"));
    tracing::debug!(rows = rows.len(), cols, header, "table rendered");
    doc.emit_markup(&markup.join("\n"));
}

fn build_row(doc: &mut Document, cells: &[String], format: &FormatRow) -> Row {
    let width = cells.len().max(format.len());
    let mut row = Row::default();
    let mut shifted = false;
    for column in 0..width {
        let key = key_at(format, column);
        let data = cells.get(column).map_or("", |c| c.trim());
        if key == Key::Span
            && let Some(last) = row.cells.last_mut()
        {
            last.end = column;
            continue;
        }
        if key == Key::Vertical || data == "\\^" {
            shifted = true;
            continue;
        }
        let text = match data {
            "_" | "=" | "\\_" | "\\=" => String::new(),
            _ if key == Key::Rule || data.starts_with("\\R") => String::new(),
            _ => doc.render_isolated(data),
        };
        row.cells.push(Cell {
            text,
            start: column,
            end: column,
            morerows: 0,
            align: key.align(),
            positioned: shifted,
        });
    }
    row
}

/// Extend cells downward over `^` markers in the rows below them.
fn apply_vertical_spans(rows: &mut [Row], formats: &[FormatRow]) {
    for index in 1..rows.len() {
        let format = &formats[index];
        let covered: Vec<usize> = (0..format.len().max(1))
            .filter(|col| key_at(format, *col) == Key::Vertical)
            .collect();
        for column in covered {
            let above = (0..index).rev().find_map(|r| {
                rows[r]
                    .cells
                    .iter()
                    .position(|c| c.start <= column && column <= c.end)
                    .map(|pos| (r, pos))
            });
            if let Some((r, pos)) = above {
                rows[r].cells[pos].morerows += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::SemanticHints;
    use crate::settings::LiftSettings;
    use pretty_assertions::assert_eq;

    fn render(lines: &[&str], explicit_header: bool) -> String {
        let mut doc = Document::new("t", LiftSettings::default(), SemanticHints::new());
        let lines: Vec<String> = lines.iter().map(|l| (*l).to_owned()).collect();
        render_table(&mut doc, &lines, explicit_header);
        doc.finish().join("\n")
    }

    #[test]
    fn test_rule_after_first_row_makes_header() {
        assert_eq!(
            render(&["l l.", "Name\tValue", "=", "a\t1", "b\t2"], false),
            "<informaltable remap='TS' frame='none'>\n<tgroup cols='2'>\n\
             <colspec colname='c1'/>\n<colspec colname='c2'/>\n\
             <thead>\n<row><entry>Name</entry><entry>Value</entry></row>\n</thead>\n\
             <tbody>\n<row><entry>a</entry><entry>1</entry></row>\n\
             <row><entry>b</entry><entry>2</entry></row>\n</tbody>\n\
             </tgroup>\n</informaltable>"
        );
    }

    #[test]
    fn test_options_spans_and_replicated_formats() {
        let out = render(&["box tab(:);", "c s", "l n.", "Title", "x:1", "y:22"], false);
        assert!(out.starts_with("<informaltable remap='TS' frame='all'>"));
        assert!(out.contains(
            "<thead>\n<row><entry align='center' namest='c1' nameend='c2'>Title</entry></row>\n</thead>"
        ));
        assert!(out.contains("<row><entry>y</entry><entry align='right'>22</entry></row>"));
    }

    #[test]
    fn test_vertical_spans_and_text_blocks() {
        let out = render(&["l l", "^ l.", "a\tT{", "long", "text", "T}", "\tb"], false);
        assert!(out.contains("<row><entry morerows='1'>a</entry><entry>long text</entry></row>"));
        assert!(out.contains("<row><entry colname='c2'>b</entry></row>"));
    }

    #[test]
    fn test_format_lines_before_last_unspanned_make_header() {
        let out = render(&["l l", "l l.", "Name\tValue", "a\tb"], false);
        assert!(out.contains(
            "<thead>\n<row><entry>Name</entry><entry>Value</entry></row>\n</thead>\n\
             <tbody>\n<row><entry>a</entry><entry>b</entry></row>\n</tbody>"
        ));
    }

    #[test]
    fn test_vertical_span_stays_in_header() {
        let out = render(&["c s", "l ^", "l l.", "Title", "Sub", "a\tb"], false);
        assert!(out.contains(
            "<thead>\n\
             <row><entry align='center' namest='c1' nameend='c2' morerows='1'>Title</entry></row>\n\
             <row><entry>Sub</entry></row>\n</thead>"
        ));
        assert!(out.contains("<tbody>\n<row><entry>a</entry><entry>b</entry></row>\n</tbody>"));
    }

    #[test]
    fn test_single_format_line_has_no_header() {
        let out = render(&["l l.", "a\tb", "c\td"], false);
        assert!(!out.contains("<thead>"));
    }

    #[test]
    fn test_explicit_header_and_title() {
        let mut doc = Document::new("t", LiftSettings::default(), SemanticHints::new());
        doc.table_title = Some("Limits".to_owned());
        let lines: Vec<String> = ["l l.", "k\tv", ".TH", "a\tb"]
            .iter()
            .map(|l| (*l).to_owned())
            .collect();
        render_table(&mut doc, &lines, true);
        let out = doc.finish().join("\n");
        assert!(out.starts_with("<table remap='TS' frame='none'><title>Limits</title>"));
        assert!(out.contains("<thead>\n<row><entry>k</entry><entry>v</entry></row>\n</thead>"));
        assert!(out.ends_with("</table>"));
    }
}
