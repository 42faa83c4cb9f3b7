//! Line-level primitives shared by the interpreters and sub-parsers.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Escape text for inclusion in XML character data.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape text for a single-quoted XML attribute value.
///
/// Input is expected to be character data already (entities intact), so only
/// quotes and stray angle brackets are touched.
#[must_use]
pub fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\'' => result.push_str("&apos;"),
            '"' => result.push_str("&quot;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Undo [`escape_xml`] plus the quote entities.
#[must_use]
pub fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_owned();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Remove every markup tag, leaving character data.
#[must_use]
pub fn strip_tags(s: &str) -> String {
    TAG.replace_all(s, "").into_owned()
}

/// True when the line is a troff comment (`.\"`, `'\"`, `\"`, `\#`).
#[must_use]
pub fn is_comment(line: &str) -> bool {
    let body = line
        .strip_prefix('.')
        .or_else(|| line.strip_prefix('\''))
        .map_or(line, str::trim_start);
    body.starts_with("\\\"") || body.starts_with("\\#")
}

/// Text of a comment line with the comment leader removed.
#[must_use]
pub fn comment_text(line: &str) -> &str {
    for leader in ["\\\"", "\\#"] {
        if let Some(pos) = line.find(leader) {
            return line[pos + leader.len()..].trim();
        }
    }
    line
}

/// True when the line starts with one of the control characters.
#[must_use]
pub fn is_command(line: &str, cc: char, c2: char) -> bool {
    line.starts_with(cc) || line.starts_with(c2)
}

/// Split a control line into its request name and the unparsed remainder.
///
/// Returns `None` for a bare control character. Names end at whitespace or at
/// an escape, so `.el\{` yields `("el", "\{")`.
#[must_use]
pub fn split_command(line: &str, cc: char, c2: char) -> Option<(String, &str)> {
    let body = line.strip_prefix(cc).or_else(|| line.strip_prefix(c2))?;
    let body = body.trim_start_matches([' ', '\t']);
    let end = body
        .find(|c: char| c.is_whitespace() || c == '\\')
        .unwrap_or(body.len());
    if end == 0 {
        return None;
    }
    let rest = body[end..].strip_prefix([' ', '\t']).unwrap_or(&body[end..]);
    Some((body[..end].to_owned(), rest))
}

/// Split request arguments the way troff does.
///
/// Whitespace separates arguments, an escaped space does not, and a double
/// quote groups an argument in which `""` stands for a literal quote.
#[must_use]
pub fn parse_args(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = s.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut arg = String::new();
        if first == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        arg.push('"');
                    } else {
                        break;
                    }
                } else {
                    arg.push(c);
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ' ' || c == '\t' {
                    break;
                }
                chars.next();
                arg.push(c);
                if c == '\\'
                    && let Some(next) = chars.next()
                {
                    arg.push(next);
                }
            }
        }
        args.push(arg);
    }
    args
}

/// Quote an argument so that [`parse_args`] returns it unchanged.
#[must_use]
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains([' ', '\t', '"']) {
        format!("\"{}\"", arg.replace('"', "\"\""))
    } else {
        arg.to_owned()
    }
}

/// Decode bytes as Latin-1, which maps every byte to one char.
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Convert text to an XML-id friendly slug.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut result = String::new();
    let mut last_was_dash = true;

    for c in strip_tags(text).trim().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && (c.is_whitespace() || c == '-' || c == '_' || c == '.') {
            result.push('-');
            last_was_dash = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }
    if !result.starts_with(|c: char| c.is_ascii_alphabetic()) {
        result.insert(0, 'x');
    }
    result
}

/// Generated XML ids with per-base occurrence counts.
#[derive(Debug, Default)]
pub struct IdRegistry {
    counts: HashMap<String, usize>,
}

impl IdRegistry {
    /// Produce a unique id for `text`, suffixing repeats as `base-n`.
    pub fn make_id(&mut self, text: &str) -> String {
        let base = slugify(text);
        let count = self.counts.entry(base.clone()).or_default();
        let id = match *count {
            0 => base,
            n => format!("{base}-{n}"),
        };
        *count += 1;
        id
    }

    /// Whether an id has been handed out for this base.
    pub fn contains(&self, base: &str) -> bool {
        self.counts.contains_key(base)
    }
}

/// Whether the token is a C-style identifier.
#[must_use]
pub fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_args_quoting() {
        assert_eq!(
            parse_args(r#"foo "bar baz" "" qu""ux "say ""hi""""#),
            vec!["foo", "bar baz", "", "qu\"\"ux", "say \"hi\""]
        );
    }

    #[test]
    fn test_parse_args_escaped_space() {
        assert_eq!(parse_args(r"a\ b c"), vec![r"a\ b", "c"]);
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command(".SH NAME", '.', '\''), Some(("SH".to_owned(), "NAME")));
        assert_eq!(split_command(".  TP", '.', '\''), Some(("TP".to_owned(), "")));
        assert_eq!(split_command(r".el\{\", '.', '\''), Some(("el".to_owned(), r"\{\")));
        assert_eq!(split_command(".", '.', '\''), None);
    }

    #[test]
    fn test_is_comment() {
        assert!(is_comment(r#".\" a comment"#));
        assert!(is_comment(r#"'\" t"#));
        assert!(is_comment(r#"\" bare"#));
        assert!(!is_comment(".SH NAME"));
    }

    #[test]
    fn test_slugify_and_registry() {
        let mut ids = IdRegistry::default();
        assert_eq!(ids.make_id("SEE ALSO"), "see-also");
        assert_eq!(ids.make_id("SEE ALSO"), "see-also-1");
        assert_eq!(ids.make_id("2. Usage"), "x2-usage");
    }

    #[test]
    fn test_escape_roundtrip_entities() {
        assert_eq!(escape_xml("a<b & c>"), "a&lt;b &amp; c&gt;");
        assert_eq!(unescape_xml("a&lt;b &amp;amp;"), "a<b &amp;");
    }
}
