//! Classify the plain lines of a synopsis and mark up each run.

use crate::hints::SemanticHints;
use crate::synopsis::SynopsisOutcome;
use crate::synopsis::command::{self, CommandContext, is_natural_language};
use crate::synopsis::function;
use crate::tokenizer::LineTokenizer;

/// Marked-up synopsis.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DisplayResult {
    pub markup: Vec<String>,
    /// Whether at least one command or function synopsis was recognized.
    pub found: bool,
    /// Parse failures on lines that looked like synopses.
    pub warnings: Vec<String>,
    /// Names learned from the synopses, with their hint tag.
    pub learned: Vec<(String, &'static str)>,
}

impl DisplayResult {
    fn flush(&mut self, stash: &mut Vec<String>) {
        if !stash.is_empty() {
            self.markup.push(format!("<para>{}</para>", stash.join("\n")));
            stash.clear();
        }
    }
}

fn is_bare_filename(line: &str) -> bool {
    let line = line.trim();
    line.len() > 1
        && !line.contains(char::is_whitespace)
        && (line.starts_with('/') || line.starts_with("~/"))
}

/// Mark up `lines`, trying a function reading first and a command reading
/// second. Anything neither parser claims becomes paragraph text.
pub fn parse_display(lines: &[String], names: &[String], hints: &SemanticHints) -> DisplayResult {
    let mut tok = LineTokenizer::new(lines.iter().cloned());
    let ctx = CommandContext { names, hints };
    let mut result = DisplayResult::default();
    let mut stash: Vec<String> = Vec::new();

    while let Some(line) = tok.peek_line() {
        if line.trim().is_empty() {
            tok.pop_line();
            result.flush(&mut stash);
            continue;
        }
        if let SynopsisOutcome::Parsed((markup, functions)) = function::parse(&mut tok) {
            result.flush(&mut stash);
            result.markup.push(markup);
            result.found = true;
            result
                .learned
                .extend(functions.into_iter().map(|name| (name, "function")));
            continue;
        }
        let Some(line) = tok.peek_line() else {
            break;
        };
        if is_natural_language(line) {
            if let Some(line) = tok.pop_line() {
                stash.push(line);
            }
            continue;
        }
        match command::parse(&mut tok, &ctx) {
            SynopsisOutcome::Parsed((markup, name)) => {
                result.flush(&mut stash);
                result.markup.push(markup);
                result.found = true;
                result.learned.push((name, "command"));
                continue;
            }
            SynopsisOutcome::Failed(reason) => {
                tracing::debug!(%reason, "command synopsis did not parse");
                result.warnings.push(reason);
            }
            SynopsisOutcome::Declined => {}
        }
        let Some(line) = tok.pop_line() else {
            break;
        };
        if is_bare_filename(&line) {
            result.flush(&mut stash);
            result
                .markup
                .push(format!("<para><filename>{}</filename></para>", line.trim()));
        } else {
            stash.push(line);
        }
    }
    result.flush(&mut stash);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn owned(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| (*l).to_owned()).collect()
    }

    #[test]
    fn test_mixed_display() {
        let hints = SemanticHints::new();
        let result = parse_display(
            &owned(&[
                "#include &lt;string.h&gt;",
                "size_t strlen(const char *s);",
                "",
                "Feature test macro requirements for glibc:",
                "/etc/frob.conf",
            ]),
            &[],
            &hints,
        );
        assert!(result.found);
        assert_eq!(result.markup.len(), 3);
        assert!(result.markup[0].starts_with("<funcsynopsis>"));
        assert_eq!(
            result.markup[1],
            "<para>Feature test macro requirements for glibc:</para>"
        );
        assert_eq!(result.markup[2], "<para><filename>/etc/frob.conf</filename></para>");
        assert_eq!(result.learned, vec![("strlen".to_owned(), "function")]);
    }

    #[test]
    fn test_command_lines_learn_names() {
        let hints = SemanticHints::new();
        let names = owned(&["frob"]);
        let result = parse_display(&owned(&["frob [-v] file", "frob --help"]), &names, &hints);
        assert_eq!(result.markup.len(), 2);
        assert!(result.markup.iter().all(|m| m.starts_with("<cmdsynopsis>")));
        assert_eq!(
            result.learned,
            vec![("frob".to_owned(), "command"), ("frob".to_owned(), "command")]
        );
    }

    #[test]
    fn test_failed_command_becomes_text_with_warning() {
        let hints = SemanticHints::new();
        let names = owned(&["cp"]);
        let result = parse_display(&owned(&["cp [-r src"]), &names, &hints);
        assert!(!result.found);
        assert_eq!(result.markup, vec!["<para>cp [-r src</para>"]);
        assert_eq!(result.warnings.len(), 1);
    }
}
