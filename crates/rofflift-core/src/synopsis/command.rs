//! Unix command-line synopses: `tar [-cxtf] file ...` → `cmdsynopsis`.

use crate::hints::SemanticHints;
use crate::synopsis::SynopsisOutcome;
use crate::synopsis::node::{Choice, NodeKind, ParseNode};
use crate::tokenizer::{LineTokenizer, NEWLINE};

/// Names known to be commands (NAME-section names and hints).
pub struct CommandContext<'a> {
    pub names: &'a [String],
    pub hints: &'a SemanticHints,
}

impl CommandContext<'_> {
    fn is_known(&self, word: &str) -> bool {
        self.names.iter().any(|n| n == word) || self.hints.is(word, "command")
    }
}

/// Separate grouping punctuation and ellipses from words.
fn pretokenize(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 16);
    let mut rest = line;
    while let Some(c) = rest.chars().next() {
        if rest.starts_with("...") {
            out.push_str(" ... ");
            rest = &rest[3..];
            continue;
        }
        match c {
            '[' | ']' | '{' | '}' | '|' => {
                out.push(' ');
                out.push(c);
                out.push(' ');
            }
            _ => out.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Whether a line reads as running prose rather than code.
pub fn is_natural_language(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() < 4 || line.contains('[') || line.contains('|') {
        return false;
    }
    let prose_words = words
        .iter()
        .filter(|w| {
            let w = w.trim_end_matches(['.', ',', ';', ':']);
            !w.is_empty() && w.chars().all(char::is_alphabetic)
        })
        .count();
    let ends_like_sentence = line.trim_end().ends_with(['.', ':', ',']);
    prose_words * 10 >= words.len() * 7 && (ends_like_sentence || prose_words == words.len())
}

/// Scored guess whether `line` is a command synopsis.
pub fn is_command_synopsis_line(line: &str, ctx: &CommandContext<'_>) -> bool {
    let Some(first) = line.split_whitespace().next() else {
        return false;
    };
    if first.starts_with(['-', '[', '{', '|', '#']) {
        return false;
    }
    if !first
        .chars()
        .all(|c| c.is_alphanumeric() || "._+-/:".contains(c))
    {
        return false;
    }
    if ctx.is_known(first) {
        return true;
    }
    if is_natural_language(line) {
        return false;
    }
    let mut score = 0;
    for word in line.split_whitespace().skip(1) {
        if word.starts_with('-') && word.len() > 1 {
            score += 2;
        }
        if word.contains('[') || word.contains('|') {
            score += 2;
        }
        if word.contains("...") || word.contains('=') {
            score += 1;
        }
    }
    let balanced = line.matches('[').count() == line.matches(']').count()
        && line.matches('{').count() == line.matches('}').count();
    score >= 2 && balanced
}

/// Recent tokens, for error messages.
fn context(seen: &[String]) -> String {
    let start = seen.len().saturating_sub(6);
    seen[start..].join(" ")
}

struct Parser<'a> {
    tok: &'a mut LineTokenizer,
    seen: Vec<String>,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<String> {
        let token = self.tok.token_pop()?;
        if token != NEWLINE {
            self.seen.push(token.clone());
        }
        Some(token)
    }

    /// Whether the line after the current one continues this synopsis.
    fn continues(&self) -> bool {
        self.tok
            .peek_line()
            .map(str::trim_start)
            .is_some_and(|l| l.starts_with(['[', '{', '-', '|']) && !l.starts_with("--- "))
    }

    /// Parse a sequence up to `closer`, returning its alternatives.
    fn sequence(&mut self, closer: Option<&str>) -> Result<Vec<Vec<ParseNode>>, String> {
        let mut alternatives: Vec<Vec<ParseNode>> = vec![Vec::new()];
        loop {
            let Some(token) = self.next() else {
                return match closer {
                    Some(closer) => Err(format!(
                        "missing `{closer}` after `{}`",
                        context(&self.seen)
                    )),
                    None => Ok(alternatives),
                };
            };
            let current = alternatives.len() - 1;
            match token.as_str() {
                NEWLINE => {
                    if closer.is_none() && !self.continues() {
                        return Ok(alternatives);
                    }
                }
                "[" | "{" => {
                    let (inner_closer, choice) = if token == "[" {
                        ("]", Choice::Opt)
                    } else {
                        ("}", Choice::Req)
                    };
                    let inner = self.sequence(Some(inner_closer))?;
                    alternatives[current].push(group_node(inner, choice));
                }
                "]" | "}" => {
                    if closer == Some(token.as_str()) {
                        return Ok(alternatives);
                    }
                    return Err(format!("unbalanced `{token}` in `{}`", context(&self.seen)));
                }
                "|" => alternatives.push(Vec::new()),
                "..." => match alternatives[current].last_mut() {
                    Some(node) => node.repeat = true,
                    None => {
                        return Err(format!(
                            "ellipsis with nothing to repeat in `{}`",
                            context(&self.seen)
                        ));
                    }
                },
                word => {
                    let node = ParseNode::word(word);
                    let node = if node.kind == NodeKind::Redirect {
                        self.bind_redirect(node)
                    } else {
                        node
                    };
                    alternatives[current].push(node);
                }
            }
        }
    }

    /// Join a redirection and the word it applies to into one `arg`.
    fn bind_redirect(&mut self, redirect: ParseNode) -> ParseNode {
        let Some(target) = self
            .tok
            .token_peek()
            .filter(|t| !matches!(*t, NEWLINE | "[" | "{" | "]" | "}" | "|" | "..."))
            .map(str::to_owned)
        else {
            return redirect;
        };
        self.next();
        ParseNode::container(
            NodeKind::Arg,
            Choice::Plain,
            vec![redirect, ParseNode::word(&target)],
        )
    }
}

/// Build the node for a bracketed sequence.
fn group_node(alternatives: Vec<Vec<ParseNode>>, choice: Choice) -> ParseNode {
    if alternatives.len() == 1 {
        let mut children = alternatives.into_iter().next().unwrap_or_default();
        if children.len() == 1 && matches!(children[0].kind, NodeKind::Arg | NodeKind::Group) {
            let mut only = children.remove(0);
            if choice == Choice::Req && only.choice == Choice::Opt {
                return ParseNode::container(NodeKind::Arg, choice, vec![only]);
            }
            only.choice = choice;
            return only;
        }
        return ParseNode::container(NodeKind::Arg, choice, children);
    }
    let children = alternatives
        .into_iter()
        .filter(|alt| !alt.is_empty())
        .map(|mut alt| {
            if alt.len() == 1 {
                let mut only = alt.remove(0);
                if matches!(only.kind, NodeKind::Arg | NodeKind::Group) {
                    return only;
                }
                let repeat = std::mem::take(&mut only.repeat);
                let mut arg = ParseNode::container(NodeKind::Arg, Choice::Plain, vec![only]);
                arg.repeat = repeat;
                arg
            } else {
                ParseNode::container(NodeKind::Arg, Choice::Plain, alt)
            }
        })
        .collect();
    ParseNode::container(NodeKind::Group, choice, children)
}

/// Parse one command synopsis.
///
/// Returns the markup and the command name. A line that looked like a
/// synopsis but failed to parse is reported as `Failed` with the reason; the
/// tokenizer is rolled back in every non-`Parsed` case.
pub fn parse(
    tok: &mut LineTokenizer,
    ctx: &CommandContext<'_>,
) -> SynopsisOutcome<(String, String)> {
    let Some(line) = tok.peek_line() else {
        return SynopsisOutcome::Declined;
    };
    if !is_command_synopsis_line(line, ctx) {
        return SynopsisOutcome::Declined;
    }
    let start = tok.checkpoint();
    tok.set_pretokenizer(Some(pretokenize));
    let mut parser = Parser {
        tok,
        seen: Vec::new(),
    };
    let command = parser.next();
    let result = parser.sequence(None);
    parser.tok.set_pretokenizer(None);

    let (Some(command), Ok(alternatives)) = (command, result.clone()) else {
        tok.unroll(start);
        return match result {
            Err(reason) => SynopsisOutcome::Failed(reason),
            Ok(_) => SynopsisOutcome::Declined,
        };
    };
    if alternatives.len() > 1 {
        tok.unroll(start);
        return SynopsisOutcome::Failed(format!("alternation outside brackets after {command}"));
    }
    let mut markup = format!("<cmdsynopsis>\n<command>{command}</command>\n");
    for node in alternatives.into_iter().flatten() {
        let node_markup = node.markup();
        if !node_markup.is_empty() {
            markup.push_str(&node_markup);
            markup.push('\n');
        }
    }
    markup.push_str("</cmdsynopsis>");
    SynopsisOutcome::Parsed((markup, command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(lines: &[&str], names: &[&str]) -> (SynopsisOutcome<(String, String)>, LineTokenizer) {
        let names: Vec<String> = names.iter().map(|n| (*n).to_owned()).collect();
        let hints = SemanticHints::new();
        let ctx = CommandContext {
            names: &names,
            hints: &hints,
        };
        let mut tok = LineTokenizer::new(lines.iter().copied());
        let outcome = parse(&mut tok, &ctx);
        (outcome, tok)
    }

    #[test]
    fn test_tar_synopsis() {
        let (outcome, tok) = run(&["tar [-cxtf] file ..."], &[]);
        let SynopsisOutcome::Parsed((markup, command)) = outcome else {
            panic!("expected a synopsis");
        };
        assert_eq!(command, "tar");
        assert_eq!(
            markup,
            "<cmdsynopsis>\n<command>tar</command>\n\
             <arg choice='opt'><option>-cxtf</option></arg>\n\
             <arg choice='plain' rep='repeat'><replaceable>file</replaceable></arg>\n\
             </cmdsynopsis>"
        );
        assert!(tok.is_empty());
    }

    #[test]
    fn test_redirect_binds_its_target() {
        let (outcome, _) = run(&["sort [-r] &lt; input &gt;&gt; output"], &["sort"]);
        let SynopsisOutcome::Parsed((markup, _)) = outcome else {
            panic!("expected a synopsis");
        };
        assert_eq!(
            markup,
            "<cmdsynopsis>\n<command>sort</command>\n\
             <arg choice='opt'><option>-r</option></arg>\n\
             <arg choice='plain'>&lt; <replaceable>input</replaceable></arg>\n\
             <arg choice='plain'>&gt;&gt; <replaceable>output</replaceable></arg>\n\
             </cmdsynopsis>"
        );
    }

    #[test]
    fn test_alternation_and_required_groups() {
        let (outcome, _) = run(&["git {add | rm} [-n | --dry-run] path..."], &["git"]);
        let SynopsisOutcome::Parsed((markup, _)) = outcome else {
            panic!("expected a synopsis");
        };
        assert!(markup.contains(
            "<group choice='req'><arg choice='plain'><replaceable>add</replaceable></arg>\
             <arg choice='plain'><replaceable>rm</replaceable></arg></group>"
        ));
        assert!(markup.contains(
            "<group choice='opt'><arg choice='plain'><option>-n</option></arg>\
             <arg choice='plain'><option>--dry-run</option></arg></group>"
        ));
        assert!(markup.contains("<arg choice='plain' rep='repeat'><replaceable>path</replaceable></arg>"));
    }

    #[test]
    fn test_nested_brackets_and_continuation_lines() {
        let (outcome, tok) = run(&["ls [-l [-h]]", "[file]", "next"], &["ls"]);
        let SynopsisOutcome::Parsed((markup, _)) = outcome else {
            panic!("expected a synopsis");
        };
        assert!(markup.contains(
            "<arg choice='opt'><option>-l</option> <arg choice='opt'><option>-h</option></arg></arg>"
        ));
        assert!(markup.contains("<arg choice='opt'><replaceable>file</replaceable></arg>"));
        assert_eq!(tok.peek_line(), Some("next"));
    }

    #[test]
    fn test_unbalanced_brackets_fail_and_roll_back() {
        let (outcome, tok) = run(&["cp [-r source target"], &["cp"]);
        match outcome {
            SynopsisOutcome::Failed(reason) => assert!(reason.contains("missing `]`"), "{reason}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(tok.peek_line(), Some("cp [-r source target"));
    }

    #[test]
    fn test_prose_is_declined() {
        let (outcome, _) = run(&["This program copies files between hosts."], &[]);
        assert!(matches!(outcome, SynopsisOutcome::Declined));
        assert!(is_natural_language("The options are as follows:"));
        assert!(!is_natural_language("tar [-cxtf] file ..."));
    }
}
