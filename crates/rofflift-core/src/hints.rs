//! Semantic hints: token → DocBook tag associations.
//!
//! Hints come from `.\" | mark TOKEN as TAG` comments and from inference
//! while parsing (for instance the names in a NAME section). Local hints live
//! for one document; [`SemanticHints::end_document`] folds them into the
//! global scope, which persists for the whole run and can be dumped back out
//! in the same comment format.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static HINT_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[.']\s*)?\\"\s*\|\s*mark\s+(\S+)\s+as\s+(\S+)\s*$"#).unwrap()
});

/// Tags a hint may name.
pub const HINT_TAGS: &[&str] = &[
    "application",
    "command",
    "constant",
    "envar",
    "errorcode",
    "filename",
    "function",
    "literal",
    "option",
    "parameter",
    "replaceable",
    "systemitem",
    "type",
    "varname",
];

/// Which registry a hint goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintScope {
    Global,
    Local,
}

/// Two-scope hint registry.
#[derive(Debug, Clone, Default)]
pub struct SemanticHints {
    global: BTreeMap<String, String>,
    local: BTreeMap<String, String>,
}

impl SemanticHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hint. Returns `false` if `tag` is not a known hint tag.
    pub fn set(&mut self, scope: HintScope, token: &str, tag: &str) -> bool {
        if !HINT_TAGS.contains(&tag) || token.is_empty() {
            return false;
        }
        let table = match scope {
            HintScope::Global => &mut self.global,
            HintScope::Local => &mut self.local,
        };
        table.insert(token.to_owned(), tag.to_owned());
        true
    }

    /// Tag for `token`, local scope first.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.local
            .get(token)
            .or_else(|| self.global.get(token))
            .map(String::as_str)
    }

    pub fn is(&self, token: &str, tag: &str) -> bool {
        self.get(token) == Some(tag)
    }

    /// All tokens carrying `tag` in either scope.
    pub fn tokens_with(&self, tag: &str) -> Vec<&str> {
        let mut tokens: Vec<&str> = self
            .global
            .iter()
            .chain(&self.local)
            .filter(|(_, t)| t.as_str() == tag)
            .map(|(k, _)| k.as_str())
            .collect();
        tokens.sort_unstable();
        tokens.dedup();
        tokens
    }

    /// Effective hints (local overriding global), sorted by token.
    pub fn effective(&self) -> BTreeMap<&str, &str> {
        let mut merged: BTreeMap<&str, &str> = self
            .global
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (k, v) in &self.local {
            merged.insert(k, v);
        }
        merged
    }

    /// Forget the previous document's local hints.
    pub fn begin_document(&mut self) {
        self.local.clear();
    }

    /// Promote the local hints of the finished document to global scope.
    pub fn end_document(&mut self) {
        let local = std::mem::take(&mut self.local);
        self.global.extend(local);
    }

    pub fn global_len(&self) -> usize {
        self.global.len()
    }

    /// Read hint comments from `text` into `scope`; other lines are ignored.
    ///
    /// Returns the number of hints accepted.
    pub fn read(&mut self, text: &str, scope: HintScope) -> usize {
        text.lines()
            .filter_map(parse_hint_comment)
            .filter(|(token, tag)| self.set(scope, token, tag))
            .count()
    }

    /// Serialize the global scope as hint comments.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (token, tag) in &self.global {
            out.push_str(&format_hint_comment(token, tag));
            out.push('\n');
        }
        out
    }
}

/// Parse one `.\" | mark TOKEN as TAG` line.
pub fn parse_hint_comment(line: &str) -> Option<(String, String)> {
    let caps = HINT_COMMENT.captures(line.trim_end())?;
    Some((caps[1].to_owned(), caps[2].to_owned()))
}

pub fn format_hint_comment(token: &str, tag: &str) -> String {
    format!(".\\\" | mark {token} as {tag}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_hint_comment() {
        assert_eq!(
            parse_hint_comment(r#".\" | mark grep as command"#),
            Some(("grep".to_owned(), "command".to_owned()))
        );
        assert_eq!(parse_hint_comment(r#".\" an ordinary comment"#), None);
    }

    #[test]
    fn test_local_shadows_global_then_promotes() {
        let mut hints = SemanticHints::new();
        assert!(hints.set(HintScope::Global, "foo", "command"));
        assert!(hints.set(HintScope::Local, "foo", "function"));
        assert_eq!(hints.get("foo"), Some("function"));

        hints.end_document();
        hints.begin_document();
        assert_eq!(hints.get("foo"), Some("function"));
        assert_eq!(hints.global_len(), 1);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut hints = SemanticHints::new();
        assert!(!hints.set(HintScope::Local, "x", "blink"));
        assert_eq!(hints.get("x"), None);
    }

    #[test]
    fn test_dump_reads_back() {
        let mut hints = SemanticHints::new();
        hints.set(HintScope::Global, "PATH", "envar");
        hints.set(HintScope::Global, "ls", "command");
        let dumped = hints.dump();
        assert_eq!(
            dumped,
            ".\\\" | mark PATH as envar\n.\\\" | mark ls as command\n"
        );

        let mut fresh = SemanticHints::new();
        assert_eq!(fresh.read(&dumped, HintScope::Global), 2);
        assert!(fresh.is("ls", "command"));
    }
}
