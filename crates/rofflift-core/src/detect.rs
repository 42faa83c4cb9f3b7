//! Macro-package detection from trigger requests.

use crate::dialects;
use crate::error::LiftError;
use crate::text::{is_comment, parse_args, split_command};

/// Requests that identify an exclusive macro package.
const TRIGGERS: &[(&str, &[&str])] = &[
    ("man", &["TH"]),
    ("mdoc", &["Dd", "Dt"]),
    ("ms", &["AI", "NH", "LP", "RP", "QP", "XP"]),
    ("me", &["sh", "lp", "pp", "ip", "np", "(l", "(b", "+c"]),
    ("mm", &["MT", "HU", "AL", "BL", "DL", "VL", "LI", "AS"]),
];

/// Cover-sheet requests both ms and mm define. They fall back to ms only
/// when nothing more distinctive appears.
const SHARED_COVER: &[&str] = &["TL", "AU", "ND", "AB"];

/// Packages found in a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub major: &'static str,
    /// Non-exclusive extension packages, in discovery order.
    pub minors: Vec<&'static str>,
}

/// Exclusive package triggered by one control line, if any.
fn exclusive_trigger(name: &str, args: &[String]) -> Option<&'static str> {
    if name == "H" && args.first().is_some_and(|a| a.parse::<u32>().is_ok()) {
        return Some("mm");
    }
    if name == "mso" {
        return args
            .first()
            .and_then(|a| dialects::package_dialect(a))
            .filter(|d| dialects::is_exclusive(d));
    }
    TRIGGERS
        .iter()
        .find(|(_, names)| names.contains(&name))
        .map(|(dialect, _)| *dialect)
}

fn minor_trigger(line: &str, name: Option<&str>, args: &[String]) -> Option<&'static str> {
    if line.contains("Pod::Man") {
        return Some("pod2man");
    }
    match (name?, args.first().map(String::as_str)) {
        ("de", Some("Vb")) => Some("pod2man"),
        ("de", Some("AP")) | ("so", Some("man.macros")) => Some("tkman"),
        ("URL" | "MTO" | "FTP", _) => Some("www"),
        ("mso", Some(package)) => {
            dialects::package_dialect(package).filter(|d| !dialects::is_exclusive(d))
        }
        _ => None,
    }
}

/// Extension-implied package, e.g. `foo.ms` → ms.
fn extension_hint(file: &str) -> Option<&'static str> {
    let ext = file.rsplit_once('.')?.1;
    match ext {
        "man" => Some("man"),
        "mdoc" => Some("mdoc"),
        "ms" => Some("ms"),
        "me" => Some("me"),
        "mm" => Some("mm"),
        _ => None,
    }
}

/// Identify the packages `text` (raw, unescaped) is written for.
pub fn detect(file: &str, text: &str) -> Result<Detection, LiftError> {
    if text.trim().is_empty() {
        return Err(LiftError::EmptyInput);
    }

    let mut first: Option<&'static str> = None;
    let mut seen: Vec<&'static str> = Vec::new();
    let mut minors: Vec<&'static str> = Vec::new();
    let mut includes: Vec<String> = Vec::new();
    let mut only_includes = true;
    let mut cover = false;

    for line in text.lines() {
        if line.trim().is_empty() || is_comment(line) {
            if let Some(minor) = minor_trigger(line, None, &[]) {
                push_unique(&mut minors, minor);
            }
            continue;
        }
        let parsed = split_command(line, '.', '\'');
        let (name, args) = match &parsed {
            Some((name, rest)) => (Some(name.as_str()), parse_args(rest)),
            None => (None, Vec::new()),
        };
        match name {
            Some("so") => includes.extend(args.first().cloned()),
            _ => only_includes = false,
        }
        if name.is_some_and(|n| SHARED_COVER.contains(&n)) {
            cover = true;
        } else if let Some(name) = name
            && let Some(dialect) = exclusive_trigger(name, &args)
        {
            first.get_or_insert(dialect);
            push_unique(&mut seen, dialect);
        }
        if let Some(minor) = minor_trigger(line, name, &args) {
            push_unique(&mut minors, minor);
        }
    }

    if only_includes && let Some(target) = includes.into_iter().next() {
        return Err(LiftError::InclusionOnly { target });
    }

    let major = match extension_hint(file) {
        Some(hinted) if seen.contains(&hinted) => hinted,
        Some(hinted @ ("ms" | "mm")) if cover => hinted,
        _ => first
            .or_else(|| cover.then_some("ms"))
            .ok_or(LiftError::NoDialect)?,
    };
    tracing::debug!(file, major, ?minors, "detected macro packages");
    Ok(Detection { major, minors })
}

fn push_unique(list: &mut Vec<&'static str>, item: &'static str) {
    if !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_trigger_wins() {
        let detection = detect("x", ".TH LS 1\n.SH NAME\n.LP\n").unwrap();
        assert_eq!(detection.major, "man");
        let detection = detect("x", ".NH\nTitle\n.TH\n").unwrap();
        assert_eq!(detection.major, "ms");
    }

    #[test]
    fn test_shared_cover_macros_defer_to_distinctive_trigger() {
        let memo = ".TL\nMemo\n.AU \"J Q\"\n.H 1 \"Top\"\n.P\ntext\n.AL\n.LI\nx\n.LE\n";
        assert_eq!(detect("memo", memo).unwrap().major, "mm");
        let paper = ".TL\nPaper\n.AU\nJ Q\n.AI\nSomewhere\n.PP\ntext\n";
        assert_eq!(detect("paper", paper).unwrap().major, "ms");
    }

    #[test]
    fn test_cover_only_falls_back_to_ms() {
        assert_eq!(detect("x", ".TL\nTitle\n.AU\nMe\n").unwrap().major, "ms");
        assert_eq!(detect("memo.mm", ".TL\nTitle\n.AU\nMe\n").unwrap().major, "mm");
    }

    #[test]
    fn test_extension_hint_breaks_ties() {
        let detection = detect("paper.ms", ".TH odd\n.LP\ntext\n").unwrap();
        assert_eq!(detection.major, "ms");
    }

    #[test]
    fn test_mdoc_and_mm_triggers() {
        assert_eq!(detect("x", ".Dd May 1, 2020\n").unwrap().major, "mdoc");
        assert_eq!(detect("x", ".H 1 \"Intro\"\n").unwrap().major, "mm");
        assert_eq!(detect("x", ".mso an.tmac\n.SH X\n").unwrap().major, "man");
    }

    #[test]
    fn test_minor_packages() {
        let text = ".\\\" Automatically generated by Pod::Man 4.14\n.de Vb\n..\n.TH FOO 3pm\n.URL x y\n";
        let detection = detect("x", text).unwrap();
        assert_eq!(detection.major, "man");
        assert_eq!(detection.minors, vec!["pod2man", "www"]);
    }

    #[test]
    fn test_fatal_outcomes() {
        assert!(matches!(detect("x", "  \n"), Err(LiftError::EmptyInput)));
        assert!(matches!(detect("x", "just text\n"), Err(LiftError::NoDialect)));
        assert!(matches!(
            detect("x", ".so man3/other.3\n"),
            Err(LiftError::InclusionOnly { target }) if target == "man3/other.3"
        ));
    }
}
