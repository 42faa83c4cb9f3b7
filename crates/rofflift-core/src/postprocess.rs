//! Passes over the assembled body: tag repair, link lifting, hint upgrades.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::hints::{HintScope, SemanticHints};
use crate::tables::{is_environment_variable, is_errno};

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([A-Za-z][\w:.-]*)(?:\s[^>]*?)?(/?)>").unwrap()
});

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]+>").unwrap());

static LINKABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?P<url>\b(?:https?|ftp)://(?:[^\s<>"'&]|&amp;)+)"#,
        r"|(?P<mail>\b[\w.+-]+@[\w-]+(?:\.[\w-]+)+)",
        r"|(?P<ref>\b[A-Za-z_][\w.+:-]*)\((?P<sec>[1-9][a-zA-Z+]*|n)\)",
    ))
    .unwrap()
});

static EMPHASIZED_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<emphasis[^>]*>([\w.:+-]+)</emphasis>\(([1-9][a-zA-Z+]*|n)\)").unwrap()
});

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<emphasis(?: role='strong')? remap='(B|I|BI)'>([^<]+)</emphasis>").unwrap()
});

/// Inline tags that may be left open by font changes.
const REPAIRABLE: &[&str] = &["emphasis", "literal"];

/// Inline elements that do not end a font run.
const INLINE: &[&str] = &[
    "application",
    "citerefentry",
    "citetitle",
    "command",
    "constant",
    "email",
    "envar",
    "errorcode",
    "filename",
    "function",
    "indexterm",
    "link",
    "manvolnum",
    "option",
    "parameter",
    "primary",
    "quote",
    "refentrytitle",
    "replaceable",
    "secondary",
    "subscript",
    "superscript",
    "systemitem",
    "type",
    "ulink",
    "varname",
];

/// Elements whose content is never scanned for links.
const NO_LINKS: &[&str] = &[
    "citerefentry",
    "cmdsynopsis",
    "command",
    "email",
    "filename",
    "funcsynopsis",
    "function",
    "indexterm",
    "link",
    "literal",
    "option",
    "programlisting",
    "refmeta",
    "refname",
    "replaceable",
    "ulink",
];

/// Close font tags left open at block boundaries and drop stray closers.
pub fn close_tags(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 64);
    let mut open: Vec<&str> = Vec::new();
    let mut last = 0;
    for caps in TAG.captures_iter(body) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&body[last..whole.start()]);
        last = whole.end();
        let closing = &caps[1] == "/";
        let name = caps.get(2).map_or("", |m| m.as_str());
        let empty = &caps[3] == "/";

        if REPAIRABLE.contains(&name) && !empty {
            if !closing {
                open.push(name);
                out.push_str(whole.as_str());
                continue;
            }
            if let Some(pos) = open.iter().rposition(|t| *t == name) {
                let inner: Vec<&str> = open.drain(pos..).collect();
                for tag in inner[1..].iter().rev() {
                    out.push_str(&format!("</{tag}>"));
                }
                out.push_str(whole.as_str());
            }
            continue;
        }
        if !INLINE.contains(&name) {
            for tag in open.drain(..).rev() {
                out.push_str(&format!("</{tag}>"));
            }
        }
        out.push_str(whole.as_str());
    }
    out.push_str(&body[last..]);
    for tag in open.drain(..).rev() {
        out.push_str(&format!("</{tag}>"));
    }
    out
}

fn link_text(caps: &Captures<'_>, docbook5: bool) -> String {
    if let Some(url) = caps.name("url") {
        let url = url.as_str();
        let trimmed = url.trim_end_matches(['.', ',', ';', ':', ')', '!', '?']);
        let tail = &url[trimmed.len()..];
        return if docbook5 {
            format!("<link xlink:href='{trimmed}'>{trimmed}</link>{tail}")
        } else {
            format!("<ulink url='{trimmed}'>{trimmed}</ulink>{tail}")
        };
    }
    if let Some(mail) = caps.name("mail") {
        let mail = mail.as_str().trim_end_matches('.');
        let tail = &caps[0][mail.len()..];
        return format!("<email>{mail}</email>{tail}");
    }
    citerefentry(&caps["ref"], &caps["sec"])
}

fn citerefentry(title: &str, volnum: &str) -> String {
    format!(
        "<citerefentry><refentrytitle>{title}</refentrytitle>\
         <manvolnum>{volnum}</manvolnum></citerefentry>"
    )
}

/// Turn man page references, URLs and mail addresses into links.
pub fn lift_links(body: &str, docbook5: bool) -> String {
    let body = EMPHASIZED_REF.replace_all(body, |caps: &Captures<'_>| {
        citerefentry(&caps[1], &caps[2])
    });
    let mut out = String::with_capacity(body.len() + 64);
    let mut depth = 0usize;
    let mut last = 0;
    for markup in MARKUP.find_iter(&body) {
        let text = &body[last..markup.start()];
        if depth == 0 {
            out.push_str(&LINKABLE.replace_all(text, |caps: &Captures<'_>| {
                link_text(caps, docbook5)
            }));
        } else {
            out.push_str(text);
        }
        last = markup.end();
        let tag = markup.as_str();
        out.push_str(tag);
        if let Some(caps) = TAG.captures(tag)
            && NO_LINKS.contains(&&caps[2])
            && &caps[3] != "/"
        {
            if &caps[1] == "/" {
                depth = depth.saturating_sub(1);
            } else {
                depth += 1;
            }
        }
    }
    let rest = &body[last..];
    if depth == 0 {
        out.push_str(&LINKABLE.replace_all(rest, |caps: &Captures<'_>| {
            link_text(caps, docbook5)
        }));
    } else {
        out.push_str(rest);
    }
    out
}

/// Guess semantic tags for emphasised tokens and record them as local hints.
pub fn infer_hints(body: &str, hints: &mut SemanticHints) {
    for caps in EMPHASIS.captures_iter(body) {
        let token = &caps[2];
        if hints.get(token).is_some() || token.contains(char::is_whitespace) {
            continue;
        }
        let tag = if token.len() > 1 && token.starts_with('/') {
            "filename"
        } else if is_environment_variable(token.trim_start_matches('$')) {
            "envar"
        } else if is_errno(token) {
            "errorcode"
        } else if &caps[1] == "B"
            && token.len() > 1
            && token.starts_with('-')
            && token[1..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '-')
        {
            "option"
        } else {
            continue;
        };
        hints.set(HintScope::Local, token, tag);
    }
}

/// Replace emphasis around hinted tokens with the hinted tag.
pub fn apply_hints(body: &str, hints: &SemanticHints) -> String {
    EMPHASIS
        .replace_all(body, |caps: &Captures<'_>| match hints.get(&caps[2]) {
            Some(tag) => format!("<{tag} remap='{}'>{}</{tag}>", &caps[1], &caps[2]),
            None => caps[0].to_owned(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_close_tags_at_block_boundary() {
        assert_eq!(
            close_tags("<para><emphasis remap='I'>open</para>\n<para>next</para>"),
            "<para><emphasis remap='I'>open</emphasis></para>\n<para>next</para>"
        );
    }

    #[test]
    fn test_close_tags_drops_stray_closer_and_keeps_inline() {
        assert_eq!(
            close_tags("<para>a</literal> <emphasis>b <option>-x</option></emphasis></para>"),
            "<para>a <emphasis>b <option>-x</option></emphasis></para>"
        );
    }

    #[test]
    fn test_close_tags_unwinds_inner_runs() {
        assert_eq!(
            close_tags("<para><emphasis>a<literal>b</emphasis>c</para>"),
            "<para><emphasis>a<literal>b</literal></emphasis>c</para>"
        );
    }

    #[test]
    fn test_lift_links() {
        assert_eq!(
            lift_links("<para>see ls(1) and http://example.com/a?b=1&amp;c=2.</para>", false),
            "<para>see <citerefentry><refentrytitle>ls</refentrytitle><manvolnum>1</manvolnum>\
             </citerefentry> and <ulink url='http://example.com/a?b=1&amp;c=2'>\
             http://example.com/a?b=1&amp;c=2</ulink>.</para>"
        );
        assert_eq!(
            lift_links("<para>mail bob@example.org</para>", true),
            "<para>mail <email>bob@example.org</email></para>"
        );
    }

    #[test]
    fn test_lift_links_emphasized_reference() {
        assert_eq!(
            lift_links("<para><emphasis role='strong' remap='B'>cat</emphasis>(1)</para>", false),
            "<para><citerefentry><refentrytitle>cat</refentrytitle><manvolnum>1</manvolnum>\
             </citerefentry></para>"
        );
    }

    #[test]
    fn test_no_links_inside_literals() {
        let body = "<programlisting>ls(1) http://x.org</programlisting>";
        assert_eq!(lift_links(body, false), body);
        let link = "<para><ulink url='http://a.org'>http://a.org</ulink></para>";
        assert_eq!(lift_links(link, false), link);
    }

    #[test]
    fn test_infer_and_apply_hints() {
        let body = "<para><emphasis remap='I'>/etc/passwd</emphasis> \
                    <emphasis role='strong' remap='B'>-v</emphasis> \
                    <emphasis remap='I'>HOME</emphasis> \
                    <emphasis remap='I'>ENOENT</emphasis> \
                    <emphasis remap='I'>plain</emphasis></para>";
        let mut hints = SemanticHints::new();
        infer_hints(body, &mut hints);
        assert_eq!(
            apply_hints(body, &hints),
            "<para><filename remap='I'>/etc/passwd</filename> \
             <option remap='B'>-v</option> \
             <envar remap='I'>HOME</envar> \
             <errorcode remap='I'>ENOENT</errorcode> \
             <emphasis remap='I'>plain</emphasis></para>"
        );
    }
}
