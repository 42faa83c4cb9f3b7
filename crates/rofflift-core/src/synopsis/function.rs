//! C function synopses: `funcsynopsisinfo` lines and `funcprototype`s.
//!
//! The parser is speculative. It checkpoints the tokenizer on entry and
//! unrolls on any failure, reporting [`SynopsisOutcome::Declined`] so the
//! display classifier can try another reading of the same lines.

use crate::synopsis::SynopsisOutcome;
use crate::text::{escape_xml, is_identifier, unescape_xml};
use crate::tokenizer::LineTokenizer;

/// A parsed prototype.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Prototype {
    return_type: String,
    name: String,
    params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Param {
    Void,
    Varargs,
    /// Type text before the name, the name, and text after it (`[]`).
    Named {
        before: String,
        name: String,
        after: String,
    },
    /// Pointer to function: `ret (*name)(params)`.
    FunctionPointer {
        before: String,
        name: String,
        params: String,
    },
    /// A type with no name.
    Unnamed(String),
}

/// Quick rejection of lines that cannot start a C synopsis.
fn obviously_not_c(line: &str) -> bool {
    line.contains('|') || line.contains(") (") || line.contains("] [")
}

fn is_preprocessor(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_compile_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    ["cc ", "gcc ", "c99 ", "Link with", "link with", "Compile with"]
        .iter()
        .any(|p| trimmed.starts_with(p))
}

/// Lines passed through verbatim into `funcsynopsisinfo`.
fn is_info_line(line: &str) -> bool {
    is_preprocessor(line)
        || is_compile_line(line)
        || (line.trim_end().ends_with(';') && !line.contains('('))
}

fn brace_depth(text: &str) -> isize {
    text.matches('{').count().cast_signed() - text.matches('}').count().cast_signed()
}

/// Split C text into identifier/word and punctuation tokens.
fn c_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
            i += 1;
            continue;
        }
        if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
        if chars[i..].starts_with(&['.', '.', '.']) {
            tokens.push("...".to_owned());
            i += 3;
            continue;
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
        i += 1;
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

/// Join declaration tokens, attaching `*` and brackets to their neighbours.
fn join_decl(tokens: &[String]) -> String {
    let mut out = String::new();
    for token in tokens {
        if !out.is_empty() {
            let glue = out.ends_with(['*', '(', '['])
                || matches!(token.as_str(), "*" | ")" | "[" | "]" | ",");
            if !glue || (token == "*" && !out.ends_with(['*', '('])) {
                out.push(' ');
            }
        }
        out.push_str(token);
    }
    out
}

/// Index of the parenthesis matching the one at `open`.
fn matching_paren(tokens: &[String], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.as_str() {
            "(" => depth += 1,
            ")" => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split at top-level commas.
fn split_params(tokens: &[String]) -> Vec<&[String]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.as_str() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth = depth.saturating_sub(1),
            "," if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

fn parse_param(tokens: &[String]) -> Result<Param, String> {
    match tokens {
        [] => Err("empty parameter".to_owned()),
        [only] if only == "void" => Ok(Param::Void),
        [only] if only == "..." => Ok(Param::Varargs),
        _ => {
            if let Some(open) = tokens.iter().position(|t| t == "(") {
                // ret (*name)(params)
                let close = matching_paren(tokens, open).ok_or("unbalanced parameter")?;
                let inner = &tokens[open + 1..close];
                let name = inner
                    .iter()
                    .rev()
                    .find(|t| is_identifier(t))
                    .ok_or("function pointer without a name")?;
                let rest = &tokens[close + 1..];
                let (Some(first), Some(last)) = (rest.first(), rest.last()) else {
                    return Err("function pointer without parameters".to_owned());
                };
                if first != "(" || last != ")" {
                    return Err("malformed function pointer".to_owned());
                }
                return Ok(Param::FunctionPointer {
                    before: join_decl(&tokens[..open]),
                    name: name.clone(),
                    params: join_decl(&rest[1..rest.len() - 1]),
                });
            }
            let end = tokens.iter().position(|t| t == "[").unwrap_or(tokens.len());
            let name_at = end.checked_sub(1).ok_or("missing parameter name")?;
            let candidate = &tokens[name_at];
            for token in tokens {
                let ok = is_identifier(token)
                    || matches!(token.as_str(), "*" | "[" | "]" | "&")
                    || token.chars().all(|c| c.is_ascii_digit());
                if !ok {
                    return Err(format!("unexpected `{token}` in parameter"));
                }
            }
            if name_at == 0 || !is_identifier(candidate) {
                return Ok(Param::Unnamed(join_decl(tokens)));
            }
            Ok(Param::Named {
                before: join_decl(&tokens[..name_at]),
                name: candidate.clone(),
                after: tokens[end..].concat(),
            })
        }
    }
}

/// Parse the unescaped text of one declaration.
fn parse_declaration(text: &str) -> Result<(Prototype, Vec<String>), String> {
    let tokens = c_tokens(text);
    let open = tokens
        .iter()
        .position(|t| t == "(")
        .ok_or("no parameter list")?;
    if open == 0 {
        return Err("no function name".to_owned());
    }
    if tokens.get(open + 1).is_some_and(|t| t == "*") {
        return Err("function returning a function pointer".to_owned());
    }
    let name = &tokens[open - 1];
    if !is_identifier(name) {
        return Err(format!("`{name}` is not a function name"));
    }
    let specifiers = &tokens[..open - 1];
    if let Some(bad) = specifiers
        .iter()
        .find(|t| !is_identifier(t) && t.as_str() != "*")
    {
        return Err(format!("unexpected `{bad}` before function name"));
    }
    let close = matching_paren(&tokens, open).ok_or("unbalanced parentheses")?;
    let trailer = &tokens[close + 1..];
    if !(trailer.is_empty() || trailer == [";"]) {
        return Err("text after parameter list".to_owned());
    }

    let inside = &tokens[open + 1..close];
    let mut params = Vec::new();
    let mut knr_names = Vec::new();
    if !inside.is_empty() {
        for part in split_params(inside) {
            let param = parse_param(part)?;
            if let Param::Unnamed(text) = &param
                && is_identifier(text)
                && trailer.is_empty()
            {
                knr_names.push(text.clone());
            }
            params.push(param);
        }
    }
    let prototype = Prototype {
        return_type: join_decl(specifiers),
        name: name.clone(),
        params,
    };
    Ok((prototype, knr_names))
}

fn param_markup(param: &Param) -> String {
    match param {
        Param::Void => "<void/>".to_owned(),
        Param::Varargs => "<varargs/>".to_owned(),
        Param::Named {
            before,
            name,
            after,
        } => {
            let sep = if before.ends_with('*') { "" } else { " " };
            format!(
                "<paramdef>{}{sep}<parameter>{}</parameter>{}</paramdef>",
                escape_xml(before),
                escape_xml(name),
                escape_xml(after)
            )
        }
        Param::FunctionPointer {
            before,
            name,
            params,
        } => format!(
            "<paramdef>{} (*<parameter>{}</parameter>)<funcparams>{}</funcparams></paramdef>",
            escape_xml(before),
            escape_xml(name),
            escape_xml(params)
        ),
        Param::Unnamed(text) => format!("<paramdef>{}</paramdef>", escape_xml(text)),
    }
}

fn prototype_markup(prototype: &Prototype) -> String {
    let sep = if prototype.return_type.is_empty() || prototype.return_type.ends_with('*') {
        ""
    } else {
        " "
    };
    let mut out = format!(
        "<funcprototype>\n<funcdef>{}{sep}<function>{}</function></funcdef>\n",
        escape_xml(&prototype.return_type),
        escape_xml(&prototype.name)
    );
    if prototype.params.is_empty() {
        out.push_str("<void/>\n");
    }
    for param in &prototype.params {
        out.push_str(&param_markup(param));
        out.push('\n');
    }
    out.push_str("</funcprototype>");
    out
}

/// Consume one prototype (possibly spanning lines, possibly K&R style).
fn parse_prototype(tok: &mut LineTokenizer) -> Result<(String, String), String> {
    let mut text = String::new();
    loop {
        let line = tok.pop_line().ok_or("unterminated parameter list")?;
        text.push_str(&unescape_xml(line.trim()));
        text.push(' ');
        let opens = text.matches('(').count();
        if opens > 0 && opens == text.matches(')').count() {
            break;
        }
        if opens < text.matches(')').count() {
            return Err("unbalanced parentheses".to_owned());
        }
    }
    let (mut prototype, knr_names) = parse_declaration(&text)?;

    if !knr_names.is_empty() && knr_names.len() == prototype.params.len() {
        let mut declared: Vec<(String, Param)> = Vec::new();
        while declared.len() < knr_names.len() {
            let Some(line) = tok.peek_line() else {
                break;
            };
            let decl = unescape_xml(line.trim());
            let Some(body) = decl.strip_suffix(';') else {
                break;
            };
            if body.contains('(') {
                break;
            }
            let tokens = c_tokens(body);
            let mut accepted = Vec::new();
            for part in split_params(&tokens) {
                // `int a, b;` declares several names with one type.
                let part: Vec<String> = if accepted.is_empty() {
                    part.to_vec()
                } else {
                    tokens[..1].iter().chain(part.iter()).cloned().collect()
                };
                let param = parse_param(&part)?;
                match &param {
                    Param::Named { name, .. } if knr_names.contains(name) => {
                        accepted.push((name.clone(), param.clone()));
                    }
                    _ => return Err(format!("`{decl}` does not declare a parameter")),
                }
            }
            tok.pop_line();
            declared.extend(accepted);
        }
        prototype.params = knr_names
            .iter()
            .map(|name| {
                declared
                    .iter()
                    .find(|(n, _)| n == name)
                    .map_or_else(
                        || Param::Named {
                            before: "int".to_owned(),
                            name: name.clone(),
                            after: String::new(),
                        },
                        |(_, p)| p.clone(),
                    )
            })
            .collect();
    }
    Ok((prototype_markup(&prototype), prototype.name))
}

/// Consume passthrough lines; bracketed declarations run to their closing brace.
fn parse_info(tok: &mut LineTokenizer) -> Vec<String> {
    let mut info = Vec::new();
    while let Some(line) = tok.peek_line() {
        if line.trim().is_empty() {
            tok.pop_line();
            continue;
        }
        if line.contains('{') && !line.contains('(') {
            let mut depth = 0;
            while let Some(line) = tok.pop_line() {
                depth += brace_depth(&line);
                info.push(line);
                if depth <= 0 {
                    break;
                }
            }
            continue;
        }
        if !is_info_line(line) {
            break;
        }
        if let Some(line) = tok.pop_line() {
            info.push(line);
        }
    }
    info
}

/// Parse a run of C declarations into a `funcsynopsis`.
///
/// Returns the markup and the names of the functions declared.
pub fn parse(tok: &mut LineTokenizer) -> SynopsisOutcome<(String, Vec<String>)> {
    let Some(first) = tok.peek_line() else {
        return SynopsisOutcome::Declined;
    };
    if obviously_not_c(first) {
        return SynopsisOutcome::Declined;
    }
    let start = tok.checkpoint();
    let mut markup = String::from("<funcsynopsis>\n");
    let mut names = Vec::new();
    loop {
        let before_info = tok.checkpoint();
        let info = parse_info(tok);
        let next_is_prototype = tok
            .peek_line()
            .is_some_and(|l| l.contains('(') && !obviously_not_c(l));
        if !next_is_prototype {
            tok.unroll(before_info);
            break;
        }
        let before_prototype = tok.checkpoint();
        match parse_prototype(tok) {
            Ok((prototype, name)) => {
                if !info.is_empty() {
                    markup.push_str(&format!(
                        "<funcsynopsisinfo>{}</funcsynopsisinfo>\n",
                        info.join("\n")
                    ));
                }
                markup.push_str(&prototype);
                markup.push('\n');
                names.push(name);
            }
            Err(reason) => {
                tracing::debug!(%reason, "not a function prototype");
                tok.unroll(before_prototype);
                tok.unroll(before_info);
                break;
            }
        }
    }
    if names.is_empty() {
        tok.unroll(start);
        return SynopsisOutcome::Declined;
    }
    markup.push_str("</funcsynopsis>");
    SynopsisOutcome::Parsed((markup, names))
}
