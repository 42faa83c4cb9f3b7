//! The BSD `mdoc` semantic macro package.
//!
//! Most mdoc macros are "parsed": the rest of their line may call further
//! macros, so lines are rendered token by token with mdoc's spacing rules
//! for punctuation. Synopsis sections are built directly from the semantic
//! macros rather than through the heuristic synopsis parsers.

use crate::dialects::emit_namediv;
use crate::document::{DisplayKind, Document, ListKind};
use crate::error::LiftError;
use crate::interpreter::{Descriptor, Interpreter, Request};
use crate::tables::{standard, system};
use crate::text::{escape_attr, escape_xml, parse_args, slugify, split_command, strip_tags};

pub static MDOC: Descriptor = Descriptor {
    name: "mdoc",
    exclusive: true,
    toptag: "refentry",
    immutable: &[
        "Bd", "Bl", "Dd", "Dt", "Ed", "El", "It", "Nd", "Nm", "Os", "Sh", "Ss",
    ],
    ignore: &["Bk", "Db", "Ek", "Hf", "Sm"],
    complain: &[],
    parabreak: &["Lp", "Pp"],
    sectionbreak: &["Sh", "Ss"],
    listbreak: &[],
    scoped: &["Bd", "Bl"],
    translations: &[],
    reducible: &["Lp", "Pp", "Sh", "Ss"],
};

/// Macros that may be called from the arguments of another macro.
const CALLABLE: &[&str] = &[
    "Ac", "Ad", "An", "Ao", "Ap", "Aq", "Ar", "At", "Bc", "Bo", "Bq", "Brc", "Bro", "Brq", "Bsx",
    "Bx", "Cd", "Cm", "Dc", "Do", "Dq", "Dv", "Dx", "Ec", "Em", "Eo", "Er", "Ev", "Fa", "Fc", "Fl",
    "Fn", "Fo", "Fr", "Ft", "Fx", "Ic", "In", "Li", "Lk", "Ms", "Mt", "Nm", "No", "Ns", "Nx", "Oc",
    "Oo", "Op", "Ot", "Ox", "Pa", "Pc", "Pf", "Po", "Pq", "Qc", "Ql", "Qo", "Qq", "Sc", "So", "Sq",
    "St", "Sx", "Sy", "Ta", "Tn", "Ux", "Va", "Vt", "Xc", "Xo", "Xr",
];

/// Macros that keep building the current synopsis instead of ending it.
const SYNOPSIS_MACROS: &[&str] = &[
    "Ar", "Bk", "Cm", "Dv", "Ek", "Fa", "Fc", "Fd", "Fl", "Fn", "Fo", "Ft", "Ic", "In", "Li",
    "Nm", "Ns", "Oc", "Oo", "Op", "Pa", "Sm", "Va", "Vt", "Xc", "Xo",
];

/// `.Sh` names that open a NAME section.
const NAME_TITLES: &[&str] = &["NAME", "NAMN", "NOM", "NOMBRE"];

fn is_callable(token: &str) -> bool {
    CALLABLE.contains(&token)
}

fn is_closing(token: &str) -> bool {
    matches!(token, "." | "," | ":" | ";" | ")" | "]" | "?" | "!")
}

fn is_opening(token: &str) -> bool {
    matches!(token, "(" | "[")
}

fn is_punctuation(token: &str) -> bool {
    is_closing(token) || is_opening(token) || token == "|"
}

/// Index of the next callable macro at or after `from`.
fn next_callable(tokens: &[String], from: usize) -> usize {
    tokens[from..]
        .iter()
        .position(|t| is_callable(t))
        .map_or(tokens.len(), |p| from + p)
}

/// Split off trailing closing punctuation.
fn split_trailing(tokens: &[String]) -> (&[String], &[String]) {
    let mut cut = tokens.len();
    while cut > 0 && is_closing(&tokens[cut - 1]) {
        cut -= 1;
    }
    tokens.split_at(cut)
}

/// Rendered text with mdoc's spacing around punctuation.
#[derive(Debug, Default)]
struct Line {
    buf: String,
    nospace: bool,
}

impl Line {
    fn word(&mut self, text: &str) {
        if !self.buf.is_empty() && !self.nospace {
            self.buf.push(' ');
        }
        self.buf.push_str(text);
        self.nospace = false;
    }

    fn punct(&mut self, token: &str) {
        if is_closing(token) {
            self.buf.push_str(token);
            self.nospace = false;
        } else if is_opening(token) {
            self.word(token);
            self.nospace = true;
        } else {
            self.word(token);
        }
    }

    fn open(&mut self, text: &str) {
        self.word(text);
        self.nospace = true;
    }

    fn close(&mut self, text: &str) {
        self.buf.push_str(text);
        self.nospace = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Part {
    Name,
    Synopsis,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockDisplay {
    Literal,
    Indented,
    Plain,
}

/// One element of a command synopsis.
#[derive(Debug, Clone)]
struct Piece {
    markup: String,
    choice: &'static str,
    repeat: bool,
    separator: bool,
    group: bool,
}

impl Piece {
    fn plain(markup: String) -> Self {
        Self {
            markup,
            choice: "plain",
            repeat: false,
            separator: false,
            group: false,
        }
    }

    fn separator() -> Self {
        Self {
            separator: true,
            ..Self::plain("|".to_owned())
        }
    }

    /// The piece as a direct child of `cmdsynopsis`.
    fn outer(&self) -> String {
        if self.group {
            return self.markup.clone();
        }
        let rep = if self.repeat { " rep='repeat'" } else { "" };
        format!("<arg choice='{}'{rep}>{}</arg>", self.choice, self.markup)
    }

    /// The piece nested inside an enclosing `arg`.
    fn inner(&self) -> String {
        if self.group || self.choice != "plain" || self.repeat {
            self.outer()
        } else {
            self.markup.clone()
        }
    }
}

/// Collapse the pieces of a bracket into one piece of the given choice.
fn enclose_pieces(pieces: Vec<Piece>, choice: &'static str) -> Piece {
    let alternatives: Vec<&[Piece]> = pieces.split(|p| p.separator).collect();
    if alternatives.len() > 1 {
        let mut markup = format!("<group choice='{choice}'>");
        for alternative in alternatives {
            let inner: Vec<String> = alternative.iter().map(Piece::inner).collect();
            markup.push_str(&format!("<arg choice='plain'>{}</arg>", inner.join(" ")));
        }
        markup.push_str("</group>");
        return Piece {
            group: true,
            choice,
            ..Piece::plain(markup)
        };
    }
    if let [only] = pieces.as_slice()
        && only.choice == "plain"
        && !only.group
    {
        return Piece {
            choice,
            ..only.clone()
        };
    }
    let inner: Vec<String> = pieces.iter().map(Piece::inner).collect();
    Piece {
        choice,
        ..Piece::plain(inner.join(" "))
    }
}

#[derive(Debug)]
struct CommandSynopsis {
    name: String,
    frames: Vec<Vec<Piece>>,
}

#[derive(Debug, Default)]
struct FunctionSynopsis {
    body: Vec<String>,
    info: Vec<String>,
    return_type: Option<String>,
    open: Option<(String, Vec<String>)>,
}

impl FunctionSynopsis {
    fn take_info(&mut self) {
        if !self.info.is_empty() {
            let info = std::mem::take(&mut self.info).join("\n");
            self.body
                .push(format!("<funcsynopsisinfo>{info}</funcsynopsisinfo>"));
        }
    }

    fn prototype(&mut self, name: &str, params: &[String]) {
        self.take_info();
        let ty = self.return_type.take().unwrap_or_default();
        let sep = if ty.is_empty() || ty.ends_with('*') { "" } else { " " };
        let mut markup = format!("<funcprototype>\n<funcdef>{ty}{sep}<function>{name}</function></funcdef>\n");
        if params.is_empty() {
            markup.push_str("<void/>\n");
        }
        for param in params {
            markup.push_str(&param_markup(param));
            markup.push('\n');
        }
        markup.push_str("</funcprototype>");
        self.body.push(markup);
    }
}

/// Markup for one `.Fa` parameter such as `const char *path`.
fn param_markup(param: &str) -> String {
    let param = param.trim();
    match param {
        "" | "void" => return "<void/>".to_owned(),
        "..." => return "<varargs/>".to_owned(),
        _ => {}
    }
    if let Some(open) = param.find("(*")
        && let Some(close) = param[open..].find(')')
    {
        let before = &param[..open];
        let name = param[open + 2..open + close].trim();
        let rest = param[open + close + 1..].trim();
        let inner = rest.trim_start_matches('(').trim_end_matches(')');
        return format!(
            "<paramdef>{before}(*<parameter>{name}</parameter>)<funcparams>{inner}</funcparams></paramdef>"
        );
    }
    let (body, suffix) = match param.find('[') {
        Some(at) => param.split_at(at),
        None => (param, ""),
    };
    let start = body
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(0, |p| p + 1);
    let name = &body[start..];
    if name.is_empty() {
        return format!("<paramdef>{param}</paramdef>");
    }
    format!("<paramdef>{}<parameter>{name}</parameter>{suffix}</paramdef>", &body[..start])
}

#[derive(Debug, Default)]
pub struct MdocInterpreter {
    part: Part,
    names: Vec<String>,
    named: bool,
    /// Open `.Bl` lists; `None` is a column list.
    lists: Vec<Option<ListKind>>,
    columns: Vec<Vec<Vec<String>>>,
    displays: Vec<BlockDisplay>,
    reference: Option<Vec<(String, String)>>,
    command: Option<CommandSynopsis>,
    functions: Option<FunctionSynopsis>,
    /// Parameters seen since an inline `.Fo`.
    inline_params: Option<usize>,
}

impl Interpreter for MdocInterpreter {
    fn descriptor(&self) -> &'static Descriptor {
        &MDOC
    }

    fn interpret(&mut self, doc: &mut Document, req: &Request) -> Result<bool, LiftError> {
        let name = req.name.as_str();
        if self.part == Part::Synopsis && !SYNOPSIS_MACROS.contains(&name) {
            self.flush_synopsis(doc);
        }
        match name {
            "Dd" => {
                let date = req.joined();
                let date = date
                    .trim_start_matches("$Mdocdate:")
                    .trim_end_matches('$')
                    .trim();
                doc.meta.date = (!date.is_empty()).then(|| date.to_owned());
            }
            "Dt" => {
                doc.meta.title = (!req.arg(0).is_empty()).then(|| req.arg(0).to_owned());
                doc.meta.volnum = (!req.arg(1).is_empty()).then(|| req.arg(1).to_owned());
            }
            "Os" => {
                let source = req.joined();
                doc.meta.source = (!source.trim().is_empty()).then(|| source.trim().to_owned());
            }
            "Sh" => self.section(doc, req, 1),
            "Ss" => self.section(doc, req, 2),
            "Pp" | "Lp" => doc.paragraph_break(),
            "Nm" if self.part == Part::Name => self.names.extend(
                req.args
                    .iter()
                    .filter(|a| !is_punctuation(a))
                    .map(|a| strip_tags(&doc.render_isolated(a))),
            ),
            "Nd" if self.part == Part::Name => {
                let purpose = self.render(doc, &req.args);
                emit_namediv(doc, &self.names, &purpose);
                self.named = true;
            }
            "Nm" if self.part == Part::Synopsis => self.begin_command(doc, &req.args),
            "Fd" | "In" | "Ft" | "Fn" | "Fo" | "Fa" | "Fc" | "Vt"
                if self.part == Part::Synopsis =>
            {
                self.function_synopsis(doc, req);
            }
            "Fo" => {
                let name = doc.render_isolated(req.arg(0));
                doc.text_line(&format!("<function>{name}</function>("));
                self.inline_params = Some(0);
            }
            "Fa" if self.inline_params.is_some() => {
                let mut text = String::new();
                for arg in &req.args {
                    if self.inline_params.is_some_and(|n| n > 0) {
                        text.push_str(", ");
                    }
                    let arg = doc.render_isolated(arg);
                    text.push_str(&format!("<parameter>{arg}</parameter>"));
                    self.inline_params = self.inline_params.map(|n| n + 1);
                }
                doc.text_line(&text);
            }
            "Fc" => {
                self.inline_params = None;
                let rest = self.render(doc, &req.args);
                doc.text_line(&format!("){rest}"));
            }
            "Bl" => self.begin_list(doc, &req.args),
            "It" => self.item(doc, req),
            "El" => self.end_list(doc),
            "Bd" => self.begin_display(doc, &req.args),
            "Ed" => match self.displays.pop() {
                Some(BlockDisplay::Literal) => {
                    doc.end_display();
                }
                Some(BlockDisplay::Indented) => {
                    doc.end_list_by("Bd");
                }
                Some(BlockDisplay::Plain) => doc.paragraph_break(),
                None => doc.warn(".Ed without .Bd"),
            },
            "D1" => {
                let text = self.render(doc, &req.args);
                doc.close_para();
                doc.emit_markup(&format!("<blockquote remap='D1'><para>{text}</para></blockquote>"));
            }
            "Dl" => {
                let text = self.render(doc, &req.args);
                doc.close_para();
                doc.emit_markup(&format!("<literallayout remap='Dl'>{text}</literallayout>"));
            }
            "Bf" => {
                let font = match req.arg(0) {
                    "-emphasis" | "Em" => "I",
                    "-literal" | "Li" => "CW",
                    _ => "B",
                };
                doc.font_request(font);
            }
            "Ef" => doc.font_request("R"),
            "Rs" => self.reference = Some(Vec::new()),
            "Re" => self.end_reference(doc),
            field if field.starts_with('%') && field.len() == 2 => {
                let value = self.render(doc, &req.args);
                match self.reference.as_mut() {
                    Some(fields) => fields.push((field[1..].to_owned(), value)),
                    None => {
                        doc.warn(format!(".{field} outside .Rs"));
                        doc.text_line(&value);
                    }
                }
            }
            "Rv" | "Ex" | "Bt" | "Ud" => {
                let text = self.boilerplate(doc, name, &req.args);
                doc.text_line(&text);
            }
            _ if self.part == Part::Synopsis
                && self.command.is_some()
                && SYNOPSIS_MACROS.contains(&name) =>
            {
                let tokens = self.tokens(req);
                self.synopsis_tokens(doc, &tokens);
            }
            _ if is_callable(name) || name == "Nm" || name == "Nd" => {
                let tokens = self.tokens(req);
                let text = self.render(doc, &tokens);
                doc.text_line(&text);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn wrap_up(&mut self, doc: &mut Document) {
        self.flush_synopsis(doc);
        if self.part == Part::Name && !self.named && !self.names.is_empty() {
            emit_namediv(doc, &self.names, "");
        }
        while !self.lists.is_empty() {
            doc.warn("unclosed .Bl");
            self.end_list(doc);
        }
        if self.reference.is_some() {
            doc.warn("unclosed .Rs");
            self.end_reference(doc);
        }
    }
}

impl MdocInterpreter {
    /// The request name followed by its arguments, as macro tokens.
    fn tokens(&self, req: &Request) -> Vec<String> {
        std::iter::once(req.name.clone())
            .chain(req.args.iter().cloned())
            .collect()
    }

    fn render(&mut self, doc: &mut Document, tokens: &[String]) -> String {
        let mut line = Line::default();
        self.render_into(doc, tokens, &mut line);
        line.buf
    }

    fn render_into(&mut self, doc: &mut Document, tokens: &[String], out: &mut Line) {
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i].as_str();
            i += 1;
            if !is_callable(token) {
                if is_punctuation(token) {
                    out.punct(token);
                } else {
                    out.word(&doc.render_isolated(token));
                }
                continue;
            }
            let end = next_callable(tokens, i);
            let args = &tokens[i..end];
            let rest = &tokens[i..];
            match token {
                "Fl" => {
                    if args.iter().all(|a| is_punctuation(a)) {
                        out.word("<option>-</option>");
                    }
                    self.elements(doc, args, out, "<option>-", "</option>");
                }
                "Ar" => {
                    if args.iter().all(|a| is_punctuation(a)) {
                        out.word("<replaceable>file ...</replaceable>");
                    }
                    self.elements(doc, args, out, "<replaceable>", "</replaceable>");
                }
                "Cm" => self.elements(doc, args, out, "<option>", "</option>"),
                "Pa" => self.elements(doc, args, out, "<filename>", "</filename>"),
                "Ev" => self.elements(doc, args, out, "<envar>", "</envar>"),
                "Er" => self.elements(doc, args, out, "<errorcode>", "</errorcode>"),
                "Dv" => self.elements(doc, args, out, "<constant>", "</constant>"),
                "Va" => self.elements(doc, args, out, "<varname>", "</varname>"),
                "Vt" | "Ft" | "Ot" => self.elements(doc, args, out, "<type>", "</type>"),
                "Fa" => self.elements(doc, args, out, "<parameter>", "</parameter>"),
                "Ic" => self.elements(doc, args, out, "<command>", "</command>"),
                "Li" | "Ad" | "Cd" => self.elements(doc, args, out, "<literal>", "</literal>"),
                "Em" => self.elements(doc, args, out, "<emphasis>", "</emphasis>"),
                "Sy" => self.elements(doc, args, out, "<emphasis role='strong'>", "</emphasis>"),
                "Mt" => self.elements(doc, args, out, "<email>", "</email>"),
                "In" => self.elements(doc, args, out, "<filename>&lt;", "&gt;</filename>"),
                "Nm" => {
                    let has_name = args.first().is_some_and(|a| !is_punctuation(a));
                    if !has_name {
                        let name = self.names.first().cloned().unwrap_or_default();
                        out.word(&format!("<command>{name}</command>"));
                    }
                    self.elements(doc, args, out, "<command>", "</command>");
                }
                "No" | "Tn" | "Ms" | "Fr" | "An" => {
                    for arg in args.iter().filter(|a| !matches!(a.as_str(), "-split" | "-nosplit")) {
                        self.text(doc, arg, out);
                    }
                }
                "Xr" => {
                    let (body, trail) = split_trailing(args);
                    if let Some(page) = body.first() {
                        let page = doc.render_isolated(page);
                        match body.get(1) {
                            Some(section) => out.word(&format!(
                                "<citerefentry><refentrytitle>{page}</refentrytitle><manvolnum>{}</manvolnum></citerefentry>",
                                escape_xml(section)
                            )),
                            None => out.word(&format!("<citerefentry><refentrytitle>{page}</refentrytitle></citerefentry>")),
                        }
                    }
                    for extra in body.iter().skip(2) {
                        self.text(doc, extra, out);
                    }
                    for p in trail {
                        out.punct(p);
                    }
                }
                "Fn" => {
                    let (body, trail) = split_trailing(args);
                    if let Some((name, params)) = body.split_first() {
                        let params: Vec<String> = params
                            .iter()
                            .map(|p| format!("<parameter>{}</parameter>", doc.render_isolated(p)))
                            .collect();
                        out.word(&format!(
                            "<function>{}</function>({})",
                            doc.render_isolated(name),
                            params.join(", ")
                        ));
                    }
                    for p in trail {
                        out.punct(p);
                    }
                }
                "Lk" => {
                    let (body, trail) = split_trailing(args);
                    if let Some((url, text)) = body.split_first() {
                        let url = strip_tags(&doc.render_isolated(url));
                        let text: Vec<String> = text.iter().map(|t| doc.render_isolated(t)).collect();
                        out.word(&super::link_markup(doc, &url, &text.join(" ")));
                    }
                    for p in trail {
                        out.punct(p);
                    }
                }
                "Sx" => {
                    let (body, trail) = split_trailing(args);
                    let text: Vec<String> = body.iter().map(|t| doc.render_isolated(t)).collect();
                    let text = text.join(" ");
                    out.word(&format!(
                        "<link linkend='{}'>{text}</link>",
                        escape_attr(&slugify(&text))
                    ));
                    for p in trail {
                        out.punct(p);
                    }
                }
                "St" => {
                    let (body, trail) = split_trailing(args);
                    if let Some(abbrev) = body.first() {
                        match standard(abbrev) {
                            Some(name) => out.word(&escape_xml(name)),
                            None => {
                                doc.warn(format!("unknown standard {abbrev}"));
                                out.word(&escape_xml(abbrev));
                            }
                        }
                    }
                    for p in trail {
                        out.punct(p);
                    }
                }
                "At" | "Bsx" | "Bx" | "Dx" | "Fx" | "Nx" | "Ox" | "Ux" => {
                    let (body, trail) = split_trailing(args);
                    let name = escape_xml(system(token).unwrap_or(token));
                    match body.first() {
                        Some(version) if token == "At" => {
                            out.word(&format!("Version {} {name}", escape_xml(version)));
                        }
                        Some(version) => out.word(&format!("{name} {}", escape_xml(version))),
                        None => out.word(&name),
                    }
                    for p in trail {
                        out.punct(p);
                    }
                }
                "Dq" => self.enclose(doc, rest, out, "&#8220;", "&#8221;"),
                "Qq" => self.enclose(doc, rest, out, "\"", "\""),
                "Sq" => self.enclose(doc, rest, out, "&#8216;", "&#8217;"),
                "Pq" => self.enclose(doc, rest, out, "(", ")"),
                "Bq" | "Op" => self.enclose(doc, rest, out, "[", "]"),
                "Brq" => self.enclose(doc, rest, out, "{", "}"),
                "Aq" => self.enclose(doc, rest, out, "&lt;", "&gt;"),
                "Ql" => self.enclose(doc, rest, out, "<literal>", "</literal>"),
                "Do" => out.open("&#8220;"),
                "Dc" => out.close("&#8221;"),
                "So" => out.open("&#8216;"),
                "Sc" => out.close("&#8217;"),
                "Qo" => out.open("\""),
                "Qc" => out.close("\""),
                "Po" => out.open("("),
                "Pc" => out.close(")"),
                "Bo" | "Oo" => out.open("["),
                "Bc" | "Oc" => out.close("]"),
                "Bro" => out.open("{"),
                "Brc" => out.close("}"),
                "Ao" => out.open("&lt;"),
                "Ac" => out.close("&gt;"),
                "Eo" | "Ec" => {
                    if let Some(delim) = args.first() {
                        let delim = doc.render_isolated(delim);
                        if token == "Eo" { out.open(&delim) } else { out.close(&delim) }
                        i += 1;
                    }
                    continue;
                }
                "Ns" => {
                    out.nospace = true;
                    continue;
                }
                "Ap" => {
                    out.close("'");
                    out.nospace = true;
                    continue;
                }
                "Pf" => {
                    if let Some(prefix) = args.first() {
                        let prefix = doc.render_isolated(prefix);
                        out.word(&prefix);
                        out.nospace = true;
                        i += 1;
                    }
                    continue;
                }
                "Ta" => {
                    out.word("\t");
                    out.nospace = true;
                    continue;
                }
                // Xo and Xc only extend lines; Fo and Fc are block macros.
                _ => {
                    for arg in args {
                        self.text(doc, arg, out);
                    }
                }
            }
            i = match token {
                "Dq" | "Qq" | "Sq" | "Pq" | "Bq" | "Op" | "Brq" | "Aq" | "Ql" => tokens.len(),
                "Do" | "Dc" | "So" | "Sc" | "Qo" | "Qc" | "Po" | "Pc" | "Bo" | "Oo" | "Bc"
                | "Oc" | "Bro" | "Brc" | "Ao" | "Ac" => i,
                _ => end,
            };
        }
    }

    fn text(&self, doc: &mut Document, token: &str, out: &mut Line) {
        if is_punctuation(token) {
            out.punct(token);
        } else {
            out.word(&doc.render_isolated(token));
        }
    }

    /// Wrap each non-punctuation argument in `open`/`close`.
    fn elements(&self, doc: &mut Document, args: &[String], out: &mut Line, open: &str, close: &str) {
        for arg in args {
            if is_punctuation(arg) {
                out.punct(arg);
            } else {
                out.word(&format!("{open}{}{close}", doc.render_isolated(arg)));
            }
        }
    }

    /// An enclosure macro: the rest of the line, bracketed, with trailing
    /// punctuation kept outside.
    fn enclose(&mut self, doc: &mut Document, rest: &[String], out: &mut Line, open: &str, close: &str) {
        let (body, trail) = split_trailing(rest);
        let mut inner = Line::default();
        self.render_into(doc, body, &mut inner);
        out.word(&format!("{open}{}{close}", inner.buf));
        for p in trail {
            out.punct(p);
        }
    }

    fn boilerplate(&mut self, doc: &mut Document, name: &str, args: &[String]) -> String {
        let subjects: Vec<&String> = args.iter().filter(|a| *a != "-std").collect();
        match name {
            "Rv" => {
                let function = subjects.first().map_or_else(
                    || self.names.first().cloned().unwrap_or_default(),
                    |s| doc.render_isolated(s),
                );
                format!(
                    "The <function>{function}</function>() function returns the value 0 if successful; \
                     otherwise the value -1 is returned and the global variable \
                     <varname>errno</varname> is set to indicate the error."
                )
            }
            "Ex" => {
                let utility = subjects.first().map_or_else(
                    || self.names.first().cloned().unwrap_or_default(),
                    |s| doc.render_isolated(s),
                );
                format!(
                    "The <command>{utility}</command> utility exits 0 on success, and &gt;0 if an error occurs."
                )
            }
            "Bt" => "is currently in beta test.".to_owned(),
            _ => "currently under development.".to_owned(),
        }
    }

    fn section(&mut self, doc: &mut Document, req: &Request, depth: usize) {
        if self.part == Part::Name && !self.named && !self.names.is_empty() {
            doc.warn("NAME section without .Nd");
            emit_namediv(doc, &self.names, "");
            self.named = true;
        }
        let title = self.render(doc, &req.args);
        let plain = strip_tags(&title).trim().to_uppercase();
        self.part = Part::Other;
        if depth == 1 && doc.is_refentry() {
            if NAME_TITLES.contains(&plain.as_str()) {
                doc.pop_sections(1);
                self.part = Part::Name;
                return;
            }
            if plain == "SYNOPSIS" {
                doc.push_synopsis_section(&title);
                self.part = Part::Synopsis;
                return;
            }
        }
        doc.push_section(depth, &title);
    }

    // Lists

    fn begin_list(&mut self, doc: &mut Document, args: &[String]) {
        let style = args
            .iter()
            .find(|a| {
                !matches!(a.as_str(), "-compact" | "-width" | "-offset") && a.starts_with('-')
            })
            .map_or("-tag", String::as_str);
        let (kind, attrs) = match style {
            "-column" => {
                doc.close_para();
                self.lists.push(None);
                self.columns.push(Vec::new());
                return;
            }
            "-bullet" => (ListKind::Itemized, " mark='bullet'"),
            "-dash" | "-hyphen" => (ListKind::Itemized, " mark='dash'"),
            "-item" => (ListKind::Itemized, " mark='none'"),
            "-enum" => (ListKind::Ordered, ""),
            "-tag" | "-hang" | "-ohang" | "-inset" | "-diag" => (ListKind::Variable, ""),
            other => {
                doc.warn(format!("unknown list type {other}"));
                (ListKind::Variable, "")
            }
        };
        doc.begin_list_with("Bl", kind, attrs);
        self.lists.push(Some(kind));
    }

    fn item(&mut self, doc: &mut Document, req: &Request) {
        let mut args = req.args.clone();
        if args.last().is_some_and(|a| a == "Xo") {
            args.pop();
            self.extend_item(doc, &mut args);
        }
        match self.lists.last().copied() {
            None => doc.warn(".It outside .Bl"),
            Some(None) => {
                let cells: Vec<String> = args
                    .split(|a| a == "Ta")
                    .map(|cell| self.render(doc, cell))
                    .collect();
                let cells = cells
                    .iter()
                    .flat_map(|c| c.split('\t').map(|s| s.trim().to_owned()))
                    .collect();
                if let Some(rows) = self.columns.last_mut() {
                    rows.push(cells);
                }
            }
            Some(Some(ListKind::Variable)) => {
                let term = self.render(doc, &args);
                doc.begin_item(Some(&term));
            }
            Some(Some(_)) => {
                doc.begin_item(None);
                if !args.is_empty() {
                    let text = self.render(doc, &args);
                    doc.text_line(&text);
                }
            }
        }
    }

    /// `.It … Xo` continues the item head up to `.Xc`.
    fn extend_item(&mut self, doc: &mut Document, args: &mut Vec<String>) {
        while let Some(line) = doc.next_line() {
            match split_command(&line, doc.troff.cc, doc.troff.c2) {
                Some((name, rest)) if name == "Xc" => {
                    args.extend(parse_args(rest));
                    return;
                }
                Some((name, rest)) => {
                    args.push(name);
                    args.extend(parse_args(rest));
                }
                None => args.extend(line.split_whitespace().map(str::to_owned)),
            }
        }
        doc.warn(".Xo without .Xc");
    }

    fn end_list(&mut self, doc: &mut Document) {
        match self.lists.pop() {
            None => doc.warn(".El without .Bl"),
            Some(Some(_)) => {
                doc.end_list_by("Bl");
            }
            Some(None) => {
                let rows = self.columns.pop().unwrap_or_default();
                emit_columns(doc, &rows);
            }
        }
    }

    fn begin_display(&mut self, doc: &mut Document, args: &[String]) {
        let has = |flag: &str| args.iter().any(|a| a == flag);
        if has("-literal") || has("-unfilled") {
            doc.begin_display(DisplayKind::Literal, "Bd");
            self.displays.push(BlockDisplay::Literal);
        } else if has("-offset") {
            doc.begin_list("Bd", ListKind::Blockquote);
            doc.begin_item(None);
            self.displays.push(BlockDisplay::Indented);
        } else {
            doc.paragraph_break();
            self.displays.push(BlockDisplay::Plain);
        }
    }

    fn end_reference(&mut self, doc: &mut Document) {
        let Some(fields) = self.reference.take() else {
            doc.warn(".Re without .Rs");
            return;
        };
        let field = |key: &str| -> Vec<&str> {
            fields
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .collect()
        };
        let mut parts = Vec::new();
        let authors = field("A");
        match authors.as_slice() {
            [] => {}
            [one] => parts.push((*one).to_owned()),
            [first, second] => parts.push(format!("{first} and {second}")),
            [init @ .., last] => parts.push(format!("{}, and {last}", init.join(", "))),
        }
        for title in field("T") {
            parts.push(format!("<citetitle>{title}</citetitle>"));
        }
        for book in field("B") {
            parts.push(format!("<citetitle pubwork='book'>{book}</citetitle>"));
        }
        for journal in field("J") {
            parts.push(format!("<citetitle pubwork='journal'>{journal}</citetitle>"));
        }
        for (key, prefix) in [
            ("R", ""),
            ("V", "vol. "),
            ("N", "no. "),
            ("I", ""),
            ("C", ""),
            ("P", "pp. "),
            ("Q", ""),
            ("D", ""),
            ("O", ""),
        ] {
            for value in field(key) {
                parts.push(format!("{prefix}{value}"));
            }
        }
        for url in field("U") {
            let target = strip_tags(url);
            parts.push(super::link_markup(doc, &target, url));
        }
        doc.paragraph_break();
        doc.emit_markup(&format!("<para remap='Rs'>{}.</para>", parts.join(", ")));
    }

    // Synopsis

    fn begin_command(&mut self, doc: &mut Document, args: &[String]) {
        self.flush_synopsis(doc);
        let (name, rest) = match args.first() {
            Some(first) if !is_callable(first) && !is_punctuation(first) => {
                (strip_tags(&doc.render_isolated(first)), &args[1..])
            }
            _ => (self.names.first().cloned().unwrap_or_default(), args),
        };
        self.command = Some(CommandSynopsis {
            name,
            frames: vec![Vec::new()],
        });
        self.synopsis_tokens(doc, rest);
    }

    fn push_piece(&mut self, piece: Piece) {
        if let Some(frame) = self.command.as_mut().and_then(|c| c.frames.last_mut()) {
            frame.push(piece);
        }
    }

    fn open_frame(&mut self) {
        if let Some(command) = self.command.as_mut() {
            command.frames.push(Vec::new());
        }
    }

    fn close_frame(&mut self) {
        if let Some(command) = self.command.as_mut()
            && command.frames.len() > 1
            && let Some(frame) = command.frames.pop()
        {
            let piece = enclose_pieces(frame, "opt");
            if let Some(parent) = command.frames.last_mut() {
                parent.push(piece);
            }
        }
    }

    fn mark_repeat(&mut self) {
        let last = self
            .command
            .as_mut()
            .and_then(|c| c.frames.last_mut())
            .and_then(|f| f.last_mut());
        if let Some(piece) = last {
            piece.repeat = true;
        }
    }

    fn synopsis_tokens(&mut self, doc: &mut Document, tokens: &[String]) {
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i].as_str();
            i += 1;
            let end = next_callable(tokens, i);
            let args = &tokens[i..end];
            match token {
                "Op" => {
                    self.open_frame();
                    self.synopsis_tokens(doc, &tokens[i..]);
                    self.close_frame();
                    return;
                }
                "Oo" => self.open_frame(),
                "Oc" => self.close_frame(),
                "Fl" | "Ar" | "Cm" | "Ic" | "Li" | "Pa" | "Va" | "Ev" | "Dv" => {
                    let (open, close) = match token {
                        "Fl" => ("<option>-", "</option>"),
                        "Cm" | "Ic" | "Li" => ("<option>", "</option>"),
                        _ => ("<replaceable>", "</replaceable>"),
                    };
                    let mut any = false;
                    for arg in args {
                        match arg.as_str() {
                            "|" => self.push_piece(Piece::separator()),
                            "..." => self.mark_repeat(),
                            a if is_punctuation(a) => {}
                            a => {
                                let text = doc.render_isolated(a);
                                self.push_piece(Piece::plain(format!("{open}{text}{close}")));
                                any = true;
                            }
                        }
                    }
                    if !any {
                        match token {
                            "Fl" => self.push_piece(Piece::plain("<option>-</option>".to_owned())),
                            "Ar" => {
                                self.push_piece(Piece::plain(
                                    "<replaceable>file</replaceable>".to_owned(),
                                ));
                                self.mark_repeat();
                            }
                            _ => {}
                        }
                    }
                    i = end;
                }
                "Ns" | "Bk" | "Ek" | "Xo" | "Xc" => {}
                "Sm" => {
                    if matches!(tokens.get(i).map(String::as_str), Some("on" | "off")) {
                        i += 1;
                    }
                }
                "|" => self.push_piece(Piece::separator()),
                "..." => self.mark_repeat(),
                _ if is_callable(token) => {
                    let text = self.render(doc, &tokens[i - 1..end]);
                    self.push_piece(Piece::plain(strip_tags(&text)));
                    i = end;
                }
                other if is_punctuation(other) => {}
                other => {
                    let text = strip_tags(&doc.render_isolated(other));
                    self.push_piece(Piece::plain(text));
                }
            }
        }
    }

    fn function_synopsis(&mut self, doc: &mut Document, req: &Request) {
        if let Some(command) = self.command.take() {
            emit_command(doc, command);
        }
        let rendered: Vec<String> = req.args.iter().map(|a| doc.render_isolated(a)).collect();
        let functions = self.functions.get_or_insert_default();
        match req.name.as_str() {
            "Fd" | "Vt" => functions.info.push(rendered.join(" ")),
            "In" => functions
                .info
                .push(format!("#include &lt;{}&gt;", rendered.join(" "))),
            "Ft" => functions.return_type = Some(rendered.join(" ")),
            "Fn" => {
                if let Some((name, params)) = rendered.split_first() {
                    let params: Vec<String> =
                        params.iter().filter(|p| !is_punctuation(p)).cloned().collect();
                    functions.prototype(name, &params);
                }
            }
            "Fo" => functions.open = Some((rendered.join(" "), Vec::new())),
            "Fa" => match functions.open.as_mut() {
                Some((_, params)) => params.extend(rendered),
                None => functions.info.push(rendered.join(" ")),
            },
            _ => match functions.open.take() {
                Some((name, params)) => functions.prototype(&name, &params),
                None => doc.warn(".Fc without .Fo"),
            },
        }
    }

    fn flush_synopsis(&mut self, doc: &mut Document) {
        if let Some(command) = self.command.take() {
            emit_command(doc, command);
        }
        if let Some(mut functions) = self.functions.take() {
            if let Some((name, params)) = functions.open.take() {
                doc.warn(".Fo without .Fc");
                functions.prototype(&name, &params);
            }
            functions.take_info();
            if !functions.body.is_empty() {
                doc.close_para();
                doc.emit_markup(&format!(
                    "<funcsynopsis>\n{}\n</funcsynopsis>",
                    functions.body.join("\n")
                ));
            }
        }
    }
}

fn emit_command(doc: &mut Document, mut command: CommandSynopsis) {
    if command.frames.len() > 1 {
        doc.warn("unclosed .Oo in synopsis");
    }
    while command.frames.len() > 1 {
        let Some(frame) = command.frames.pop() else {
            break;
        };
        let piece = enclose_pieces(frame, "opt");
        if let Some(parent) = command.frames.last_mut() {
            parent.push(piece);
        }
    }
    let pieces = command.frames.pop().unwrap_or_default();
    let mut markup = format!("<cmdsynopsis>\n<command>{}</command>", command.name);
    for piece in pieces.iter().filter(|p| !p.separator) {
        markup.push('\n');
        markup.push_str(&piece.outer());
    }
    markup.push_str("\n</cmdsynopsis>");
    doc.close_para();
    doc.emit_markup(&markup);
}

/// A `.Bl -column` list as an informal table.
fn emit_columns(doc: &mut Document, rows: &[Vec<String>]) {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    if cols == 0 {
        return;
    }
    let mut markup = format!("<informaltable remap='Bl' frame='none'>\n<tgroup cols='{cols}'>\n<tbody>\n");
    for row in rows {
        markup.push_str("<row>");
        for cell in row {
            markup.push_str(&format!("<entry>{cell}</entry>"));
        }
        markup.push_str("</row>\n");
    }
    markup.push_str("</tbody>\n</tgroup>\n</informaltable>");
    doc.close_para();
    doc.emit_markup(&markup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifter::Lifter;
    use crate::settings::LiftSettings;
    use pretty_assertions::assert_eq;

    fn lift(source: &str) -> String {
        let mut lifter = Lifter::new(LiftSettings::default());
        match lifter.translate("frob.1", source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}: {:?}", lifter.diagnostics()),
        }
    }

    const HEADER: &str = ".Dd March 1, 2024\n.Dt FROB 1\n.Os\n.Sh NAME\n.Nm frob\n.Nd twiddle bits\n";

    #[test]
    fn test_name_section() {
        let xml = lift(&format!("{HEADER}.Sh DESCRIPTION\nText.\n"));
        assert!(xml.contains("<refentrytitle>FROB</refentrytitle>"));
        assert!(xml.contains(
            "<refnamediv><refname>frob</refname><refpurpose>twiddle bits</refpurpose></refnamediv>"
        ));
    }

    #[test]
    fn test_command_synopsis() {
        let xml = lift(&format!(
            "{HEADER}.Sh SYNOPSIS\n.Nm frob\n.Op Fl v\n.Op Fl o Ar output\n.Ar file ...\n.Sh DESCRIPTION\nThe\n.Nm\nutility.\n"
        ));
        assert!(xml.contains("<cmdsynopsis>\n<command>frob</command>\n<arg choice='opt'><option>-v</option></arg>"));
        assert!(xml.contains(
            "<arg choice='opt'><option>-o</option> <replaceable>output</replaceable></arg>"
        ));
        assert!(xml.contains("<arg choice='plain' rep='repeat'><replaceable>file</replaceable></arg>\n</cmdsynopsis>"));
        assert!(xml.contains("<para>The\n<command>frob</command>\nutility.</para>"));
    }

    #[test]
    fn test_function_synopsis() {
        let xml = lift(&format!(
            "{HEADER}.Sh SYNOPSIS\n.In stdio.h\n.Ft int\n.Fn printf \"const char *format\" ...\n.Sh DESCRIPTION\nText.\n"
        ));
        assert!(xml.contains("<funcsynopsisinfo>#include &lt;stdio.h&gt;</funcsynopsisinfo>"));
        assert!(xml.contains("<funcdef>int <function>printf</function></funcdef>"));
        assert!(xml.contains("<paramdef>const char *<parameter>format</parameter></paramdef>\n<varargs/>"));
    }

    #[test]
    fn test_lists() {
        let xml = lift(&format!(
            "{HEADER}.Sh OPTIONS\n.Bl -tag -width Ds\n.It Fl v\nVerbose.\n.It Fl q\nQuiet.\n.El\n.Bl -bullet -compact\n.It\nOne\n.El\n"
        ));
        assert!(xml.contains("<variablelist remap='Bl'>"));
        assert!(xml.contains("<varlistentry><term><option>-v</option></term>"));
        assert!(xml.contains("<itemizedlist mark='bullet' remap='Bl'>"));
        assert_eq!(xml.matches("<listitem>").count(), 3);
        assert_eq!(xml.matches("</listitem>").count(), 3);
    }

    #[test]
    fn test_column_list() {
        let xml = lift(&format!(
            "{HEADER}.Sh FILES\n.Bl -column \"name\" \"purpose\"\n.It Pa a.conf Ta main\n.It Pa b.conf Ta extra\n.El\n"
        ));
        assert!(xml.contains("<tgroup cols='2'>"));
        assert!(xml.contains("<row><entry><filename>a.conf</filename></entry><entry>main</entry></row>"));
    }

    #[test]
    fn test_inline_macros() {
        let xml = lift(&format!(
            "{HEADER}.Sh SEE ALSO\nRead\n.Pa /etc/frob.conf ,\n.Dq quoted text .\n.Xr ls 1 ,\n.St -p1003.1\n"
        ));
        assert!(xml.contains("<filename>/etc/frob.conf</filename>,"));
        assert!(xml.contains("&#8220;quoted text&#8221;."));
        assert!(xml.contains(
            "<citerefentry><refentrytitle>ls</refentrytitle><manvolnum>1</manvolnum></citerefentry>,"
        ));
        assert!(xml.contains("IEEE Std 1003.1"));
    }

    #[test]
    fn test_reference_block() {
        let xml = lift(&format!(
            "{HEADER}.Sh HISTORY\n.Rs\n.%A Ken Thompson\n.%A Dennis Ritchie\n.%T The UNIX Time-Sharing System\n.%D 1974\n.Re\n"
        ));
        assert!(xml.contains(
            "<para remap='Rs'>Ken Thompson and Dennis Ritchie, <citetitle>The UNIX Time-Sharing System</citetitle>, 1974.</para>"
        ));
    }

    #[test]
    fn test_param_markup() {
        assert_eq!(param_markup("int fd"), "<paramdef>int <parameter>fd</parameter></paramdef>");
        assert_eq!(param_markup("void"), "<void/>");
        assert_eq!(
            param_markup("char buf[]"),
            "<paramdef>char <parameter>buf</parameter>[]</paramdef>"
        );
    }
}
