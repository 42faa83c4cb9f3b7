//! Per-file orchestration: detection, the interpreter stack and the run loop.
//!
//! A [`Lifter`] is created once per run and translates any number of files.
//! Each call to [`Lifter::translate`] builds a fresh [`Document`], activates
//! the detected packages on top of the base troff interpreter, and then pops
//! work items until the input is exhausted. Control lines are offered to the
//! interpreters most recently activated first; the first one to claim a
//! request wins.

use std::path::Path;

use crate::converter::{BlockConverter, BlockKind, ConvertResult};
use crate::detect::detect;
use crate::diagnostics::Diagnostic;
use crate::dialects;
use crate::document::{DisplayKind, Document};
use crate::error::LiftError;
use crate::hints::{HintScope, SemanticHints};
use crate::input::WorkItem;
use crate::interpreter::{Interpreter, Request};
use crate::output;
use crate::postprocess;
use crate::settings::LiftSettings;
use crate::table;
use crate::text::{
    comment_text, decode_latin1, escape_xml, is_command, is_comment, parse_args, split_command,
    unescape_xml,
};
use crate::troff::{TroffInterpreter, invoke_macro};

/// A successfully translated document.
#[derive(Debug, Clone)]
pub struct LiftOutput {
    pub xml: String,
    /// Interpreters that claimed at least one request.
    pub dialects: Vec<&'static str>,
}

/// Translates troff sources to DocBook, one file at a time.
pub struct Lifter {
    settings: LiftSettings,
    hints: SemanticHints,
    converters: Vec<Box<dyn BlockConverter>>,
    diagnostics: Vec<Diagnostic>,
}

impl Lifter {
    pub fn new(settings: LiftSettings) -> Self {
        Self {
            settings,
            hints: SemanticHints::new(),
            converters: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Seed the hint registry (normally read from a hints file).
    #[must_use]
    pub fn with_hints(mut self, hints: SemanticHints) -> Self {
        self.hints = hints;
        self
    }

    /// Register a converter for equation and diagram blocks.
    #[must_use]
    pub fn with_converter(mut self, converter: Box<dyn BlockConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn settings(&self) -> &LiftSettings {
        &self.settings
    }

    pub fn hints(&self) -> &SemanticHints {
        &self.hints
    }

    pub fn into_hints(self) -> SemanticHints {
        self.hints
    }

    /// Diagnostics raised by the most recent translation.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Translate the source bytes of `name` (a path or a display name).
    ///
    /// Local hints learned from the file are promoted to the global scope
    /// whether or not translation succeeds.
    pub fn translate(&mut self, name: &str, bytes: &[u8]) -> Result<LiftOutput, LiftError> {
        self.diagnostics.clear();
        let text = decode_latin1(bytes).replace("\r\n", "\n");
        let detection = detect(name, &text)?;
        tracing::info!(file = name, major = detection.major, "translating");

        let mut hints = std::mem::take(&mut self.hints);
        hints.begin_document();
        hints.read(&text, HintScope::Local);

        let mut doc = Document::new(name, self.settings.clone(), hints);
        doc.source_dir = Path::new(name)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        let mut run = Run {
            doc,
            interpreters: Vec::new(),
            converters: &mut self.converters,
        };
        run.activate("troff");
        run.activate(detection.major);
        for minor in detection.minors {
            run.activate(minor);
        }

        let result = run.run(escape_xml(&text));

        let Run { doc, .. } = run;
        let mut hints = doc.hints;
        hints.end_document();
        self.hints = hints;
        self.diagnostics = doc.diag.into_entries();

        let xml = result?;
        Ok(LiftOutput {
            xml,
            dialects: doc.fired.into_iter().collect(),
        })
    }
}

struct Run<'a> {
    doc: Document,
    /// Most recently activated first.
    interpreters: Vec<Box<dyn Interpreter>>,
    converters: &'a mut Vec<Box<dyn BlockConverter>>,
}

impl Run<'_> {
    fn activate(&mut self, name: &'static str) {
        if self.doc.is_active(name) {
            return;
        }
        let interpreter: Box<dyn Interpreter> = match name {
            "troff" => Box::new(TroffInterpreter),
            other => match dialects::create(other) {
                Some(interpreter) => interpreter,
                None => {
                    self.doc.warn(format!("no interpreter for macro package {other}"));
                    return;
                }
            },
        };
        let descriptor = interpreter.descriptor();
        if descriptor.exclusive
            && let Some(major) = self.doc.major()
        {
            tracing::debug!(ignored = name, major, "exclusive package already active");
            return;
        }
        for (key, value) in descriptor.translations {
            self.doc
                .troff
                .strings
                .entry((*key).to_owned())
                .or_insert_with(|| (*value).to_owned());
        }
        tracing::debug!(name, "interpreter activated");
        self.doc.active.insert(0, descriptor);
        self.interpreters.insert(0, interpreter);
    }

    fn activate_pending(&mut self) {
        for name in std::mem::take(&mut self.doc.pending_activation) {
            self.activate(name);
        }
    }

    fn run(&mut self, text: String) -> Result<String, LiftError> {
        let mut text = text;
        for interpreter in &mut self.interpreters {
            text = interpreter.preprocess(text);
        }
        self.doc.input = crate::input::InputStack::from_text(&text);
        self.interpret_all()?;
        for interpreter in &mut self.interpreters {
            interpreter.wrap_up(&mut self.doc);
        }

        let mut body = self.doc.finish().join("\n");
        for interpreter in &mut self.interpreters {
            body = interpreter.postprocess(body);
        }
        let body = postprocess::close_tags(&body);
        let body = postprocess::lift_links(&body, self.doc.is_docbook5());
        postprocess::infer_hints(&body, &mut self.doc.hints);
        let body = postprocess::apply_hints(&body, &self.doc.hints);

        let xml = output::assemble(&self.doc, &body);
        let xml = output::encode(&xml, &self.doc.settings.encodings)?;
        match self.doc.diag.error_count() {
            0 => Ok(xml),
            count => Err(LiftError::TranslationErrors { count, xml }),
        }
    }

    fn interpret_all(&mut self) -> Result<(), LiftError> {
        while let Some(item) = self.doc.input.pop() {
            match item {
                WorkItem::Line { text, lineno } => {
                    if let Some(n) = lineno {
                        self.doc.lineno = n;
                    }
                    self.interpret_line(text)?;
                }
                WorkItem::Return { lineno } => {
                    self.doc.troff.frames.pop();
                    self.doc.lineno = lineno;
                }
                WorkItem::Markup(markup) => self.doc.emit_markup(&markup),
                WorkItem::Break => self.doc.paragraph_break(),
            }
            self.activate_pending();
        }
        Ok(())
    }

    fn interpret_line(&mut self, mut line: String) -> Result<(), LiftError> {
        while ends_with_continuation(&line) {
            line.pop();
            match self.doc.next_raw_line() {
                Some(next) => line.push_str(&next),
                None => break,
            }
        }
        if is_comment(&line) {
            self.doc.emit_comment(comment_text(&line));
            return Ok(());
        }
        let had_braces = line.contains("\\}");
        let mut line = self.doc.troff.expand_strings(&line);
        if had_braces || line.contains("\\}") {
            line = line.replace("\\}", "");
            if line.trim().is_empty() {
                return Ok(());
            }
        }
        if let Some(rest) = line.strip_prefix("\\{") {
            line = rest.to_owned();
        }
        if is_command(&line, self.doc.troff.cc, self.doc.troff.c2) {
            self.execute(&strip_trailing_comment(&line))
        } else {
            self.doc.text_line(&line);
            Ok(())
        }
    }

    fn execute(&mut self, line: &str) -> Result<(), LiftError> {
        let Some((name, rest)) = split_command(line, self.doc.troff.cc, self.doc.troff.c2) else {
            return Ok(());
        };
        let rest = rest.to_owned();
        if self.doc.is_ignored(&name) {
            self.doc.emit_comment(line);
            return Ok(());
        }
        if self.doc.is_complained(&name) {
            self.doc.portability(format!(".{name} is not portable; ignored"));
            self.doc.emit_comment(line);
            return Ok(());
        }
        if self.doc.is_listbreak(&name) {
            self.doc.list_break(&name);
        }
        if self.doc.is_parabreak(&name) || self.doc.is_sectionbreak(&name) {
            self.doc.paragraph_break();
        }

        let reduced = self.doc.troff.reductions.get(&name).cloned();
        let req = Request {
            name: reduced.clone().unwrap_or(name),
            args: parse_args(&rest),
            rest,
            line: line.to_owned(),
        };

        match req.name.as_str() {
            "TS" => {
                self.table(&req);
                return Ok(());
            }
            "EQ" => {
                self.filtered_block(BlockKind::Equation, &req);
                return Ok(());
            }
            "PS" => {
                self.filtered_block(BlockKind::Diagram, &req);
                return Ok(());
            }
            _ => {}
        }

        if reduced.is_none() && self.doc.troff.macros.contains_key(&req.name) {
            invoke_macro(&mut self.doc, &req);
            return Ok(());
        }

        for interpreter in &mut self.interpreters {
            if interpreter.interpret(&mut self.doc, &req)? {
                self.doc.fired.insert(interpreter.descriptor().name);
                return Ok(());
            }
        }

        self.doc.error(format!("unhandled request .{}", req.name));
        self.doc.emit_unhandled(line);
        Ok(())
    }

    /// Raw lines up to the control line named `end`.
    fn gather_block(&mut self, end: &str) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.doc.next_raw_line() {
            if split_command(&line, self.doc.troff.cc, self.doc.troff.c2)
                .is_some_and(|(cmd, _)| cmd == end)
            {
                return lines;
            }
            lines.push(line);
        }
        self.doc.warn(format!("missing .{end}"));
        lines
    }

    fn table(&mut self, req: &Request) {
        let lines = self.gather_block("TE");
        let lines: Vec<String> = lines
            .iter()
            .map(|l| self.doc.troff.expand_strings(l))
            .collect();
        self.doc.paragraph_break();
        table::render_table(&mut self.doc, &lines, req.arg(0) == "H");
        self.doc.paragraph_break();
    }

    fn filtered_block(&mut self, kind: BlockKind, req: &Request) {
        let lines = self.gather_block(kind.closer());
        self.doc.paragraph_break();
        let source = unescape_xml(&lines.join("\n"));
        for converter in self.converters.iter_mut() {
            match converter.convert(kind, &source) {
                ConvertResult::Markup(markup) => {
                    let wrapped = match kind {
                        BlockKind::Equation => {
                            format!("<informalequation>{markup}</informalequation>")
                        }
                        BlockKind::Diagram => format!(
                            "<mediaobject remap='PS'><imageobject><imagedata format='SVG'>\
                             {markup}</imagedata></imageobject></mediaobject>"
                        ),
                    };
                    self.doc.emit_markup(&wrapped);
                    return;
                }
                ConvertResult::Failed(reason) => {
                    self.doc.warn(format!(
                        ".{} block not translated: {reason}",
                        kind.opener()
                    ));
                    break;
                }
                ConvertResult::PassThrough => {}
            }
        }
        if self.converters.is_empty() {
            self.doc
                .warn(format!(".{} block kept as literal text", kind.opener()));
        }
        let opener = req.name.clone();
        self.doc.begin_display(DisplayKind::Literal, &opener);
        for line in &lines {
            self.doc.emit_markup(line);
        }
        self.doc.end_display();
    }
}

/// Whether the line ends in an unescaped backslash.
fn ends_with_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
    trailing % 2 == 1
}

/// Drop a `\"` comment from the end of a control line.
fn strip_trailing_comment(line: &str) -> String {
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\\' {
            continue;
        }
        match chars.peek() {
            Some((_, '"' | '#')) => return line[..i].trim_end().to_owned(),
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }
    line.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_continuation_detection() {
        assert!(ends_with_continuation("text \\"));
        assert!(!ends_with_continuation("text \\\\"));
        assert!(!ends_with_continuation("text"));
    }

    #[test]
    fn test_strip_trailing_comment() {
        assert_eq!(strip_trailing_comment(".SH NAME \\\" the name"), ".SH NAME");
        assert_eq!(strip_trailing_comment(".B a\\\\b"), ".B a\\\\b");
    }

    #[test]
    fn test_diagnostics_survive_failure() {
        let mut lifter = Lifter::new(LiftSettings::default());
        let err = lifter
            .translate("x.1", b".TH X 1\n.SH NAME\nx \\- y\n.XYZZY\n")
            .unwrap_err();
        assert!(matches!(err, LiftError::TranslationErrors { count: 1, .. }));
        let errors: Vec<&Diagnostic> = lifter
            .diagnostics()
            .iter()
            .filter(|d| d.severity == crate::diagnostics::Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains(".XYZZY"));
    }

    #[test]
    fn test_local_hints_are_promoted() {
        let mut lifter = Lifter::new(LiftSettings::default());
        lifter
            .translate("x.1", b".\\\" | mark frob as command\n.TH X 1\n.SH NAME\nx \\- y\n")
            .unwrap();
        assert_eq!(lifter.hints().get("frob"), Some("command"));
        assert_eq!(lifter.hints().get("x"), Some("command"));
    }

    fn lift(name: &str, source: &str) -> String {
        let mut lifter = Lifter::new(LiftSettings::default());
        match lifter.translate(name, source.as_bytes()) {
            Ok(output) => output.xml,
            Err(err) => panic!("translation failed: {err}: {:?}", lifter.diagnostics()),
        }
    }

    /// Parse the whole document, failing on any XML error or unbalanced tag.
    fn assert_well_formed(xml: &str) {
        use quick_xml::events::Event;

        let mut reader = quick_xml::Reader::from_str(xml);
        let mut depth = 0usize;
        loop {
            match reader.read_event() {
                Ok(Event::Start(_)) => depth += 1,
                Ok(Event::End(_)) => {
                    depth = depth.checked_sub(1).expect("close tag without open tag");
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => panic!(
                    "malformed XML at byte {}: {err}\n{xml}",
                    reader.buffer_position()
                ),
            }
        }
        assert_eq!(depth, 0, "unclosed elements in\n{xml}");
    }

    const PAGE: &str = ".TH FOO 1\n.SH NAME\nfoo \\- does a thing\n";

    #[test]
    fn test_trivial_page_round_trip() {
        let xml = lift("foo.1", &format!("{PAGE}.SH DESCRIPTION\nText.\n"));
        assert_well_formed(&xml);
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<refname>foo</refname><refpurpose>does a thing</refpurpose>"));
        assert_eq!(xml.matches("<refentry ").count(), 1);
        assert!(xml.trim_end().ends_with("-->"));
    }

    #[test]
    fn test_ignored_requests_leave_no_trace() {
        let with = lift(
            "foo.1",
            &format!("{PAGE}.SH DESCRIPTION\n.PD 0\nOne.\n.DT\n.PP\nTwo.\n.PD\n"),
        );
        let without = lift("foo.1", &format!("{PAGE}.SH DESCRIPTION\nOne.\n.PP\nTwo.\n"));
        assert_eq!(with, without);
    }

    #[test]
    fn test_conditional_takes_exactly_one_arm() {
        let xml = lift(
            "foo.1",
            &format!("{PAGE}.SH DESCRIPTION\n.ie n nroff arm\n.el troff arm\n.if t also troff\n"),
        );
        let nroff = xml.contains("nroff arm");
        let troff = xml.contains("troff arm");
        assert!(nroff != troff, "{xml}");
        assert_eq!(xml.contains("also troff"), troff);
    }

    #[test]
    fn test_lists_are_balanced() {
        let xml = lift(
            "foo.1",
            &format!(
                "{PAGE}.SH OPTIONS\n.TP\n\\-a\nAll.\n.IP \\(bu\nBullet\n.RS\n.IP 1.\nNested\n.RE\n.TP\n\\-b\nBee.\n.SH NOTES\nDone.\n"
            ),
        );
        assert_well_formed(&xml);
        for tag in ["variablelist", "itemizedlist", "orderedlist", "blockquote"] {
            assert_eq!(
                xml.matches(&format!("<{tag} ")).count() + xml.matches(&format!("<{tag}>")).count(),
                xml.matches(&format!("</{tag}>")).count(),
                "{tag} in\n{xml}"
            );
        }
    }

    #[test]
    fn test_macro_arguments_bind_at_the_call_site() {
        let xml = lift(
            "foo.1",
            &format!("{PAGE}.de XX\n.BR \\$1 \\$2\n..\n.SH DESCRIPTION\n.XX first (1)\n.XX second (2)\n"),
        );
        assert_well_formed(&xml);
        assert!(xml.contains("<refentrytitle>first</refentrytitle><manvolnum>1</manvolnum>"), "{xml}");
        assert!(xml.contains("<refentrytitle>second</refentrytitle><manvolnum>2</manvolnum>"));
        assert!(!xml.contains("$1"));
    }

    #[test]
    fn test_function_synopsis_scenario() {
        let xml = lift(
            "printf.3",
            ".TH PRINTF 3\n.SH NAME\nprintf \\- format output\n.SH SYNOPSIS\n#include <stdio.h>\n\nint printf(const char *format, ...);\n.SH DESCRIPTION\nText.\n",
        );
        assert_well_formed(&xml);
        assert!(xml.contains("<funcsynopsisinfo>#include &lt;stdio.h&gt;</funcsynopsisinfo>"));
        assert!(xml.contains("<function>printf</function></funcdef>"));
        assert!(xml.contains("<varargs/>"));
    }

    #[test]
    fn test_command_synopsis_scenario() {
        let xml = lift(
            "tar.1",
            ".TH TAR 1\n.SH NAME\ntar \\- archiver\n.SH SYNOPSIS\ntar [-cxtf] file ...\n.SH DESCRIPTION\nText.\n",
        );
        assert_well_formed(&xml);
        assert!(xml.contains("<command>tar</command>"));
        assert!(xml.contains("<arg choice='opt'><option>-cxtf</option></arg>"));
        assert!(xml.contains("<arg choice='plain' rep='repeat'><replaceable>file</replaceable></arg>"));
    }

    #[test]
    fn test_table_scenario() {
        let xml = lift(
            "foo.1",
            &format!("{PAGE}.SH LIMITS\n.TS\nl l.\nName\tValue\n=\na\t1\nb\t2\n.TE\n"),
        );
        assert_well_formed(&xml);
        assert!(xml.contains("<tgroup cols='2'>"));
        assert!(xml.contains(
            "<thead>\n<row><entry>Name</entry><entry>Value</entry></row>\n</thead>"
        ));
        assert!(xml.contains("<row><entry>a</entry><entry>1</entry></row>"));
    }

    #[test]
    fn test_every_dialect_is_well_formed() {
        let sources = [
            ("a.1", format!("{PAGE}.SH DESCRIPTION\n.B bold\nand\n.I italic\n.EX\ncode\n.EE\n")),
            ("b.1", ".Dd May 1, 2024\n.Dt B 1\n.Os\n.Sh NAME\n.Nm b\n.Nd bee\n.Sh SYNOPSIS\n.Nm\n.Op Fl x\n.Sh DESCRIPTION\n.Bl -enum\n.It\nOne\n.El\n".to_owned()),
            ("c.ms", ".TL\nPaper\n.AU\nA. Person\n.NH\nStart\n.PP\nText.\n.IP \\(bu\nItem\n".to_owned()),
            ("d.me", ".sh 1 Start\n.pp\nText.\n.(q\nQuote.\n.)q\n".to_owned()),
            ("e.mm", ".TL\nMemo\n.H 1 Start\n.P\nText.\n.BL\n.LI\nItem\n.LE\n".to_owned()),
        ];
        for (name, source) in &sources {
            let xml = lift(name, source);
            assert_well_formed(&xml);
        }
    }
}
