//! Per-file translation state shared by every interpreter.
//!
//! [`Document`] owns the remaining input, the base troff state and the output
//! buffers, and exposes the structural primitives (paragraphs, lists,
//! displays, sections, diversions, traps) that dialect interpreters map their
//! macros onto. Structural calls keep the output balanced: opening a section
//! closes any list, display or paragraph still open, and so on.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::diagnostics::Diagnostics;
use crate::glyphs::PREDEFINED_ENTITIES;
use crate::hints::SemanticHints;
use crate::inline::FontState;
use crate::input::{InputStack, WorkItem};
use crate::interpreter::Descriptor;
use crate::settings::{DocBookVersion, LiftSettings};
use crate::text::{IdRegistry, escape_attr, slugify, strip_tags};
use crate::troff::state::TroffState;

/// Default tab stop interval in character cells.
const TAB_WIDTH: usize = 8;

/// Front matter harvested from title and author macros.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    /// `.TH`/`.Dt` title or article title.
    pub title: Option<String>,
    /// Manual section (`manvolnum`).
    pub volnum: Option<String>,
    pub date: Option<String>,
    pub source: Option<String>,
    pub manual: Option<String>,
    pub authors: Vec<Author>,
    /// Names from the NAME section.
    pub names: Vec<String>,
    /// Abstract paragraphs, already rendered.
    pub abstract_paras: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub affiliation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Variable,
    Itemized,
    Ordered,
    /// Indented block without items (`.RS`, `.(q`).
    Blockquote,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Variable => "variablelist",
            Self::Itemized => "itemizedlist",
            Self::Ordered => "orderedlist",
            Self::Blockquote => "blockquote",
        }
    }
}

#[derive(Debug)]
struct Frame {
    command: String,
    kind: ListKind,
    count: usize,
    item_open: bool,
    /// Index of the opening tag in the current sink.
    start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    Literal,
    Program,
}

#[derive(Debug)]
struct Display {
    kind: DisplayKind,
    opener: String,
    saved_fill: bool,
    list_depth: usize,
}

#[derive(Debug)]
struct SectionMark {
    depth: usize,
    tag: String,
    start: usize,
}

#[derive(Debug)]
struct Trap {
    prefix: String,
    suffix: String,
}

#[derive(Debug)]
struct Diversion {
    lines: Vec<String>,
    saved_para: bool,
}

/// An external file referenced instead of being read inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inclusion {
    pub entity: String,
    pub href: String,
}

pub struct Document {
    /// File name used in diagnostics.
    pub name: String,
    /// Directory of the input file, searched first by `.so`.
    pub source_dir: Option<PathBuf>,
    pub settings: LiftSettings,
    pub troff: TroffState,
    pub input: InputStack,
    pub diag: Diagnostics,
    pub hints: SemanticHints,
    pub ids: IdRegistry,
    pub meta: Meta,
    /// Descriptors of the active interpreters, most recent first.
    pub active: Vec<&'static Descriptor>,
    /// Interpreters requested by `.mso` or triggers, activated by the run loop.
    pub pending_activation: Vec<&'static str>,
    /// Interpreters that claimed at least one request.
    pub fired: BTreeSet<&'static str>,
    /// Title for the next table, when a dialect supplies one.
    pub table_title: Option<String>,
    /// Plain-text title of the innermost section.
    pub section_name: Option<String>,
    /// Current input line number.
    pub lineno: usize,
    pub(crate) font: FontState,

    output: Vec<String>,
    diversions: Vec<Diversion>,
    in_para: bool,
    join_next: bool,
    trap: Option<Trap>,
    lists: Vec<Frame>,
    displays: Vec<Display>,
    sections: Vec<SectionMark>,
    translations: HashMap<char, String>,
    tabstops: Vec<usize>,
    entities: BTreeSet<String>,
    inclusions: Vec<Inclusion>,
}

impl Document {
    pub fn new(name: impl Into<String>, settings: LiftSettings, hints: SemanticHints) -> Self {
        let name = name.into();
        let diag = Diagnostics::new(name.clone(), settings.portability_warnings);
        let mut troff = TroffState::new();
        for (key, value) in &settings.defines {
            troff.strings.insert(key.clone(), value.clone());
        }
        Self {
            name,
            source_dir: None,
            settings,
            troff,
            input: InputStack::default(),
            diag,
            hints,
            ids: IdRegistry::default(),
            meta: Meta::default(),
            active: Vec::new(),
            pending_activation: Vec::new(),
            fired: BTreeSet::new(),
            table_title: None,
            section_name: None,
            lineno: 0,
            font: FontState::default(),
            output: Vec::new(),
            diversions: Vec::new(),
            in_para: false,
            join_next: false,
            trap: None,
            lists: Vec::new(),
            displays: Vec::new(),
            sections: Vec::new(),
            translations: HashMap::new(),
            tabstops: Vec::new(),
            entities: BTreeSet::new(),
            inclusions: Vec::new(),
        }
    }

    // Diagnostics

    pub fn warn(&mut self, message: impl Into<String>) {
        self.diag.warn(self.lineno, self.troff.current_macro(), message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.diag.error(self.lineno, self.troff.current_macro(), message);
    }

    pub fn portability(&mut self, message: impl Into<String>) {
        self.diag
            .portability(self.lineno, self.troff.current_macro(), message);
    }

    // Active-interpreter queries

    pub fn is_ignored(&self, name: &str) -> bool {
        self.settings.ignore_macros.iter().any(|m| m == name)
            || self.active.iter().any(|d| d.ignore.contains(&name))
    }

    pub fn is_complained(&self, name: &str) -> bool {
        self.active.iter().any(|d| d.complain.contains(&name))
    }

    pub fn is_immutable(&self, name: &str) -> bool {
        self.active.iter().any(|d| d.immutable.contains(&name))
    }

    pub fn is_listbreak(&self, name: &str) -> bool {
        self.active.iter().any(|d| d.listbreak.contains(&name))
    }

    pub fn is_scoped(&self, name: &str) -> bool {
        self.active.iter().any(|d| d.scoped.contains(&name))
    }

    pub fn is_sectionbreak(&self, name: &str) -> bool {
        self.active.iter().any(|d| d.sectionbreak.contains(&name))
    }

    pub fn is_parabreak(&self, name: &str) -> bool {
        self.active.iter().any(|d| d.parabreak.contains(&name))
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.iter().any(|d| d.name == name)
    }

    /// Name of the active exclusive package.
    pub fn major(&self) -> Option<&'static str> {
        self.active.iter().find(|d| d.exclusive).map(|d| d.name)
    }

    /// Top-level element of the document.
    pub fn toptag(&self) -> &'static str {
        self.active
            .iter()
            .find(|d| d.exclusive)
            .map_or("article", |d| d.toptag)
    }

    pub fn is_refentry(&self) -> bool {
        self.toptag() == "refentry"
    }

    pub fn is_docbook5(&self) -> bool {
        self.settings.docbook == DocBookVersion::V5
    }

    pub fn fill(&self) -> bool {
        self.troff.fill
    }

    // Input

    /// Pop the next raw input line, consuming macro return sentinels.
    ///
    /// Returns `None` at end of input or when the next item is not a line.
    pub fn next_raw_line(&mut self) -> Option<String> {
        loop {
            match self.input.pop()? {
                WorkItem::Line { text, lineno } => {
                    if let Some(n) = lineno {
                        self.lineno = n;
                    }
                    return Some(text);
                }
                WorkItem::Return { lineno } => {
                    self.troff.frames.pop();
                    self.lineno = lineno;
                }
                other => {
                    self.input.push(other);
                    return None;
                }
            }
        }
    }

    /// Pop the next line with strings and macro arguments expanded.
    pub fn next_line(&mut self) -> Option<String> {
        let line = self.next_raw_line()?;
        Some(self.troff.expand_strings(&line))
    }

    /// Name of the request on the next input line, if it is a control line.
    pub fn peek_request(&self) -> Option<String> {
        let line = self.input.peek_line()?;
        crate::text::split_command(line, self.troff.cc, self.troff.c2).map(|(name, _)| name)
    }

    /// Whether the next input line is a control line.
    pub fn next_is_command(&self) -> bool {
        self.input
            .peek_line()
            .is_some_and(|l| crate::text::is_command(l, self.troff.cc, self.troff.c2))
    }

    // Raw output

    fn sink(&mut self) -> &mut Vec<String> {
        match self.diversions.last_mut() {
            Some(diversion) => &mut diversion.lines,
            None => &mut self.output,
        }
    }

    fn sink_len(&self) -> usize {
        self.diversions
            .last()
            .map_or(self.output.len(), |d| d.lines.len())
    }

    fn emit_raw(&mut self, line: String) {
        if std::mem::take(&mut self.join_next)
            && let Some(last) = self.sink().last_mut()
        {
            last.push_str(&line);
            return;
        }
        self.sink().push(line);
    }

    /// Append text to the last output line.
    pub(crate) fn push_close(&mut self, text: &str) {
        self.join_next = false;
        let sink = self.sink();
        if let Some(last) = sink.last_mut() {
            last.push_str(text);
        } else {
            sink.push(text.to_owned());
        }
    }

    /// Emit block-level markup verbatim, one output line per input line.
    pub fn emit_markup(&mut self, markup: &str) {
        for line in markup.lines() {
            self.emit_raw(line.to_owned());
        }
    }

    /// Emit an XML comment when comment passthrough is on.
    pub fn emit_comment(&mut self, text: &str) {
        if self.settings.comments {
            let text = text.replace("--", "- -");
            let text = text.trim_end_matches('-');
            self.emit_raw(format!("<!-- {} -->", text.trim()));
        }
    }

    /// Emit an unhandled request as a comment, regardless of settings.
    pub fn emit_unhandled(&mut self, line: &str) {
        let text = line.replace("--", "- -");
        self.emit_raw(format!("<!-- {} -->", text.trim_end_matches('-')));
    }

    /// Emit a line of document text.
    ///
    /// In fill mode a blank line is a paragraph break and other text opens a
    /// paragraph as needed; in no-fill mode every line is kept. A pending trap
    /// captures the next non-blank line.
    pub fn text_line(&mut self, line: &str) {
        if self.troff.fill && line.trim().is_empty() && self.trap.is_none() {
            self.paragraph_break();
            return;
        }
        let rendered = self.render_inline(line);
        if let Some(trap) = self.trap.take() {
            if rendered.trim().is_empty() {
                self.trap = Some(trap);
                return;
            }
            let mut text = trap.prefix;
            text.push_str(&self.finish_line(&rendered));
            text.push_str(&self.take_font_close());
            text.push_str(&trap.suffix);
            self.emit_raw(text);
            return;
        }
        if self.troff.fill {
            self.ensure_para();
        }
        let finished = self.finish_line(&rendered);
        self.emit_raw(finished);
    }

    /// Register interpolation, motion escapes, `.tr` and tab expansion.
    fn finish_line(&mut self, line: &str) -> String {
        let line = self.troff.interpolate_registers(line);
        let line = strip_motions(&line);
        let line = self.apply_translations(&line);
        if self.troff.fill {
            line
        } else {
            self.expand_tabs(&line)
        }
    }

    pub fn set_translation(&mut self, from: char, to: String) {
        if to.chars().count() == 1 && to.starts_with(from) {
            self.translations.remove(&from);
        } else {
            self.translations.insert(from, to);
        }
    }

    fn apply_translations(&self, line: &str) -> String {
        if self.translations.is_empty() {
            return line.to_owned();
        }
        let mut out = String::with_capacity(line.len());
        let mut in_markup = false;
        for c in line.chars() {
            match c {
                '<' | '&' => in_markup = true,
                '>' | ';' if in_markup => {
                    in_markup = false;
                    out.push(c);
                    continue;
                }
                _ => {}
            }
            match self.translations.get(&c) {
                Some(to) if !in_markup => out.push_str(to),
                _ => out.push(c),
            }
        }
        out
    }

    pub fn set_tabstops(&mut self, stops: Vec<usize>) {
        self.tabstops = stops;
    }

    fn next_tabstop(&self, column: usize) -> usize {
        if let Some(stop) = self.tabstops.iter().copied().find(|s| *s > column) {
            return stop;
        }
        let last = self.tabstops.last().copied().unwrap_or(0);
        let interval = match self.tabstops.as_slice() {
            [.., a, b] => b - a,
            _ => TAB_WIDTH,
        }
        .max(1);
        let past = column.saturating_sub(last);
        last + (past / interval + 1) * interval
    }

    fn expand_tabs(&self, line: &str) -> String {
        if !line.contains('\t') {
            return line.to_owned();
        }
        let mut out = String::with_capacity(line.len() + 16);
        let mut column = 0;
        let mut in_tag = false;
        let mut in_entity = false;
        for c in line.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => {
                    in_tag = false;
                    out.push(c);
                    continue;
                }
                '&' if !in_tag => {
                    in_entity = true;
                    column += 1;
                }
                ';' if in_entity => {
                    in_entity = false;
                    out.push(c);
                    continue;
                }
                '\t' if !in_tag => {
                    let stop = self.next_tabstop(column);
                    out.extend(std::iter::repeat_n(' ', stop - column));
                    column = stop;
                    continue;
                }
                _ if !in_tag && !in_entity => column += 1,
                _ => {}
            }
            out.push(c);
        }
        out
    }

    // Paragraphs

    pub fn in_para(&self) -> bool {
        self.in_para
    }

    fn ensure_para(&mut self) {
        if !self.in_para {
            self.emit_raw("<para>".to_owned());
            self.join_next = true;
            self.in_para = true;
        }
    }

    pub fn close_para(&mut self) {
        if self.in_para {
            let close = self.take_font_close();
            self.push_close(&close);
            self.push_close("</para>");
            self.in_para = false;
        }
    }

    pub fn paragraph_break(&mut self) {
        self.close_para();
    }

    // Traps

    /// Wrap the next non-blank text line in `prefix`/`suffix`.
    pub fn set_trap(&mut self, prefix: impl Into<String>, suffix: impl Into<String>) {
        self.flush_trap();
        self.close_para();
        self.trap = Some(Trap {
            prefix: prefix.into(),
            suffix: suffix.into(),
        });
    }

    pub fn has_trap(&self) -> bool {
        self.trap.is_some()
    }

    /// Emit a pending trap around empty content.
    pub fn flush_trap(&mut self) {
        if let Some(trap) = self.trap.take() {
            self.emit_raw(format!("{}{}", trap.prefix, trap.suffix));
        }
    }

    // Lists

    /// Open a list (or indented block) started by `command`.
    pub fn begin_list(&mut self, command: &str, kind: ListKind) {
        self.begin_list_with(command, kind, "");
    }

    /// Open a list with extra attributes (` numeration='loweralpha'`).
    pub fn begin_list_with(&mut self, command: &str, kind: ListKind, attrs: &str) {
        self.flush_trap();
        self.close_para();
        let start = self.sink_len();
        self.emit_raw(format!(
            "<{}{attrs} remap='{}'>",
            kind.tag(),
            escape_attr(command)
        ));
        self.lists.push(Frame {
            command: command.to_owned(),
            kind,
            count: 0,
            item_open: false,
            start,
        });
    }

    pub fn list_depth(&self) -> usize {
        self.lists.len()
    }

    /// Command and kind of the innermost open list.
    pub fn top_list(&self) -> Option<(&str, ListKind)> {
        self.lists.last().map(|f| (f.command.as_str(), f.kind))
    }

    /// Whether any open list was started by `command`.
    pub fn has_list(&self, command: &str) -> bool {
        self.lists.iter().any(|f| f.command == command)
    }

    /// Start an item of the innermost list.
    ///
    /// For a variable list, `term` is rendered markup; `None` makes the next
    /// text line the term.
    pub fn begin_item(&mut self, term: Option<&str>) {
        self.close_item();
        self.end_displays_above(self.lists.len());
        let Some(frame) = self.lists.last_mut() else {
            return;
        };
        frame.count += 1;
        frame.item_open = true;
        let kind = frame.kind;
        match kind {
            ListKind::Variable => match term {
                Some(term) => {
                    self.emit_raw(format!("<varlistentry><term>{term}</term>"));
                    self.emit_raw("<listitem>".to_owned());
                }
                None => {
                    self.emit_raw("<varlistentry>".to_owned());
                    self.trap = Some(Trap {
                        prefix: "<term>".to_owned(),
                        suffix: "</term><listitem>".to_owned(),
                    });
                }
            },
            ListKind::Itemized | ListKind::Ordered => self.emit_raw("<listitem>".to_owned()),
            ListKind::Blockquote => {}
        }
    }

    /// Reopen the term of the entry just started, so the next text line adds
    /// another term. Returns `false` when no term was just emitted.
    pub fn add_term(&mut self) -> bool {
        let Some(last) = self.sink().last_mut() else {
            return false;
        };
        let Some(stripped) = last.strip_suffix("<listitem>") else {
            return false;
        };
        if !stripped.ends_with("</term>") {
            return false;
        }
        *last = stripped.to_owned();
        self.trap = Some(Trap {
            prefix: "<term>".to_owned(),
            suffix: "</term><listitem>".to_owned(),
        });
        true
    }

    /// Close the open item of the innermost list, if any.
    pub fn close_item(&mut self) {
        let open = self.lists.last().is_some_and(|f| f.item_open);
        if !open {
            self.close_para();
            return;
        }
        self.end_displays_above(self.lists.len());
        self.flush_trap();
        self.close_para();
        let Some(frame) = self.lists.last_mut() else {
            return;
        };
        frame.item_open = false;
        let kind = frame.kind;
        if kind == ListKind::Blockquote {
            return;
        }
        if self.sink().last().is_some_and(|l| l.ends_with("<listitem>")) {
            self.push_close("<para/>");
        }
        self.emit_raw("</listitem>".to_owned());
        if kind == ListKind::Variable {
            self.push_close("</varlistentry>");
        }
    }

    /// Close the innermost list.
    pub fn end_list(&mut self) {
        if self.lists.is_empty() {
            return;
        }
        self.close_item();
        self.end_displays_above(self.lists.len());
        self.close_para();
        let Some(frame) = self.lists.pop() else {
            return;
        };
        if self.sink_len() == frame.start + 1 && frame.count == 0 {
            self.sink().truncate(frame.start);
            return;
        }
        if frame.kind == ListKind::Blockquote && self.sink_len() == frame.start + 1 {
            self.push_close("<para/>");
        }
        self.emit_raw(format!("</{}>", frame.kind.tag()));
    }

    /// Close lists up to and including the innermost one opened by `command`.
    ///
    /// Returns `false` (closing nothing) when no such list is open.
    pub fn end_list_by(&mut self, command: &str) -> bool {
        if !self.has_list(command) {
            return false;
        }
        while let Some(top) = self.lists.last() {
            let matched = top.command == command;
            self.end_list();
            if matched {
                break;
            }
        }
        true
    }

    /// Close non-scoped lists on a list-breaking request.
    pub fn list_break(&mut self, command: &str) {
        while let Some(top) = self.lists.last() {
            if self.is_scoped(&top.command) {
                break;
            }
            let matched = top.command == command;
            self.end_list();
            if matched {
                break;
            }
        }
    }

    pub fn end_all_lists(&mut self) {
        while !self.lists.is_empty() {
            self.end_list();
        }
    }

    // Displays

    pub fn begin_display(&mut self, kind: DisplayKind, opener: &str) {
        self.flush_trap();
        self.close_para();
        let tag = match kind {
            DisplayKind::Literal => "literallayout",
            DisplayKind::Program => "programlisting",
        };
        self.emit_raw(format!("<{tag} remap='{}'>", escape_attr(opener)));
        self.join_next = true;
        self.displays.push(Display {
            kind,
            opener: opener.to_owned(),
            saved_fill: self.troff.fill,
            list_depth: self.lists.len(),
        });
        self.troff.fill = false;
    }

    /// Close the innermost display. Returns `false` when none is open.
    pub fn end_display(&mut self) -> bool {
        let Some(display) = self.displays.pop() else {
            return false;
        };
        while self.lists.len() > display.list_depth {
            self.end_list();
        }
        let close = self.take_font_close();
        self.push_close(&close);
        let tag = match display.kind {
            DisplayKind::Literal => "literallayout",
            DisplayKind::Program => "programlisting",
        };
        self.push_close(&format!("</{tag}>"));
        self.troff.fill = display.saved_fill;
        true
    }

    pub fn in_display(&self) -> bool {
        !self.displays.is_empty()
    }

    /// Request that opened the innermost display.
    pub fn display_opener(&self) -> Option<&str> {
        self.displays.last().map(|d| d.opener.as_str())
    }

    fn end_displays_above(&mut self, list_depth: usize) {
        while self
            .displays
            .last()
            .is_some_and(|d| d.list_depth >= list_depth)
        {
            self.end_display();
        }
    }

    pub fn end_all_displays(&mut self) {
        while self.end_display() {}
    }

    // Sections

    /// Open a section at `depth` (1-based) titled with rendered `title`.
    pub fn push_section(&mut self, depth: usize, title: &str) {
        let depth = depth.max(1);
        let tag = if self.is_refentry() {
            format!("refsect{}", depth.min(3))
        } else {
            format!("sect{}", depth.min(5))
        };
        self.open_section(depth, tag, title);
    }

    /// Open the reference-page synopsis division.
    pub fn push_synopsis_section(&mut self, title: &str) {
        if self.is_refentry() {
            self.open_section(1, "refsynopsisdiv".to_owned(), title);
        } else {
            self.push_section(1, title);
        }
    }

    fn open_section(&mut self, depth: usize, tag: String, title: &str) {
        self.flush_trap();
        self.end_all_displays();
        self.end_all_lists();
        self.close_para();
        self.pop_sections(depth);
        let plain = strip_tags(title);
        let id = self.ids.make_id(&plain);
        let start = self.sink_len();
        self.emit_raw(format!("<{tag} id='{id}'><title>{title}</title>"));
        self.section_name = Some(plain);
        self.sections.push(SectionMark { depth, tag, start });
    }

    /// Close every section at `depth` or deeper.
    pub fn pop_sections(&mut self, depth: usize) {
        while self.sections.last().is_some_and(|s| s.depth >= depth) {
            self.pop_section();
        }
    }

    fn pop_section(&mut self) {
        self.flush_trap();
        self.end_all_displays();
        self.end_all_lists();
        self.close_para();
        let Some(mark) = self.sections.pop() else {
            return;
        };
        if self.sink_len() == mark.start + 1 {
            if mark.depth == 1 {
                self.warn("empty section deleted");
                self.sink().truncate(mark.start);
                return;
            }
            self.push_close("<para/>");
        }
        self.emit_raw(format!("</{}>", mark.tag));
    }

    pub fn end_sections(&mut self) {
        self.pop_sections(0);
    }

    pub fn section_depth(&self) -> usize {
        self.sections.last().map_or(0, |s| s.depth)
    }

    // Diversions

    /// Redirect output into a fresh buffer.
    pub fn begin_diversion(&mut self) {
        self.diversions.push(Diversion {
            lines: Vec::new(),
            saved_para: self.in_para,
        });
        self.in_para = false;
        self.join_next = false;
    }

    /// Stop redirecting and return what was captured.
    pub fn end_diversion(&mut self) -> Vec<String> {
        self.flush_trap();
        self.close_para();
        let Some(diversion) = self.diversions.pop() else {
            return Vec::new();
        };
        self.in_para = diversion.saved_para;
        self.join_next = false;
        diversion.lines
    }

    pub fn in_diversion(&self) -> bool {
        !self.diversions.is_empty()
    }

    pub fn begin_footnote(&mut self) {
        self.begin_diversion();
    }

    /// Close a footnote and attach it to the text before it.
    pub fn end_footnote(&mut self) {
        if self.diversions.is_empty() {
            self.warn("footnote end without start");
            return;
        }
        let lines = self.end_diversion();
        if lines.iter().all(|l| l.trim().is_empty()) {
            return;
        }
        let body = lines.join("\n");
        let body = if body.starts_with("<para") {
            body
        } else {
            format!("<para>{body}</para>")
        };
        self.push_close(&format!("<footnote>{body}</footnote>"));
    }

    // Entities and inclusions

    /// Note a named entity used in the output.
    pub fn record_entity(&mut self, name: &str) {
        if !PREDEFINED_ENTITIES.contains(&name) {
            self.entities.insert(name.to_owned());
        }
    }

    pub fn entities(&self) -> &BTreeSet<String> {
        &self.entities
    }

    /// Reference `file` as an external inclusion and return the markup.
    pub fn add_inclusion(&mut self, file: &str) -> String {
        let stem = file.rsplit('/').next().unwrap_or(file);
        let stem = stem.rsplit_once('.').map_or(stem, |(s, _)| s);
        let href = format!("{stem}.xml");
        let entity = slugify(stem);
        let markup = if self.is_docbook5() {
            format!("<xi:include href='{}'/>", escape_attr(&href))
        } else {
            format!("&{entity};")
        };
        if !self.inclusions.iter().any(|i| i.entity == entity) {
            self.inclusions.push(Inclusion { entity, href });
        }
        markup
    }

    pub fn inclusions(&self) -> &[Inclusion] {
        &self.inclusions
    }

    /// Close everything still open and return the body lines.
    pub fn finish(&mut self) -> Vec<String> {
        while !self.diversions.is_empty() {
            let lines = self.end_diversion();
            for line in lines {
                self.emit_raw(line);
            }
        }
        self.flush_trap();
        self.end_all_displays();
        self.end_all_lists();
        self.close_para();
        self.end_sections();
        std::mem::take(&mut self.output)
    }

    /// Number of lines in the current output buffer.
    pub fn output_len(&self) -> usize {
        self.sink_len()
    }

    /// Output lines produced since `start` in the current buffer.
    pub fn output_since(&self, start: usize) -> &[String] {
        let lines = self
            .diversions
            .last()
            .map_or(self.output.as_slice(), |d| d.lines.as_slice());
        &lines[start.min(lines.len())..]
    }
}

/// Drop `\s` and `\v`, turn `\h` into a space.
pub(crate) fn strip_motions(line: &str) -> String {
    if !line.contains("\\s") && !line.contains("\\v") && !line.contains("\\h") {
        return line.to_owned();
    }
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            's' => i = skip_size(&chars, i + 2),
            'v' | 'h' => {
                if chars[i + 1] == 'h' {
                    out.push(' ');
                }
                i = skip_delimited(&chars, i + 2);
            }
            other => {
                out.push('\\');
                out.push(other);
                i += 2;
            }
        }
    }
    out
}

/// Skip the argument of `\s`: `N`, `±N`, `(NN`, `±(NN`, `[N]` or `'N'`.
fn skip_size(chars: &[char], mut i: usize) -> usize {
    if matches!(chars.get(i), Some('+' | '-')) {
        i += 1;
    }
    match chars.get(i) {
        Some('(') => (i + 3).min(chars.len()),
        Some('[' | '\'') => {
            let close = if chars[i] == '[' { ']' } else { '\'' };
            let mut j = i + 1;
            while j < chars.len() && chars[j] != close {
                j += 1;
            }
            (j + 1).min(chars.len())
        }
        Some(c) if c.is_ascii_digit() => {
            let mut j = i + 1;
            if *c != '0' && chars.get(j).is_some_and(char::is_ascii_digit) && *c < '4' {
                j += 1;
            }
            j
        }
        _ => i,
    }
}

fn skip_delimited(chars: &[char], i: usize) -> usize {
    let Some(&delim) = chars.get(i) else {
        return i;
    };
    let mut j = i + 1;
    while j < chars.len() && chars[j] != delim {
        j += 1;
    }
    (j + 1).min(chars.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    static REF: Descriptor = Descriptor {
        toptag: "refentry",
        exclusive: true,
        scoped: &["RS"],
        ..Descriptor::empty("test")
    };

    fn doc() -> Document {
        let mut doc = Document::new("t.1", LiftSettings::default(), SemanticHints::new());
        doc.active.push(&REF);
        doc
    }

    fn body(doc: &mut Document) -> String {
        doc.finish().join("\n")
    }

    #[test]
    fn test_paragraphs_open_lazily_and_close_on_break() {
        let mut doc = doc();
        doc.text_line("one");
        doc.text_line("two");
        doc.text_line("");
        doc.text_line("three");
        assert_eq!(body(&mut doc), "<para>one\ntwo</para>\n<para>three</para>");
    }

    #[test]
    fn test_variable_list_with_trapped_term() {
        let mut doc = doc();
        doc.begin_list("TP", ListKind::Variable);
        doc.begin_item(None);
        doc.text_line("-v");
        doc.text_line("Be verbose.");
        doc.begin_item(Some("-q"));
        doc.end_list();
        assert_eq!(
            body(&mut doc),
            "<variablelist remap='TP'>\n<varlistentry>\n<term>-v</term><listitem>\n\
             <para>Be verbose.</para>\n</listitem></varlistentry>\n\
             <varlistentry><term>-q</term>\n<listitem><para/>\n</listitem></varlistentry>\n\
             </variablelist>"
        );
    }

    #[test]
    fn test_list_break_stops_at_scoped_frame() {
        let mut doc = doc();
        doc.begin_list("RS", ListKind::Blockquote);
        doc.begin_list("IP", ListKind::Itemized);
        doc.begin_item(None);
        doc.text_line("x");
        doc.list_break("PP");
        assert_eq!(doc.list_depth(), 1);
        assert!(doc.end_list_by("RS"));
        assert_eq!(doc.list_depth(), 0);
    }

    #[test]
    fn test_empty_list_is_removed() {
        let mut doc = doc();
        doc.text_line("a");
        doc.begin_list("BL", ListKind::Itemized);
        doc.end_list();
        assert_eq!(body(&mut doc), "<para>a</para>");
    }

    #[test]
    fn test_display_joins_first_line_and_restores_fill() {
        let mut doc = doc();
        doc.begin_display(DisplayKind::Literal, "EX");
        doc.text_line("a\tb");
        doc.text_line("");
        doc.text_line("c");
        assert!(doc.end_display());
        assert!(doc.fill());
        assert_eq!(
            body(&mut doc),
            "<literallayout remap='EX'>a       b\n\nc</literallayout>"
        );
    }

    #[test]
    fn test_sections_nest_and_empty_top_level_is_deleted() {
        let mut doc = doc();
        doc.push_section(1, "EMPTY");
        doc.push_section(1, "DESCRIPTION");
        doc.text_line("text");
        doc.push_section(2, "Detail");
        doc.push_section(1, "NOTES");
        doc.text_line("more");
        assert_eq!(
            body(&mut doc),
            "<refsect1 id='description'><title>DESCRIPTION</title>\n<para>text</para>\n\
             <refsect2 id='detail'><title>Detail</title><para/>\n</refsect2>\n</refsect1>\n\
             <refsect1 id='notes'><title>NOTES</title>\n<para>more</para>\n</refsect1>"
        );
        assert_eq!(doc.diag.entries().len(), 1);
    }

    #[test]
    fn test_footnote_is_attached_inline() {
        let mut doc = doc();
        doc.text_line("claim");
        doc.begin_footnote();
        doc.text_line("source");
        doc.end_footnote();
        doc.text_line("after");
        assert_eq!(
            body(&mut doc),
            "<para>claim<footnote><para>source</para></footnote>\nafter</para>"
        );
    }

    #[test]
    fn test_translations_skip_markup() {
        let mut doc = doc();
        doc.set_translation('a', "o".to_owned());
        doc.text_line(r"\fBbar\fR &amp; a");
        assert_eq!(
            body(&mut doc),
            "<para><emphasis role='strong' remap='B'>bor</emphasis> &amp; o</para>"
        );
    }

    #[test]
    fn test_motion_escapes() {
        assert_eq!(strip_motions(r"a\s-2b\s0c\h'1i'd\v'-1'e"), "abc de");
        assert_eq!(strip_motions(r"\s(12x\s[+3]y"), "xy");
    }

    #[test]
    fn test_inclusion_reference_forms() {
        let mut doc = doc();
        assert_eq!(doc.add_inclusion("sub/common.man"), "&common;");
        let mut v5 = Document::new(
            "t",
            LiftSettings::default().with_docbook(DocBookVersion::V5),
            SemanticHints::new(),
        );
        assert_eq!(v5.add_inclusion("common.man"), "<xi:include href='common.xml'/>");
        assert_eq!(doc.inclusions()[0].href, "common.xml");
    }
}
