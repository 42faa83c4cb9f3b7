//! External equation and diagram converters for rofflift.
//!
//! Each [`CommandConverter`] owns one [`BlockKind`] and pipes the block,
//! re-wrapped in its `.EQ`/`.EN` or `.PS`/`.PE` delimiters, through an
//! external program such as `eqn -TMathML` or `pic2plot -Tsvg`. The program's
//! stdout must contain the expected root element (`<math>` or `<svg>`);
//! anything else is reported as [`ConvertResult::Failed`] so the engine keeps
//! the block as literal text.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use rofflift_core::{BlockConverter, BlockKind, ConvertResult};

static MATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<math\b.*</math>").unwrap());
static SVG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<svg\b.*</svg>").unwrap());
static XML_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\?xml[^>]*\?>\s*").unwrap());

/// Failure to run a converter.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("I/O error talking to converter: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited with {}", .code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}")))]
    Status { program: String, code: Option<i32> },

    #[error("{program} produced no <{root}> markup")]
    MissingMarkup { program: String, root: &'static str },
}

/// Runs one kind of embedded block through an external program.
#[derive(Debug)]
pub struct CommandConverter {
    kind: BlockKind,
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    /// Build a converter from a whitespace-separated command line.
    ///
    /// Returns `None` for an empty command line, which disables the kind.
    pub fn new(kind: BlockKind, command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace().map(str::to_owned);
        let program = words.next()?;
        Some(Self {
            kind,
            program,
            args: words.collect(),
        })
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    fn root(&self) -> (&'static str, &'static Regex) {
        match self.kind {
            BlockKind::Equation => ("math", &MATH),
            BlockKind::Diagram => ("svg", &SVG),
        }
    }

    /// Convert `source`, returning the extracted markup.
    pub fn run(&self, source: &str) -> Result<String, FilterError> {
        let input = format!(
            ".{}\n{}\n.{}\n",
            self.kind.opener(),
            source.trim_end_matches('\n'),
            self.kind.closer()
        );
        tracing::debug!(program = %self.program, bytes = input.len(), "running converter");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FilterError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin from a thread so a chatty child cannot fill its stdout
        // pipe while we are still writing.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(input.as_bytes()))
        });
        let output = child.wait_with_output()?;
        let written = match writer.map(std::thread::JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(std::io::Error::other("converter input thread panicked")),
            None => Ok(()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                tracing::debug!(program = %self.program, stderr = %stderr.trim(), "converter failed");
            }
            return Err(FilterError::Status {
                program: self.program.clone(),
                code: output.status.code(),
            });
        }

        // A converter may legitimately stop reading early.
        if let Err(err) = written
            && err.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(err.into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (root, pattern) = self.root();
        let markup = pattern.find(&stdout).ok_or_else(|| FilterError::MissingMarkup {
            program: self.program.clone(),
            root,
        })?;
        Ok(XML_DECL.replace_all(markup.as_str(), "").into_owned())
    }
}

impl BlockConverter for CommandConverter {
    fn convert(&mut self, kind: BlockKind, source: &str) -> ConvertResult {
        if kind != self.kind {
            return ConvertResult::PassThrough;
        }
        match self.run(source) {
            Ok(markup) => ConvertResult::Markup(markup),
            Err(err) => {
                tracing::debug!(error = %err, "block converter failed");
                ConvertResult::Failed(err.to_string())
            }
        }
    }
}

/// Converters for the configured command lines, skipping disabled ones.
pub fn converters(eqn: Option<&str>, pic: Option<&str>) -> Vec<Box<dyn BlockConverter>> {
    [(BlockKind::Equation, eqn), (BlockKind::Diagram, pic)]
        .into_iter()
        .filter_map(|(kind, line)| CommandConverter::new(kind, line?))
        .map(|c| Box::new(c) as Box<dyn BlockConverter>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_command_disables() {
        assert!(CommandConverter::new(BlockKind::Equation, "   ").is_none());
        assert_eq!(converters(Some(""), None).len(), 0);
        assert_eq!(converters(Some("eqn -TMathML"), Some("pic2plot -Tsvg")).len(), 2);
    }

    #[test]
    fn test_other_kinds_pass_through() {
        let mut converter = CommandConverter::new(BlockKind::Equation, "cat").unwrap();
        assert_eq!(
            converter.convert(BlockKind::Diagram, "box"),
            ConvertResult::PassThrough
        );
    }

    #[test]
    fn test_missing_program_fails() {
        let mut converter =
            CommandConverter::new(BlockKind::Diagram, "rofflift-no-such-program -Tsvg").unwrap();
        let ConvertResult::Failed(reason) = converter.convert(BlockKind::Diagram, "box") else {
            panic!("expected failure");
        };
        assert!(reason.contains("rofflift-no-such-program"));
    }

    #[cfg(unix)]
    #[test]
    fn test_markup_is_extracted() {
        let converter = CommandConverter::new(BlockKind::Equation, "cat").unwrap();
        let markup = converter
            .run("<?xml version=\"1.0\"?>\n<math><mi>x</mi></math>")
            .unwrap();
        assert_eq!(markup, "<math><mi>x</mi></math>");
    }

    #[cfg(unix)]
    #[test]
    fn test_output_without_markup_fails() {
        let converter = CommandConverter::new(BlockKind::Equation, "cat").unwrap();
        let err = converter.run("x sup 2").unwrap_err();
        assert!(matches!(err, FilterError::MissingMarkup { root: "math", .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_bad_status_fails() {
        let converter = CommandConverter::new(BlockKind::Diagram, "false").unwrap();
        let err = converter.run("box").unwrap_err();
        assert!(matches!(err, FilterError::Status { code: Some(1), .. }));
    }
}
