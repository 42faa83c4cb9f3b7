//! The translation driver: files or stdin in, DocBook out.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use rofflift_config::{CliSettings, Config};
use rofflift_core::{HintScope, LiftError, Lifter, SemanticHints};

use crate::error::CliError;
use crate::output::Output;
use crate::target::{output_path, write_atomic};

/// Arguments for a translation run.
#[derive(Args)]
pub(crate) struct LiftArgs {
    /// Source files; reads stdin and writes stdout when none are given.
    files: Vec<PathBuf>,

    /// Directory for the generated `.xml` files (default: next to each source).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Emit DocBook 5 instead of DocBook 4.5.
    #[arg(long)]
    docbook5: bool,

    /// Predefine a troff string.
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE", value_parser = parse_define)]
    defines: Vec<(String, String)>,

    /// Add a directory to the `.so` search path.
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Ignore a macro wherever it appears.
    #[arg(short = 'i', long = "ignore", value_name = "MACRO")]
    ignore_macros: Vec<String>,

    /// Read semantic hints from FILE before the run and write them back after.
    #[arg(long, value_name = "FILE")]
    hints: Option<PathBuf>,

    /// Pass troff comments through as XML comments.
    #[arg(long)]
    comments: bool,

    /// Warn about non-portable troff requests.
    #[arg(short = 'w', long)]
    portability: bool,

    /// Suppress warnings.
    #[arg(short, long)]
    quiet: bool,

    /// Log more (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,

    /// Path to configuration file (default: auto-discover rofflift.toml).
    #[arg(short, long, env = "ROFFLIFT_CONFIG")]
    config: Option<PathBuf>,
}

/// Parse a `name=value` string definition.
fn parse_define(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    if name.is_empty() {
        return Err("string name cannot be empty".to_owned());
    }
    Ok((name.to_owned(), value.to_owned()))
}

impl LiftArgs {
    /// Run the translation and return the process exit status.
    pub(crate) fn execute(self) -> Result<u8, CliError> {
        let cli_settings = CliSettings {
            docbook5: self.docbook5.then_some(true),
            comments: self.comments.then_some(true),
            portability: self.portability.then_some(true),
            quiet: self.quiet.then_some(true),
            include_dirs: self.include_dirs,
            defines: self.defines,
            ignore_macros: self.ignore_macros,
            hints_file: self.hints,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let output = Output::new().quiet(config.diagnostics.quiet);

        if let Some(dir) = &self.output_dir
            && !dir.is_dir()
        {
            return Err(CliError::Validation(format!(
                "output directory {} does not exist",
                dir.display()
            )));
        }

        let hints = match &config.hints_file {
            Some(path) => read_hints(path)?,
            None => SemanticHints::new(),
        };
        let mut lifter = Lifter::new(config.lift_settings()).with_hints(hints);
        for converter in rofflift_filters::converters(
            config.filters.eqn_command(),
            config.filters.pic_command(),
        ) {
            lifter = lifter.with_converter(converter);
        }

        let status = if self.files.is_empty() {
            lift_stdin(&mut lifter, &output)?
        } else {
            let mut batch = Batch {
                lifter: &mut lifter,
                output: &output,
                output_dir: self.output_dir.as_deref(),
            };
            batch.run(&self.files)
        };

        if let Some(path) = &config.hints_file {
            write_atomic(path, &lifter.hints().dump())?;
            tracing::info!(
                path = %path.display(),
                hints = lifter.hints().global_len(),
                "wrote hints"
            );
        }

        Ok(status)
    }
}

fn read_hints(path: &Path) -> Result<SemanticHints, CliError> {
    let mut hints = SemanticHints::new();
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let count = hints.read(&text, HintScope::Global);
            tracing::info!(path = %path.display(), count, "read hints");
        }
        // The first run creates the file.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    Ok(hints)
}

/// Filter mode: stdin to stdout.
fn lift_stdin(lifter: &mut Lifter, output: &Output) -> Result<u8, CliError> {
    let mut bytes = Vec::new();
    std::io::stdin().lock().read_to_end(&mut bytes)?;
    let result = lifter.translate("stdin", &bytes);
    report(lifter, output);

    let (xml, status) = match &result {
        Ok(lifted) => (Some(lifted.xml.as_str()), 0),
        Err(err) => {
            output.error(&format!("rofflift: stdin: {err}"));
            (err.partial_output(), exit_status(err))
        }
    };
    if let Some(xml) = xml {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(xml.as_bytes())?;
        stdout.flush()?;
    }
    Ok(status)
}

/// Batch mode: each file to its own `.xml` file.
struct Batch<'a> {
    lifter: &'a mut Lifter,
    output: &'a Output,
    output_dir: Option<&'a Path>,
}

impl Batch<'_> {
    /// Translate every file, continuing past failures. The status is the
    /// highest per-file status seen.
    fn run(&mut self, files: &[PathBuf]) -> u8 {
        let mut status = 0;
        let mut written = 0usize;
        for file in files {
            let file_status = self.lift_file(file);
            if file_status == 0 {
                written += 1;
            }
            status = status.max(file_status);
        }
        if files.len() > 1 {
            self.output
                .success(&format!("Translated {written} of {} files", files.len()));
        }
        status
    }

    fn lift_file(&mut self, file: &Path) -> u8 {
        let name = file.display().to_string();
        let bytes = match std::fs::read(file) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.output.error(&format!("rofflift: {name}: {err}"));
                return 1;
            }
        };

        let result = self.lifter.translate(&name, &bytes);
        report(self.lifter, self.output);
        let target = output_path(file, self.output_dir);

        let (xml, status) = match &result {
            Ok(lifted) => {
                tracing::info!(file = %name, dialects = ?lifted.dialects, "translated");
                (Some(lifted.xml.as_str()), 0)
            }
            Err(err) => {
                self.output.error(&format!("rofflift: {name}: {err}"));
                (err.partial_output(), exit_status(err))
            }
        };

        if let Some(xml) = xml {
            if let Err(err) = write_atomic(&target, xml) {
                self.output.error(&format!("rofflift: {err}"));
                return status.max(1);
            }
            self.output
                .info(&format!("{name} -> {}", target.display()));
        }
        status
    }
}

fn exit_status(err: &LiftError) -> u8 {
    u8::try_from(err.exit_code()).unwrap_or(1)
}

fn report(lifter: &Lifter, output: &Output) {
    for diagnostic in lifter.diagnostics() {
        output.diagnostic(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rofflift_core::LiftSettings;

    #[test]
    fn test_parse_define() {
        assert_eq!(
            parse_define("Pn=rofflift").unwrap(),
            ("Pn".to_owned(), "rofflift".to_owned())
        );
        assert_eq!(
            parse_define("Ev=a=b").unwrap(),
            ("Ev".to_owned(), "a=b".to_owned())
        );
        assert!(parse_define("novalue").is_err());
        assert!(parse_define("=x").is_err());
    }

    #[test]
    fn test_batch_writes_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.1");
        let empty = dir.path().join("empty.1");
        std::fs::write(&good, ".TH GOOD 1\n.SH NAME\ngood \\- works\n.SH DESCRIPTION\nText.\n").unwrap();
        std::fs::write(&empty, "").unwrap();

        let mut lifter = Lifter::new(LiftSettings::default());
        let output = Output::new().quiet(true);
        let mut batch = Batch {
            lifter: &mut lifter,
            output: &output,
            output_dir: None,
        };
        let status = batch.run(&[empty.clone(), good.clone()]);

        assert_eq!(status, 1);
        let xml = std::fs::read_to_string(dir.path().join("good.xml")).unwrap();
        assert!(xml.contains("<refname>good</refname>"));
        assert!(!dir.path().join("empty.xml").exists());
    }

    #[test]
    fn test_batch_inclusion_only_status() {
        let dir = tempfile::tempdir().unwrap();
        let shim = dir.path().join("shim.1");
        std::fs::write(&shim, ".so man1/real.1\n").unwrap();

        let mut lifter = Lifter::new(LiftSettings::default());
        let output = Output::new().quiet(true);
        let out_dir = tempfile::tempdir().unwrap();
        let mut batch = Batch {
            lifter: &mut lifter,
            output: &output,
            output_dir: Some(out_dir.path()),
        };

        assert_eq!(batch.run(&[shim]), 2);
        assert!(!out_dir.path().join("shim.xml").exists());
    }

    const WARNS_ONLY: &str =
        ".TH GOOD 1\n.SH NAME\ngood \\- works\n.SH DESCRIPTION\nText.\n.SH EMPTY\n";

    #[test]
    fn test_quiet_batch_prints_nothing_for_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("good.1");
        std::fs::write(&page, WARNS_ONLY).unwrap();

        let mut lifter = Lifter::new(LiftSettings::default());
        let output = Output::capturing().quiet(true);
        let mut batch = Batch {
            lifter: &mut lifter,
            output: &output,
            output_dir: None,
        };

        assert_eq!(batch.run(&[page]), 0);
        assert_eq!(output.lines(), Vec::<String>::new());
    }

    #[test]
    fn test_warning_is_printed_once() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("good.1");
        std::fs::write(&page, WARNS_ONLY).unwrap();

        let mut lifter = Lifter::new(LiftSettings::default());
        let output = Output::capturing();
        let mut batch = Batch {
            lifter: &mut lifter,
            output: &output,
            output_dir: None,
        };
        batch.run(&[page]);

        let warnings: Vec<String> = output
            .lines()
            .into_iter()
            .filter(|l| l.contains("empty section deleted"))
            .collect();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_read_hints_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let hints = read_hints(&dir.path().join("hints")).unwrap();
        assert_eq!(hints.global_len(), 0);
    }

    #[test]
    fn test_read_hints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hints");
        std::fs::write(&path, ".\\\" | mark frob as command\nnoise\n").unwrap();
        let hints = read_hints(&path).unwrap();
        assert_eq!(hints.get("frob"), Some("command"));
    }
}
