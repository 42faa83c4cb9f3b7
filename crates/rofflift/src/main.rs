//! rofflift CLI - troff to DocBook translator.
//!
//! Translates manual pages and papers written with the man, mdoc, ms, me or
//! mm macro packages into DocBook XML. Each source file `name.N` becomes
//! `name.xml`; with no files, stdin is translated to stdout.
//!
//! Exit status: 0 on success, 1 when a file could not be translated, 2 when
//! a file only includes another page, 3 when output was written despite
//! translation errors. In batch mode the highest status wins.

mod error;
mod lift;
mod output;
mod target;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lift::LiftArgs;
use output::Output;

/// rofflift - lift troff sources to DocBook XML.
#[derive(Parser)]
#[command(name = "rofflift", version, about)]
struct Cli {
    #[command(flatten)]
    args: LiftArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new();

    // -v enables INFO, -vv DEBUG, otherwise use RUST_LOG. Diagnostics are
    // printed by Output, not logged.
    let filter = match cli.args.verbose {
        0 => EnvFilter::from_default_env(),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.args.execute() {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            output.error(&format!("Error: {err}"));
            ExitCode::FAILURE
        }
    }
}
