//! Where translated documents go, and writing them without leaving partial
//! files behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Output path for `input`: `<stem>.xml` next to it, or in `output_dir`.
pub(crate) fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "stdin".into(), |s| s.to_string_lossy());
    let name = format!("{stem}.xml");
    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Write `contents` to `path` through a temporary file in the same directory,
/// renamed into place once complete.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), CliError> {
    let write_err = |source| CliError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
