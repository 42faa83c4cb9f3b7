//! Per-run translation settings.

use std::path::PathBuf;

/// DocBook flavour of the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocBookVersion {
    /// SGML-heritage DocBook 4.5 XML with a DTD reference.
    #[default]
    V4,
    /// Namespaced DocBook 5.
    V5,
}

/// Settings that shape how every file in a run is translated.
///
/// This is the plain value the configuration layer produces; the engine never
/// reads configuration files itself.
#[derive(Debug, Clone)]
pub struct LiftSettings {
    pub docbook: DocBookVersion,
    /// Pass troff comments through as XML comments.
    pub comments: bool,
    /// Report use of non-portable requests.
    pub portability_warnings: bool,
    /// Search path for `.so`.
    pub include_dirs: Vec<PathBuf>,
    /// Search path for `.mso`.
    pub macro_dirs: Vec<PathBuf>,
    /// Candidate output encodings, tried in order.
    pub encodings: Vec<String>,
    /// Strings predefined before interpretation (`-D name=value`).
    pub defines: Vec<(String, String)>,
    /// Extra macros dropped silently wherever they appear.
    pub ignore_macros: Vec<String>,
}

impl Default for LiftSettings {
    fn default() -> Self {
        Self {
            docbook: DocBookVersion::V4,
            comments: false,
            portability_warnings: false,
            include_dirs: vec![PathBuf::from(".")],
            macro_dirs: Vec::new(),
            encodings: vec!["utf-8".to_owned(), "iso-8859-1".to_owned()],
            defines: Vec::new(),
            ignore_macros: Vec::new(),
        }
    }
}

impl LiftSettings {
    #[must_use]
    pub fn with_docbook(mut self, docbook: DocBookVersion) -> Self {
        self.docbook = docbook;
        self
    }

    #[must_use]
    pub fn with_comments(mut self, comments: bool) -> Self {
        self.comments = comments;
        self
    }

    #[must_use]
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    #[must_use]
    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }
}
