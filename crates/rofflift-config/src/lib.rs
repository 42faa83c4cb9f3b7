//! Configuration management for rofflift.
//!
//! Parses `rofflift.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`]. The
//! translation engine itself never sees this crate: [`Config::lift_settings`]
//! produces the plain [`LiftSettings`] value it consumes.
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `input.include_dirs`
//! - `input.macro_dirs`
//! - `filters.eqn`
//! - `filters.pic`
//! - `hints.file`

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rofflift_core::{DocBookVersion, LiftSettings};
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// Scalar fields override only when set; list fields are appended to the
/// configured lists.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Emit DocBook 5 instead of DocBook 4.5.
    pub docbook5: Option<bool>,
    /// Pass troff comments through.
    pub comments: Option<bool>,
    /// Report non-portable requests.
    pub portability: Option<bool>,
    /// Suppress warnings.
    pub quiet: Option<bool>,
    /// Extra `.so` search directories (`-I`).
    pub include_dirs: Vec<PathBuf>,
    /// Predefined strings (`-D name=value`).
    pub defines: Vec<(String, String)>,
    /// Extra ignored macros (`-i`).
    pub ignore_macros: Vec<String>,
    /// Override the hints file.
    pub hints_file: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "rofflift.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output configuration.
    pub output: OutputConfig,
    /// Input configuration (paths are relative strings from TOML).
    input: InputConfigRaw,
    /// Diagnostic reporting.
    pub diagnostics: DiagnosticsConfig,
    /// External converter command lines.
    pub filters: FiltersConfig,
    /// Semantic hints persistence.
    hints: HintsConfigRaw,
    /// troff defaults applied to every file.
    pub troff: TroffConfig,

    /// Resolved input configuration (set after loading).
    #[serde(skip)]
    pub input_resolved: InputConfig,
    /// Resolved hints file (set after loading).
    #[serde(skip)]
    pub hints_file: Option<PathBuf>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Output configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// DocBook major version, 4 or 5.
    pub docbook: u8,
    /// Pass troff comments through as XML comments.
    pub comments: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            docbook: 4,
            comments: false,
        }
    }
}

/// Raw input configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct InputConfigRaw {
    encodings: Option<Vec<String>>,
    include_dirs: Option<Vec<String>>,
    macro_dirs: Option<Vec<String>>,
}

/// Resolved input configuration with absolute paths.
#[derive(Debug)]
pub struct InputConfig {
    /// Candidate output encodings, tried in order.
    pub encodings: Vec<String>,
    /// Search path for `.so`.
    pub include_dirs: Vec<PathBuf>,
    /// Search path for `.mso`.
    pub macro_dirs: Vec<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        let defaults = LiftSettings::default();
        Self {
            encodings: defaults.encodings,
            include_dirs: defaults.include_dirs,
            macro_dirs: defaults.macro_dirs,
        }
    }
}

/// Diagnostic reporting configuration.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Report use of non-portable requests.
    pub portability: bool,
    /// Suppress warnings; errors are still printed.
    pub quiet: bool,
}

/// External converter command lines. An empty string disables a converter.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Equation converter, fed `.EQ` blocks on stdin.
    pub eqn: String,
    /// Diagram converter, fed `.PS` blocks on stdin.
    pub pic: String,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            eqn: "eqn -TMathML".to_owned(),
            pic: "pic2plot -Tsvg".to_owned(),
        }
    }
}

impl FiltersConfig {
    /// The equation command, unless disabled.
    #[must_use]
    pub fn eqn_command(&self) -> Option<&str> {
        Some(self.eqn.trim()).filter(|c| !c.is_empty())
    }

    /// The diagram command, unless disabled.
    #[must_use]
    pub fn pic_command(&self) -> Option<&str> {
        Some(self.pic.trim()).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct HintsConfigRaw {
    file: Option<String>,
}

/// troff defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct TroffConfig {
    /// Strings predefined before interpretation.
    pub defines: BTreeMap<String, String>,
    /// Macros dropped silently wherever they appear.
    pub ignore: Vec<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`filters.eqn`").
        field: String,
        /// Error message (e.g., "${`EQN`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `rofflift.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(docbook5) = settings.docbook5 {
            self.output.docbook = if docbook5 { 5 } else { 4 };
        }
        if let Some(comments) = settings.comments {
            self.output.comments = comments;
        }
        if let Some(portability) = settings.portability {
            self.diagnostics.portability = portability;
        }
        if let Some(quiet) = settings.quiet {
            self.diagnostics.quiet = quiet;
        }
        self.input_resolved
            .include_dirs
            .extend(settings.include_dirs.iter().cloned());
        for (name, value) in &settings.defines {
            self.troff.defines.insert(name.clone(), value.clone());
        }
        self.troff
            .ignore
            .extend(settings.ignore_macros.iter().cloned());
        if let Some(hints_file) = &settings.hints_file {
            self.hints_file = Some(hints_file.clone());
        }
    }

    /// The engine settings this configuration describes.
    #[must_use]
    pub fn lift_settings(&self) -> LiftSettings {
        let docbook = if self.output.docbook == 5 {
            DocBookVersion::V5
        } else {
            DocBookVersion::V4
        };
        LiftSettings {
            docbook,
            comments: self.output.comments,
            portability_warnings: self.diagnostics.portability,
            include_dirs: self.input_resolved.include_dirs.clone(),
            macro_dirs: self.input_resolved.macro_dirs.clone(),
            encodings: self.input_resolved.encodings.clone(),
            defines: self
                .troff
                .defines
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ignore_macros: self.troff.ignore.clone(),
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            output: OutputConfig::default(),
            input: InputConfigRaw::default(),
            diagnostics: DiagnosticsConfig::default(),
            filters: FiltersConfig::default(),
            hints: HintsConfigRaw::default(),
            troff: TroffConfig::default(),
            input_resolved: InputConfig {
                include_dirs: vec![base.to_path_buf()],
                ..InputConfig::default()
            },
            hints_file: None,
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.output.docbook, 4 | 5) {
            return Err(ConfigError::Validation(format!(
                "output.docbook must be 4 or 5, not {}",
                self.output.docbook
            )));
        }
        if self.input_resolved.encodings.is_empty() {
            return Err(ConfigError::Validation(
                "input.encodings cannot be empty".to_owned(),
            ));
        }
        for name in self.troff.defines.keys() {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(ConfigError::Validation(format!(
                    "troff.defines has an invalid string name {name:?}"
                )));
            }
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(dirs) = self.input.include_dirs.as_mut() {
            expand::expand_all(dirs, "input.include_dirs")?;
        }
        if let Some(dirs) = self.input.macro_dirs.as_mut() {
            expand::expand_all(dirs, "input.macro_dirs")?;
        }
        self.filters.eqn = expand::expand_env(&self.filters.eqn, "filters.eqn")?;
        self.filters.pic = expand::expand_env(&self.filters.pic, "filters.pic")?;
        if let Some(ref file) = self.hints.file {
            self.hints.file = Some(expand::expand_env(file, "hints.file")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve_all = |dirs: Option<&Vec<String>>| -> Option<Vec<PathBuf>> {
            dirs.map(|dirs| dirs.iter().map(|d| config_dir.join(d)).collect())
        };
        let defaults = InputConfig::default();

        self.input_resolved = InputConfig {
            encodings: self
                .input
                .encodings
                .clone()
                .unwrap_or(defaults.encodings),
            include_dirs: resolve_all(self.input.include_dirs.as_ref())
                .unwrap_or_else(|| vec![PathBuf::from(".")]),
            macro_dirs: resolve_all(self.input.macro_dirs.as_ref()).unwrap_or_default(),
        };
        self.hints_file = self.hints.file.as_deref().map(|f| config_dir.join(f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.output.docbook, 4);
        assert!(!config.output.comments);
        assert_eq!(config.input_resolved.include_dirs, vec![PathBuf::from("/test")]);
        assert_eq!(config.input_resolved.encodings, vec!["utf-8", "iso-8859-1"]);
        assert_eq!(config.filters.eqn_command(), Some("eqn -TMathML"));
        assert!(config.hints_file.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.output.docbook, 4);
        assert!(config.troff.defines.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[output]
docbook = 5
comments = true

[input]
encodings = ["utf-8"]
include_dirs = ["man", "shared"]
macro_dirs = ["tmac"]

[diagnostics]
portability = true
quiet = true

[filters]
eqn = ""
pic = "pic2svg"

[hints]
file = "hints.txt"

[troff]
ignore = ["Pp", "XX"]

[troff.defines]
Pn = "rofflift"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.output.docbook, 5);
        assert!(config.output.comments);
        assert!(config.diagnostics.portability);
        assert!(config.diagnostics.quiet);
        assert_eq!(config.filters.eqn_command(), None);
        assert_eq!(config.filters.pic_command(), Some("pic2svg"));
        assert_eq!(
            config.input_resolved.include_dirs,
            vec![PathBuf::from("/project/man"), PathBuf::from("/project/shared")]
        );
        assert_eq!(
            config.input_resolved.macro_dirs,
            vec![PathBuf::from("/project/tmac")]
        );
        assert_eq!(config.input_resolved.encodings, vec!["utf-8"]);
        assert_eq!(config.hints_file, Some(PathBuf::from("/project/hints.txt")));
        assert_eq!(config.troff.ignore, vec!["Pp", "XX"]);
        assert_eq!(config.troff.defines.get("Pn").map(String::as_str), Some("rofflift"));
    }

    #[test]
    fn test_lift_settings() {
        let toml = r#"
[output]
docbook = 5

[troff]
ignore = ["XX"]

[troff.defines]
Pn = "rofflift"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));
        let settings = config.lift_settings();

        assert_eq!(settings.docbook, DocBookVersion::V5);
        assert_eq!(settings.defines, vec![("Pn".to_owned(), "rofflift".to_owned())]);
        assert_eq!(settings.ignore_macros, vec!["XX"]);
        assert_eq!(settings.include_dirs, vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            docbook5: Some(true),
            quiet: Some(true),
            include_dirs: vec![PathBuf::from("/extra")],
            defines: vec![("Pn".to_owned(), "x".to_owned())],
            ignore_macros: vec!["XX".to_owned()],
            hints_file: Some(PathBuf::from("/tmp/hints")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.output.docbook, 5);
        assert!(config.diagnostics.quiet);
        assert!(!config.diagnostics.portability); // Unchanged
        assert_eq!(
            config.input_resolved.include_dirs,
            vec![PathBuf::from("/test"), PathBuf::from("/extra")]
        );
        assert_eq!(config.troff.defines.get("Pn").map(String::as_str), Some("x"));
        assert_eq!(config.troff.ignore, vec!["XX"]);
        assert_eq!(config.hints_file, Some(PathBuf::from("/tmp/hints")));
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings::default());
        assert_eq!(config.output.docbook, 4);
        assert_eq!(config.input_resolved.include_dirs, vec![PathBuf::from("/test")]);
    }

    #[test]
    fn test_expand_env_vars_filters() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("ROFFLIFT_TEST_EQN", "/opt/bin/eqn");
        }

        let toml = r#"
[filters]
eqn = "${ROFFLIFT_TEST_EQN} -TMathML"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(config.filters.eqn, "/opt/bin/eqn -TMathML");

        unsafe {
            std::env::remove_var("ROFFLIFT_TEST_EQN");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("ROFFLIFT_MISSING_HINTS");
        }

        let toml = r#"
[hints]
file = "${ROFFLIFT_MISSING_HINTS}/hints"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("ROFFLIFT_MISSING_HINTS"));
        assert!(err.to_string().contains("hints.file"));
    }

    #[test]
    fn test_validate_docbook_version() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.output.docbook = 3;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("output.docbook"));
    }

    #[test]
    fn test_validate_empty_encodings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.input_resolved.encodings.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("input.encodings"));
    }

    #[test]
    fn test_validate_define_names() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.troff.defines.insert("a b".to_owned(), "x".to_owned());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[output]\ndocbook = 5\n[input]\ninclude_dirs = [\"inc\"]\n")
            .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.output.docbook, 5);
        assert_eq!(config.config_path, Some(path.clone()));
        assert_eq!(config.input_resolved.include_dirs, vec![dir.path().join("inc")]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rofflift.toml");
        std::fs::write(&path, "[output\n").unwrap();
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
