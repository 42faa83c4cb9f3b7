//! `${VAR}` and `${VAR:-default}` expansion in configuration strings.
//!
//! Only the braced form is expanded; a bare `$` is left alone so that troff
//! escapes and shell fragments in filter command lines survive.

use crate::ConfigError;

/// Expand environment variable references in `value`.
///
/// `field` names the configuration key for error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(LookupError {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

/// Expand every entry of a list, numbering the field by index.
pub(crate) fn expand_all(values: &mut [String], field: &str) -> Result<(), ConfigError> {
    for (i, value) in values.iter_mut().enumerate() {
        *value = expand_env(value, &format!("{field}[{i}]"))?;
    }
    Ok(())
}

struct LookupError {
    var_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_simple_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("ROFFLIFT_TEST_MANDIR", "/usr/share/man");
        }
        let result = expand_env("${ROFFLIFT_TEST_MANDIR}/man1", "input.include_dirs").unwrap();
        assert_eq!(result, "/usr/share/man/man1");
        unsafe {
            std::env::remove_var("ROFFLIFT_TEST_MANDIR");
        }
    }

    #[test]
    fn test_expand_with_default_uses_default() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("ROFFLIFT_TEST_UNSET");
        }
        let result = expand_env("${ROFFLIFT_TEST_UNSET:-eqn -TMathML}", "filters.eqn").unwrap();
        assert_eq!(result, "eqn -TMathML");
    }

    #[test]
    fn test_expand_missing_var_error() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("ROFFLIFT_TEST_MISSING");
        }
        let err = expand_env("${ROFFLIFT_TEST_MISSING}", "hints.file").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("ROFFLIFT_TEST_MISSING"));
        assert!(err.to_string().contains("hints.file"));
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        let result = expand_env("sed 's/x$//'", "filters.pic").unwrap();
        assert_eq!(result, "sed 's/x$//'");
    }

    #[test]
    fn test_expand_all_names_the_index() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("ROFFLIFT_TEST_LIST");
        }
        let mut values = vec!["man".to_owned(), "${ROFFLIFT_TEST_LIST}".to_owned()];
        let err = expand_all(&mut values, "input.macro_dirs").unwrap_err();
        assert!(err.to_string().contains("input.macro_dirs[1]"));
    }
}
