//! Fatal per-file errors.

/// A condition that makes translating the current file pointless.
///
/// Recoverable problems are reported through
/// [`Diagnostics`](crate::Diagnostics) instead and never surface here, except
/// for the final tally carried by [`LiftError::TranslationErrors`].
#[derive(Debug, thiserror::Error)]
pub enum LiftError {
    #[error("input is empty")]
    EmptyInput,

    #[error("no troff macro package triggers found")]
    NoDialect,

    #[error("file only includes {target}; translate that file instead")]
    InclusionOnly { target: String },

    #[error("output could not be decoded as any of: {}", .tried.join(", "))]
    Decode { tried: Vec<String> },

    #[error("aborted by .ab request: {message}")]
    Aborted { message: String },

    /// Best-effort output was produced but hard errors were counted.
    #[error("{count} translation error(s)")]
    TranslationErrors { count: usize, xml: String },
}

impl LiftError {
    /// Process exit status for this failure.
    ///
    /// 1 means the file has a structural defect and was skipped, 2 that it is
    /// a pure inclusion file, 3 that output was written despite errors.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InclusionOnly { .. } => 2,
            Self::TranslationErrors { .. } => 3,
            _ => 1,
        }
    }

    /// The best-effort document, when one was produced.
    #[must_use]
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Self::TranslationErrors { xml, .. } => Some(xml),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(LiftError::NoDialect.exit_code(), 1);
        assert_eq!(
            LiftError::InclusionOnly {
                target: "man1/foo.1".to_owned()
            }
            .exit_code(),
            2
        );
        let err = LiftError::TranslationErrors {
            count: 2,
            xml: "<refentry/>".to_owned(),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.partial_output(), Some("<refentry/>"));
        assert_eq!(err.to_string(), "2 translation error(s)");
    }
}
