//! Analysis error types.
//!
//! Everything that can go wrong inside the analysis core is represented as a
//! value of [`AnalysisError`] and bubbles up through `Result` to the
//! per-translation-unit boundary. There are deliberately no panics on these
//! paths: a broken invariant abandons the current unit, not the process.

use std::fmt;

use thiserror::Error;

/// A source position attached to an internal error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    /// Index into the token list's file table.
    pub file_index: u32,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An analysis failure.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// An internal invariant was violated: pattern-matcher misuse, an AST
    /// cycle, a broken bracket pair. The current translation unit is
    /// abandoned.
    #[error("internal error at {location}: {what}")]
    Internal {
        /// Position of the offending token, when one is known.
        location: ErrorLocation,
        /// Description of the violated invariant.
        what: String,
    },

    /// The token stream handed to the analysis was not well formed, e.g. an
    /// unmatched bracket produced by the tokenizer.
    #[error("malformed input at {location}: {what}")]
    MalformedInput {
        /// Position of the offending token.
        location: ErrorLocation,
        /// Description of the defect.
        what: String,
    },
}

impl AnalysisError {
    /// Internal error without a known source position.
    pub fn internal(what: impl Into<String>) -> Self {
        AnalysisError::Internal {
            location: ErrorLocation::default(),
            what: what.into(),
        }
    }

    /// Internal error anchored at a source position.
    pub fn internal_at(location: ErrorLocation, what: impl Into<String>) -> Self {
        AnalysisError::Internal {
            location,
            what: what.into(),
        }
    }

    /// Malformed-input error anchored at a source position.
    pub fn malformed(location: ErrorLocation, what: impl Into<String>) -> Self {
        AnalysisError::MalformedInput {
            location,
            what: what.into(),
        }
    }
}

/// The result type used throughout the analysis core.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let err = AnalysisError::internal_at(
            ErrorLocation {
                file_index: 0,
                line: 12,
                column: 7,
            },
            "AST cyclic dependency",
        );
        assert_eq!(
            err.to_string(),
            "internal error at 12:7: AST cyclic dependency"
        );
    }
}
