//! The single error kind of the pass.
//!
//! Every static-resolution failure surfaces as an `InvalidRequireCallError`
//! carrying a stable message and the offending node's source span. The
//! message forms are fixed so downstream snapshot tests can diff them.

use crate::location::{SourcePosition, SourceSpan};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRequireCallError {
    pub message: String,
    pub loc: SourceSpan,
}

impl InvalidRequireCallError {
    pub fn dynamic_interpolation(loc: SourceSpan) -> Self {
        Self {
            message: format!(
                "Invalid call at line {}: dynamic template interpolation cannot be resolved at build time",
                loc.start.line
            ),
            loc,
        }
    }

    pub fn tagged_template(loc: SourceSpan) -> Self {
        Self {
            message: format!(
                "Invalid call at line {}: tagged template expressions are not supported",
                loc.start.line
            ),
            loc,
        }
    }

    pub fn non_string_argument(loc: SourceSpan) -> Self {
        Self {
            message: format!(
                "Invalid call at line {}: argument must resolve to a constant string",
                loc.start.line
            ),
            loc,
        }
    }

    pub fn bad_arity(loc: SourceSpan) -> Self {
        Self {
            message: format!(
                "Invalid call at line {}: expected exactly one string argument",
                loc.start.line
            ),
            loc,
        }
    }

    /// Parser diagnostics are fatal but carry no span of their own here;
    /// the pass only models their existence.
    pub fn parse(detail: &str) -> Self {
        let start = SourcePosition { line: 1, column: 0 };
        Self {
            message: format!("Parse failure: {}", detail),
            loc: SourceSpan { start, end: start },
        }
    }
}

impl fmt::Display for InvalidRequireCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for InvalidRequireCallError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourcePosition;

    fn loc_at_line(line: u32) -> SourceSpan {
        SourceSpan {
            start: SourcePosition { line, column: 0 },
            end: SourcePosition { line, column: 10 },
        }
    }

    #[test]
    fn test_message_forms_are_stable() {
        assert_eq!(
            InvalidRequireCallError::dynamic_interpolation(loc_at_line(3)).message,
            "Invalid call at line 3: dynamic template interpolation cannot be resolved at build time"
        );
        assert_eq!(
            InvalidRequireCallError::tagged_template(loc_at_line(1)).message,
            "Invalid call at line 1: tagged template expressions are not supported"
        );
        assert_eq!(
            InvalidRequireCallError::non_string_argument(loc_at_line(7)).message,
            "Invalid call at line 7: argument must resolve to a constant string"
        );
        assert_eq!(
            InvalidRequireCallError::bad_arity(loc_at_line(2)).message,
            "Invalid call at line 2: expected exactly one string argument"
        );
    }
}
