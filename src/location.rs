//! Source positions for collected dependencies.
//!
//! oxc spans are byte offsets into the source text; dependency summaries
//! and error messages need line/column pairs. `LineIndex` is built once
//! per pass and answers offset lookups by binary search.

use oxc_span::Span;
use serde::{Deserialize, Serialize};

/// A point in the source text. Lines are 1-based, columns are 0-based
/// byte offsets within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { line_starts }
    }

    pub fn position(&self, offset: u32) -> SourcePosition {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        SourcePosition {
            line: line as u32,
            column: offset - self.line_starts[line - 1],
        }
    }

    pub fn span(&self, span: Span) -> SourceSpan {
        SourceSpan {
            start: self.position(span.start),
            end: self.position(span.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let index = LineIndex::new("require('a');");
        assert_eq!(index.position(0), SourcePosition { line: 1, column: 0 });
        assert_eq!(index.position(8), SourcePosition { line: 1, column: 8 });
    }

    #[test]
    fn test_multi_line() {
        let index = LineIndex::new("const a = 1;\nconst b = 2;\n");
        assert_eq!(index.position(13), SourcePosition { line: 2, column: 0 });
        assert_eq!(index.position(19), SourcePosition { line: 2, column: 6 });
    }

    #[test]
    fn test_span_conversion() {
        let index = LineIndex::new("x;\nrequire('a');\n");
        let span = index.span(Span::new(3, 15));
        assert_eq!(span.start, SourcePosition { line: 2, column: 0 });
        assert_eq!(span.end, SourcePosition { line: 2, column: 12 });
    }
}
