//! Source positions for compile-error reporting.

use std::fmt;
use std::ops::{Index, Range};

/// A half-open byte range into the template source.
///
/// Spans are produced whole by the lexer, one per tag, and only travel
/// into [`CompileError`][crate::CompileError] excerpts; there is no span
/// arithmetic or merging anywhere in the pipeline.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl Index<Span> for str {
    type Output = str;

    fn index(&self, span: Span) -> &str {
        &self[span.start..span.end]
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
