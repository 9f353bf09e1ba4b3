//! User-facing parse diagnostics
//!
//! Internal failures stay a bare offset plus message so that backtracking
//! never pays for rendering. Only when a failure actually surfaces is the
//! line table built and a [`SyntaxError`] produced, with a labeled span and
//! the named source attached for `miette` report rendering.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::combinator::Failure;

// ============================================================================
// LINE INDEX
// ============================================================================

/// Offset-to-position lookup for one source text.
///
/// One O(n) scan collects the line-start offsets; each lookup is then a
/// binary search. The index is owned by the parse invocation that needed it,
/// so no process-wide cache can grow across calls.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (at, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(at + 1);
            }
        }
        Self { line_starts }
    }

    /// The 1-based line and column holding `offset`. The column counts bytes
    /// from the line start.
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        (line, column)
    }
}

// ============================================================================
// SYNTAX ERRORS
// ============================================================================

/// A fatal parse outcome, ready for `miette` rendering.
#[derive(Debug, Error, Diagnostic)]
#[error("syntax error at line {line}, column {column}: {message}")]
#[diagnostic(code(wat_syntax::parse))]
pub struct SyntaxError {
    pub message: String,
    /// 1-based line of the failure offset.
    pub line: usize,
    /// 1-based byte column of the failure offset.
    pub column: usize,
    #[label("syntax error here")]
    pub span: SourceSpan,
    #[source_code]
    pub src: NamedSource<String>,
}

impl SyntaxError {
    /// Renders an internal failure against its source. Line and column are
    /// computed here, not during parsing.
    pub(crate) fn from_failure(name: &str, source: &str, failure: Failure) -> Self {
        let index = LineIndex::new(source);
        let (line, column) = index.locate(failure.offset());
        let end = (failure.offset() + 1).min(source.len());
        let len = end.saturating_sub(failure.offset());
        Self {
            message: failure.message().to_string(),
            line,
            column,
            span: SourceSpan::new(failure.offset().into(), len),
            src: NamedSource::new(name, source.to_string()),
        }
    }
}
