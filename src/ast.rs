//! Tree model for the WebAssembly text format
//!
//! Every parsed construct is a [`Node`]: a payload value, the byte span it
//! covers, and the comments captured while that construct was being parsed.
//! Nodes are immutable once produced; the comment-hoisting rewrite consumes a
//! tree and allocates a new one.

use serde::{Deserialize, Serialize};

// ============================================================================
// SPANS
// ============================================================================

/// A half-open byte range into the source text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

// ============================================================================
// NODES
// ============================================================================

/// A syntax tree node: payload, source span, and out-of-band comments.
///
/// The `comments` list holds the comments the producing rule captured between
/// its own steps, in document order. Trivia between sibling constructs is
/// owned by the enclosing construct, never silently absorbed by a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node<T> {
    pub value: T,
    pub span: Span,
    pub comments: Vec<Node<Comment>>,
}

impl<T> Node<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self {
            value,
            span,
            comments: Vec::new(),
        }
    }

    pub fn with_comments(value: T, span: Span, comments: Vec<Node<Comment>>) -> Self {
        Self {
            value,
            span,
            comments,
        }
    }

    /// Maps the payload while keeping span and captured comments intact.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Node<U> {
        Node {
            value: f(self.value),
            span: self.span,
            comments: self.comments,
        }
    }
}

// ============================================================================
// COMMENTS
// ============================================================================

/// The two comment forms of the text format.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    /// `;; ...` up to the end of the line.
    Line,
    /// `(; ... ;)`.
    Block,
}

/// A comment with its raw content, delimiters excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub kind: CommentKind,
    pub content: String,
}

// ============================================================================
// OPAQUE TEXT
// ============================================================================

/// Source text the parser skipped over: the resynchronization gap of a
/// recovered construct, or the unparseable tail of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unknown {
    pub text: String,
}

// ============================================================================
// COMMENT HOISTING
// ============================================================================

/// Bottom-up comment detachment, one explicit routine per payload shape.
///
/// `hoist_children` pushes every comment found below `self` into `sink` and
/// returns the rebuilt payload with those lists emptied. The per-construct
/// policy (how far comments bubble) lives with the entry point in
/// [`crate::grammar::hoist_comments`].
pub trait HoistChildren: Sized {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self;
}

impl<T: HoistChildren> Node<T> {
    /// Detaches this node's comments and its descendants' comments into
    /// `sink`, in traversal order, returning the stripped node.
    pub fn hoist(self, sink: &mut Vec<Node<Comment>>) -> Self {
        let Node {
            value,
            span,
            mut comments,
        } = self;
        let value = value.hoist_children(sink);
        sink.append(&mut comments);
        Node {
            value,
            span,
            comments: Vec::new(),
        }
    }
}

/// Hoists an optional child in place.
pub fn hoist_opt<T: HoistChildren>(
    child: Option<Node<T>>,
    sink: &mut Vec<Node<Comment>>,
) -> Option<Node<T>> {
    child.map(|n| n.hoist(sink))
}

/// Hoists an ordered child list in place.
pub fn hoist_all<T: HoistChildren>(
    children: Vec<Node<T>>,
    sink: &mut Vec<Node<Comment>>,
) -> Vec<Node<T>> {
    children.into_iter().map(|n| n.hoist(sink)).collect()
}

impl HoistChildren for Unknown {
    fn hoist_children(self, _sink: &mut Vec<Node<Comment>>) -> Self {
        self
    }
}
