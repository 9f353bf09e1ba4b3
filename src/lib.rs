//! A comment-preserving parser for the WebAssembly text format.
//!
//! [`parse`] turns a `.wat` document into an immutable tree of spanned
//! nodes. Comments are captured out-of-band and attached to the construct
//! whose parse collected them; [`hoist_comments`] bubbles them up to the
//! enclosing top-level construct when a consumer prefers one flat list.
//! The parser is purely syntactic and performs no I/O and no re-emission;
//! rendering is the consumer's job.

pub use crate::ast::{Comment, CommentKind, Node, Span, Unknown};
pub use crate::diagnostics::{LineIndex, SyntaxError};
pub use crate::grammar::{hoist_comments, parse, parse_named, Module, Program, ProgramItem};

pub mod ast;
pub mod combinator;
pub mod diagnostics;
pub mod grammar;
pub mod trivia;
