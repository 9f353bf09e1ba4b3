//! The WebAssembly text grammar
//!
//! Everything here is expressed through the combinator primitives; no rule
//! scans text by hand beyond the lexical leaves in [`values`]. The document
//! rule is deliberately forgiving: a module whose inside breaks is recovered
//! at its closing parenthesis, and a top-level form that cannot be parsed at
//! all turns the remainder of the document into one opaque tail node.

pub mod fields;
mod hoist;
pub mod instructions;
pub mod types;
pub mod values;

use serde::{Deserialize, Serialize};

use crate::ast::{HoistChildren, Node, Span, Unknown};
use crate::combinator::{eof, literal, sequence, synchronized, Bracketed, Input, PResult};
use crate::diagnostics::SyntaxError;
use crate::trivia::{gap, keyword};

use fields::{module_field, ModuleField};
use values::{identifier, Identifier};

// ============================================================================
// DOCUMENT SHAPES
// ============================================================================

/// A parsed document: modules in order, with an opaque tail if scanning had
/// to give up. Comments between top-level constructs live here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Node<ProgramItem>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgramItem {
    Module(Module),
    Unknown(Unknown),
}

/// `(module $id? field*)`. A recovered module carries the text skipped
/// between the failure point and its closing parenthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: Option<Node<Identifier>>,
    pub fields: Vec<Node<ModuleField>>,
    pub skipped: Option<Node<Unknown>>,
}

#[derive(Debug, Clone, PartialEq)]
struct ModuleBody {
    id: Option<Node<Identifier>>,
    fields: Vec<Node<ModuleField>>,
}

// ============================================================================
// MODULE
// ============================================================================

fn module_open(input: Input<'_>) -> PResult<'_, Node<()>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "module"))?;
        Ok(())
    })
}

fn module_body(input: Input<'_>) -> PResult<'_, Node<ModuleBody>> {
    sequence(input, |s| {
        let id = s.opt(identifier)?;
        let fields = s.repeat(module_field)?;
        Ok(ModuleBody { id, fields })
    })
}

fn module_close(input: Input<'_>) -> PResult<'_, Node<()>> {
    let (node, next) = literal(input, ")")?;
    Ok((node.map(|_| ()), next))
}

/// One `(module ...)` form, recovered at its closing parenthesis when the
/// inside fails to parse.
pub fn module(input: Input<'_>) -> PResult<'_, Node<Module>> {
    let (node, next) = synchronized(input, module_open, module_body, module_close)?;
    let Node {
        value,
        span,
        mut comments,
    } = node;
    let module = match value {
        Bracketed::Complete { body, .. } => {
            let Node {
                value: ModuleBody { id, fields },
                comments: body_comments,
                ..
            } = body;
            comments.extend(body_comments);
            Module {
                id,
                fields,
                skipped: None,
            }
        }
        Bracketed::Recovered { body, skipped, .. } => {
            let (id, fields) = match body {
                Some(Node {
                    value: ModuleBody { id, fields },
                    comments: body_comments,
                    ..
                }) => {
                    comments.extend(body_comments);
                    (id, fields)
                }
                None => (None, Vec::new()),
            };
            Module {
                id,
                fields,
                skipped: Some(skipped),
            }
        }
    };
    comments.sort_by_key(|c| c.span.start);
    Ok((Node::with_comments(module, span, comments), next))
}

// ============================================================================
// DOCUMENT
// ============================================================================

fn program(input: Input<'_>) -> PResult<'_, Node<Program>> {
    let source_len = input.source().len();
    let (mut comments, mut current) = gap(input)?;
    let mut body = Vec::new();
    while eof(current).is_err() {
        match module(current) {
            Ok((node, next)) => {
                body.push(node.map(ProgramItem::Module));
                let (more, after) = gap(next)?;
                comments.extend(more);
                current = after;
            }
            Err(f) if f.is_fatal() => return Err(f),
            Err(_) => {
                // No way to parse this form: give up on the rest of the
                // document and hand it back as one opaque tail.
                body.push(Node::new(
                    ProgramItem::Unknown(Unknown {
                        text: current.rest().to_string(),
                    }),
                    Span::new(current.offset(), source_len),
                ));
                current = current.at(source_len);
            }
        }
    }
    Ok((
        Node::with_comments(Program { body }, Span::new(0, source_len), comments),
        current,
    ))
}

/// Parses a whole document. The only fatal outcome is a lexical failure that
/// nothing recovers (an unterminated block comment); everything else yields
/// a tree, possibly with recovered or unknown parts.
pub fn parse(source: &str) -> Result<Node<Program>, SyntaxError> {
    parse_named("wat", source)
}

/// [`parse`], with a source name for diagnostics.
pub fn parse_named(name: &str, source: &str) -> Result<Node<Program>, SyntaxError> {
    match program(Input::new(source)) {
        Ok((node, _)) => Ok(node),
        Err(failure) => Err(SyntaxError::from_failure(name, source, failure)),
    }
}

// ============================================================================
// COMMENT REATTACHMENT
// ============================================================================

/// Bubbles every comment below each top-level construct up onto that
/// construct, ordered by source offset.
///
/// This is the one comment policy of the crate, and it is observable:
/// `parse` returns comments exactly where they were captured, and this
/// rewrite moves each module's interior comments onto the module node
/// itself. Comments between top-level constructs stay on the [`Program`]
/// node in both views.
pub fn hoist_comments(program: Node<Program>) -> Node<Program> {
    let Node {
        value: Program { body },
        span,
        comments,
    } = program;
    let body = body
        .into_iter()
        .map(|item| {
            let Node {
                value,
                span,
                mut comments,
            } = item;
            let value = value.hoist_children(&mut comments);
            comments.sort_by_key(|c| c.span.start);
            Node {
                value,
                span,
                comments,
            }
        })
        .collect();
    Node {
        value: Program { body },
        span,
        comments,
    }
}
