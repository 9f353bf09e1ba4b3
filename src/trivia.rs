//! Whitespace, comments, and keyword scanning
//!
//! Trivia is everything the grammar does not treat as a token: whitespace
//! runs and the two comment forms. The [`gap`] rule is the default separator
//! the sequencing combinator runs between steps; it is the only place
//! comments enter the tree.

use crate::ast::{Comment, CommentKind, Node, Span};
use crate::combinator::{Failure, Input, PResult};

/// Advances over the whitespace characters of the text format. Always
/// succeeds, possibly without moving.
pub fn spaces(input: Input<'_>) -> Input<'_> {
    let rest = input.rest();
    let n = rest
        .find(|c| !matches!(c, ' ' | '\t' | '\n' | '\r'))
        .unwrap_or(rest.len());
    input.advance(n)
}

/// A `;; ...` comment running to the end of the line. The line terminator is
/// not part of the content and is not consumed.
pub fn line_comment(input: Input<'_>) -> PResult<'_, Node<Comment>> {
    if !input.rest().starts_with(";;") {
        return Err(Failure::soft(input.offset(), "expected `;;`"));
    }
    let body = input.advance(2);
    let rest = body.rest();
    let len = rest.find(['\n', '\r']).unwrap_or(rest.len());
    let end = body.advance(len);
    let node = Node::new(
        Comment {
            kind: CommentKind::Line,
            content: rest[..len].to_string(),
        },
        Span::new(input.offset(), end.offset()),
    );
    Ok((node, end))
}

/// A `(; ... ;)` comment. A missing closer is a fatal lexical failure: no
/// recovery rule may turn it into an ordinary mismatch.
pub fn block_comment(input: Input<'_>) -> PResult<'_, Node<Comment>> {
    if !input.rest().starts_with("(;") {
        return Err(Failure::soft(input.offset(), "expected `(;`"));
    }
    let body = input.advance(2);
    match body.rest().find(";)") {
        Some(len) => {
            let end = body.advance(len + 2);
            let node = Node::new(
                Comment {
                    kind: CommentKind::Block,
                    content: body.rest()[..len].to_string(),
                },
                Span::new(input.offset(), end.offset()),
            );
            Ok((node, end))
        }
        None => Err(Failure::fatal(
            input.offset(),
            "unterminated block comment: missing `;)`",
        )),
    }
}

/// Either comment form.
pub fn comment(input: Input<'_>) -> PResult<'_, Node<Comment>> {
    match line_comment(input) {
        Ok(out) => Ok(out),
        Err(f) if f.is_exclusive() => Err(f),
        Err(first) => match block_comment(input) {
            Ok(out) => Ok(out),
            Err(f) if f.is_exclusive() => Err(f),
            Err(second) => Err(first.furthest(second)),
        },
    }
}

/// Spaces, then any number of comments each followed by spaces. Collects the
/// comments in document order. Never fails, except that an unterminated block
/// comment surfaces as the fatal failure it is.
pub fn gap(input: Input<'_>) -> PResult<'_, Vec<Node<Comment>>> {
    let mut current = spaces(input);
    let mut comments = Vec::new();
    loop {
        match comment(current) {
            Ok((node, next)) => {
                comments.push(node);
                current = spaces(next);
            }
            Err(f) if f.is_fatal() => return Err(f),
            Err(_) => break,
        }
    }
    Ok((comments, current))
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn scan_word(input: Input<'_>) -> (&str, Input<'_>) {
    let rest = input.rest();
    let len = rest.find(|c| !is_word_char(c)).unwrap_or(rest.len());
    (&rest[..len], input.advance(len))
}

/// Scans a maximal keyword-class run and checks it against `allowed`. Used
/// for mnemonic recognition without spelling out one literal per keyword.
pub fn word<'s>(
    input: Input<'s>,
    what: &str,
    allowed: &std::collections::BTreeSet<&'static str>,
) -> PResult<'s, Node<&'s str>> {
    let (run, next) = scan_word(input);
    if run.is_empty() {
        return Err(Failure::soft(
            input.offset(),
            format!("expected {what}"),
        ));
    }
    if !allowed.contains(run) {
        return Err(Failure::soft(
            input.offset(),
            format!("`{run}` is not a valid {what}"),
        ));
    }
    Ok((
        Node::new(run, Span::new(input.offset(), next.offset())),
        next,
    ))
}

/// Matches one exact keyword as a whole word, so `module` does not match the
/// prefix of `modulex`.
pub fn keyword<'s>(input: Input<'s>, expected: &str) -> PResult<'s, Node<&'s str>> {
    let (run, next) = scan_word(input);
    if run != expected {
        return Err(Failure::soft(
            input.offset(),
            format!("expected `{expected}`"),
        ));
    }
    Ok((
        Node::new(run, Span::new(input.offset(), next.offset())),
        next,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(source: &str) -> Input<'_> {
        Input::new(source)
    }

    #[test]
    fn spaces_stops_at_token() {
        let next = spaces(at("  \t\n x"));
        assert_eq!(next.offset(), 5);
    }

    #[test]
    fn line_comment_excludes_terminator() {
        let (node, next) = line_comment(at(";; hello\nrest")).unwrap();
        assert_eq!(node.value.kind, CommentKind::Line);
        assert_eq!(node.value.content, " hello");
        assert_eq!(next.offset(), 8);
    }

    #[test]
    fn block_comment_content_excludes_delimiters() {
        let (node, next) = block_comment(at("(; body ;)x")).unwrap();
        assert_eq!(node.value.kind, CommentKind::Block);
        assert_eq!(node.value.content, " body ");
        assert_eq!(next.offset(), 10);
    }

    #[test]
    fn unterminated_block_comment_is_fatal() {
        let failure = block_comment(at("(; never closed")).unwrap_err();
        assert!(failure.is_fatal());
        assert!(failure.message().contains("unterminated"));
    }

    #[test]
    fn gap_collects_comments_in_order() {
        let (comments, next) = gap(at("  ;; a\n (; b ;)  token")).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].value.content, " a");
        assert_eq!(comments[1].value.content, " b ");
        assert_eq!(&"  ;; a\n (; b ;)  token"[next.offset()..], "token");
    }

    #[test]
    fn keyword_requires_whole_word() {
        assert!(keyword(at("module"), "module").is_ok());
        assert!(keyword(at("modulex"), "module").is_err());
        assert!(keyword(at("module)"), "module").is_ok());
    }

    #[test]
    fn word_reports_unknown_member() {
        let allowed = ["i32", "i64"].into_iter().collect();
        let failure = word(at("f80"), "number type", &allowed).unwrap_err();
        assert!(failure.message().contains("f80"));
    }
}
