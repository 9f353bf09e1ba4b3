//! Hand-written parser-combinator engine
//!
//! Rules are pure functions from an [`Input`] position to a [`PResult`]:
//! either a value plus the next position, or a [`Failure`]. Nothing is
//! shared between rule invocations except the position threaded through one
//! [`Seq`] frame, so backtracking is plain recomputation and discarding a
//! branch has no cleanup obligation.
//!
//! Failures come in three strengths. A `Soft` mismatch lets an enclosing
//! choice try its next alternative. A `Cut` failure is raised once a
//! branch-identifying keyword has matched: from then on the branch is
//! committed and the failure must reach a recovery point instead of being
//! retried or treated as absence. A `Fatal` failure (unterminated block
//! comment) stops even recovery.

use crate::ast::{Comment, Node, Span, Unknown};
use crate::trivia::gap;

// ============================================================================
// POSITIONS
// ============================================================================

/// An immutable cursor into the source text. Advancing yields a new value;
/// the source reference itself is never copied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Input<'s> {
    source: &'s str,
    offset: usize,
}

impl<'s> Input<'s> {
    pub fn new(source: &'s str) -> Self {
        Self { source, offset: 0 }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The unconsumed remainder of the source.
    pub fn rest(&self) -> &'s str {
        &self.source[self.offset..]
    }

    pub fn at_end(&self) -> bool {
        self.offset >= self.source.len()
    }

    /// A new cursor `n` bytes further along, clamped to the input end.
    pub fn advance(&self, n: usize) -> Self {
        Self {
            source: self.source,
            offset: (self.offset + n).min(self.source.len()),
        }
    }

    /// A new cursor at an absolute offset, clamped to the input end.
    pub fn at(&self, offset: usize) -> Self {
        Self {
            source: self.source,
            offset: offset.min(self.source.len()),
        }
    }
}

// ============================================================================
// FAILURES
// ============================================================================

/// How far a failure propagates before something may absorb it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Ordinary mismatch; choices try the next alternative, optionals yield
    /// emptiness.
    Soft,
    /// Committed branch; must not be replaced by a sibling alternative or
    /// turned into emptiness. Absorbed only by `synchronized` or by the
    /// top-level document scan.
    Cut,
    /// Nothing recovers this; it surfaces as the parse diagnostic.
    Fatal,
}

/// A failed parse attempt: where, why, and how far it propagates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    offset: usize,
    message: String,
    severity: Severity,
}

impl Failure {
    pub fn soft(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
            severity: Severity::Soft,
        }
    }

    pub fn cut(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
            severity: Severity::Cut,
        }
    }

    pub fn fatal(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
            severity: Severity::Fatal,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// True for `Cut` and `Fatal`: the failure must not be masked by a
    /// sibling alternative or an optional.
    pub fn is_exclusive(&self) -> bool {
        self.severity >= Severity::Cut
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Furthest-failure selection between sibling attempts: the attempt that
    /// consumed more input is the more informative mismatch. Ties keep the
    /// first seen.
    pub fn furthest(self, later: Failure) -> Failure {
        if later.offset > self.offset {
            later
        } else {
            self
        }
    }

    /// Upgrades a soft failure to a cut once its sequence has committed.
    pub fn escalate(self) -> Failure {
        match self.severity {
            Severity::Soft => Failure {
                severity: Severity::Cut,
                ..self
            },
            _ => self,
        }
    }
}

/// The outcome of one rule at one position.
pub type PResult<'s, T> = Result<(T, Input<'s>), Failure>;

/// Payload mapping for rule outcomes, keeping span and comments.
pub trait MapNode<'s, T> {
    fn map_node<U>(self, f: impl FnOnce(T) -> U) -> PResult<'s, Node<U>>;
}

impl<'s, T> MapNode<'s, T> for PResult<'s, Node<T>> {
    fn map_node<U>(self, f: impl FnOnce(T) -> U) -> PResult<'s, Node<U>> {
        self.map(|(node, next)| (node.map(f), next))
    }
}

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Matches `text` exactly at the current position.
pub fn literal<'s>(input: Input<'s>, text: &str) -> PResult<'s, Node<&'s str>> {
    if input.rest().starts_with(text) {
        let next = input.advance(text.len());
        let node = Node::new(
            &input.source()[input.offset()..next.offset()],
            Span::new(input.offset(), next.offset()),
        );
        Ok((node, next))
    } else {
        Err(Failure::soft(input.offset(), format!("expected `{text}`")))
    }
}

/// Succeeds only at the end of the input.
pub fn eof(input: Input<'_>) -> PResult<'_, ()> {
    match input.rest().chars().next() {
        None => Ok(((), input)),
        Some(c) => Err(Failure::soft(
            input.offset(),
            format!("expected end of input, found `{c}`"),
        )),
    }
}

/// Ordered choice: tries each alternative at the same start position and
/// returns the first success. An exclusive failure short-circuits the
/// remaining alternatives; otherwise the furthest mismatch is reported.
pub fn one_of<'s, T>(
    input: Input<'s>,
    what: &str,
    alternatives: &[&dyn Fn(Input<'s>) -> PResult<'s, T>],
) -> PResult<'s, T> {
    let mut best: Option<Failure> = None;
    for alternative in alternatives {
        match alternative(input) {
            Ok(out) => return Ok(out),
            Err(f) if f.is_exclusive() => return Err(f),
            Err(f) => {
                best = Some(match best {
                    None => f,
                    Some(seen) => seen.furthest(f),
                });
            }
        }
    }
    Err(best.unwrap_or_else(|| Failure::soft(input.offset(), format!("expected {what}"))))
}

/// Optional match outside a sequence frame: `None` on a soft failure,
/// exclusive failures propagate unchanged.
pub fn opt<'s, T>(
    input: Input<'s>,
    rule: impl FnOnce(Input<'s>) -> PResult<'s, T>,
) -> PResult<'s, Option<T>> {
    match rule(input) {
        Ok((value, next)) => Ok((Some(value), next)),
        Err(f) if f.is_exclusive() => Err(f),
        Err(_) => Ok((None, input)),
    }
}

// ============================================================================
// SEQUENCING
// ============================================================================

/// A do-style sequence frame: one threaded position, a pending comment list,
/// and the commit flag.
///
/// Between steps (never before the first) the trivia separator runs and its
/// comments accumulate here; the finished sequence packages them onto the
/// node it returns. After [`Seq::commit`], any failure leaving this frame is
/// escalated to a cut.
pub struct Seq<'s> {
    input: Input<'s>,
    start: usize,
    comments: Vec<Node<Comment>>,
    committed: bool,
    consumed: bool,
    separated: bool,
}

/// Runs `build` as a sequence with the trivia separator between steps,
/// wrapping the result in a [`Node`] spanning the consumed text.
pub fn sequence<'s, T>(
    input: Input<'s>,
    build: impl FnOnce(&mut Seq<'s>) -> Result<T, Failure>,
) -> PResult<'s, Node<T>> {
    run_sequence(input, true, build)
}

/// A separator-free sequence, for compound tokens such as `local.get` whose
/// pieces must touch.
pub fn sequence_tight<'s, T>(
    input: Input<'s>,
    build: impl FnOnce(&mut Seq<'s>) -> Result<T, Failure>,
) -> PResult<'s, Node<T>> {
    run_sequence(input, false, build)
}

fn run_sequence<'s, T>(
    input: Input<'s>,
    separated: bool,
    build: impl FnOnce(&mut Seq<'s>) -> Result<T, Failure>,
) -> PResult<'s, Node<T>> {
    let mut seq = Seq {
        input,
        start: input.offset(),
        comments: Vec::new(),
        committed: false,
        consumed: false,
        separated,
    };
    match build(&mut seq) {
        Ok(value) => {
            let span = Span::new(seq.start, seq.input.offset());
            Ok((Node::with_comments(value, span, seq.comments), seq.input))
        }
        Err(f) => Err(if seq.committed { f.escalate() } else { f }),
    }
}

impl<'s> Seq<'s> {
    /// The position the next step would run at, before trivia.
    pub fn position(&self) -> Input<'s> {
        self.input
    }

    /// Commits this sequence: the branch has been identified, so later
    /// failures are real errors rather than cues to try a sibling.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Runs one step, aborting the sequence with the step's failure.
    pub fn step<T>(
        &mut self,
        rule: impl FnOnce(Input<'s>) -> PResult<'s, T>,
    ) -> Result<T, Failure> {
        self.separator()?;
        match rule(self.input) {
            Ok((value, next)) => {
                self.input = next;
                self.consumed = true;
                Ok(value)
            }
            Err(f) => Err(self.raise(f)),
        }
    }

    /// Runs an optional step: `None` on a soft failure of the sub-rule.
    /// Trivia scanned ahead of the attempt stays consumed either way, so a
    /// failed optional does not give captured comments back.
    pub fn opt<T>(
        &mut self,
        rule: impl FnOnce(Input<'s>) -> PResult<'s, T>,
    ) -> Result<Option<T>, Failure> {
        self.separator()?;
        match rule(self.input) {
            Ok((value, next)) => {
                self.input = next;
                self.consumed = true;
                Ok(Some(value))
            }
            Err(f) if f.is_exclusive() => Err(self.raise(f)),
            Err(_) => Ok(None),
        }
    }

    /// Repeats a rule until it softly fails. Never fails itself; zero
    /// matches is a valid outcome.
    pub fn repeat<T>(
        &mut self,
        rule: impl Fn(Input<'s>) -> PResult<'s, T>,
    ) -> Result<Vec<T>, Failure> {
        let mut items = Vec::new();
        loop {
            let before = self.input.offset();
            match self.opt(&rule)? {
                Some(item) => {
                    items.push(item);
                    // A repetition that consumed nothing would loop forever.
                    if self.input.offset() == before {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(items)
    }

    /// Evaluates a rule at the would-be next position (after trivia) without
    /// consuming input or comments.
    pub fn peek<T>(&self, rule: impl FnOnce(Input<'s>) -> PResult<'s, T>) -> bool {
        let mut probe = self.input;
        if self.separated && self.consumed {
            if let Ok((_, next)) = gap(probe) {
                probe = next;
            }
        }
        rule(probe).is_ok()
    }

    /// Flattens a child node away, moving its captured comments onto this
    /// sequence's pending list so they are not lost with the wrapper.
    pub fn absorb<T>(&mut self, node: Node<T>) -> T {
        self.comments.extend(node.comments);
        node.value
    }

    /// A failure at the current position, escalated if this sequence has
    /// already committed.
    pub fn fail(&self, message: impl Into<String>) -> Failure {
        self.raise(Failure::soft(self.input.offset(), message))
    }

    fn separator(&mut self) -> Result<(), Failure> {
        if !self.separated || !self.consumed {
            return Ok(());
        }
        let (mut comments, next) = gap(self.input).map_err(|f| self.raise(f))?;
        self.comments.append(&mut comments);
        self.input = next;
        Ok(())
    }

    fn raise(&self, f: Failure) -> Failure {
        if self.committed {
            f.escalate()
        } else {
            f
        }
    }
}

// ============================================================================
// RECOVERY
// ============================================================================

/// The outcome of a [`synchronized`] parse: either the bracketed construct
/// parsed cleanly, or its body was abandoned and the closer was found again
/// further along.
#[derive(Debug, Clone, PartialEq)]
pub enum Bracketed<O, B, C> {
    Complete {
        open: Node<O>,
        body: Node<B>,
        close: Node<C>,
    },
    Recovered {
        open: Node<O>,
        body: Option<Node<B>>,
        skipped: Node<Unknown>,
        close: Node<C>,
    },
}

/// Parses `open`, `body`, `close` with trivia between the phases.
///
/// When `open` fails, the construct is simply absent and the failure
/// propagates as-is. Once `open` has matched, a failing `body` or `close`
/// triggers resynchronization: scan forward byte by byte, re-attempting
/// `close` at every position, and wrap the skipped stretch as an [`Unknown`]
/// node. The scan is forward-only and bounded by the input length, and the
/// returned position is always valid for resuming after the construct. Fatal
/// failures are never recovered.
pub fn synchronized<'s, O, B, C>(
    input: Input<'s>,
    open: impl FnOnce(Input<'s>) -> PResult<'s, Node<O>>,
    body: impl FnOnce(Input<'s>) -> PResult<'s, Node<B>>,
    close: impl Fn(Input<'s>) -> PResult<'s, Node<C>>,
) -> PResult<'s, Node<Bracketed<O, B, C>>> {
    let start = input.offset();
    let (open_node, after_open) = open(input)?;

    let (mut comments, body_start) = gap(after_open)?;
    let (body_node, after_body) = match body(body_start) {
        Ok(out) => out,
        Err(f) if f.is_fatal() => return Err(f),
        Err(f) => {
            return resync(input, start, open_node, None, comments, body_start, &close, f);
        }
    };

    let (mut trailing, close_start) = gap(after_body)?;
    comments.append(&mut trailing);
    match close(close_start) {
        Ok((close_node, next)) => {
            let node = Node::with_comments(
                Bracketed::Complete {
                    open: open_node,
                    body: body_node,
                    close: close_node,
                },
                Span::new(start, next.offset()),
                comments,
            );
            Ok((node, next))
        }
        Err(f) if f.is_fatal() => Err(f),
        Err(f) => resync(
            input,
            start,
            open_node,
            Some(body_node),
            comments,
            close_start,
            &close,
            f,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn resync<'s, O, B, C>(
    input: Input<'s>,
    start: usize,
    open: Node<O>,
    body: Option<Node<B>>,
    comments: Vec<Node<Comment>>,
    from: Input<'s>,
    close: &impl Fn(Input<'s>) -> PResult<'s, Node<C>>,
    failure: Failure,
) -> PResult<'s, Node<Bracketed<O, B, C>>> {
    for at in from.offset()..=input.source().len() {
        if !input.source().is_char_boundary(at) {
            continue;
        }
        let probe = input.at(at);
        let (close_node, next) = match close(probe) {
            Ok(out) => out,
            Err(f) if f.is_fatal() => return Err(f),
            Err(_) => continue,
        };
        let skipped = Node::new(
            Unknown {
                text: input.source()[from.offset()..at].to_string(),
            },
            Span::new(from.offset(), at),
        );
        let node = Node::with_comments(
            Bracketed::Recovered {
                open,
                body,
                skipped,
                close: close_node,
            },
            Span::new(start, next.offset()),
            comments,
        );
        return Ok((node, next));
    }
    Err(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trivia::keyword;

    fn at(source: &str) -> Input<'_> {
        Input::new(source)
    }

    fn abc_def_ghi(input: Input<'_>) -> PResult<'_, Node<Vec<String>>> {
        sequence(input, |s| {
            let a = s.step(|i| literal(i, "abc"))?;
            let d = s.step(|i| literal(i, "def"))?;
            let g = s.step(|i| literal(i, "ghi"))?;
            Ok(vec![
                a.value.to_string(),
                d.value.to_string(),
                g.value.to_string(),
            ])
        })
    }

    #[test]
    fn sequence_threads_position() {
        let (node, next) = abc_def_ghi(at("abcdefghi")).unwrap();
        assert_eq!(node.value, vec!["abc", "def", "ghi"]);
        assert_eq!(node.span, Span::new(0, 9));
        assert!(next.at_end());
    }

    #[test]
    fn sequence_skips_trivia_between_steps() {
        let (node, _) = abc_def_ghi(at("abc ;; note\n def ghi")).unwrap();
        assert_eq!(node.comments.len(), 1);
        assert_eq!(node.comments[0].value.content, " note");
    }

    #[test]
    fn sequence_does_not_absorb_leading_trivia() {
        assert!(abc_def_ghi(at("  abcdefghi")).is_err());
    }

    #[test]
    fn sequence_aborts_on_first_failing_step() {
        let failure = abc_def_ghi(at("abcxef")).unwrap_err();
        assert_eq!(failure.offset(), 3);
        assert!(!failure.is_exclusive());
    }

    #[test]
    fn commit_escalates_later_failures() {
        let rule = |i| {
            sequence(i, |s| {
                s.step(|i| literal(i, "abc"))?;
                s.commit();
                s.step(|i| literal(i, "def"))?;
                Ok(())
            })
        };
        let failure = rule(at("abcxef")).unwrap_err();
        assert!(failure.is_exclusive());
        assert_eq!(failure.offset(), 3);
    }

    #[test]
    fn one_of_short_circuits_on_cut() {
        let committed = |i| {
            sequence(i, |s| {
                s.step(|i| literal(i, "ab"))?;
                s.commit();
                s.step(|i| literal(i, "cd"))?;
                Ok("committed")
            })
        };
        let fallback =
            |i| sequence(i, |s| s.step(|i| literal(i, "abxx")).map(|_| "fallback"));
        let failure = one_of(at("abxx"), "test", &[&committed, &fallback]).unwrap_err();
        assert!(failure.is_exclusive());
    }

    #[test]
    fn one_of_reports_furthest_soft_failure() {
        let shallow = |i| literal(i, "x").map_node(|v| v.to_string());
        let deep = |i| {
            sequence(i, |s| {
                s.step(|i| literal(i, "ab"))?;
                s.step(|i| literal(i, "zz"))?;
                Ok(String::new())
            })
        };
        let failure = one_of(at("abq"), "test", &[&shallow, &deep]).unwrap_err();
        assert_eq!(failure.offset(), 2);
    }

    #[test]
    fn opt_passes_exclusive_failures_through() {
        let committed = |i| {
            sequence(i, |s| {
                s.step(|i| literal(i, "ab"))?;
                s.commit();
                s.step(|i| literal(i, "cd"))?;
                Ok(())
            })
        };
        assert!(opt(at("abxx"), committed).is_err());
        let (none, next) = opt(at("zz"), committed).unwrap();
        assert!(none.is_none());
        assert_eq!(next.offset(), 0);
    }

    #[test]
    fn repeat_never_fails() {
        let rule = |i| {
            sequence(i, |s| {
                let items = s.repeat(|i| literal(i, "a"))?;
                Ok(items.len())
            })
        };
        let (node, _) = rule(at("aaab")).unwrap();
        assert_eq!(node.value, 3);
        let (node, _) = rule(at("b")).unwrap();
        assert_eq!(node.value, 0);
    }

    #[test]
    fn eof_names_the_unexpected_character() {
        assert!(eof(at("")).is_ok());
        let failure = eof(at("x")).unwrap_err();
        assert!(failure.message().contains('x'));
    }

    // The synchronized scenarios mirror its contract: clean parse, absent
    // construct, recovery after a bad body, recovery after a bad closer,
    // and no recovery point at all.

    fn sync_rule(input: Input<'_>) -> PResult<'_, Node<Bracketed<&str, &str, &str>>> {
        synchronized(
            input,
            |i| literal(i, "("),
            |i| keyword(i, "body"),
            |i| literal(i, ")"),
        )
    }

    #[test]
    fn synchronized_complete() {
        let (node, next) = sync_rule(at("(body)")).unwrap();
        assert!(matches!(node.value, Bracketed::Complete { .. }));
        assert_eq!(node.span, Span::new(0, 6));
        assert!(next.at_end());
    }

    #[test]
    fn synchronized_absent_when_open_fails() {
        let failure = sync_rule(at("[body)")).unwrap_err();
        assert!(!failure.is_exclusive());
        assert_eq!(failure.offset(), 0);
    }

    #[test]
    fn synchronized_recovers_after_bad_body() {
        let (node, next) = sync_rule(at("(boy)")).unwrap();
        match node.value {
            Bracketed::Recovered { body, skipped, .. } => {
                assert!(body.is_none());
                assert_eq!(skipped.value.text, "boy");
            }
            other => panic!("expected recovery, got {other:?}"),
        }
        assert!(next.at_end());
    }

    #[test]
    fn synchronized_recovers_after_bad_close() {
        let (node, _) = sync_rule(at("(body!)")).unwrap();
        match node.value {
            Bracketed::Recovered { body, skipped, .. } => {
                assert_eq!(body.unwrap().value, "body");
                assert_eq!(skipped.value.text, "!");
            }
            other => panic!("expected recovery, got {other:?}"),
        }
    }

    #[test]
    fn synchronized_fails_without_resync_point() {
        let failure = sync_rule(at("(boy")).unwrap_err();
        assert_eq!(failure.offset(), 1);
    }

    #[test]
    fn synchronized_resumes_after_the_matched_closer() {
        let (_, next) = sync_rule(at("(boy) (body)")).unwrap();
        assert_eq!(&"(boy) (body)"[next.offset()..], " (body)");
    }
}
