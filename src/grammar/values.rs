//! Lexical values: identifiers, integers, floats, strings, indices

use serde::{Deserialize, Serialize};

use crate::ast::{Node, Span};
use crate::combinator::{one_of, Failure, Input, MapNode, PResult};

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// A `$name` symbolic identifier, `$` included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '.'
                | '/'
                | ':'
                | '<'
                | '='
                | '>'
                | '?'
                | '@'
                | '\\'
                | '^'
                | '_'
                | '`'
                | '|'
                | '~'
        )
}

pub fn identifier(input: Input<'_>) -> PResult<'_, Node<Identifier>> {
    if !input.rest().starts_with('$') {
        return Err(Failure::soft(input.offset(), "expected a `$` identifier"));
    }
    let body = input.advance(1);
    let rest = body.rest();
    let len = rest.find(|c| !is_id_char(c)).unwrap_or(rest.len());
    if len == 0 {
        return Err(Failure::soft(
            input.offset(),
            "`$` must be followed by at least one identifier character",
        ));
    }
    let next = body.advance(len);
    let node = Node::new(
        Identifier {
            name: input.source()[input.offset()..next.offset()].to_string(),
        },
        Span::new(input.offset(), next.offset()),
    );
    Ok((node, next))
}

// ============================================================================
// INTEGERS
// ============================================================================

/// An unsigned integer literal, decimal or `0x` hexadecimal, with optional
/// `_` digit separators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UInteger {
    pub value: u64,
}

/// A signed integer literal with an explicit `+` or `-`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SInteger {
    pub value: i64,
}

/// Either integer form, as accepted by integer `const` operands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Integer {
    Unsigned(UInteger),
    Signed(SInteger),
}

fn scan_digits(input: Input<'_>, hex: bool) -> (&str, Input<'_>) {
    let rest = input.rest();
    let len = rest
        .find(|c: char| !(c == '_' || if hex { c.is_ascii_hexdigit() } else { c.is_ascii_digit() }))
        .unwrap_or(rest.len());
    (&rest[..len], input.advance(len))
}

fn digits_value(digits: &str, radix: u32, at: usize) -> Result<u64, Failure> {
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() {
        return Err(Failure::soft(at, "expected an integer"));
    }
    u64::from_str_radix(&cleaned, radix)
        .map_err(|_| Failure::soft(at, format!("integer literal `{digits}` is out of range")))
}

pub fn uinteger(input: Input<'_>) -> PResult<'_, Node<UInteger>> {
    let (radix, body) = if input.rest().starts_with("0x") || input.rest().starts_with("0X") {
        (16, input.advance(2))
    } else {
        (10, input)
    };
    let (digits, next) = scan_digits(body, radix == 16);
    let value = digits_value(digits, radix, input.offset())?;
    let node = Node::new(
        UInteger { value },
        Span::new(input.offset(), next.offset()),
    );
    Ok((node, next))
}

pub fn sinteger(input: Input<'_>) -> PResult<'_, Node<SInteger>> {
    let negative = match input.rest().chars().next() {
        Some('-') => true,
        Some('+') => false,
        _ => return Err(Failure::soft(input.offset(), "expected a signed integer")),
    };
    let (magnitude, next) = uinteger(input.advance(1))?;
    let value = if negative {
        0i64.checked_sub_unsigned(magnitude.value.value)
    } else {
        i64::try_from(magnitude.value.value).ok()
    };
    let value = value.ok_or_else(|| {
        Failure::soft(input.offset(), "signed integer literal is out of range")
    })?;
    let node = Node::new(
        SInteger { value },
        Span::new(input.offset(), next.offset()),
    );
    Ok((node, next))
}

pub fn integer(input: Input<'_>) -> PResult<'_, Node<Integer>> {
    one_of(
        input,
        "an integer",
        &[
            &|i| sinteger(i).map_node(Integer::Signed),
            &|i| uinteger(i).map_node(Integer::Unsigned),
        ],
    )
}

// ============================================================================
// FLOATS
// ============================================================================

/// A floating-point literal, including `inf` and `nan`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Float {
    pub value: f64,
}

pub fn float(input: Input<'_>) -> PResult<'_, Node<Float>> {
    let (negative, body) = match input.rest().chars().next() {
        Some('-') => (true, input.advance(1)),
        Some('+') => (false, input.advance(1)),
        _ => (false, input),
    };

    let (magnitude, next) = if body.rest().starts_with("inf") {
        (f64::INFINITY, body.advance(3))
    } else if body.rest().starts_with("nan") {
        (f64::NAN, body.advance(3))
    } else {
        let (digits, after_int) = scan_digits(body, false);
        if digits.is_empty() {
            return Err(Failure::soft(input.offset(), "expected a float"));
        }
        let mut end = after_int;
        if end.rest().starts_with('.') {
            let (_, after_frac) = scan_digits(end.advance(1), false);
            end = after_frac;
        }
        if end.rest().starts_with(['e', 'E']) {
            let mut exp = end.advance(1);
            if exp.rest().starts_with(['+', '-']) {
                exp = exp.advance(1);
            }
            let (exp_digits, after_exp) = scan_digits(exp, false);
            if exp_digits.chars().any(|c| c.is_ascii_digit()) {
                end = after_exp;
            }
        }
        let text: String = body.source()[body.offset()..end.offset()]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        let value = text.parse::<f64>().map_err(|_| {
            Failure::soft(input.offset(), format!("invalid float literal `{text}`"))
        })?;
        (value, end)
    };

    let value = if negative { -magnitude } else { magnitude };
    let node = Node::new(Float { value }, Span::new(input.offset(), next.offset()));
    Ok((node, next))
}

// ============================================================================
// STRINGS
// ============================================================================

/// A quoted string literal. `value` is the raw content between the quotes
/// with escape sequences left as written; the parser only validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringLiteral {
    pub value: String,
}

pub fn string(input: Input<'_>) -> PResult<'_, Node<StringLiteral>> {
    if !input.rest().starts_with('"') {
        return Err(Failure::soft(input.offset(), "expected a string literal"));
    }
    // The opening quote commits: a malformed string is an error in this
    // construct, not a cue to try another alternative.
    let mut chars = input.advance(1).rest().char_indices();
    let content_start = input.offset() + 1;
    loop {
        let Some((at, c)) = chars.next() else {
            return Err(Failure::cut(input.offset(), "unterminated string literal"));
        };
        match c {
            '"' => {
                let end = content_start + at;
                let node = Node::new(
                    StringLiteral {
                        value: input.source()[content_start..end].to_string(),
                    },
                    Span::new(input.offset(), end + 1),
                );
                return Ok((node, input.at(end + 1)));
            }
            '\\' => {
                let Some((escape_at, escape)) = chars.next() else {
                    return Err(Failure::cut(input.offset(), "unterminated string literal"));
                };
                match escape {
                    't' | 'n' | 'r' | '"' | '\'' | '\\' => {}
                    'u' => {
                        if !take_unicode_escape(&mut chars) {
                            return Err(Failure::cut(
                                content_start + escape_at,
                                "invalid `\\u{...}` escape in string literal",
                            ));
                        }
                    }
                    c if c.is_ascii_hexdigit() => {
                        if !matches!(chars.next(), Some((_, c2)) if c2.is_ascii_hexdigit()) {
                            return Err(Failure::cut(
                                content_start + escape_at,
                                "`\\` hex escape needs two hex digits",
                            ));
                        }
                    }
                    _ => {
                        return Err(Failure::cut(
                            content_start + escape_at,
                            format!("invalid string escape `\\{escape}`"),
                        ));
                    }
                }
            }
            _ => {}
        }
    }
}

fn take_unicode_escape(chars: &mut std::str::CharIndices<'_>) -> bool {
    if !matches!(chars.next(), Some((_, '{'))) {
        return false;
    }
    let mut digits = 0;
    loop {
        match chars.next() {
            Some((_, '}')) => return digits > 0,
            Some((_, c)) if c.is_ascii_hexdigit() || c == '_' => digits += 1,
            _ => return false,
        }
    }
}

// ============================================================================
// INDICES
// ============================================================================

/// A reference to a definition: by numeric position or by `$name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Index {
    Numeric(u64),
    Named(String),
}

pub fn index(input: Input<'_>) -> PResult<'_, Node<Index>> {
    one_of(
        input,
        "an index",
        &[
            &|i| uinteger(i).map_node(|u| Index::Numeric(u.value)),
            &|i| identifier(i).map_node(|id| Index::Named(id.name)),
        ],
    )
}
