//! Value and compound types

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ast::Node;
use crate::combinator::{literal, one_of, sequence, Input, MapNode, PResult};
use crate::trivia::{keyword, word};

use super::values::{identifier, uinteger, Identifier, UInteger};

// ============================================================================
// VALUE TYPES
// ============================================================================

pub(crate) static NUM_TYPES: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| ["i32", "i64", "f32", "f64"].into_iter().collect());

static REF_TYPES: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "anyref",
        "eqref",
        "i31ref",
        "structref",
        "arrayref",
        "nullref",
        "funcref",
        "nullfuncref",
        "exnref",
        "nullexnref",
        "externref",
        "nullexternref",
    ]
    .into_iter()
    .collect()
});

/// `i32`, `i64`, `f32` or `f64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberType {
    pub name: String,
}

/// The single 128-bit vector type, `v128`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorType;

/// `funcref`, `externref`, and the other reference types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceType {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Number(NumberType),
    Vector(VectorType),
    Ref(ReferenceType),
}

pub fn numtype(input: Input<'_>) -> PResult<'_, Node<NumberType>> {
    word(input, "number type", &NUM_TYPES).map_node(|name| NumberType {
        name: name.to_string(),
    })
}

pub fn vectype(input: Input<'_>) -> PResult<'_, Node<VectorType>> {
    keyword(input, "v128").map_node(|_| VectorType)
}

pub fn reftype(input: Input<'_>) -> PResult<'_, Node<ReferenceType>> {
    word(input, "reference type", &REF_TYPES).map_node(|name| ReferenceType {
        name: name.to_string(),
    })
}

pub fn valtype(input: Input<'_>) -> PResult<'_, Node<ValueType>> {
    one_of(
        input,
        "a value type",
        &[
            &|i| numtype(i).map_node(ValueType::Number),
            &|i| vectype(i).map_node(ValueType::Vector),
            &|i| reftype(i).map_node(ValueType::Ref),
        ],
    )
}

// ============================================================================
// FUNCTION TYPES
// ============================================================================

/// `(param $id? valtype*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub id: Option<Node<Identifier>>,
    pub types: Vec<Node<ValueType>>,
}

/// `(result valtype+)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultType {
    pub types: Vec<Node<ValueType>>,
}

/// `(func (param ...)* (result ...)*)`, as used inside `(type ...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionType {
    pub params: Vec<Node<Param>>,
    pub results: Vec<Node<ResultType>>,
}

pub fn param(input: Input<'_>) -> PResult<'_, Node<Param>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "param"))?;
        s.commit();
        let id = s.opt(identifier)?;
        let types = s.repeat(valtype)?;
        s.step(|i| literal(i, ")"))?;
        Ok(Param { id, types })
    })
}

pub fn result_type(input: Input<'_>) -> PResult<'_, Node<ResultType>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "result"))?;
        s.commit();
        let types = s.repeat(valtype)?;
        if types.is_empty() {
            return Err(s.fail("expected at least one value type"));
        }
        s.step(|i| literal(i, ")"))?;
        Ok(ResultType { types })
    })
}

pub fn functype(input: Input<'_>) -> PResult<'_, Node<FunctionType>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "func"))?;
        let params = s.repeat(param)?;
        let results = s.repeat(result_type)?;
        s.step(|i| literal(i, ")"))?;
        Ok(FunctionType { params, results })
    })
}

// ============================================================================
// LIMITS AND DESCRIPTORS
// ============================================================================

/// A `min max?` size range for memories and tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub min: Node<UInteger>,
    pub max: Option<Node<UInteger>>,
}

/// `valtype` or `(mut valtype)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalType {
    pub mutable: bool,
    pub valtype: Node<ValueType>,
}

/// The memory descriptor: its limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemType {
    pub limits: Node<Limits>,
}

/// The table descriptor: limits plus element reference type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableType {
    pub limits: Node<Limits>,
    pub reftype: Node<ReferenceType>,
}

pub fn limits(input: Input<'_>) -> PResult<'_, Node<Limits>> {
    sequence(input, |s| {
        let min = s.step(uinteger)?;
        let max = s.opt(uinteger)?;
        Ok(Limits { min, max })
    })
}

pub fn globaltype(input: Input<'_>) -> PResult<'_, Node<GlobalType>> {
    one_of(
        input,
        "a global type",
        &[
            &|i| {
                sequence(i, |s| {
                    s.step(|i| literal(i, "("))?;
                    s.step(|i| keyword(i, "mut"))?;
                    s.commit();
                    let valtype = s.step(valtype)?;
                    s.step(|i| literal(i, ")"))?;
                    Ok(GlobalType {
                        mutable: true,
                        valtype,
                    })
                })
            },
            &|i| {
                let (valtype, next) = valtype(i)?;
                let span = valtype.span;
                Ok((
                    Node::new(
                        GlobalType {
                            mutable: false,
                            valtype,
                        },
                        span,
                    ),
                    next,
                ))
            },
        ],
    )
}

pub fn memtype(input: Input<'_>) -> PResult<'_, Node<MemType>> {
    let (limits, next) = limits(input)?;
    let span = limits.span;
    Ok((Node::new(MemType { limits }, span), next))
}

pub fn tabletype(input: Input<'_>) -> PResult<'_, Node<TableType>> {
    sequence(input, |s| {
        let limits = s.step(limits)?;
        let reftype = s.step(reftype)?;
        Ok(TableType { limits, reftype })
    })
}
