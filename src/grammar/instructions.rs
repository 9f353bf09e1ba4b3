//! Instructions, in both surface syntaxes
//!
//! The linear form is flat keyword-then-operand text terminated by `end`;
//! the folded form expresses nesting with parentheses. Both share the plain
//! instruction rules. Mnemonic tables are matched with [`word`] so a whole
//! keyword run either names an instruction or softly fails, and each rule
//! commits as soon as its identifying mnemonic has matched.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ast::Node;
use crate::combinator::{
    literal, one_of, sequence, sequence_tight, Failure, Input, MapNode, PResult,
};
use crate::trivia::{keyword, word};

use super::fields::{typeuse, TypeUse};
use super::types::{result_type, ResultType, NUM_TYPES};
use super::values::{float, index, integer, uinteger, Float, Index, Integer, UInteger};

// ============================================================================
// NODE SHAPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Block(BlockInstruction),
    Loop(LoopInstruction),
    If(IfInstruction),
    Plain(PlainInstruction),
    Folded(FoldedInstruction),
}

/// `block label? blocktype instr* end id?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInstruction {
    pub label: Option<Node<Index>>,
    pub blocktype: Node<TypeUse>,
    pub body: Vec<Node<Instruction>>,
    pub end_id: Option<Node<Index>>,
}

/// `loop label? blocktype instr* end id?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopInstruction {
    pub label: Option<Node<Index>>,
    pub blocktype: Node<TypeUse>,
    pub body: Vec<Node<Instruction>>,
    pub end_id: Option<Node<Index>>,
}

/// `if label? blocktype instr* (else id? instr*)? end id?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfInstruction {
    pub label: Option<Node<Index>>,
    pub blocktype: Node<TypeUse>,
    pub then_body: Vec<Node<Instruction>>,
    pub else_id: Option<Node<Index>>,
    pub else_body: Option<Vec<Node<Instruction>>>,
    pub end_id: Option<Node<Index>>,
}

/// An operand of a plain control instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlArg {
    Index(Index),
    TypeUse(TypeUse),
}

/// An integer or float `const` operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Int(Integer),
    Float(Float),
}

/// `offset=n? align=n?` on memory access instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memarg {
    pub offset: Option<Node<UInteger>>,
    pub align: Option<Node<UInteger>>,
}

/// A flat keyword-then-operand instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlainInstruction {
    Control {
        op: String,
        args: Vec<Node<ControlArg>>,
    },
    Parametric {
        op: String,
        results: Vec<Node<ResultType>>,
    },
    Variable {
        op: String,
        index: Node<Index>,
    },
    NumericSimple {
        op: String,
    },
    NumericConst {
        op: String,
        value: Node<ConstValue>,
    },
    VectorSimple {
        op: String,
    },
    VectorLane {
        op: String,
        lane: Node<UInteger>,
    },
    VectorMemory {
        op: String,
        memarg: Node<Memarg>,
    },
    VectorConst {
        shape: String,
        values: Vec<Node<ConstValue>>,
    },
    Memory {
        op: String,
        memarg: Option<Node<Memarg>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FoldedInstruction {
    Plain {
        operator: Node<PlainInstruction>,
        operands: Vec<Node<FoldedInstruction>>,
    },
    If(FoldedIfInstruction),
    Block(FoldedBlockInstruction),
    Loop(FoldedLoopInstruction),
}

/// `(if (result ...)? cond* (then ...) (else ...)?)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldedIfInstruction {
    pub result: Option<Node<ResultType>>,
    pub condition: Vec<Node<Instruction>>,
    pub then_body: Vec<Node<Instruction>>,
    pub else_body: Option<Vec<Node<Instruction>>>,
}

/// `(block label? blocktype instr*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldedBlockInstruction {
    pub label: Option<Node<Index>>,
    pub blocktype: Node<TypeUse>,
    pub body: Vec<Node<Instruction>>,
}

/// `(loop label? blocktype instr*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldedLoopInstruction {
    pub label: Option<Node<Index>>,
    pub blocktype: Node<TypeUse>,
    pub body: Vec<Node<Instruction>>,
}

/// A bare instruction sequence, as used for constant initializers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub instructions: Vec<Node<Instruction>>,
}

// ============================================================================
// ENTRY RULES
// ============================================================================

pub fn instruction(input: Input<'_>) -> PResult<'_, Node<Instruction>> {
    one_of(
        input,
        "an instruction",
        &[
            &block_control,
            &|i| plain_instruction(i).map_node(Instruction::Plain),
            &|i| folded_instruction(i).map_node(Instruction::Folded),
        ],
    )
}

pub fn expression(input: Input<'_>) -> PResult<'_, Node<Expression>> {
    sequence(input, |s| {
        let instructions = s.repeat(instruction)?;
        Ok(Expression { instructions })
    })
}

// ============================================================================
// BLOCK CONTROL (LINEAR FORM)
// ============================================================================

fn block_control(input: Input<'_>) -> PResult<'_, Node<Instruction>> {
    one_of(
        input,
        "a structured instruction",
        &[
            &|i| if_instruction(i).map_node(Instruction::If),
            &|i| block_instruction(i).map_node(Instruction::Block),
            &|i| loop_instruction(i).map_node(Instruction::Loop),
        ],
    )
}

fn block_instruction(input: Input<'_>) -> PResult<'_, Node<BlockInstruction>> {
    sequence(input, |s| {
        s.step(|i| keyword(i, "block"))?;
        s.commit();
        let label = s.opt(index)?;
        let blocktype = s.step(typeuse)?;
        let body = s.repeat(instruction)?;
        s.step(|i| keyword(i, "end"))?;
        let end_id = s.opt(index)?;
        Ok(BlockInstruction {
            label,
            blocktype,
            body,
            end_id,
        })
    })
}

fn loop_instruction(input: Input<'_>) -> PResult<'_, Node<LoopInstruction>> {
    sequence(input, |s| {
        s.step(|i| keyword(i, "loop"))?;
        s.commit();
        let label = s.opt(index)?;
        let blocktype = s.step(typeuse)?;
        let body = s.repeat(instruction)?;
        s.step(|i| keyword(i, "end"))?;
        let end_id = s.opt(index)?;
        Ok(LoopInstruction {
            label,
            blocktype,
            body,
            end_id,
        })
    })
}

fn if_instruction(input: Input<'_>) -> PResult<'_, Node<IfInstruction>> {
    sequence(input, |s| {
        s.step(|i| keyword(i, "if"))?;
        s.commit();
        let label = s.opt(index)?;
        let blocktype = s.step(typeuse)?;
        let then_body = s.repeat(instruction)?;
        let has_else = s.opt(|i| keyword(i, "else"))?.is_some();
        let (else_id, else_body) = if has_else {
            (s.opt(index)?, Some(s.repeat(instruction)?))
        } else {
            (None, None)
        };
        s.step(|i| keyword(i, "end"))?;
        // Peek first: a plain `opt` would scan trivia ahead and capture
        // comments that belong to whatever follows the `end`.
        let end_id = if s.peek(index) { s.opt(index)? } else { None };
        Ok(IfInstruction {
            label,
            blocktype,
            then_body,
            else_id,
            else_body,
            end_id,
        })
    })
}

// ============================================================================
// PLAIN INSTRUCTIONS
// ============================================================================

static PLAIN_CONTROL_OPS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "unreachable",
        "nop",
        "br_if",
        "br_table",
        "br",
        "return",
        "call_indirect",
        "call",
    ]
    .into_iter()
    .collect()
});

static PARAMETRIC_OPS: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| ["drop", "select"].into_iter().collect());

static VAR_SCOPES: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| ["local", "global"].into_iter().collect());

static VAR_ACTIONS: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| ["get", "set", "tee"].into_iter().collect());

pub fn plain_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    one_of(
        input,
        "an instruction mnemonic",
        &[
            &control_instruction,
            &parametric_instruction,
            &variable_instruction,
            &numeric_instruction,
            &vector_instruction,
            &memory_instruction,
        ],
    )
}

fn control_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    sequence(input, |s| {
        let op = s
            .step(|i| word(i, "control instruction", &PLAIN_CONTROL_OPS))?
            .value
            .to_string();
        s.commit();
        let args = match op.as_str() {
            "br" | "br_if" | "call" => vec![s.step(index)?.map(ControlArg::Index)],
            "br_table" => s
                .repeat(index)?
                .into_iter()
                .map(|n| n.map(ControlArg::Index))
                .collect(),
            "call_indirect" => {
                let table = s.opt(index)?;
                let signature = s.step(typeuse)?;
                let mut args: Vec<Node<ControlArg>> =
                    table.into_iter().map(|n| n.map(ControlArg::Index)).collect();
                args.push(signature.map(ControlArg::TypeUse));
                args
            }
            _ => Vec::new(),
        };
        Ok(PlainInstruction::Control { op, args })
    })
}

fn parametric_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    sequence(input, |s| {
        let op = s
            .step(|i| word(i, "parametric instruction", &PARAMETRIC_OPS))?
            .value
            .to_string();
        let results = if op == "select" {
            s.repeat(result_type)?
        } else {
            Vec::new()
        };
        Ok(PlainInstruction::Parametric { op, results })
    })
}

fn variable_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        let scope = s.step(|i| word(i, "variable scope", &VAR_SCOPES))?;
        s.step(|i| literal(i, "."))?;
        let action = s.step(|i| word(i, "variable action", &VAR_ACTIONS))?;
        Ok(format!("{}.{}", scope.value, action.value))
    })
}

fn variable_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    sequence(input, |s| {
        let op = s.step(variable_op)?;
        s.commit();
        let target = s.step(index)?;
        Ok(PlainInstruction::Variable {
            op: s.absorb(op),
            index: target,
        })
    })
}

// ============================================================================
// NUMERIC INSTRUCTIONS
// ============================================================================

static NUMERIC_OPS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        // integer arithmetic and bit twiddling
        "clz", "ctz", "popcnt", "add", "sub", "mul", "div_s", "div_u", "rem_s", "rem_u", "and",
        "or", "xor", "shl", "shr_s", "shr_u", "rotl", "rotr",
        // comparisons
        "eqz", "eq", "ne", "lt_s", "lt_u", "gt_s", "gt_u", "le_s", "le_u", "ge_s", "ge_u", "lt",
        "gt", "le", "ge",
        // float arithmetic
        "abs", "neg", "ceil", "floor", "trunc", "nearest", "sqrt", "div", "min", "max", "copysign",
        // conversions
        "wrap_i64", "extend_i32_s", "extend_i32_u", "extend8_s", "extend16_s", "extend32_s",
        "trunc_f32_s", "trunc_f32_u", "trunc_f64_s", "trunc_f64_u", "trunc_sat_f32_s",
        "trunc_sat_f32_u", "trunc_sat_f64_s", "trunc_sat_f64_u", "convert_i32_s", "convert_i32_u",
        "convert_i64_s", "convert_i64_u", "demote_f64", "promote_f32", "reinterpret_i32",
        "reinterpret_i64", "reinterpret_f32", "reinterpret_f64",
    ]
    .into_iter()
    .collect()
});

fn numeric_simple_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        let ty = s.step(|i| word(i, "number type", &NUM_TYPES))?;
        s.step(|i| literal(i, "."))?;
        let op = s.step(|i| word(i, "numeric operation", &NUMERIC_OPS))?;
        Ok(format!("{}.{}", ty.value, op.value))
    })
}

fn numeric_const_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        let ty = s.step(|i| word(i, "number type", &NUM_TYPES))?;
        s.step(|i| literal(i, "."))?;
        s.step(|i| keyword(i, "const"))?;
        Ok(format!("{}.const", ty.value))
    })
}

fn numeric_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    one_of(
        input,
        "a numeric instruction",
        &[
            &|i| numeric_simple_op(i).map_node(|op| PlainInstruction::NumericSimple { op }),
            &numeric_const_instruction,
        ],
    )
}

fn numeric_const_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    sequence(input, |s| {
        let op_node = s.step(numeric_const_op)?;
        s.commit();
        let op = s.absorb(op_node);
        let value = if op.starts_with('i') {
            s.step(integer)?.map(ConstValue::Int)
        } else {
            s.step(float)?.map(ConstValue::Float)
        };
        Ok(PlainInstruction::NumericConst { op, value })
    })
}

// ============================================================================
// MEMORY INSTRUCTIONS
// ============================================================================

static MEM_WHOLE_OPS: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| ["grow", "size", "fill"].into_iter().collect());

static LOAD_STORE: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| ["load", "store"].into_iter().collect());

static MEM_INT_OPS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "load8_s", "load8_u", "load16_s", "load16_u", "load32_s", "load32_u", "store8", "store16",
        "store32",
    ]
    .into_iter()
    .collect()
});

fn memory_whole_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        s.step(|i| keyword(i, "memory"))?;
        s.step(|i| literal(i, "."))?;
        s.commit();
        let op = s.step(|i| word(i, "memory operation", &MEM_WHOLE_OPS))?;
        Ok(format!("memory.{}", op.value))
    })
}

fn memory_access_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        let ty = s.step(|i| word(i, "number type", &NUM_TYPES))?;
        s.step(|i| literal(i, "."))?;
        if let Some(whole) = s.opt(|i| word(i, "memory operation", &LOAD_STORE))? {
            return Ok(format!("{}.{}", ty.value, whole.value));
        }
        if !ty.value.starts_with('i') {
            return Err(s.fail("floating-point types have no partial-width memory access"));
        }
        let op = s.step(|i| word(i, "memory operation", &MEM_INT_OPS))?;
        Ok(format!("{}.{}", ty.value, op.value))
    })
}

fn memory_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    sequence(input, |s| {
        let op_node = s.step(|i| {
            one_of(
                i,
                "a memory instruction",
                &[&memory_whole_op, &memory_access_op],
            )
        })?;
        let op = s.absorb(op_node);
        let memarg = if op.contains("load") || op.contains("store") {
            Some(s.step(memarg)?)
        } else {
            None
        };
        Ok(PlainInstruction::Memory { op, memarg })
    })
}

fn memarg_offset(input: Input<'_>) -> PResult<'_, Node<UInteger>> {
    sequence_tight(input, |s| {
        s.step(|i| literal(i, "offset="))?;
        s.commit();
        let value = s.step(uinteger)?;
        Ok(value.value)
    })
}

fn memarg_align(input: Input<'_>) -> PResult<'_, Node<UInteger>> {
    sequence_tight(input, |s| {
        s.step(|i| literal(i, "align="))?;
        s.commit();
        let value = s.step(uinteger)?;
        Ok(value.value)
    })
}

pub fn memarg(input: Input<'_>) -> PResult<'_, Node<Memarg>> {
    sequence(input, |s| {
        let offset = s.opt(memarg_offset)?;
        let align = s.opt(memarg_align)?;
        Ok(Memarg { offset, align })
    })
}

// ============================================================================
// VECTOR INSTRUCTIONS
// ============================================================================

static SHAPES: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    ["i8x16", "i16x8", "i32x4", "i64x2", "f32x4", "f64x2"]
        .into_iter()
        .collect()
});

static VEC_SHAPED_OPS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "swizzle", "splat", "eq", "ne", "lt_s", "lt_u", "gt_s", "gt_u", "abs", "neg", "all_true",
        "bitmask", "narrow_i16x8_s", "narrow_i16x8_u", "shl", "shr_s", "shr_u", "add",
        "add_sat_s", "add_sat_u", "sub", "sub_sat_s", "sub_sat_u", "min_s", "min_u", "max_s",
        "max_u", "avgr_u", "popcnt", "mul", "div", "min", "max", "sqrt",
    ]
    .into_iter()
    .collect()
});

static VEC_WHOLE_OPS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    ["not", "and", "andnot", "or", "xor", "bitselect", "any_true"]
        .into_iter()
        .collect()
});

static VEC_LANE_OPS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "extract_lane_s",
        "extract_lane_u",
        "replace_lane",
        "extract_lane",
    ]
    .into_iter()
    .collect()
});

fn vector_shaped_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        let shape = s.step(|i| word(i, "vector shape", &SHAPES))?;
        s.step(|i| literal(i, "."))?;
        let op = s.step(|i| word(i, "vector operation", &VEC_SHAPED_OPS))?;
        Ok(format!("{}.{}", shape.value, op.value))
    })
}

fn vector_whole_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        s.step(|i| keyword(i, "v128"))?;
        s.step(|i| literal(i, "."))?;
        let op = s.step(|i| word(i, "vector operation", &VEC_WHOLE_OPS))?;
        Ok(format!("v128.{}", op.value))
    })
}

fn vector_simple_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    let (op, next) = one_of(
        input,
        "a vector instruction",
        &[&vector_shaped_op, &vector_whole_op],
    )?;
    Ok((op.map(|op| PlainInstruction::VectorSimple { op }), next))
}

fn vector_lane_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        let shape = s.step(|i| word(i, "vector shape", &SHAPES))?;
        s.step(|i| literal(i, "."))?;
        let op = s.step(|i| word(i, "lane operation", &VEC_LANE_OPS))?;
        Ok(format!("{}.{}", shape.value, op.value))
    })
}

fn vector_lane_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    sequence(input, |s| {
        let op = s.step(vector_lane_op)?;
        s.commit();
        let lane = s.step(uinteger)?;
        Ok(PlainInstruction::VectorLane {
            op: s.absorb(op),
            lane,
        })
    })
}

fn vector_memory_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        s.step(|i| keyword(i, "v128"))?;
        s.step(|i| literal(i, "."))?;
        let op = s.step(|i| word(i, "memory operation", &LOAD_STORE))?;
        Ok(format!("v128.{}", op.value))
    })
}

fn vector_memory_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    sequence(input, |s| {
        let op = s.step(vector_memory_op)?;
        let memarg = s.step(memarg)?;
        Ok(PlainInstruction::VectorMemory {
            op: s.absorb(op),
            memarg,
        })
    })
}

fn vector_const_op(input: Input<'_>) -> PResult<'_, Node<String>> {
    sequence_tight(input, |s| {
        s.step(|i| keyword(i, "v128"))?;
        s.step(|i| literal(i, "."))?;
        s.step(|i| keyword(i, "const"))?;
        Ok("v128.const".to_string())
    })
}

fn vector_const_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    sequence(input, |s| {
        s.step(vector_const_op)?;
        s.commit();
        let shape = s
            .step(|i| word(i, "vector shape", &SHAPES))?
            .value
            .to_string();
        let values = if shape.starts_with('i') {
            s.repeat(|i| integer(i).map_node(ConstValue::Int))?
        } else {
            s.repeat(|i| float(i).map_node(ConstValue::Float))?
        };
        Ok(PlainInstruction::VectorConst { shape, values })
    })
}

fn vector_instruction(input: Input<'_>) -> PResult<'_, Node<PlainInstruction>> {
    one_of(
        input,
        "a vector instruction",
        &[
            &vector_simple_instruction,
            &vector_lane_instruction,
            &vector_memory_instruction,
            &vector_const_instruction,
        ],
    )
}

// ============================================================================
// FOLDED INSTRUCTIONS
// ============================================================================

pub fn folded_instruction(input: Input<'_>) -> PResult<'_, Node<FoldedInstruction>> {
    // Folded forms always open with a parenthesis; checking it up front
    // keeps the error at the right offset instead of inside an alternative.
    if !input.rest().starts_with('(') {
        return Err(Failure::soft(input.offset(), "expected `(`"));
    }
    one_of(
        input,
        "a folded instruction",
        &[
            &|i| folded_if(i).map_node(FoldedInstruction::If),
            &|i| folded_block(i).map_node(FoldedInstruction::Block),
            &|i| folded_loop(i).map_node(FoldedInstruction::Loop),
            &folded_plain,
        ],
    )
}

fn folded_if(input: Input<'_>) -> PResult<'_, Node<FoldedIfInstruction>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "if"))?;
        s.commit();
        let result = s.opt(result_type)?;
        let condition = s.repeat(instruction)?;
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "then"))?;
        let then_body = s.repeat(instruction)?;
        s.step(|i| literal(i, ")"))?;
        let else_clause = s.opt(folded_else)?;
        let else_body = else_clause.map(|n| s.absorb(n));
        s.step(|i| literal(i, ")"))?;
        Ok(FoldedIfInstruction {
            result,
            condition,
            then_body,
            else_body,
        })
    })
}

fn folded_else(input: Input<'_>) -> PResult<'_, Node<Vec<Node<Instruction>>>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "else"))?;
        s.commit();
        let body = s.repeat(instruction)?;
        s.step(|i| literal(i, ")"))?;
        Ok(body)
    })
}

fn folded_block(input: Input<'_>) -> PResult<'_, Node<FoldedBlockInstruction>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "block"))?;
        s.commit();
        let label = s.opt(index)?;
        let blocktype = s.step(typeuse)?;
        let body = s.repeat(instruction)?;
        s.step(|i| literal(i, ")"))?;
        Ok(FoldedBlockInstruction {
            label,
            blocktype,
            body,
        })
    })
}

fn folded_loop(input: Input<'_>) -> PResult<'_, Node<FoldedLoopInstruction>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "loop"))?;
        s.commit();
        let label = s.opt(index)?;
        let blocktype = s.step(typeuse)?;
        let body = s.repeat(instruction)?;
        s.step(|i| literal(i, ")"))?;
        Ok(FoldedLoopInstruction {
            label,
            blocktype,
            body,
        })
    })
}

fn folded_plain(input: Input<'_>) -> PResult<'_, Node<FoldedInstruction>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        let operator = s.step(plain_instruction)?;
        let operands = s.repeat(folded_instruction)?;
        s.step(|i| literal(i, ")"))?;
        Ok(FoldedInstruction::Plain { operator, operands })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(source: &str) -> Input<'_> {
        Input::new(source)
    }

    fn parse_instruction(source: &str) -> Node<Instruction> {
        let (node, next) = instruction(at(source)).unwrap();
        assert!(next.at_end(), "did not consume all of {source:?}");
        node
    }

    #[test]
    fn variable_instruction_reads_its_index() {
        let node = parse_instruction("local.get 0");
        match node.value {
            Instruction::Plain(PlainInstruction::Variable { op, index }) => {
                assert_eq!(op, "local.get");
                assert_eq!(index.value, Index::Numeric(0));
            }
            other => panic!("expected variable instruction, got {other:?}"),
        }
    }

    #[test]
    fn variable_instruction_without_index_is_exclusive() {
        let failure = instruction(at("local.get")).unwrap_err();
        assert!(failure.is_exclusive());
    }

    #[test]
    fn numeric_const_dispatches_on_type() {
        match parse_instruction("i32.const -5").value {
            Instruction::Plain(PlainInstruction::NumericConst { op, value }) => {
                assert_eq!(op, "i32.const");
                assert!(matches!(value.value, ConstValue::Int(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse_instruction("f64.const 1.5").value {
            Instruction::Plain(PlainInstruction::NumericConst { op, value }) => {
                assert_eq!(op, "f64.const");
                assert!(matches!(value.value, ConstValue::Float(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn memory_access_takes_a_memarg() {
        match parse_instruction("i32.load offset=4 align=2").value {
            Instruction::Plain(PlainInstruction::Memory { op, memarg }) => {
                assert_eq!(op, "i32.load");
                let memarg = memarg.unwrap();
                assert_eq!(memarg.value.offset.unwrap().value.value, 4);
                assert_eq!(memarg.value.align.unwrap().value.value, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partial_width_access_requires_an_integer_type() {
        assert!(instruction(at("i64.load32_u")).is_ok());
        assert!(instruction(at("f32.load8_s")).is_err());
    }

    #[test]
    fn block_runs_to_its_end_keyword() {
        match parse_instruction("block $l (result i32) i32.const 1 end $l").value {
            Instruction::Block(block) => {
                assert_eq!(block.label.unwrap().value, Index::Named("$l".to_string()));
                assert_eq!(block.body.len(), 1);
                assert_eq!(block.end_id.unwrap().value, Index::Named("$l".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn linear_if_with_else_arm() {
        match parse_instruction("if (result i32) i32.const 1 else i32.const 2 end").value {
            Instruction::If(node) => {
                assert_eq!(node.then_body.len(), 1);
                assert_eq!(node.else_body.unwrap().len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn folded_plain_nests_operands() {
        match parse_instruction("(i32.add (local.get 0) (i32.const 1))").value {
            Instruction::Folded(FoldedInstruction::Plain { operator, operands }) => {
                assert!(matches!(
                    operator.value,
                    PlainInstruction::NumericSimple { .. }
                ));
                assert_eq!(operands.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn folded_if_with_then_and_else() {
        let source = "(if (result i32) (local.get 0) (then (i32.const 1)) (else (i32.const 0)))";
        match parse_instruction(source).value {
            Instruction::Folded(FoldedInstruction::If(node)) => {
                assert!(node.result.is_some());
                assert_eq!(node.condition.len(), 1);
                assert_eq!(node.then_body.len(), 1);
                assert_eq!(node.else_body.unwrap().len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn vector_const_reads_shaped_operands() {
        match parse_instruction("v128.const i32x4 1 2 3 4").value {
            Instruction::Plain(PlainInstruction::VectorConst { shape, values }) => {
                assert_eq!(shape, "i32x4");
                assert_eq!(values.len(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_mnemonic_fails_softly() {
        let failure = instruction(at("frobnicate 1")).unwrap_err();
        assert!(!failure.is_exclusive());
    }
}
