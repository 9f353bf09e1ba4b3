//! Module-level fields
//!
//! Each field is a parenthesized form opening with its identifying keyword;
//! the rules commit right after that keyword, so malformed content inside a
//! recognized field is reported as that field's error rather than making the
//! field look absent.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ast::Node;
use crate::combinator::{literal, one_of, sequence, Input, MapNode, PResult};
use crate::trivia::{keyword, word};

use super::instructions::{expression, folded_instruction, instruction, Expression, Instruction};
use super::types::{
    functype, globaltype, memtype, param, reftype, result_type, tabletype, valtype, FunctionType,
    GlobalType, MemType, Param, ReferenceType, ResultType, TableType, ValueType,
};
use super::values::{identifier, index, string, Identifier, Index, StringLiteral};

// ============================================================================
// TYPE USE
// ============================================================================

/// A reference to a function signature: `(type idx)? (param ...)* (result ...)*`.
/// Any of the three parts may be absent, so the whole rule can succeed
/// without consuming input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeUse {
    pub type_index: Option<Node<Index>>,
    pub params: Vec<Node<Param>>,
    pub results: Vec<Node<ResultType>>,
}

fn type_use_index(input: Input<'_>) -> PResult<'_, Node<Index>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "type"))?;
        s.commit();
        let target = s.step(index)?;
        s.step(|i| literal(i, ")"))?;
        Ok(s.absorb(target))
    })
}

pub fn typeuse(input: Input<'_>) -> PResult<'_, Node<TypeUse>> {
    sequence(input, |s| {
        let type_index = s.opt(type_use_index)?;
        let params = s.repeat(param)?;
        let results = s.repeat(result_type)?;
        Ok(TypeUse {
            type_index,
            params,
            results,
        })
    })
}

// ============================================================================
// FIELD SHAPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModuleField {
    Type(TypeDef),
    Import(Import),
    Func(Function),
    Table(Table),
    Memory(MemoryField),
    Global(Global),
    Export(Export),
    Elem(ElementSegment),
    Data(DataSegment),
}

/// `(type $id? (func ...))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub id: Option<Node<Identifier>>,
    pub functype: Node<FunctionType>,
}

/// `(import "module" "name" desc)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub module: Node<StringLiteral>,
    pub name: Node<StringLiteral>,
    pub desc: Node<ImportDesc>,
}

/// What an import binds: a function signature or a table/memory/global
/// descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportDesc {
    Func {
        id: Option<Node<Identifier>>,
        signature: Node<TypeUse>,
    },
    Table {
        id: Option<Node<Identifier>>,
        tabletype: Node<TableType>,
    },
    Memory {
        id: Option<Node<Identifier>>,
        memtype: Node<MemType>,
    },
    Global {
        id: Option<Node<Identifier>>,
        globaltype: Node<GlobalType>,
    },
}

/// `(export "name")` attached inside a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineExport {
    pub name: Node<StringLiteral>,
}

/// `(func $id? (export ...)? typeuse (local ...)* instr*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub id: Option<Node<Identifier>>,
    pub export: Option<Node<InlineExport>>,
    pub signature: Node<TypeUse>,
    pub locals: Vec<Node<Local>>,
    pub body: Vec<Node<Instruction>>,
}

/// `(local $id? valtype*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Local {
    pub id: Option<Node<Identifier>>,
    pub types: Vec<Node<ValueType>>,
}

/// `(table $id? (export ...)? ...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: Option<Node<Identifier>>,
    pub export: Option<Node<InlineExport>>,
    pub kind: Node<TableKind>,
}

/// Either an explicit table type or the inline-element abbreviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableKind {
    Sized(Node<TableType>),
    Inline {
        reftype: Node<ReferenceType>,
        elements: Vec<Node<Index>>,
    },
}

/// `(memory $id? (export ...)? limits)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryField {
    pub id: Option<Node<Identifier>>,
    pub export: Option<Node<InlineExport>>,
    pub memtype: Node<MemType>,
}

/// `(global $id? globaltype instr*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub id: Option<Node<Identifier>>,
    pub globaltype: Node<GlobalType>,
    pub init: Vec<Node<Instruction>>,
}

/// `(export "name" (kind idx))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub name: Node<StringLiteral>,
    pub desc: Node<ExportDesc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDesc {
    pub kind: String,
    pub index: Node<Index>,
}

/// `(elem $id? declare? (table idx)? offset? func? idx*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSegment {
    pub id: Option<Node<Identifier>>,
    pub declare: bool,
    pub table: Option<Node<Index>>,
    pub offset: Option<Node<Expression>>,
    pub func_keyword: bool,
    pub items: Vec<Node<Index>>,
}

/// `(data $id? (memory idx)? offset? "init"*)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSegment {
    pub id: Option<Node<Identifier>>,
    pub memory: Option<Node<Index>>,
    pub offset: Option<Node<Expression>>,
    pub inits: Vec<Node<StringLiteral>>,
}

// ============================================================================
// FIELD RULES
// ============================================================================

pub fn module_field(input: Input<'_>) -> PResult<'_, Node<ModuleField>> {
    one_of(
        input,
        "a module field",
        &[
            &|i| type_def(i).map_node(ModuleField::Type),
            &|i| import(i).map_node(ModuleField::Import),
            &|i| function(i).map_node(ModuleField::Func),
            &|i| table(i).map_node(ModuleField::Table),
            &|i| memory_field(i).map_node(ModuleField::Memory),
            &|i| global(i).map_node(ModuleField::Global),
            &|i| export(i).map_node(ModuleField::Export),
            &|i| element_segment(i).map_node(ModuleField::Elem),
            &|i| data_segment(i).map_node(ModuleField::Data),
        ],
    )
}

pub fn type_def(input: Input<'_>) -> PResult<'_, Node<TypeDef>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "type"))?;
        s.commit();
        let id = s.opt(identifier)?;
        let functype = s.step(functype)?;
        s.step(|i| literal(i, ")"))?;
        Ok(TypeDef { id, functype })
    })
}

pub fn import(input: Input<'_>) -> PResult<'_, Node<Import>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "import"))?;
        s.commit();
        let module = s.step(string)?;
        let name = s.step(string)?;
        let desc = s.step(import_desc)?;
        s.step(|i| literal(i, ")"))?;
        Ok(Import { module, name, desc })
    })
}

pub fn import_desc(input: Input<'_>) -> PResult<'_, Node<ImportDesc>> {
    one_of(
        input,
        "an import descriptor",
        &[
            &|i| {
                sequence(i, |s| {
                    s.step(|l| literal(l, "("))?;
                    s.step(|l| keyword(l, "func"))?;
                    s.commit();
                    let id = s.opt(identifier)?;
                    let signature = s.step(typeuse)?;
                    s.step(|l| literal(l, ")"))?;
                    Ok(ImportDesc::Func { id, signature })
                })
            },
            &|i| {
                sequence(i, |s| {
                    s.step(|l| literal(l, "("))?;
                    s.step(|l| keyword(l, "table"))?;
                    s.commit();
                    let id = s.opt(identifier)?;
                    let tabletype = s.step(tabletype)?;
                    s.step(|l| literal(l, ")"))?;
                    Ok(ImportDesc::Table { id, tabletype })
                })
            },
            &|i| {
                sequence(i, |s| {
                    s.step(|l| literal(l, "("))?;
                    s.step(|l| keyword(l, "memory"))?;
                    s.commit();
                    let id = s.opt(identifier)?;
                    let memtype = s.step(memtype)?;
                    s.step(|l| literal(l, ")"))?;
                    Ok(ImportDesc::Memory { id, memtype })
                })
            },
            &|i| {
                sequence(i, |s| {
                    s.step(|l| literal(l, "("))?;
                    s.step(|l| keyword(l, "global"))?;
                    s.commit();
                    let id = s.opt(identifier)?;
                    let globaltype = s.step(globaltype)?;
                    s.step(|l| literal(l, ")"))?;
                    Ok(ImportDesc::Global { id, globaltype })
                })
            },
        ],
    )
}

pub fn inline_export(input: Input<'_>) -> PResult<'_, Node<InlineExport>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "export"))?;
        s.commit();
        let name = s.step(string)?;
        s.step(|i| literal(i, ")"))?;
        Ok(InlineExport { name })
    })
}

pub fn function(input: Input<'_>) -> PResult<'_, Node<Function>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "func"))?;
        s.commit();
        let id = s.opt(identifier)?;
        let export = s.opt(inline_export)?;
        let signature = s.step(typeuse)?;
        let locals = s.repeat(local)?;
        let body = s.repeat(instruction)?;
        s.step(|i| literal(i, ")"))?;
        Ok(Function {
            id,
            export,
            signature,
            locals,
            body,
        })
    })
}

pub fn local(input: Input<'_>) -> PResult<'_, Node<Local>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "local"))?;
        // `(local.get 0)` in folded form also starts with this keyword run;
        // only commit to a declaration when no mnemonic dot follows.
        if s.position().rest().starts_with('.') {
            return Err(s.fail("expected a local declaration"));
        }
        s.commit();
        let id = s.opt(identifier)?;
        let types = s.repeat(valtype)?;
        s.step(|i| literal(i, ")"))?;
        Ok(Local { id, types })
    })
}

fn table_kind(input: Input<'_>) -> PResult<'_, Node<TableKind>> {
    one_of(
        input,
        "a table description",
        &[
            &|i| {
                let (tabletype, next) = tabletype(i)?;
                let span = tabletype.span;
                Ok((Node::new(TableKind::Sized(tabletype), span), next))
            },
            &|i| {
                sequence(i, |s| {
                    let reftype = s.step(reftype)?;
                    s.step(|l| literal(l, "("))?;
                    s.step(|l| keyword(l, "elem"))?;
                    s.commit();
                    let elements = s.repeat(index)?;
                    s.step(|l| literal(l, ")"))?;
                    Ok(TableKind::Inline { reftype, elements })
                })
            },
        ],
    )
}

pub fn table(input: Input<'_>) -> PResult<'_, Node<Table>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "table"))?;
        s.commit();
        let id = s.opt(identifier)?;
        let export = s.opt(inline_export)?;
        let kind = s.step(table_kind)?;
        s.step(|i| literal(i, ")"))?;
        Ok(Table { id, export, kind })
    })
}

pub fn memory_field(input: Input<'_>) -> PResult<'_, Node<MemoryField>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "memory"))?;
        s.commit();
        let id = s.opt(identifier)?;
        let export = s.opt(inline_export)?;
        let memtype = s.step(memtype)?;
        s.step(|i| literal(i, ")"))?;
        Ok(MemoryField {
            id,
            export,
            memtype,
        })
    })
}

pub fn global(input: Input<'_>) -> PResult<'_, Node<Global>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "global"))?;
        s.commit();
        let id = s.opt(identifier)?;
        let globaltype = s.step(globaltype)?;
        let init = s.repeat(instruction)?;
        s.step(|i| literal(i, ")"))?;
        Ok(Global {
            id,
            globaltype,
            init,
        })
    })
}

static EXPORT_KINDS: Lazy<BTreeSet<&'static str>> =
    Lazy::new(|| ["func", "table", "memory", "global"].into_iter().collect());

fn export_desc(input: Input<'_>) -> PResult<'_, Node<ExportDesc>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        let kind = s
            .step(|i| word(i, "export kind", &EXPORT_KINDS))?
            .value
            .to_string();
        s.commit();
        let target = s.step(index)?;
        s.step(|i| literal(i, ")"))?;
        Ok(ExportDesc {
            kind,
            index: target,
        })
    })
}

pub fn export(input: Input<'_>) -> PResult<'_, Node<Export>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "export"))?;
        s.commit();
        let name = s.step(string)?;
        let desc = s.step(export_desc)?;
        s.step(|i| literal(i, ")"))?;
        Ok(Export { name, desc })
    })
}

fn table_use(input: Input<'_>) -> PResult<'_, Node<Index>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "table"))?;
        s.commit();
        let target = s.step(index)?;
        s.step(|i| literal(i, ")"))?;
        Ok(s.absorb(target))
    })
}

fn mem_use(input: Input<'_>) -> PResult<'_, Node<Index>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "memory"))?;
        s.commit();
        let target = s.step(index)?;
        s.step(|i| literal(i, ")"))?;
        Ok(s.absorb(target))
    })
}

/// `(offset instr*)`, or a single folded instruction as its abbreviation.
fn offset_expr(input: Input<'_>) -> PResult<'_, Node<Expression>> {
    one_of(
        input,
        "an offset expression",
        &[
            &|i| {
                sequence(i, |s| {
                    s.step(|l| literal(l, "("))?;
                    s.step(|l| keyword(l, "offset"))?;
                    s.commit();
                    let body = s.step(expression)?;
                    s.step(|l| literal(l, ")"))?;
                    Ok(s.absorb(body))
                })
            },
            &|i| {
                let (instr, next) = folded_instruction(i)?;
                let span = instr.span;
                let node = Node::new(
                    Expression {
                        instructions: vec![instr.map(Instruction::Folded)],
                    },
                    span,
                );
                Ok((node, next))
            },
        ],
    )
}

pub fn element_segment(input: Input<'_>) -> PResult<'_, Node<ElementSegment>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "elem"))?;
        s.commit();
        let id = s.opt(identifier)?;
        let declare = s.opt(|i| keyword(i, "declare"))?.is_some();
        let table = s.opt(table_use)?;
        let offset = s.opt(offset_expr)?;
        let func_keyword = s.opt(|i| keyword(i, "func"))?.is_some();
        let items = s.repeat(index)?;
        s.step(|i| literal(i, ")"))?;
        Ok(ElementSegment {
            id,
            declare,
            table,
            offset,
            func_keyword,
            items,
        })
    })
}

pub fn data_segment(input: Input<'_>) -> PResult<'_, Node<DataSegment>> {
    sequence(input, |s| {
        s.step(|i| literal(i, "("))?;
        s.step(|i| keyword(i, "data"))?;
        s.commit();
        let id = s.opt(identifier)?;
        let memory = s.opt(mem_use)?;
        let offset = s.opt(offset_expr)?;
        let inits = s.repeat(string)?;
        s.step(|i| literal(i, ")"))?;
        Ok(DataSegment {
            id,
            memory,
            offset,
            inits,
        })
    })
}
