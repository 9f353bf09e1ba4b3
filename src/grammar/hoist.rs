//! Per-shape traversal for the comment-hoisting rewrite
//!
//! One explicit impl per payload shape, so adding a grammar node without
//! deciding what happens to its comments is a compile error, not a silently
//! reflective walk.

use crate::ast::{hoist_all, hoist_opt, Comment, HoistChildren, Node};

use super::fields::{
    DataSegment, ElementSegment, Export, ExportDesc, Function, Global, Import, ImportDesc,
    InlineExport, Local, MemoryField, ModuleField, Table, TableKind, TypeDef, TypeUse,
};
use super::instructions::{
    BlockInstruction, ConstValue, ControlArg, Expression, FoldedBlockInstruction,
    FoldedIfInstruction, FoldedInstruction, FoldedLoopInstruction, IfInstruction, Instruction,
    LoopInstruction, Memarg, PlainInstruction,
};
use super::types::{
    FunctionType, GlobalType, Limits, MemType, NumberType, Param, ReferenceType, ResultType,
    TableType, ValueType, VectorType,
};
use super::values::{Float, Identifier, Index, Integer, SInteger, StringLiteral, UInteger};
use super::{Module, ProgramItem};

macro_rules! hoist_leaves {
    ($($shape:ty),* $(,)?) => {$(
        impl HoistChildren for $shape {
            fn hoist_children(self, _sink: &mut Vec<Node<Comment>>) -> Self {
                self
            }
        }
    )*};
}

hoist_leaves!(
    Identifier,
    UInteger,
    SInteger,
    Integer,
    Float,
    StringLiteral,
    Index,
    NumberType,
    VectorType,
    ReferenceType,
    ValueType,
    ConstValue,
);

// ---------------------------------------------------------------------------
// types
// ---------------------------------------------------------------------------

impl HoistChildren for Param {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            types: hoist_all(self.types, sink),
        }
    }
}

impl HoistChildren for ResultType {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            types: hoist_all(self.types, sink),
        }
    }
}

impl HoistChildren for FunctionType {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            params: hoist_all(self.params, sink),
            results: hoist_all(self.results, sink),
        }
    }
}

impl HoistChildren for Limits {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            min: self.min.hoist(sink),
            max: hoist_opt(self.max, sink),
        }
    }
}

impl HoistChildren for GlobalType {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            mutable: self.mutable,
            valtype: self.valtype.hoist(sink),
        }
    }
}

impl HoistChildren for MemType {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            limits: self.limits.hoist(sink),
        }
    }
}

impl HoistChildren for TableType {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            limits: self.limits.hoist(sink),
            reftype: self.reftype.hoist(sink),
        }
    }
}

// ---------------------------------------------------------------------------
// instructions
// ---------------------------------------------------------------------------

impl HoistChildren for Instruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        match self {
            Self::Block(inner) => Self::Block(inner.hoist_children(sink)),
            Self::Loop(inner) => Self::Loop(inner.hoist_children(sink)),
            Self::If(inner) => Self::If(inner.hoist_children(sink)),
            Self::Plain(inner) => Self::Plain(inner.hoist_children(sink)),
            Self::Folded(inner) => Self::Folded(inner.hoist_children(sink)),
        }
    }
}

impl HoistChildren for BlockInstruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            label: hoist_opt(self.label, sink),
            blocktype: self.blocktype.hoist(sink),
            body: hoist_all(self.body, sink),
            end_id: hoist_opt(self.end_id, sink),
        }
    }
}

impl HoistChildren for LoopInstruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            label: hoist_opt(self.label, sink),
            blocktype: self.blocktype.hoist(sink),
            body: hoist_all(self.body, sink),
            end_id: hoist_opt(self.end_id, sink),
        }
    }
}

impl HoistChildren for IfInstruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            label: hoist_opt(self.label, sink),
            blocktype: self.blocktype.hoist(sink),
            then_body: hoist_all(self.then_body, sink),
            else_id: hoist_opt(self.else_id, sink),
            else_body: self.else_body.map(|body| hoist_all(body, sink)),
            end_id: hoist_opt(self.end_id, sink),
        }
    }
}

impl HoistChildren for PlainInstruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        match self {
            Self::Control { op, args } => Self::Control {
                op,
                args: hoist_all(args, sink),
            },
            Self::Parametric { op, results } => Self::Parametric {
                op,
                results: hoist_all(results, sink),
            },
            Self::Variable { op, index } => Self::Variable {
                op,
                index: index.hoist(sink),
            },
            Self::NumericSimple { op } => Self::NumericSimple { op },
            Self::NumericConst { op, value } => Self::NumericConst {
                op,
                value: value.hoist(sink),
            },
            Self::VectorSimple { op } => Self::VectorSimple { op },
            Self::VectorLane { op, lane } => Self::VectorLane {
                op,
                lane: lane.hoist(sink),
            },
            Self::VectorMemory { op, memarg } => Self::VectorMemory {
                op,
                memarg: memarg.hoist(sink),
            },
            Self::VectorConst { shape, values } => Self::VectorConst {
                shape,
                values: hoist_all(values, sink),
            },
            Self::Memory { op, memarg } => Self::Memory {
                op,
                memarg: hoist_opt(memarg, sink),
            },
        }
    }
}

impl HoistChildren for ControlArg {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        match self {
            Self::Index(index) => Self::Index(index),
            Self::TypeUse(typeuse) => Self::TypeUse(typeuse.hoist_children(sink)),
        }
    }
}

impl HoistChildren for Memarg {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            offset: hoist_opt(self.offset, sink),
            align: hoist_opt(self.align, sink),
        }
    }
}

impl HoistChildren for FoldedInstruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        match self {
            Self::Plain { operator, operands } => Self::Plain {
                operator: operator.hoist(sink),
                operands: hoist_all(operands, sink),
            },
            Self::If(inner) => Self::If(inner.hoist_children(sink)),
            Self::Block(inner) => Self::Block(inner.hoist_children(sink)),
            Self::Loop(inner) => Self::Loop(inner.hoist_children(sink)),
        }
    }
}

impl HoistChildren for FoldedIfInstruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            result: hoist_opt(self.result, sink),
            condition: hoist_all(self.condition, sink),
            then_body: hoist_all(self.then_body, sink),
            else_body: self.else_body.map(|body| hoist_all(body, sink)),
        }
    }
}

impl HoistChildren for FoldedBlockInstruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            label: hoist_opt(self.label, sink),
            blocktype: self.blocktype.hoist(sink),
            body: hoist_all(self.body, sink),
        }
    }
}

impl HoistChildren for FoldedLoopInstruction {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            label: hoist_opt(self.label, sink),
            blocktype: self.blocktype.hoist(sink),
            body: hoist_all(self.body, sink),
        }
    }
}

impl HoistChildren for Expression {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            instructions: hoist_all(self.instructions, sink),
        }
    }
}

// ---------------------------------------------------------------------------
// fields
// ---------------------------------------------------------------------------

impl HoistChildren for TypeUse {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            type_index: hoist_opt(self.type_index, sink),
            params: hoist_all(self.params, sink),
            results: hoist_all(self.results, sink),
        }
    }
}

impl HoistChildren for ModuleField {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        match self {
            Self::Type(inner) => Self::Type(inner.hoist_children(sink)),
            Self::Import(inner) => Self::Import(inner.hoist_children(sink)),
            Self::Func(inner) => Self::Func(inner.hoist_children(sink)),
            Self::Table(inner) => Self::Table(inner.hoist_children(sink)),
            Self::Memory(inner) => Self::Memory(inner.hoist_children(sink)),
            Self::Global(inner) => Self::Global(inner.hoist_children(sink)),
            Self::Export(inner) => Self::Export(inner.hoist_children(sink)),
            Self::Elem(inner) => Self::Elem(inner.hoist_children(sink)),
            Self::Data(inner) => Self::Data(inner.hoist_children(sink)),
        }
    }
}

impl HoistChildren for TypeDef {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            functype: self.functype.hoist(sink),
        }
    }
}

impl HoistChildren for Import {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            module: self.module.hoist(sink),
            name: self.name.hoist(sink),
            desc: self.desc.hoist(sink),
        }
    }
}

impl HoistChildren for ImportDesc {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        match self {
            Self::Func { id, signature } => Self::Func {
                id: hoist_opt(id, sink),
                signature: signature.hoist(sink),
            },
            Self::Table { id, tabletype } => Self::Table {
                id: hoist_opt(id, sink),
                tabletype: tabletype.hoist(sink),
            },
            Self::Memory { id, memtype } => Self::Memory {
                id: hoist_opt(id, sink),
                memtype: memtype.hoist(sink),
            },
            Self::Global { id, globaltype } => Self::Global {
                id: hoist_opt(id, sink),
                globaltype: globaltype.hoist(sink),
            },
        }
    }
}

impl HoistChildren for InlineExport {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            name: self.name.hoist(sink),
        }
    }
}

impl HoistChildren for Function {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            export: hoist_opt(self.export, sink),
            signature: self.signature.hoist(sink),
            locals: hoist_all(self.locals, sink),
            body: hoist_all(self.body, sink),
        }
    }
}

impl HoistChildren for Local {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            types: hoist_all(self.types, sink),
        }
    }
}

impl HoistChildren for Table {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            export: hoist_opt(self.export, sink),
            kind: self.kind.hoist(sink),
        }
    }
}

impl HoistChildren for TableKind {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        match self {
            Self::Sized(tabletype) => Self::Sized(tabletype.hoist(sink)),
            Self::Inline { reftype, elements } => Self::Inline {
                reftype: reftype.hoist(sink),
                elements: hoist_all(elements, sink),
            },
        }
    }
}

impl HoistChildren for MemoryField {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            export: hoist_opt(self.export, sink),
            memtype: self.memtype.hoist(sink),
        }
    }
}

impl HoistChildren for Global {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            globaltype: self.globaltype.hoist(sink),
            init: hoist_all(self.init, sink),
        }
    }
}

impl HoistChildren for Export {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            name: self.name.hoist(sink),
            desc: self.desc.hoist(sink),
        }
    }
}

impl HoistChildren for ExportDesc {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            kind: self.kind,
            index: self.index.hoist(sink),
        }
    }
}

impl HoistChildren for ElementSegment {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            declare: self.declare,
            table: hoist_opt(self.table, sink),
            offset: hoist_opt(self.offset, sink),
            func_keyword: self.func_keyword,
            items: hoist_all(self.items, sink),
        }
    }
}

impl HoistChildren for DataSegment {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            memory: hoist_opt(self.memory, sink),
            offset: hoist_opt(self.offset, sink),
            inits: hoist_all(self.inits, sink),
        }
    }
}

// ---------------------------------------------------------------------------
// document
// ---------------------------------------------------------------------------

impl HoistChildren for ProgramItem {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        match self {
            Self::Module(inner) => Self::Module(inner.hoist_children(sink)),
            Self::Unknown(inner) => Self::Unknown(inner.hoist_children(sink)),
        }
    }
}

impl HoistChildren for Module {
    fn hoist_children(self, sink: &mut Vec<Node<Comment>>) -> Self {
        Self {
            id: hoist_opt(self.id, sink),
            fields: hoist_all(self.fields, sink),
            skipped: hoist_opt(self.skipped, sink),
        }
    }
}
