// tests/parser_tests.rs

use wat_syntax::grammar::fields::ModuleField;
use wat_syntax::grammar::instructions::{Instruction, PlainInstruction};
use wat_syntax::grammar::values::Index;
use wat_syntax::{parse, Node, Program, ProgramItem};

// A helper to get the single module out of a parsed document.
fn only_module(program: &Node<Program>) -> &wat_syntax::Module {
    assert_eq!(program.value.body.len(), 1, "expected exactly one module");
    match &program.value.body[0].value {
        ProgramItem::Module(module) => module,
        other => panic!("expected a module, got {other:?}"),
    }
}

#[test]
fn empty_module() {
    let program = parse("(module)").unwrap();
    let module = only_module(&program);
    assert!(module.id.is_none());
    assert!(module.fields.is_empty());
    assert!(module.skipped.is_none());
}

#[test]
fn module_with_id() {
    let program = parse("(module $m)").unwrap();
    let module = only_module(&program);
    assert_eq!(module.id.as_ref().unwrap().value.name, "$m");
}

#[test]
fn function_instruction_index_payload() {
    let program = parse("(module (func $f (local.get 0)))").unwrap();
    let module = only_module(&program);
    let func = match &module.fields[0].value {
        ModuleField::Func(func) => func,
        other => panic!("expected a function, got {other:?}"),
    };
    assert_eq!(func.id.as_ref().unwrap().value.name, "$f");
    let folded = match &func.body[0].value {
        Instruction::Folded(wat_syntax::grammar::instructions::FoldedInstruction::Plain {
            operator,
            operands,
        }) => {
            assert!(operands.is_empty());
            operator
        }
        other => panic!("expected a folded instruction, got {other:?}"),
    };
    match &folded.value {
        PlainInstruction::Variable { op, index } => {
            assert_eq!(op, "local.get");
            assert_eq!(index.value, Index::Numeric(0));
        }
        other => panic!("expected local.get, got {other:?}"),
    }
}

#[test]
fn function_with_params_locals_and_linear_body() {
    // The canonical introduction example for the text format.
    let program = parse(
        "(module (func (param i32) (param f32) (local f64)
            local.get 0
            local.get 1
            local.get 2))",
    )
    .unwrap();
    let module = only_module(&program);
    let func = match &module.fields[0].value {
        ModuleField::Func(func) => func,
        other => panic!("expected a function, got {other:?}"),
    };
    assert_eq!(func.signature.value.params.len(), 2);
    assert_eq!(func.locals.len(), 1);
    assert_eq!(func.body.len(), 3);
    for (n, instr) in func.body.iter().enumerate() {
        match &instr.value {
            Instruction::Plain(PlainInstruction::Variable { op, index }) => {
                assert_eq!(op, "local.get");
                assert_eq!(index.value, Index::Numeric(n as u64));
            }
            other => panic!("expected local.get, got {other:?}"),
        }
    }
}

#[test]
fn several_modules_in_one_document() {
    let program = parse("(module $a) (module $b)").unwrap();
    assert_eq!(program.value.body.len(), 2);
    for item in &program.value.body {
        assert!(matches!(item.value, ProgramItem::Module(_)));
    }
}

#[test]
fn a_realistic_module() {
    let source = r#"
(module
    (import "env" "log" (func $log (param i32)))
    (memory (export "memory") 1)
    (global $counter (mut i32) (i32.const 0))
    (func $bump (export "bump") (result i32)
        global.get $counter
        i32.const 1
        i32.add
        global.set $counter
        global.get $counter)
    (table 1 funcref)
    (elem (i32.const 0) $bump)
    (data (i32.const 8) "hi")
    (export "log" (func $log)))
"#;
    let program = parse(source).unwrap();
    let module = only_module(&program);
    assert!(module.skipped.is_none());
    let kinds: Vec<&str> = module
        .fields
        .iter()
        .map(|f| match &f.value {
            ModuleField::Type(_) => "type",
            ModuleField::Import(_) => "import",
            ModuleField::Func(_) => "func",
            ModuleField::Table(_) => "table",
            ModuleField::Memory(_) => "memory",
            ModuleField::Global(_) => "global",
            ModuleField::Export(_) => "export",
            ModuleField::Elem(_) => "elem",
            ModuleField::Data(_) => "data",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["import", "memory", "global", "func", "table", "elem", "data", "export"]
    );
}

#[test]
fn empty_and_blank_documents() {
    assert!(parse("").unwrap().value.body.is_empty());
    assert!(parse("  \n\t ").unwrap().value.body.is_empty());
    assert!(parse(";; only a comment").unwrap().value.body.is_empty());
}

#[test]
fn module_recovers_from_garbage_before_its_closer() {
    let program = parse("(module $m *unknown string*)").unwrap();
    let module = only_module(&program);
    assert_eq!(module.id.as_ref().unwrap().value.name, "$m");
    let skipped = module.skipped.as_ref().unwrap();
    assert_eq!(skipped.value.text, "*unknown string*");
}

#[test]
fn document_scan_resumes_after_a_recovered_module() {
    let program = parse("(module $broken ???) (module $ok)").unwrap();
    assert_eq!(program.value.body.len(), 2);
    match &program.value.body[1].value {
        ProgramItem::Module(module) => {
            assert_eq!(module.id.as_ref().unwrap().value.name, "$ok");
            assert!(module.skipped.is_none());
        }
        other => panic!("expected a module, got {other:?}"),
    }
}

#[test]
fn spans_cover_the_source_they_came_from() {
    let source = "(module (func $f (local.get 0)))";
    let program = parse(source).unwrap();
    assert_eq!(program.span.start, 0);
    assert_eq!(program.span.end, source.len());
    let module_node = &program.value.body[0];
    assert_eq!(&source[module_node.span.start..module_node.span.end], source);
    let module = only_module(&program);
    let func_node = &module.fields[0];
    assert_eq!(
        &source[func_node.span.start..func_node.span.end],
        "(func $f (local.get 0))"
    );
}

#[test]
fn span_round_trip_through_the_producing_rule() {
    use wat_syntax::combinator::Input;
    use wat_syntax::grammar::fields::module_field;

    // Reparsing a node's own span through the rule that produced it yields
    // the same shape; only the offsets inside shift, so the comparison here
    // is on the material fields.
    let source = "(module (func $f (param $x i32) (result i32) (local.get $x)))";
    let program = parse(source).unwrap();
    let module = only_module(&program);
    let func_node = &module.fields[0];
    let slice = &source[func_node.span.start..func_node.span.end];
    let (reparsed, rest) = module_field(Input::new(slice)).unwrap();
    assert!(rest.at_end());
    let (original, reparsed) = match (&func_node.value, &reparsed.value) {
        (ModuleField::Func(a), ModuleField::Func(b)) => (a, b),
        other => panic!("expected two functions, got {other:?}"),
    };
    assert_eq!(
        original.id.as_ref().unwrap().value,
        reparsed.id.as_ref().unwrap().value
    );
    assert_eq!(
        original.signature.value.params.len(),
        reparsed.signature.value.params.len()
    );
    assert_eq!(
        original.signature.value.results.len(),
        reparsed.signature.value.results.len()
    );
    assert_eq!(original.body.len(), reparsed.body.len());
}

#[test]
fn trees_serialize_and_round_trip_as_json() {
    let program = parse(r#"(module (func $f (export "f") (local.get 0)))"#).unwrap();
    let json = serde_json::to_string(&program).unwrap();
    let back: Node<Program> = serde_json::from_str(&json).unwrap();
    assert_eq!(program, back);
}
