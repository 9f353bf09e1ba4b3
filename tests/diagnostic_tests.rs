// tests/diagnostic_tests.rs

use wat_syntax::combinator::{Input, Severity};
use wat_syntax::grammar::fields::module_field;
use wat_syntax::{parse, parse_named, ProgramItem};

#[test]
fn unterminated_block_comment_is_a_dedicated_diagnostic() {
    let err = parse("(; never closed").unwrap_err();
    assert!(err.message.contains("unterminated block comment"));
    assert_eq!(err.line, 1);
    assert_eq!(err.column, 1);
}

#[test]
fn unterminated_comment_inside_a_module_is_still_fatal() {
    // Module-level recovery must not swallow this into a recovered node.
    let err = parse("(module\n(; bad").unwrap_err();
    assert!(err.message.contains("unterminated block comment"));
    assert_eq!(err.line, 2);
    assert_eq!(err.column, 1);
}

#[test]
fn unterminated_comment_deep_inside_a_function_is_fatal() {
    let err = parse("(module (func $f (; bad))").unwrap_err();
    assert!(err.message.contains("unterminated block comment"));
}

#[test]
fn diagnostics_carry_the_source_name() {
    let err = parse_named("example.wat", "(; oops").unwrap_err();
    let rendered = format!("{:?}", miette::Report::new(err));
    assert!(rendered.contains("example.wat"));
}

#[test]
fn unparseable_top_level_form_becomes_the_unknown_tail() {
    // Scanning gives up at the first form it cannot parse; everything from
    // there on, including any later well-formed modules, is one opaque tail.
    let program = parse("(module $a) junk (module $b)").unwrap();
    assert_eq!(program.value.body.len(), 2);
    assert!(matches!(
        program.value.body[0].value,
        ProgramItem::Module(_)
    ));
    match &program.value.body[1].value {
        ProgramItem::Unknown(unknown) => {
            assert_eq!(unknown.text, "junk (module $b)");
        }
        other => panic!("expected the unknown tail, got {other:?}"),
    }
    let tail = &program.value.body[1];
    assert_eq!(tail.span.end, "(module $a) junk (module $b)".len());
}

#[test]
fn committed_keyword_turns_mismatch_into_a_construct_error() {
    // After `param` has matched, `x` is a bad parameter, not "no function".
    let failure = module_field(Input::new("(func $f (param x) (result i32))")).unwrap_err();
    assert_eq!(failure.severity(), Severity::Cut);
    assert!(failure.offset() >= "(func $f (param ".len());
}

#[test]
fn malformed_field_inside_a_module_is_recovered_at_the_closer() {
    let program = parse("(module (func $f (param x)))").unwrap();
    let module = match &program.value.body[0].value {
        ProgramItem::Module(module) => module,
        other => panic!("expected a module, got {other:?}"),
    };
    let skipped = module.skipped.as_ref().unwrap();
    assert!(skipped.value.text.contains("param x"));
}

#[test]
fn failure_offsets_prefer_the_deepest_attempt() {
    // The function alternative consumes far more input than any sibling
    // field rule before failing, so its offset is the one reported.
    let failure = module_field(Input::new("(func $f (result i32) local.get)")).unwrap_err();
    assert!(failure.offset() >= "(func $f (result i32) ".len());
}

#[test]
fn error_spans_stay_inside_the_source() {
    for source in ["", "(", "(module", "(module (func", "\"", "(;;"] {
        match parse(source) {
            Ok(program) => assert!(program.span.end <= source.len()),
            Err(err) => {
                let offset: usize = err.span.offset();
                assert!(offset <= source.len());
            }
        }
    }
}
