// tests/property_tests.rs

use proptest::prelude::*;

use wat_syntax::combinator::{literal, one_of, sequence, synchronized, Input, PResult};
use wat_syntax::trivia::keyword;
use wat_syntax::{parse, Node, ProgramItem};

proptest! {
    // Total: any input yields either a tree or a diagnostic, never a panic,
    // and every reported position stays inside the source.
    #[test]
    fn parsing_is_total_and_bounded(source in ".{0,200}") {
        match parse(&source) {
            Ok(program) => {
                prop_assert!(program.span.end <= source.len());
                for item in &program.value.body {
                    prop_assert!(item.span.end <= source.len());
                    prop_assert!(item.span.start <= item.span.end);
                }
            }
            Err(err) => prop_assert!(err.span.offset() <= source.len()),
        }
    }

    // The furthest-failure heuristic: a choice over failing alternatives
    // reports an offset at least as deep as each alternative's own failure.
    #[test]
    fn choice_failures_prefer_the_deepest_offset(
        a in "[a-z]{1,4}",
        b in "[a-z]{1,4}",
        input in "[a-z ]{0,8}",
    ) {
        let deep = |i| {
            sequence(i, |s| {
                s.step(|i| literal(i, &a))?;
                s.step(|i| literal(i, &b))?;
                Ok(())
            })
        };
        let shallow = |i| {
            sequence(i, |s| {
                s.step(|i| literal(i, &b))?;
                Ok(())
            })
        };
        let fa = deep(Input::new(&input)).err();
        let fb = shallow(Input::new(&input)).err();
        prop_assume!(fa.is_some() && fb.is_some());
        let combined = one_of(Input::new(&input), "either", &[&deep, &shallow]).unwrap_err();
        prop_assert!(combined.offset() >= fa.unwrap().offset());
        prop_assert!(combined.offset() >= fb.unwrap().offset());
    }

    // Repetition is total and prefix-monotonic: k occurrences parse as
    // exactly k items, and every shorter document parses as its own count.
    #[test]
    fn repetition_counts_every_occurrence(k in 0usize..6) {
        for n in 0..=k {
            let source = format!("{}zz", "ab ".repeat(n));
            let rule = |i| {
                sequence(i, |s| {
                    let items = s.repeat(|i| literal(i, "ab"))?;
                    Ok(items.len())
                })
            };
            let (node, _) = rule(Input::new(&source)).unwrap();
            prop_assert_eq!(node.value, n);
        }
    }

    // Recovery terminates: forward-only scanning bounded by the input
    // length, and a successful recovery never points past the end.
    #[test]
    fn recovery_is_bounded(input in ".{0,80}") {
        let outcome: PResult<'_, Node<_>> = synchronized(
            Input::new(&input),
            |i| literal(i, "("),
            |i| keyword(i, "body"),
            |i| literal(i, ")"),
        );
        if let Ok((node, next)) = outcome {
            prop_assert!(node.span.end <= input.len());
            prop_assert!(next.offset() <= input.len());
            prop_assert!(next.offset() >= node.span.end);
        }
    }

    // Well-formed documents come back whole: n modules in, n modules out,
    // in order.
    #[test]
    fn document_scan_collects_every_module(n in 0usize..8) {
        let source = (0..n)
            .map(|i| format!("(module $m{i})"))
            .collect::<Vec<_>>()
            .join("\n");
        let program = parse(&source).unwrap();
        prop_assert_eq!(program.value.body.len(), n);
        for (i, item) in program.value.body.iter().enumerate() {
            match &item.value {
                ProgramItem::Module(module) => {
                    let id = module.id.as_ref().unwrap();
                    let expected = format!("$m{i}");
                    prop_assert_eq!(id.value.name.as_str(), expected.as_str());
                }
                other => panic!("expected a module, got {other:?}"),
            }
        }
    }
}
