//! Integration tests for error reporting
//!
//! These tests cover parse failures (position, attribution, user payloads,
//! formatting) and every construction-time grammar error.

use serde::{Deserialize, Serialize};
use sprout::prelude::*;

type P<A> = Parser<String, A>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum CalcError {
    Overflow,
    UnknownOperator(char),
    Context(String),
}

type Calc<A> = Parser<String, A, (), CalcError>;

fn digits() -> Calc<String> {
    charset(CharSet::range('0', '9')).some().slice()
}

// ============================================================================
// Position and Attribution
// ============================================================================

#[test]
fn test_leaf_failure_is_attributed_to_root() {
    let parser = exact::<String, (), ()>("abc").compile().unwrap();
    let r = parser.parse(&"abx".to_string(), ());

    let err = r.error().expect("mismatch should fail");
    assert_eq!(err.position, 0);
    assert_eq!(err.parser, Some(parser.root()));
    assert_eq!(err.message, None);
    assert_eq!(err.user_error, None);
}

#[test]
fn test_sequence_failure_points_at_inner_node() {
    let p: P<(String, String)> = exact("ab").and(exact("cd"));
    let parser = p.compile().unwrap();
    let r = parser.parse(&"abxx".to_string(), ());

    let err = r.error().unwrap();
    assert_eq!(err.position, 2);
    let node = err.parser.unwrap();
    assert_eq!(parser.grammar().describe(node), "Exact(\"cd\")");
    assert_eq!(r.consumed, 2);
}

#[test]
fn test_charset_at_end_of_input() {
    let parser = digits().compile().unwrap();
    let err = parser.parse(&String::new(), ()).into_result().unwrap_err();
    assert_eq!(err.position, 0);
    assert_eq!(err.message.as_deref(), Some("EOF"));
}

#[test]
fn test_eof_message() {
    let p: P<String> = exact("a").then_l(eof());
    let err = p
        .compile()
        .unwrap()
        .parse(&"ab".to_string(), ())
        .into_result()
        .unwrap_err();
    assert_eq!(err.position, 1);
    assert_eq!(err.message.as_deref(), Some("expected end of input"));
}

#[test]
fn test_lookahead_messages() {
    let pos: P<String> = exact("a").followed_by(exact("b"));
    let err = pos
        .compile()
        .unwrap()
        .parse(&"ac".to_string(), ())
        .into_result()
        .unwrap_err();
    assert_eq!(err.position, 1);
    assert_eq!(err.message.as_deref(), Some("expected lookahead to match"));

    let neg: P<String> = exact("a").not_followed_by(exact("b"));
    let err = neg
        .compile()
        .unwrap()
        .parse(&"ab".to_string(), ())
        .into_result()
        .unwrap_err();
    assert_eq!(err.position, 1);
    assert_eq!(
        err.message.as_deref(),
        Some("unexpected match of negative lookahead")
    );
}

#[test]
fn test_source_position_of_failure() {
    let line: P<String> = regex("[a-z ]*").slice().then_l(exact("\n"));
    let p = line.many().then_l(eof());
    let input = "first line\nsecond Line\n".to_string();

    let err = p.compile().unwrap().parse(&input, ()).into_result().unwrap_err();
    let pos = err.source_position(&input);
    assert_eq!(err.position, 18);
    assert_eq!(pos.line, 2);
    assert_eq!(pos.column, 8);
    assert_eq!(pos.line_text(&input), "second Line");
}

// ============================================================================
// User Errors
// ============================================================================

#[test]
fn test_map_e_reports_typed_error() {
    let number: Calc<u8> = digits().map_e(|s, _| s.parse::<u8>().map_err(|_| CalcError::Overflow));
    let p = exact("n=").then_r(number);
    let parser = p.compile().unwrap();

    assert_eq!(parser.parse(&"n=200".to_string(), ()).result, Ok(200));

    let err = parser.parse(&"n=300".to_string(), ()).into_result().unwrap_err();
    assert_eq!(err.position, 2);
    assert_eq!(err.user_error, Some(CalcError::Overflow));
}

#[test]
fn test_fail_with_payload() {
    let op: Calc<char> = one_of("+-").or(fail_with("operator", CalcError::UnknownOperator('?')));
    let err = op
        .compile()
        .unwrap()
        .parse(&"*".to_string(), ())
        .into_result()
        .unwrap_err();
    assert_eq!(err.message.as_deref(), Some("operator"));
    assert_eq!(err.user_error, Some(CalcError::UnknownOperator('?')));
}

#[test]
fn test_custom_leaf_rejection() {
    let op: Calc<char> = from_fn("operator", |input: &String, pos, _: &()| {
        match input[pos..].chars().next() {
            Some(c @ ('+' | '-')) => Ok((c, 1)),
            Some(c) => Err(Reject::User(CalcError::UnknownOperator(c))),
            None => Err(Reject::Message("missing operator".to_string())),
        }
    });
    let parser = op.compile().unwrap();

    assert_eq!(parser.parse(&"-".to_string(), ()).result, Ok('-'));

    let err = parser.parse(&"%".to_string(), ()).into_result().unwrap_err();
    assert_eq!(err.user_error, Some(CalcError::UnknownOperator('%')));

    let err = parser.parse(&String::new(), ()).into_result().unwrap_err();
    assert_eq!(err.message.as_deref(), Some("missing operator"));
}

#[test]
fn test_map_error_adds_context() {
    let number: Calc<u8> = digits()
        .map_e(|s, _| s.parse::<u8>().map_err(|_| CalcError::Overflow))
        .map_error(|e| CalcError::Context(format!("in literal: {:?}", e)));
    let err = number
        .compile()
        .unwrap()
        .parse(&"999".to_string(), ())
        .into_result()
        .unwrap_err();
    assert_eq!(
        err.user_error,
        Some(CalcError::Context("in literal: Overflow".to_string()))
    );
}

#[test]
fn test_map_user_error_changes_type() {
    let err: ParseError<CalcError> = ParseError::at(4).with_user_error(CalcError::Overflow);
    let mapped: ParseError<String> = err.map_user_error(|e| format!("{:?}", e));
    assert_eq!(mapped.position, 4);
    assert_eq!(mapped.user_error.as_deref(), Some("Overflow"));
}

// ============================================================================
// Formatting
// ============================================================================

#[test]
fn test_display() {
    let err: ParseError<CalcError> = ParseError::at(3)
        .with_message("expected end of input")
        .with_user_error(CalcError::Overflow);
    assert_eq!(
        err.to_string(),
        "Parse failed at position 3: expected end of input [Overflow]"
    );

    let bare: ParseError<()> = ParseError::at(0);
    assert_eq!(bare.to_string(), "Parse failed at position 0");
}

#[test]
fn test_json_round_trip() {
    let number: Calc<u8> = digits().map_e(|s, _| s.parse::<u8>().map_err(|_| CalcError::Overflow));
    let err = number
        .compile()
        .unwrap()
        .parse(&"1000".to_string(), ())
        .into_result()
        .unwrap_err();

    let json = err.to_json().unwrap();
    assert!(json.contains("\"position\":0"));
    assert!(json.contains("Overflow"));

    let back: ParseError<CalcError> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}

// ============================================================================
// Resource Limits
// ============================================================================

#[test]
fn test_input_size_limit() {
    let parser = exact::<String, (), ()>("a")
        .many()
        .compile()
        .unwrap()
        .with_config(ParserConfig::new().with_max_input_size(4));

    assert!(parser.parse(&"aaaa".to_string(), ()).is_ok());

    let r = parser.parse(&"aaaaa".to_string(), ());
    assert_eq!(r.consumed, 0);
    assert_eq!(
        r.error().unwrap().message.as_deref(),
        Some("input too large: 5 units exceeds limit of 4")
    );
}

#[test]
fn test_recursion_depth_limit() {
    let nested = reference::<String, String, (), ()>("nested")
        .betweens("(".to_string(), ")".to_string())
        .or(exact("x"));
    let parser = GrammarBuilder::new()
        .rule("nested", nested)
        .build()
        .unwrap()
        .parser::<String>("nested")
        .unwrap();

    let input = format!("{}x{}", "(".repeat(50), ")".repeat(50));
    assert_eq!(parser.parse(&input, ()).result, Ok("x".to_string()));

    let limited = parser.with_config(ParserConfig::new().with_max_recursion_depth(20));
    let err = limited.parse(&input, ()).into_result().unwrap_err();
    assert_eq!(err.message.as_deref(), Some("recursion limit exceeded"));
}

#[test]
fn test_recursion_depth_limit_under_optional() {
    let pair: P<(Option<String>, Option<String>)> = exact("x")
        .map(|s: String, _| s)
        .opt()
        .and(exact("x").opt());
    let parser = pair.compile().unwrap();

    let r = parser.parse(&"xx".to_string(), ());
    assert_eq!(r.consumed, 2);
    assert_eq!(
        r.result,
        Ok((Some("x".to_string()), Some("x".to_string())))
    );

    let r = parser
        .with_config(ParserConfig::new().with_max_recursion_depth(3))
        .parse(&"xx".to_string(), ());
    let err = r.into_result().unwrap_err();
    assert_eq!(err.message.as_deref(), Some("recursion limit exceeded"));
}

#[test]
fn test_recursion_depth_limit_under_repeat() {
    let words: P<Vec<String>> = exact("ab")
        .map(|s: String, _| s)
        .or(exact("c"))
        .many();
    let parser = words.compile().unwrap();
    assert_eq!(
        parser.parse(&"abcab".to_string(), ()).result.map(|w| w.len()),
        Ok(3)
    );

    let err = parser
        .with_config(ParserConfig::new().with_max_recursion_depth(3))
        .parse(&"abcab".to_string(), ())
        .into_result()
        .unwrap_err();
    assert_eq!(err.message.as_deref(), Some("recursion limit exceeded"));
    assert_eq!(err.position, 0);
}

// ============================================================================
// Grammar Errors
// ============================================================================

#[test]
fn test_structural_errors() {
    assert_eq!(
        seq::<String, String, (), (), _>(Vec::new()).compile().err(),
        Some(GrammarError::EmptySequence)
    );
    assert_eq!(
        alt::<String, String, (), (), _>(Vec::new()).compile().err(),
        Some(GrammarError::EmptyAlternation)
    );
    assert_eq!(
        exact::<String, (), ()>("").compile().err(),
        Some(GrammarError::EmptyLiteral)
    );
}

#[test]
fn test_invalid_pattern() {
    let p: P<Captures> = regex("(unclosed");
    match p.compile().err() {
        Some(GrammarError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
        other => panic!("expected InvalidPattern, got {:?}", other),
    }
}

#[test]
fn test_invalid_charset() {
    let err = CharSet::from_pattern("z-a").unwrap_err();
    assert!(matches!(err, GrammarError::InvalidCharset { .. }));
    assert!(err.to_string().starts_with("Invalid charset \"z-a\""));
}

#[test]
fn test_nullable_errors() {
    let p: P<Vec<()>> = empty().many();
    assert!(matches!(
        p.compile().err(),
        Some(GrammarError::NullableRepeat { .. })
    ));

    let p: P<Option<String>> = exact("a").opt().left_recur();
    assert!(matches!(
        p.compile().err(),
        Some(GrammarError::NullableLeftRecursion { .. })
    ));

    let p: P<Vec<String>> = exact("a").repeat(3, 2);
    assert_eq!(
        p.compile().err(),
        Some(GrammarError::InvalidRepeatBounds { min: 3, max: 2 })
    );
}

#[test]
fn test_reference_errors() {
    let p: P<String> = reference("missing");
    assert_eq!(
        p.compile().err(),
        Some(GrammarError::UnresolvedReference {
            name: "missing".to_string()
        })
    );

    let cyclic = GrammarBuilder::<String>::new()
        .rule("a", reference::<String, String, (), ()>("b"))
        .rule("b", reference::<String, String, (), ()>("a"))
        .build();
    assert!(matches!(
        cyclic.err(),
        Some(GrammarError::CyclicReference { .. })
    ));

    let duplicate = GrammarBuilder::<String>::new()
        .rule("a", exact::<String, (), ()>("x"))
        .rule("a", exact::<String, (), ()>("y"))
        .build();
    assert_eq!(
        duplicate.err(),
        Some(GrammarError::DuplicateRule {
            name: "a".to_string()
        })
    );
}

#[test]
fn test_type_errors() {
    let number: P<i64> = regex("[0-9]+").map(|caps, _| caps.as_str().len() as i64);
    let mismatched = GrammarBuilder::new()
        .rule("number", number.clone())
        .rule("text", reference::<String, String, (), ()>("number"))
        .build();
    match mismatched.err() {
        Some(GrammarError::TypeMismatch { name, .. }) => assert_eq!(name, "number"),
        other => panic!("expected TypeMismatch, got {:?}", other),
    }

    let grammar = GrammarBuilder::new().rule("number", number).build().unwrap();
    assert!(matches!(
        grammar.parser::<String>("number").err(),
        Some(GrammarError::TypeMismatch { .. })
    ));
    assert_eq!(
        grammar.parser::<i64>("nope").err(),
        Some(GrammarError::UnknownRule {
            name: "nope".to_string()
        })
    );
}

#[test]
fn test_grammar_error_display() {
    let cases = [
        (GrammarError::EmptySequence, "Sequence can not be empty"),
        (
            GrammarError::UnresolvedReference {
                name: "expr".to_string(),
            },
            "Referenced rule does not exist: expr",
        ),
        (
            GrammarError::InvalidRepeatBounds { min: 2, max: 1 },
            "Invalid repeat bounds: min 2 exceeds max 1",
        ),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}
