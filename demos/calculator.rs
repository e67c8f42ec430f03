//! Calculator Example - Left-Recursive Expression Grammar
//!
//! Parses arithmetic into a serializable tree with left-associative
//! operators, counts the operators in the user state, and evaluates the
//! tree. Errors are reported with line and column.
//!
//! Run with: cargo run --example calculator

use serde::Serialize;
use sprout::prelude::*;

/// Operators seen so far
type Ops = u32;

type P<A> = Parser<String, A, Ops, String>;

#[derive(Debug, Clone, Serialize)]
enum Expr {
    Number(i64),
    BinOp {
        left: Box<Expr>,
        op: char,
        right: Box<Expr>,
    },
}

impl Expr {
    fn eval(&self) -> Option<i64> {
        match self {
            Expr::Number(n) => Some(*n),
            Expr::BinOp { left, op, right } => {
                let (l, r) = (left.eval()?, right.eval()?);
                match op {
                    '+' => l.checked_add(r),
                    '-' => l.checked_sub(r),
                    '*' => l.checked_mul(r),
                    _ => l.checked_div(r),
                }
            }
        }
    }
}

fn token(literal: &str) -> P<String> {
    exact(literal).then_l(regex("[ \t]*"))
}

fn binop(left: Expr, op: char, right: Expr) -> Expr {
    Expr::BinOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Build the calculator grammar
///
/// ```text
/// expr   = expr ("+" | "-") term | term
/// term   = term ("*" | "/") factor | factor
/// factor = number | "(" expr ")"
/// ```
fn build_calculator() -> Result<CompiledParser<String, Expr, Ops, String>, GrammarError> {
    let operator = |chars: &str| -> P<char> {
        one_of(chars)
            .then_l(regex("[ \t]*"))
            .state_f(|ops: &Ops, _| ops + 1)
    };

    let number: P<Expr> = regex("[0-9]+")
        .map_e(|caps, _| {
            caps.as_str()
                .parse::<i64>()
                .map(Expr::Number)
                .map_err(|e| format!("bad number {:?}: {}", caps.as_str(), e))
        })
        .then_l(regex("[ \t]*"));

    let expr = reference::<String, Expr, Ops, String>("expr")
        .and(operator("+-"))
        .and(reference::<String, Expr, Ops, String>("term"))
        .map(|((l, op), r), _| binop(l, op, r))
        .or(reference("term"))
        .left_recur();

    let term = reference::<String, Expr, Ops, String>("term")
        .and(operator("*/"))
        .and(reference::<String, Expr, Ops, String>("factor"))
        .map(|((l, op), r), _| binop(l, op, r))
        .or(reference("factor"))
        .left_recur();

    let factor = number.or(reference::<String, Expr, Ops, String>("expr").between(token("("), token(")")));

    let line = regex("[ \t]*").then_r(reference::<String, Expr, Ops, String>("expr")).then_l(eof());

    let grammar = GrammarBuilder::new()
        .rule("line", line)
        .rule("expr", expr)
        .rule("term", term)
        .rule("factor", factor)
        .build()?;

    for warning in grammar.warnings("line")? {
        eprintln!("warning: {}", warning);
    }

    grammar.parser::<Expr>("line")
}

fn main() {
    println!("Calculator - Left-Recursive Grammar");
    println!("===================================\n");

    let parser = match build_calculator() {
        Ok(parser) => parser,
        Err(e) => {
            eprintln!("grammar error: {}", e);
            return;
        }
    };

    let inputs = [
        "42",
        "1 + 2",
        "1 + 2 * 3",
        "(1 + 2) * 3",
        "10 - 3 - 2",
        "100 / 10 / 5",
        "2 * (3 + 4",
        "99999999999999999999",
    ];

    for input in inputs {
        let input = input.to_string();
        let result = parser.parse(&input, 0);
        match result.result {
            Ok(expr) => {
                let tree = serde_json::to_string(&expr).unwrap_or_default();
                match expr.eval() {
                    Some(value) => println!("{} = {} ({} ops)", input, value, result.state),
                    None => println!("{} overflows ({} ops)", input, result.state),
                }
                println!("  {}", tree);
            }
            Err(e) => {
                let pos = e.source_position(&input);
                println!("{} Error at {}: {}", input, pos, e);
            }
        }
    }
}
