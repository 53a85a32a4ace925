use winnow::ascii::{dec_int, till_line_ending};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated};
use winnow::error::{ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::{CompareOp, Expr, Value};

use super::parser::{Condition, ParsedRule, ParsedRuleSet};

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

// -- Identifiers & keywords -------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        }),
    )
        .take()
        .parse_next(input)
}

/// Match a whole word, so `notional` is never read as `NOT` + `ional`.
fn keyword<'i>(kw: &'static str) -> impl FnMut(&mut &'i str) -> ModalResult<()> {
    move |input: &mut &'i str| {
        let checkpoint = input.checkpoint();
        let word = ident.parse_next(input)?;
        if word.eq_ignore_ascii_case(kw) {
            Ok(())
        } else {
            input.reset(&checkpoint);
            Err(ErrMode::from_input(input))
        }
    }
}

// -- Values -----------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn negative_number(input: &mut &str) -> ModalResult<Value> {
    let neg_str = (
        '-',
        take_while(1.., |c: char| c.is_ascii_digit() || c == '.'),
    )
        .take()
        .parse_next(input)?;
    if neg_str.contains('.') {
        let f: f64 = neg_str
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Float(f))
    } else {
        let i: i64 = neg_str
            .parse()
            .map_err(|_| ErrMode::from_input(input).cut())?;
        Ok(Value::Int(i))
    }
}

fn float_literal(input: &mut &str) -> ModalResult<f64> {
    // Only match floats that contain a decimal point
    (
        take_while(1.., |c: char| c.is_ascii_digit()),
        '.',
        take_while(1.., |c: char| c.is_ascii_digit()),
    )
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .parse_next(input)
}

fn value(input: &mut &str) -> ModalResult<Value> {
    ws.parse_next(input)?;
    alt((
        string_literal.map(Value::String),
        keyword("true").value(Value::Bool(true)),
        keyword("false").value(Value::Bool(false)),
        negative_number,
        float_literal.map(Value::Float),
        dec_int::<_, i64, _>.map(Value::Int),
    ))
    .context(StrContext::Expected(StrContextValue::Description("value")))
    .parse_next(input)
}

#[allow(clippy::cast_precision_loss)]
fn number(input: &mut &str) -> ModalResult<f64> {
    ws.parse_next(input)?;
    alt((float_literal, dec_int::<_, i64, _>.map(|i| i as f64)))
        .context(StrContext::Expected(StrContextValue::Description("number")))
        .parse_next(input)
}

// -- Comparison operators ---------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    ws.parse_next(input)?;
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "comparison operator",
    )))
    .parse_next(input)
}

// -- Expressions (precedence: OR < AND < NOT < primary) ---------------------

fn primary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((delimited('(', expr, (ws, ')')), comparison))
        .context(StrContext::Expected(StrContextValue::Description(
            "expression",
        )))
        .parse_next(input)
}

fn comparison(input: &mut &str) -> ModalResult<Expr> {
    let name = ident.parse_next(input)?;
    let op = cut_err(compare_op).parse_next(input)?;
    let val = cut_err(value).parse_next(input)?;
    Ok(Expr::Compare {
        data_point: name.to_owned(),
        op,
        value: val,
    })
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    if opt(keyword("NOT")).parse_next(input)?.is_some() {
        let inner = cut_err(unary).parse_next(input)?;
        Ok(Expr::Not(Box::new(inner)))
    } else {
        primary(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = unary(input)?;
    let rest: Vec<Expr> =
        repeat(0.., preceded((ws, keyword("AND")), cut_err(unary))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::And(Box::new(acc), Box::new(r))))
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = and_expr(input)?;
    let rest: Vec<Expr> =
        repeat(0.., preceded((ws, keyword("OR")), cut_err(and_expr))).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::Or(Box::new(acc), Box::new(r))))
}

fn expr(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    or_expr(input)
}

// -- Built-in conditions ----------------------------------------------------

fn open_call(name: &'static str) -> impl FnMut(&mut &str) -> ModalResult<()> {
    move |input: &mut &str| {
        keyword(name).parse_next(input)?;
        (ws, '(', ws).void().parse_next(input)
    }
}

fn close_call(input: &mut &str) -> ModalResult<()> {
    (ws, cut_err(')')).void().parse_next(input)
}

fn comma(input: &mut &str) -> ModalResult<()> {
    (ws, ',', ws).void().parse_next(input)
}

fn equals_call(input: &mut &str) -> ModalResult<Condition> {
    open_call("equals").parse_next(input)?;
    let (data_point, (), expected) =
        cut_err((ident, comma, string_literal)).parse_next(input)?;
    close_call(input)?;
    Ok(Condition::Equals {
        data_point: data_point.to_owned(),
        expected,
    })
}

fn percentage_call(input: &mut &str) -> ModalResult<Condition> {
    open_call("percentage").parse_next(input)?;
    let names = opt((ident, comma, cut_err(ident), cut_err(comma))).parse_next(input)?;
    let threshold = cut_err(number).parse_next(input)?;
    close_call(input)?;
    let (filled, total) = match names {
        Some((filled, (), total, ())) => (Some(filled.to_owned()), Some(total.to_owned())),
        None => (None, None),
    };
    Ok(Condition::Percentage {
        filled,
        total,
        threshold,
    })
}

fn flag_call(input: &mut &str) -> ModalResult<Condition> {
    open_call("flag").parse_next(input)?;
    let data_point = cut_err(ident).parse_next(input)?;
    close_call(input)?;
    Ok(Condition::Flag(data_point.to_owned()))
}

fn condition(input: &mut &str) -> ModalResult<Condition> {
    ws.parse_next(input)?;
    alt((
        equals_call,
        percentage_call,
        flag_call,
        expr.map(Condition::Expr),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "condition",
    )))
    .parse_next(input)
}

// -- Rule definitions -------------------------------------------------------

fn parent_annotation(input: &mut &str) -> ModalResult<String> {
    let parent = delimited(
        (ws, '(', ws, keyword("under"), ws),
        cut_err(ident),
        (ws, cut_err(')')),
    )
    .parse_next(input)?;
    Ok(parent.to_owned())
}

fn then_clause(input: &mut &str) -> ModalResult<Vec<String>> {
    (ws, keyword("then"), ws).void().parse_next(input)?;
    let actions: Vec<String> = cut_err(separated(
        1..,
        ident.map(str::to_owned),
        (ws, ',', ws),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "action name",
    )))
    .parse_next(input)?;
    Ok(actions)
}

fn rule_def(input: &mut &str) -> ModalResult<ParsedRule> {
    ws.parse_next(input)?;
    keyword("rule").parse_next(input)?;
    ws.parse_next(input)?;

    let name = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "rule name",
        )))
        .parse_next(input)?;

    let parent = opt(parent_annotation).parse_next(input)?;

    ws.parse_next(input)?;
    cut_err(':').parse_next(input)?;

    let condition = cut_err(condition)
        .context(StrContext::Expected(StrContextValue::Description(
            "rule body",
        )))
        .parse_next(input)?;

    let actions = opt(then_clause).parse_next(input)?.unwrap_or_default();

    Ok(ParsedRule {
        name: name.to_owned(),
        parent,
        condition,
        actions,
    })
}

// -- Top-level parser -------------------------------------------------------

pub fn parse_ruleset(input: &mut &str) -> ModalResult<ParsedRuleSet> {
    ws.parse_next(input)?;
    let name = opt(preceded((keyword("ruleset"), ws), cut_err(ident))).parse_next(input)?;
    let rules: Vec<ParsedRule> = repeat(0.., rule_def).parse_next(input)?;
    ws.parse_next(input)?;

    Ok(ParsedRuleSet {
        name: name.map(str::to_owned),
        rules,
    })
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;

    use super::*;

    #[test]
    fn parse_equals_rule() {
        let result = parse("rule StatusWorking:\n    equals(OrderStatus, \"WORKING\")").unwrap();
        assert_eq!(result.rules.len(), 1);
        assert_eq!(result.rules[0].name, "StatusWorking");
        assert_eq!(
            result.rules[0].condition,
            Condition::Equals {
                data_point: "OrderStatus".into(),
                expected: "WORKING".into()
            }
        );
        assert!(result.rules[0].parent.is_none());
        assert!(result.name.is_none());
    }

    #[test]
    fn parse_ruleset_header() {
        let result = parse("ruleset SingleStockHedge\nrule a:\n    flag(x)").unwrap();
        assert_eq!(result.name.as_deref(), Some("SingleStockHedge"));
    }

    #[test]
    fn parse_parent_and_actions() {
        let result = parse(
            "rule HedgeRequired (under Filled50Percent):\n    flag(HedgeRequired)\n    then CreateHedgeOrder, Notify",
        )
        .unwrap();
        let rule = &result.rules[0];
        assert_eq!(rule.parent.as_deref(), Some("Filled50Percent"));
        assert_eq!(rule.condition, Condition::Flag("HedgeRequired".into()));
        assert_eq!(rule.actions, vec!["CreateHedgeOrder", "Notify"]);
    }

    #[test]
    fn parse_percentage_forms() {
        let result = parse(
            "rule a:\n    percentage(50)\nrule b:\n    percentage(Done, All, 12.5)",
        )
        .unwrap();
        assert_eq!(
            result.rules[0].condition,
            Condition::Percentage {
                filled: None,
                total: None,
                threshold: 50.0
            }
        );
        assert_eq!(
            result.rules[1].condition,
            Condition::Percentage {
                filled: Some("Done".into()),
                total: Some("All".into()),
                threshold: 12.5
            }
        );
    }

    #[test]
    fn parse_and_expression() {
        let result = parse("rule r:\n    x == 1 AND y == 2").unwrap();
        assert!(matches!(
            result.rules[0].condition,
            Condition::Expr(Expr::And(_, _))
        ));
    }

    #[test]
    fn parse_precedence_and_before_or() {
        let result = parse("rule r:\n    a == 1 OR b == 2 AND c == 3").unwrap();
        match &result.rules[0].condition {
            Condition::Expr(Expr::Or(left, right)) => {
                assert!(matches!(left.as_ref(), Expr::Compare { data_point, .. } if data_point == "a"));
                assert!(matches!(right.as_ref(), Expr::And(_, _)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parse_parenthesized_grouping() {
        let result = parse("rule r:\n    (a == 1 OR b == 2) AND c == 3").unwrap();
        assert!(matches!(
            &result.rules[0].condition,
            Condition::Expr(Expr::And(left, _)) if matches!(left.as_ref(), Expr::Or(_, _))
        ));
    }

    #[test]
    fn parse_not_keyword_is_a_whole_word() {
        let result = parse("rule r:\n    notional > 5").unwrap();
        assert!(matches!(
            &result.rules[0].condition,
            Condition::Expr(Expr::Compare { data_point, .. }) if data_point == "notional"
        ));
        let result = parse("rule r:\n    NOT notional > 5").unwrap();
        assert!(matches!(
            result.rules[0].condition,
            Condition::Expr(Expr::Not(_))
        ));
    }

    #[test]
    fn parse_all_comparison_ops() {
        let ops = [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Neq),
            (">", CompareOp::Gt),
            (">=", CompareOp::Gte),
            ("<", CompareOp::Lt),
            ("<=", CompareOp::Lte),
        ];
        for (sym, expected_op) in ops {
            let input = format!("rule r:\n    x {sym} 1");
            let result = parse(&input).unwrap();
            match &result.rules[0].condition {
                Condition::Expr(Expr::Compare { op, .. }) => {
                    assert_eq!(*op, expected_op, "failed for {sym}");
                }
                other => panic!("expected Compare for {sym}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_all_value_types() {
        let cases = [
            ("42", Value::Int(42)),
            ("2.5", Value::Float(2.5)),
            ("-5", Value::Int(-5)),
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
            (r#""hello""#, Value::String("hello".into())),
        ];
        for (literal, expected) in cases {
            let input = format!("rule r:\n    x == {literal}");
            let result = parse(&input).unwrap();
            match &result.rules[0].condition {
                Condition::Expr(Expr::Compare { value, .. }) => {
                    assert_eq!(*value, expected, "failed for {literal}");
                }
                other => panic!("expected Compare for {literal}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_comments_ignored() {
        let result = parse("# Header\nrule r:\n    # inline\n    flag(x)\n# trailer\n").unwrap();
        assert_eq!(result.rules.len(), 1);
    }

    #[test]
    fn parse_string_with_escapes() {
        let result = parse(
            r#"rule r:
    equals(x, "a\"b\\c")"#,
        )
        .unwrap();
        assert_eq!(
            result.rules[0].condition,
            Condition::Equals {
                data_point: "x".into(),
                expected: "a\"b\\c".into()
            }
        );
    }

    #[test]
    fn bare_data_point_is_rejected() {
        assert!(parse("rule r:\n    HedgeRequired").is_err());
    }

    #[test]
    fn missing_colon_is_rejected() {
        assert!(parse("rule r\n    flag(x)").is_err());
    }

    #[test]
    fn unclosed_call_is_rejected() {
        assert!(parse("rule r:\n    flag(x").is_err());
    }
}
