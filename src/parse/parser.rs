use std::sync::Arc;

use crate::{BooleanFlag, Expr, ExprEvaluator, PercentageThreshold, RuleEvaluator, StringEquals};

/// The result of parsing a DSL input string.
#[derive(Debug)]
pub struct ParsedRuleSet {
    pub name: Option<String>,
    pub rules: Vec<ParsedRule>,
}

#[derive(Debug)]
pub struct ParsedRule {
    pub name: String,
    pub parent: Option<String>,
    pub condition: Condition,
    pub actions: Vec<String>,
}

/// Rule body as written in the DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `equals(DataPoint, "literal")`
    Equals { data_point: String, expected: String },
    /// `percentage(Filled, Total, threshold)` or `percentage(threshold)`
    Percentage {
        filled: Option<String>,
        total: Option<String>,
        threshold: f64,
    },
    /// `flag(DataPoint)`
    Flag(String),
    /// Comparison expression, e.g. `TotalAmount >= 1000 AND NOT Side == "SELL"`
    Expr(Expr),
}

impl Condition {
    #[must_use]
    pub fn into_evaluator(self) -> Arc<dyn RuleEvaluator> {
        match self {
            Condition::Equals {
                data_point,
                expected,
            } => Arc::new(StringEquals::new(data_point, expected)),
            Condition::Percentage {
                filled,
                total,
                threshold,
            } => {
                let rule = PercentageThreshold::new(threshold);
                match (filled, total) {
                    (Some(filled), Some(total)) => Arc::new(rule.over(filled, total)),
                    _ => Arc::new(rule),
                }
            }
            Condition::Flag(data_point) => Arc::new(BooleanFlag::new(data_point)),
            Condition::Expr(expr) => Arc::new(ExprEvaluator::new(expr)),
        }
    }
}
