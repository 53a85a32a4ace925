use std::fmt;
use std::ops::Not;

use super::data_set::DataSet;
use super::error::EvalError;
use super::Value;

/// Comparison operators supported in rule expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Boolean expression over data points, evaluated by
/// [`ExprEvaluator`](super::ExprEvaluator).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        data_point: String,
        op: CompareOp,
        value: Value,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare {
                data_point,
                op,
                value,
            } => write!(f, "({data_point} {op} {value})"),
            Expr::And(a, b) => write!(f, "({a} AND {b})"),
            Expr::Or(a, b) => write!(f, "({a} OR {b})"),
            Expr::Not(inner) => write!(f, "(NOT {inner})"),
        }
    }
}

impl Expr {
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Evaluate with short-circuiting `AND`/`OR`. Only the data points that
    /// are actually reached are read.
    pub(crate) fn eval(&self, data_set: &DataSet) -> Result<bool, EvalError> {
        match self {
            Expr::Compare {
                data_point,
                op,
                value,
            } => data_set
                .value(data_point)?
                .compare(*op, value)
                .map_err(|e| EvalError::coercion(data_point, e)),
            Expr::And(a, b) => Ok(a.eval(data_set)? && b.eval(data_set)?),
            Expr::Or(a, b) => Ok(a.eval(data_set)? || b.eval(data_set)?),
            Expr::Not(inner) => Ok(!inner.eval(data_set)?),
        }
    }

    /// Names of every data point referenced, in first-seen order.
    pub(crate) fn collect_data_points(&self, out: &mut Vec<String>) {
        match self {
            Expr::Compare { data_point, .. } => {
                if !out.contains(data_point) {
                    out.push(data_point.clone());
                }
            }
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_data_points(out);
                b.collect_data_points(out);
            }
            Expr::Not(inner) => inner.collect_data_points(out),
        }
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// Intermediate builder for data point comparisons.
/// Created by [`data_point()`]; requires a comparison method to produce an [`Expr`].
#[derive(Debug, Clone)]
pub struct DataPointExpr {
    name: String,
}

impl DataPointExpr {
    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Expr {
        Expr::Compare {
            data_point: self.name,
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Eq, value)
    }

    #[must_use]
    pub fn neq(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Neq, value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Gt, value)
    }

    #[must_use]
    pub fn gte(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Gte, value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Lt, value)
    }

    #[must_use]
    pub fn lte(self, value: impl Into<Value>) -> Expr {
        self.compare(CompareOp::Lte, value)
    }
}

#[must_use]
pub fn data_point(name: &str) -> DataPointExpr {
    DataPointExpr {
        name: name.to_owned(),
    }
}
