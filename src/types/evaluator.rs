use std::fmt;

use tracing::debug;

use super::data_set::DataSet;
use super::error::EvalError;
use super::expr::Expr;

/// Predicate deciding whether a [`Rule`](super::Rule) is satisfied for a data set.
///
/// Evaluators only read sources. The declared dependencies document which data
/// points an evaluator reads; they are not enforced. The `Display` form appears
/// in rule reports.
pub trait RuleEvaluator: fmt::Display + fmt::Debug + Send + Sync {
    /// # Errors
    ///
    /// Returns [`EvalError`] when a data point is missing or cannot be coerced.
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, EvalError>;

    /// Declared dependent data point names.
    fn dependencies(&self) -> &[String];
}

/// True iff a data point's text form equals a literal.
#[derive(Debug, Clone)]
pub struct StringEquals {
    data_point: String,
    expected: String,
    dependencies: Vec<String>,
}

impl StringEquals {
    pub fn new(data_point: impl Into<String>, expected: impl Into<String>) -> Self {
        let data_point = data_point.into();
        Self {
            dependencies: vec![data_point.clone()],
            data_point,
            expected: expected.into(),
        }
    }

    /// Record an extra declared dependency.
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

impl RuleEvaluator for StringEquals {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, EvalError> {
        let actual = data_set.value(&self.data_point)?.text();
        let result = actual == self.expected;
        debug!(
            data_set = data_set.name(),
            data_point = %self.data_point,
            actual = %actual,
            expected = %self.expected,
            result,
            "string equality"
        );
        Ok(result)
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl fmt::Display for StringEquals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "equals({}, \"{}\")", self.data_point, self.expected)
    }
}

/// True iff `filled / total * 100 >= threshold`.
///
/// Reads `FilledAmount` and `TotalAmount` unless renamed with [`over`](Self::over).
/// A zero total fails with [`EvalError::DivisionByZero`].
#[derive(Debug, Clone)]
pub struct PercentageThreshold {
    filled: String,
    total: String,
    threshold: f64,
    dependencies: Vec<String>,
}

impl PercentageThreshold {
    pub const FILLED: &'static str = "FilledAmount";
    pub const TOTAL: &'static str = "TotalAmount";

    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            filled: Self::FILLED.to_owned(),
            total: Self::TOTAL.to_owned(),
            threshold,
            dependencies: vec![Self::FILLED.to_owned(), Self::TOTAL.to_owned()],
        }
    }

    /// Read the two amounts from differently named data points.
    #[must_use]
    pub fn over(mut self, filled: impl Into<String>, total: impl Into<String>) -> Self {
        self.filled = filled.into();
        self.total = total.into();
        self.dependencies = vec![self.filled.clone(), self.total.clone()];
        self
    }

    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn amount(&self, data_set: &DataSet, name: &str) -> Result<f64, EvalError> {
        data_set
            .value(name)?
            .to_f64()
            .map_err(|e| EvalError::coercion(name, e))
    }
}

impl RuleEvaluator for PercentageThreshold {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, EvalError> {
        let filled = self.amount(data_set, &self.filled)?;
        let total = self.amount(data_set, &self.total)?;
        if total == 0.0 {
            return Err(EvalError::DivisionByZero {
                data_point: self.total.clone(),
            });
        }
        let percent = filled / total * 100.0;
        let result = percent >= self.threshold;
        debug!(
            data_set = data_set.name(),
            percent,
            threshold = self.threshold,
            result,
            "percentage threshold"
        );
        Ok(result)
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl fmt::Display for PercentageThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "percentage({}, {}, {})",
            self.filled, self.total, self.threshold
        )
    }
}

/// Returns a boolean data point verbatim.
#[derive(Debug, Clone)]
pub struct BooleanFlag {
    data_point: String,
    dependencies: Vec<String>,
}

impl BooleanFlag {
    pub fn new(data_point: impl Into<String>) -> Self {
        let data_point = data_point.into();
        Self {
            dependencies: vec![data_point.clone()],
            data_point,
        }
    }

    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

impl RuleEvaluator for BooleanFlag {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, EvalError> {
        let result = data_set
            .value(&self.data_point)?
            .to_bool()
            .map_err(|e| EvalError::coercion(&self.data_point, e))?;
        debug!(
            data_set = data_set.name(),
            data_point = %self.data_point,
            result,
            "boolean flag"
        );
        Ok(result)
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl fmt::Display for BooleanFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flag({})", self.data_point)
    }
}

/// Evaluates an [`Expr`]; dependencies are every data point it mentions.
#[derive(Debug, Clone)]
pub struct ExprEvaluator {
    expr: Expr,
    dependencies: Vec<String>,
}

impl ExprEvaluator {
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        let mut dependencies = Vec::new();
        expr.collect_data_points(&mut dependencies);
        Self { expr, dependencies }
    }

    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl From<Expr> for ExprEvaluator {
    fn from(expr: Expr) -> Self {
        Self::new(expr)
    }
}

impl RuleEvaluator for ExprEvaluator {
    fn evaluate(&self, data_set: &DataSet) -> Result<bool, EvalError> {
        let result = self.expr.eval(data_set)?;
        debug!(data_set = data_set.name(), expr = %self.expr, result, "expression");
        Ok(result)
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl fmt::Display for ExprEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data_point, FlagSource, LazySource, Value};

    fn order(status: &str, filled: impl Into<Value>, total: impl Into<Value>) -> DataSet {
        let status = Value::from(status);
        let filled = filled.into();
        let total = total.into();
        DataSet::new("order")
            .with_data_point("OrderStatus", LazySource::new(move || status.clone()))
            .unwrap()
            .with_data_point("FilledAmount", LazySource::new(move || filled.clone()))
            .unwrap()
            .with_data_point("TotalAmount", LazySource::new(move || total.clone()))
            .unwrap()
            .with_data_point("HedgeRequired", FlagSource::new("HedgeRequired", true))
            .unwrap()
    }

    #[test]
    fn string_equals_matches_text() {
        let ds = order("WORKING", 0_i64, 100_i64);
        assert!(StringEquals::new("OrderStatus", "WORKING").evaluate(&ds).unwrap());
        assert!(!StringEquals::new("OrderStatus", "FILLED").evaluate(&ds).unwrap());
        assert!(StringEquals::new("TotalAmount", "100").evaluate(&ds).unwrap());
    }

    #[test]
    fn percentage_boundary_is_inclusive() {
        let rule = PercentageThreshold::new(50.0);
        assert!(rule.evaluate(&order("WORKING", 50_i64, 100_i64)).unwrap());
        assert!(!rule.evaluate(&order("WORKING", 49.999, 100_i64)).unwrap());
    }

    #[test]
    fn percentage_reads_numeric_strings() {
        let rule = PercentageThreshold::new(50.0);
        assert!(rule.evaluate(&order("WORKING", "60", "100")).unwrap());
    }

    #[test]
    fn percentage_zero_total_is_an_error() {
        let rule = PercentageThreshold::new(50.0);
        assert_eq!(
            rule.evaluate(&order("WORKING", 10_i64, 0_i64)).unwrap_err(),
            EvalError::DivisionByZero {
                data_point: "TotalAmount".into()
            }
        );
    }

    #[test]
    fn percentage_non_numeric_is_type_mismatch() {
        let rule = PercentageThreshold::new(50.0);
        let err = rule
            .evaluate(&order("WORKING", "lots", 100_i64))
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::TypeMismatch { ref data_point, .. } if data_point == "FilledAmount"
        ));
    }

    #[test]
    fn percentage_over_renames_inputs() {
        let ds = DataSet::new("x")
            .with_data_point("done", LazySource::new(|| Value::Int(3)))
            .unwrap()
            .with_data_point("all", LazySource::new(|| Value::Int(4)))
            .unwrap();
        let rule = PercentageThreshold::new(75.0).over("done", "all");
        assert!(rule.evaluate(&ds).unwrap());
        assert_eq!(rule.dependencies(), &["done".to_owned(), "all".to_owned()]);
        assert_eq!(rule.to_string(), "percentage(done, all, 75)");
    }

    #[test]
    fn boolean_flag_reads_native_and_text() {
        let ds = order("true", 0_i64, 1_i64);
        assert!(BooleanFlag::new("HedgeRequired").evaluate(&ds).unwrap());
        assert!(BooleanFlag::new("OrderStatus").evaluate(&ds).unwrap());
        assert!(matches!(
            BooleanFlag::new("TotalAmount").evaluate(&ds),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn missing_data_point_is_not_found() {
        let ds = DataSet::new("empty");
        assert!(matches!(
            BooleanFlag::new("HedgeRequired").evaluate(&ds),
            Err(EvalError::NotFound { .. })
        ));
    }

    #[test]
    fn declared_dependencies() {
        let rule = StringEquals::new("OrderStatus", "WORKING").depends_on("OrderNo");
        assert_eq!(
            rule.dependencies(),
            &["OrderStatus".to_owned(), "OrderNo".to_owned()]
        );
        let rule = ExprEvaluator::new(
            data_point("TotalAmount")
                .gte(1000_i64)
                .and(data_point("OrderStatus").eq("WORKING")),
        );
        assert_eq!(
            rule.dependencies(),
            &["TotalAmount".to_owned(), "OrderStatus".to_owned()]
        );
    }

    #[test]
    fn expression_evaluator() {
        let ds = order("WORKING", "60", "100");
        let rule = ExprEvaluator::new(
            data_point("FilledAmount")
                .gt(50_i64)
                .and(!data_point("OrderStatus").eq("FILLED")),
        );
        assert!(rule.evaluate(&ds).unwrap());
    }
}
