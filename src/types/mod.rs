mod action;
mod data_set;
mod error;
mod evaluator;
mod execution_report;
mod expr;
mod rule;
mod ruleset;
mod source;
mod upstream;
mod value;

pub use action::{ActionExecutor, ClearFlag, RuleAction};
pub use data_set::{DataPoint, DataSet};
pub use error::{ActionError, BuildError, CoercionError, EvalError};
pub use evaluator::{BooleanFlag, ExprEvaluator, PercentageThreshold, RuleEvaluator, StringEquals};
pub use execution_report::{ExecutionReport, Failure, FailureKind, FiredAction};
pub use expr::{data_point, CompareOp, DataPointExpr, Expr};
pub(crate) use rule::RuleDef;
pub use rule::Rule;
pub use ruleset::{RuleBuilder, RuleSet, RuleSetBuilder};
pub use source::{Cached, DataPointSource, FieldSource, FlagSource, LazySource};
pub use upstream::{Field, FieldChange, FieldReader};
pub use value::Value;
