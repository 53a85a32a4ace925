mod compile;
mod dispatch;
mod error;
mod evaluate;
pub mod parse;
mod types;

pub use dispatch::{DispatchError, Dispatcher, DispatcherConfig, EventSender};
pub use error::RuleTreeError;
pub use tokio_util::sync::CancellationToken;
pub use types::{
    data_point, ActionError, ActionExecutor, BooleanFlag, BuildError, Cached, ClearFlag,
    CoercionError, CompareOp, DataPoint, DataPointExpr, DataPointSource, DataSet, EvalError,
    ExecutionReport, Expr, ExprEvaluator, Failure, FailureKind, Field, FieldChange, FieldReader,
    FieldSource, FiredAction, FlagSource, LazySource, PercentageThreshold, Rule, RuleAction,
    RuleBuilder, RuleEvaluator, RuleSet, RuleSetBuilder, StringEquals, Value,
};
