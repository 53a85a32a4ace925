use thiserror::Error;

/// Construction-time failure. The engine never runs with a malformed tree or data set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("duplicate data point '{name}' in data set '{data_set}'")]
    DuplicateDataPoint { data_set: String, name: String },

    #[error("duplicate rule name '{name}'")]
    DuplicateRule { name: String },

    #[error("rule '{rule}' has no condition")]
    MissingCondition { rule: String },

    #[error("rule '{rule}' is attached under undefined rule '{parent}'")]
    UndefinedParent { rule: String, parent: String },

    #[error("cyclic rule attachment detected: {}", path.join(" -> "))]
    CyclicRule { path: Vec<String> },

    #[error("rule '{rule}' references undefined action '{action}'")]
    UndefinedAction { rule: String, action: String },

    #[error("duplicate action name '{name}'")]
    DuplicateAction { name: String },

    #[error("rule '{rule}' has children, action '{action}' can never run")]
    ActionOnBranch { rule: String, action: String },
}

/// A value could not be converted to the type a rule needs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot read {value} as {expected}")]
pub struct CoercionError {
    pub value: String,
    pub expected: &'static str,
}

/// Failure while an evaluator reads a data set. The node is treated as not satisfied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("data point '{data_point}' not found in data set '{data_set}'")]
    NotFound { data_set: String, data_point: String },

    #[error("data point '{data_point}' holds {value}, expected a {expected}")]
    TypeMismatch {
        data_point: String,
        value: String,
        expected: &'static str,
    },

    #[error("data point '{data_point}' is zero, cannot divide by it")]
    DivisionByZero { data_point: String },

    #[error("data point '{data_point}' is not backed by a {expected}")]
    SourceType {
        data_point: String,
        expected: &'static str,
    },
}

impl EvalError {
    pub(crate) fn coercion(data_point: &str, err: CoercionError) -> Self {
        EvalError::TypeMismatch {
            data_point: data_point.to_owned(),
            value: err.value,
            expected: err.expected,
        }
    }
}

/// Failure raised by an action. Logged by the engine, never retried.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("action '{action}' failed: {reason}")]
    Failed { action: String, reason: String },

    #[error("action panicked: {0}")]
    Panicked(String),
}

impl ActionError {
    pub fn failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        ActionError::Failed {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_data_point_message() {
        let err = BuildError::DuplicateDataPoint {
            data_set: "RMSXTest1".into(),
            name: "OrderNo".into(),
        };
        assert_eq!(
            err.to_string(),
            "duplicate data point 'OrderNo' in data set 'RMSXTest1'"
        );
    }

    #[test]
    fn cyclic_rule_message() {
        let err = BuildError::CyclicRule {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic rule attachment detected: a -> b -> a");
    }

    #[test]
    fn undefined_parent_message() {
        let err = BuildError::UndefinedParent {
            rule: "HedgeRequired".into(),
            parent: "Filled".into(),
        };
        assert_eq!(
            err.to_string(),
            "rule 'HedgeRequired' is attached under undefined rule 'Filled'"
        );
    }

    #[test]
    fn undefined_action_message() {
        let err = BuildError::UndefinedAction {
            rule: "HedgeRequired".into(),
            action: "CreateHedgeOrder".into(),
        };
        assert_eq!(
            err.to_string(),
            "rule 'HedgeRequired' references undefined action 'CreateHedgeOrder'"
        );
    }

    #[test]
    fn not_found_message() {
        let err = EvalError::NotFound {
            data_set: "order".into(),
            data_point: "TotalAmount".into(),
        };
        assert_eq!(
            err.to_string(),
            "data point 'TotalAmount' not found in data set 'order'"
        );
    }

    #[test]
    fn coercion_maps_to_type_mismatch() {
        let err = EvalError::coercion(
            "FilledAmount",
            CoercionError {
                value: "\"abc\"".into(),
                expected: "number",
            },
        );
        assert_eq!(
            err.to_string(),
            "data point 'FilledAmount' holds \"abc\", expected a number"
        );
    }

    #[test]
    fn action_error_wraps_eval_error() {
        let err: ActionError = EvalError::DivisionByZero {
            data_point: "TotalAmount".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "data point 'TotalAmount' is zero, cannot divide by it"
        );
    }
}
