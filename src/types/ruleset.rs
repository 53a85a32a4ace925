use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::action::{ActionExecutor, RuleAction};
use super::data_set::DataSet;
use super::error::BuildError;
use super::evaluator::RuleEvaluator;
use super::execution_report::ExecutionReport;
use super::rule::{Rule, RuleDef};

/// Builder for constructing a [`RuleSet`] from named rules.
///
/// Rules reference their parent and actions by name; [`compile`](Self::compile)
/// validates the references and assembles the tree.
///
/// # Example
///
/// ```
/// use ruletree::{ActionError, BooleanFlag, DataSet, PercentageThreshold, RuleSetBuilder, StringEquals};
///
/// let rule_set = RuleSetBuilder::new("SingleStockHedge")
///     .rule("StatusWorking", |r| r.when(StringEquals::new("OrderStatus", "WORKING")))
///     .rule("Filled50Percent", |r| {
///         r.under("StatusWorking").when(PercentageThreshold::new(50.0))
///     })
///     .rule("HedgeRequired", |r| {
///         r.under("Filled50Percent")
///             .when(BooleanFlag::new("HedgeRequired"))
///             .then("CreateHedgeOrder")
///     })
///     .action("CreateHedgeOrder", |_: &DataSet| -> Result<(), ActionError> { Ok(()) })
///     .compile()
///     .unwrap();
/// assert_eq!(rule_set.rules().len(), 1);
/// ```
#[derive(Debug)]
pub struct RuleSetBuilder {
    name: String,
    rules: Vec<RuleDef>,
    actions: Vec<RuleAction>,
}

/// Intermediate builder passed to the rule definition closure.
#[derive(Debug)]
pub struct RuleBuilder {
    evaluator: Option<Arc<dyn RuleEvaluator>>,
    parent: Option<String>,
    actions: Vec<String>,
}

impl RuleSetBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Define a rule. The closure must call `.when(evaluator)`.
    ///
    /// If `.when()` is not called, compilation fails with
    /// [`BuildError::MissingCondition`].
    #[must_use]
    pub fn rule(mut self, name: &str, f: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        let builder = f(RuleBuilder {
            evaluator: None,
            parent: None,
            actions: Vec::new(),
        });
        self.rules.push(RuleDef {
            name: name.to_owned(),
            evaluator: builder.evaluator,
            parent: builder.parent,
            actions: builder.actions,
        });
        self
    }

    /// Register an action that rules can reference by name.
    #[must_use]
    pub fn action(mut self, name: &str, executor: impl ActionExecutor + 'static) -> Self {
        self.actions.push(RuleAction::new(name, executor));
        self
    }

    /// Parse a rule DSL string into a builder. Actions still need to be
    /// registered with [`action`](Self::action) before compiling.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`](crate::parse::ParseError) on invalid syntax.
    pub fn from_dsl(input: &str) -> Result<Self, crate::parse::ParseError> {
        let parsed = crate::parse::parse(input)?;
        let mut builder = Self::new(parsed.name.unwrap_or_else(|| "rules".to_owned()));
        for rule in parsed.rules {
            builder.rules.push(RuleDef {
                name: rule.name,
                evaluator: Some(rule.condition.into_evaluator()),
                parent: rule.parent,
                actions: rule.actions,
            });
        }
        Ok(builder)
    }

    /// Read a rule DSL file into a builder.
    ///
    /// # Errors
    ///
    /// Returns [`RuleTreeError`](crate::RuleTreeError) on I/O or parse failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::RuleTreeError> {
        let input = std::fs::read_to_string(path)?;
        Ok(Self::from_dsl(&input)?)
    }

    /// Validate the definitions and assemble the immutable [`RuleSet`].
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] on duplicate names, missing conditions, unknown
    /// parents or actions, and cyclic parent chains.
    pub fn compile(self) -> Result<RuleSet, BuildError> {
        crate::compile::compile(self.name, &self.rules, self.actions)
    }
}

impl RuleBuilder {
    /// Set the evaluator deciding whether this rule is satisfied.
    #[must_use]
    pub fn when(mut self, evaluator: impl RuleEvaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Attach this rule as a child of `parent`. Rules without a parent are roots.
    #[must_use]
    pub fn under(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_owned());
        self
    }

    /// Run the named action when this rule is a satisfied leaf.
    #[must_use]
    pub fn then(mut self, action: &str) -> Self {
        self.actions.push(action.to_owned());
        self
    }
}

/// Ordered forest of root rules, evaluated against one [`DataSet`] at a time.
///
/// Built once and shared behind `Arc`; it holds no per-data-set state.
#[derive(Debug)]
pub struct RuleSet {
    name: String,
    rules: Vec<Rule>,
    shutdown: CancellationToken,
}

fn warn_branch_actions(rule_set: &str, root: &Rule) {
    root.walk("", &mut |path, rule| {
        if !rule.is_leaf() && !rule.actions().is_empty() {
            let actions: Vec<&str> = rule.actions().iter().map(RuleAction::name).collect();
            warn!(rule_set, rule = path, ?actions, "actions on a rule with children never run");
        }
    });
}

impl RuleSet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Append a root rule.
    ///
    /// Actions only fire at satisfied leaves. Actions attached to a rule
    /// with children never run and are logged with `warn!`.
    pub fn add_rule(&mut self, rule: Rule) -> &mut Self {
        warn_branch_actions(&self.name, &rule);
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.add_rule(rule);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate every root against `data_set`, depth-first, in declaration order.
    pub fn execute(&self, data_set: &DataSet) -> ExecutionReport {
        self.execute_with(data_set, &CancellationToken::new())
    }

    /// Like [`execute`](Self::execute), checking `cancel` before every rule and action.
    pub fn execute_with(&self, data_set: &DataSet, cancel: &CancellationToken) -> ExecutionReport {
        if self.is_stopped() {
            debug!(rule_set = %self.name, data_set = data_set.name(), "rule set stopped, skipping");
            let mut report = ExecutionReport::new(&self.name, data_set.name());
            report.cancelled = true;
            return report;
        }
        crate::evaluate::execute(self, data_set, cancel)
    }

    /// Shut the rule set down. In-flight executions stop at the next rule,
    /// later ones are skipped, and dispatchers driving it exit. Idempotent.
    pub fn stop(&self) {
        if !self.shutdown.is_cancelled() {
            info!(rule_set = %self.name, "stopping rule set");
            self.shutdown.cancel();
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Rule names in pre-order, the order a fully satisfied pass visits them.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for root in &self.rules {
            root.walk("", &mut |_, rule| names.push(rule.name()));
        }
        names
    }

    /// Declared dependencies that `data_set` does not provide, as
    /// `(rule path, data point name)` pairs.
    #[must_use]
    pub fn missing_data_points(&self, data_set: &DataSet) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for root in &self.rules {
            root.walk("", &mut |path, rule| {
                for dep in rule.evaluator().dependencies() {
                    if !data_set.contains(dep) {
                        missing.push((path.to_owned(), dep.clone()));
                    }
                }
            });
        }
        missing
    }

    /// Indented rendering of the whole forest.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = format!("RuleSet: {}\n", self.name);
        for root in &self.rules {
            root.write_report(&mut out, 1);
        }
        out
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules = 0;
        let mut actions = 0;
        for root in &self.rules {
            root.walk("", &mut |_, rule| {
                rules += 1;
                actions += rule.actions().len();
            });
        }
        write!(
            f,
            "RuleSet({}, {} roots, {} rules, {} actions)",
            self.name,
            self.rules.len(),
            rules,
            actions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_point, ActionError, BooleanFlag, ExprEvaluator, FlagSource, PercentageThreshold,
        StringEquals,
    };

    fn noop(_: &DataSet) -> Result<(), ActionError> {
        Ok(())
    }

    fn hedge_builder() -> RuleSetBuilder {
        RuleSetBuilder::new("SingleStockHedge")
            .rule("StatusWorking", |r| {
                r.when(StringEquals::new("OrderStatus", "WORKING"))
            })
            .rule("Filled50Percent", |r| {
                r.under("StatusWorking")
                    .when(PercentageThreshold::new(50.0))
            })
            .rule("HedgeRequired", |r| {
                r.under("Filled50Percent")
                    .when(BooleanFlag::new("HedgeRequired"))
                    .then("CreateHedgeOrder")
            })
            .action("CreateHedgeOrder", noop)
    }

    #[test]
    fn builder_assembles_tree() {
        let rs = hedge_builder().compile().unwrap();
        assert_eq!(rs.name(), "SingleStockHedge");
        assert_eq!(
            rs.execution_order(),
            vec!["StatusWorking", "Filled50Percent", "HedgeRequired"]
        );
        assert_eq!(rs.to_string(), "RuleSet(SingleStockHedge, 1 roots, 3 rules, 1 actions)");
    }

    #[test]
    fn builder_rule_without_when_returns_error() {
        let result = RuleSetBuilder::new("rs").rule("bad_rule", |r| r).compile();
        assert!(matches!(
            result,
            Err(BuildError::MissingCondition { rule }) if rule == "bad_rule"
        ));
    }

    #[test]
    fn report_lists_forest() {
        let rs = hedge_builder().compile().unwrap();
        let report = rs.report();
        assert!(report.starts_with("RuleSet: SingleStockHedge\n    Rule: StatusWorking"));
        assert!(report.contains("            Rule: HedgeRequired [flag(HedgeRequired)]\n"));
        assert!(report.ends_with("                Action: CreateHedgeOrder\n"));
    }

    #[test]
    fn missing_data_points_reports_rule_paths() {
        let rs = hedge_builder().compile().unwrap();
        let ds = DataSet::new("partial")
            .with_data_point("HedgeRequired", FlagSource::new("HedgeRequired", true))
            .unwrap();
        assert_eq!(
            rs.missing_data_points(&ds),
            vec![
                ("StatusWorking".to_owned(), "OrderStatus".to_owned()),
                (
                    "StatusWorking/Filled50Percent".to_owned(),
                    "FilledAmount".to_owned()
                ),
                (
                    "StatusWorking/Filled50Percent".to_owned(),
                    "TotalAmount".to_owned()
                ),
            ]
        );
    }

    #[test]
    fn stop_is_idempotent_and_skips_execution() {
        let mut rs = RuleSet::new("rs");
        rs.add_rule(Rule::new(
            "r",
            ExprEvaluator::new(data_point("x").eq(1_i64)),
        ));
        rs.stop();
        rs.stop();
        assert!(rs.is_stopped());
        let report = rs.execute(&DataSet::new("s"));
        assert!(report.cancelled());
        assert!(report.evaluation_order().is_empty());
    }
}
