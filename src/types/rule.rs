use std::fmt::Write as _;
use std::sync::Arc;

use super::action::RuleAction;
use super::evaluator::RuleEvaluator;

/// Node of a rule tree: one evaluator, ordered children and ordered actions.
///
/// A rule is satisfied when its evaluator returns `true`. Children of a
/// satisfied rule are all evaluated, in order; actions only run on a satisfied
/// rule with no children. Rules keep no per-data-set state, so one tree serves
/// every evaluation.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    evaluator: Arc<dyn RuleEvaluator>,
    children: Vec<Rule>,
    actions: Vec<RuleAction>,
}

impl Rule {
    pub fn new(name: impl Into<String>, evaluator: impl RuleEvaluator + 'static) -> Self {
        Self::with_evaluator(name, Arc::new(evaluator))
    }

    pub fn with_evaluator(name: impl Into<String>, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        Self {
            name: name.into(),
            evaluator,
            children: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Append a child rule.
    pub fn add_rule(&mut self, child: Rule) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Append an action, run when this rule is a satisfied leaf.
    pub fn add_action(&mut self, action: RuleAction) -> &mut Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn with_rule(mut self, child: Rule) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn evaluator(&self) -> &dyn RuleEvaluator {
        self.evaluator.as_ref()
    }

    #[must_use]
    pub fn children(&self) -> &[Rule] {
        &self.children
    }

    #[must_use]
    pub fn actions(&self) -> &[RuleAction] {
        &self.actions
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Indented rendering of this rule, its evaluator, actions and children.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        self.write_report(&mut out, 0);
        out
    }

    pub(crate) fn write_report(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        let _ = writeln!(out, "{indent}Rule: {} [{}]", self.name, self.evaluator);
        for action in &self.actions {
            let _ = writeln!(out, "{indent}    Action: {}", action.name());
        }
        for child in &self.children {
            child.write_report(out, depth + 1);
        }
    }

    /// Visit this rule and its descendants in pre-order with their paths.
    pub(crate) fn walk<'a>(&'a self, prefix: &str, visit: &mut impl FnMut(&str, &'a Rule)) {
        let path = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}/{}", self.name)
        };
        visit(&path, self);
        for child in &self.children {
            child.walk(&path, visit);
        }
    }
}

/// Name-based rule definition collected by
/// [`RuleSetBuilder`](super::RuleSetBuilder) before compilation.
#[derive(Debug, Clone)]
pub(crate) struct RuleDef {
    pub(crate) name: String,
    pub(crate) evaluator: Option<Arc<dyn RuleEvaluator>>,
    pub(crate) parent: Option<String>,
    pub(crate) actions: Vec<String>,
}
