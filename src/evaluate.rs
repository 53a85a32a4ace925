use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use crate::types::{ExecutionReport, Failure, FailureKind, FiredAction};
use crate::{ActionError, DataSet, Rule, RuleSet};

enum Flow {
    Continue,
    Cancelled,
}

struct Pass<'a> {
    data_set: &'a DataSet,
    cancel: &'a CancellationToken,
    shutdown: &'a CancellationToken,
    path: Vec<&'a str>,
    report: ExecutionReport,
}

impl Pass<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.shutdown.is_cancelled()
    }
}

pub(crate) fn execute(
    rule_set: &RuleSet,
    data_set: &DataSet,
    cancel: &CancellationToken,
) -> ExecutionReport {
    let span = info_span!("execute", rule_set = rule_set.name(), data_set = data_set.name());
    let _guard = span.enter();
    let _pass = data_set.lock_pass();
    let start = Instant::now();

    let mut pass = Pass {
        data_set,
        cancel,
        shutdown: rule_set.shutdown_token(),
        path: Vec::new(),
        report: ExecutionReport::new(rule_set.name(), data_set.name()),
    };

    for root in rule_set.rules() {
        match visit(root, &mut pass) {
            Flow::Continue => {}
            Flow::Cancelled => {
                debug!("execution cancelled");
                pass.report.cancelled = true;
                break;
            }
        }
    }

    pass.report.duration = start.elapsed();
    pass.report
}

fn visit<'a>(rule: &'a Rule, pass: &mut Pass<'a>) -> Flow {
    if pass.is_cancelled() {
        return Flow::Cancelled;
    }
    pass.path.push(rule.name());
    let flow = visit_node(rule, pass);
    pass.path.pop();
    flow
}

fn visit_node<'a>(rule: &'a Rule, pass: &mut Pass<'a>) -> Flow {
    let path = pass.path.join("/");
    pass.report.evaluation_order.push(path.clone());

    let satisfied = match rule.evaluator().evaluate(pass.data_set) {
        Ok(result) => result,
        Err(e) => {
            warn!(rule = %path, error = %e, "evaluation failed, rule not satisfied");
            pass.report.failures.push(Failure {
                rule: path,
                kind: FailureKind::Evaluation(e),
            });
            return Flow::Continue;
        }
    };

    debug!(rule = %path, satisfied, "rule evaluated");
    if !satisfied {
        return Flow::Continue;
    }
    pass.report.satisfied.push(path.clone());

    if rule.is_leaf() {
        return fire(rule, path, pass);
    }

    // Every child is explored; one child's outcome never hides a sibling.
    for child in rule.children() {
        match visit(child, pass) {
            Flow::Continue => {}
            Flow::Cancelled => return Flow::Cancelled,
        }
    }
    Flow::Continue
}

fn fire(rule: &Rule, path: String, pass: &mut Pass<'_>) -> Flow {
    for action in rule.actions() {
        if pass.is_cancelled() {
            return Flow::Cancelled;
        }
        let data_set = pass.data_set;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action.execute(data_set)))
            .unwrap_or_else(|payload| Err(ActionError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(()) => {
                info!(rule = %path, action = action.name(), "action executed");
                pass.report.fired.push(FiredAction {
                    rule: path.clone(),
                    action: action.name().to_owned(),
                });
            }
            Err(e) => {
                // The rest of this leaf's actions are skipped; siblings still run.
                error!(rule = %path, action = action.name(), error = %e, "action failed");
                pass.report.failures.push(Failure {
                    rule: path,
                    kind: FailureKind::Action {
                        action: action.name().to_owned(),
                        error: e,
                    },
                });
                return Flow::Continue;
            }
        }
    }
    Flow::Continue
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
