use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::types::RuleDef;
use crate::{BuildError, Rule, RuleAction, RuleEvaluator, RuleSet};

pub(crate) fn compile(
    name: String,
    defs: &[RuleDef],
    actions: Vec<RuleAction>,
) -> Result<RuleSet, BuildError> {
    let action_map = check_actions(actions)?;
    check_duplicates(defs)?;
    let evaluators = check_conditions(defs)?;

    let index: HashMap<&str, usize> = defs
        .iter()
        .enumerate()
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();

    check_parents(defs, &index)?;
    check_action_refs(defs, &action_map)?;
    check_cycles(defs, &index)?;
    check_branch_actions(defs)?;

    // children[i] lists the rules attached under defs[i], in declaration order
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); defs.len()];
    let mut roots = Vec::new();
    for (i, def) in defs.iter().enumerate() {
        match &def.parent {
            Some(parent) => children[index[parent.as_str()]].push(i),
            None => roots.push(i),
        }
    }

    let mut rule_set = RuleSet::new(name);
    for root in roots {
        rule_set.add_rule(assemble(root, defs, &evaluators, &children, &action_map));
    }
    Ok(rule_set)
}

fn check_actions(actions: Vec<RuleAction>) -> Result<HashMap<String, RuleAction>, BuildError> {
    let mut map = HashMap::new();
    for action in actions {
        let name = action.name().to_owned();
        if map.insert(name.clone(), action).is_some() {
            return Err(BuildError::DuplicateAction { name });
        }
    }
    Ok(map)
}

fn check_duplicates(defs: &[RuleDef]) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    for def in defs {
        if !seen.insert(&def.name) {
            return Err(BuildError::DuplicateRule {
                name: def.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_conditions(defs: &[RuleDef]) -> Result<Vec<Arc<dyn RuleEvaluator>>, BuildError> {
    defs.iter()
        .map(|def| {
            def.evaluator
                .clone()
                .ok_or_else(|| BuildError::MissingCondition {
                    rule: def.name.clone(),
                })
        })
        .collect()
}

fn check_parents(defs: &[RuleDef], index: &HashMap<&str, usize>) -> Result<(), BuildError> {
    for def in defs {
        if let Some(parent) = &def.parent {
            if !index.contains_key(parent.as_str()) {
                return Err(BuildError::UndefinedParent {
                    rule: def.name.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_action_refs(
    defs: &[RuleDef],
    action_map: &HashMap<String, RuleAction>,
) -> Result<(), BuildError> {
    for def in defs {
        for action in &def.actions {
            if !action_map.contains_key(action) {
                return Err(BuildError::UndefinedAction {
                    rule: def.name.clone(),
                    action: action.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Actions only fire at satisfied leaves, so a rule with children must not carry any.
fn check_branch_actions(defs: &[RuleDef]) -> Result<(), BuildError> {
    let parents: HashSet<&str> = defs.iter().filter_map(|d| d.parent.as_deref()).collect();
    for def in defs {
        if let Some(action) = def.actions.first() {
            if parents.contains(def.name.as_str()) {
                return Err(BuildError::ActionOnBranch {
                    rule: def.name.clone(),
                    action: action.clone(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Unvisited,
    InChain,
    Done,
}

/// Follow parent links from every rule. Each rule has at most one parent, so
/// a chain either ends at a root or loops back onto itself.
fn check_cycles(defs: &[RuleDef], index: &HashMap<&str, usize>) -> Result<(), BuildError> {
    let mut state = vec![WalkState::Unvisited; defs.len()];

    for start in 0..defs.len() {
        let mut chain: Vec<usize> = Vec::new();
        let mut current = Some(start);

        while let Some(i) = current {
            match state[i] {
                WalkState::Done => break,
                WalkState::InChain => {
                    let pos = chain.iter().position(|&c| c == i).unwrap_or(0);
                    let mut path: Vec<String> =
                        chain[pos..].iter().map(|&c| defs[c].name.clone()).collect();
                    path.push(defs[i].name.clone());
                    return Err(BuildError::CyclicRule { path });
                }
                WalkState::Unvisited => {
                    state[i] = WalkState::InChain;
                    chain.push(i);
                    current = defs[i]
                        .parent
                        .as_deref()
                        .and_then(|p| index.get(p).copied());
                }
            }
        }

        for i in chain {
            state[i] = WalkState::Done;
        }
    }
    Ok(())
}

fn assemble(
    i: usize,
    defs: &[RuleDef],
    evaluators: &[Arc<dyn RuleEvaluator>],
    children: &[Vec<usize>],
    action_map: &HashMap<String, RuleAction>,
) -> Rule {
    let def = &defs[i];
    let mut rule = Rule::with_evaluator(def.name.clone(), Arc::clone(&evaluators[i]));
    for action in &def.actions {
        if let Some(a) = action_map.get(action) {
            rule.add_action(a.clone());
        }
    }
    for &child in &children[i] {
        rule.add_rule(assemble(child, defs, evaluators, children, action_map));
    }
    rule
}
