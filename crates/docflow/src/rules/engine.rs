use std::fmt;

use super::{Action, Condition, MatchMode, Rule, RuleError};
use crate::model::Document;

/// Observes rule evaluation. The normal path uses the no-op `()` recorder,
/// [`trace_rule`] records into a [`RuleTrace`].
trait Recorder {
    fn condition(&mut self, _index: usize, _condition: &Condition, _outcome: ConditionOutcome) {}
    fn action(&mut self, _index: usize, _action: &Action, _result: &Result<(), RuleError>) {}
}

impl Recorder for () {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionOutcome {
    Skipped,
    Evaluated(bool),
    Failed(String),
}

fn evaluate<R: Recorder>(rule: &Rule, doc: &Document, recorder: &mut R) -> Result<bool, RuleError> {
    let mut evaluated = 0usize;

    for (index, condition) in rule.conditions.iter().enumerate() {
        if !condition.enabled {
            recorder.condition(index, condition, ConditionOutcome::Skipped);
            continue;
        }

        let result = match condition.evaluate(doc) {
            Ok(result) => result,
            Err(e) => {
                recorder.condition(index, condition, ConditionOutcome::Failed(e.to_string()));
                return Err(e);
            }
        };
        recorder.condition(index, condition, ConditionOutcome::Evaluated(result));
        evaluated += 1;

        match rule.mode {
            MatchMode::MatchAll if !result => return Ok(false),
            MatchMode::MatchAny if result => return Ok(true),
            _ => {}
        }
    }

    // A rule whose conditions are all disabled never matches.
    Ok(match rule.mode {
        MatchMode::MatchAll => evaluated > 0,
        MatchMode::MatchAny => false,
    })
}

fn apply<R: Recorder>(rule: &Rule, doc: &mut Document, recorder: &mut R) -> Result<(), RuleError> {
    let mut first_error = None;

    for (index, action) in rule.actions.iter().enumerate() {
        let result = action.apply(doc);
        recorder.action(index, action, &result);
        if let Err(e) = result {
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Evaluates the rule's conditions against the document.
pub fn matches(rule: &Rule, doc: &Document) -> Result<bool, RuleError> {
    evaluate(rule, doc, &mut ())
}

/// Runs every action in order. A failing action does not stop the remaining
/// ones; the first error is returned once all have run.
pub fn run_actions(rule: &Rule, doc: &mut Document) -> Result<(), RuleError> {
    apply(rule, doc, &mut ())
}

/// Runs the rule's actions if its conditions match. Returns whether it matched.
pub fn apply_rule(rule: &Rule, doc: &mut Document) -> Result<bool, RuleError> {
    if !matches(rule, doc)? {
        return Ok(false);
    }
    run_actions(rule, doc)?;
    Ok(true)
}

#[derive(Debug, Clone)]
pub struct ConditionTrace {
    pub index: usize,
    pub description: String,
    pub outcome: ConditionOutcome,
}

#[derive(Debug, Clone)]
pub struct ActionTrace {
    pub index: usize,
    pub description: String,
    pub error: Option<String>,
}

/// Step-by-step record of one rule execution, for rule debugging.
#[derive(Debug, Clone, Default)]
pub struct RuleTrace {
    pub rule: String,
    pub conditions: Vec<ConditionTrace>,
    pub matched: bool,
    pub actions: Vec<ActionTrace>,
    pub error: Option<String>,
}

impl Recorder for RuleTrace {
    fn condition(&mut self, index: usize, condition: &Condition, outcome: ConditionOutcome) {
        self.conditions.push(ConditionTrace {
            index,
            description: condition.to_string(),
            outcome,
        });
    }

    fn action(&mut self, index: usize, action: &Action, result: &Result<(), RuleError>) {
        self.actions.push(ActionTrace {
            index,
            description: action.to_string(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
    }
}

/// Same as [`apply_rule`], recording every condition and action on the way.
pub fn trace_rule(rule: &Rule, doc: &mut Document) -> RuleTrace {
    let mut trace = RuleTrace {
        rule: rule.name.clone(),
        ..Default::default()
    };

    match evaluate(rule, doc, &mut trace) {
        Ok(true) => {
            trace.matched = true;
            if let Err(e) = apply(rule, doc, &mut trace) {
                trace.error = Some(e.to_string());
            }
        }
        Ok(false) => {}
        Err(e) => trace.error = Some(e.to_string()),
    }

    trace
}

impl fmt::Display for RuleTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rule \"{}\"", self.rule)?;
        for c in &self.conditions {
            let outcome = match &c.outcome {
                ConditionOutcome::Skipped => "skipped (disabled)".to_string(),
                ConditionOutcome::Evaluated(true) => "matched".to_string(),
                ConditionOutcome::Evaluated(false) => "no match".to_string(),
                ConditionOutcome::Failed(e) => format!("error: {}", e),
            };
            writeln!(f, "  condition #{} {}: {}", c.index + 1, c.description, outcome)?;
        }
        writeln!(f, "  => {}", if self.matched { "matched" } else { "not matched" })?;
        for a in &self.actions {
            match &a.error {
                None => writeln!(f, "  action #{} {}: ok", a.index + 1, a.description)?,
                Some(e) => writeln!(f, "  action #{} {}: error: {}", a.index + 1, a.description, e)?,
            }
        }
        if let Some(e) = &self.error {
            writeln!(f, "  error: {}", e)?;
        }
        Ok(())
    }
}
