//! User rules and automatic filter rules.
//!
//! Both evaluators are plain functions over a [`Document`](crate::model::Document)
//! snapshot. Persisting the mutated document is up to the caller.

pub mod action;
pub mod automatic;
pub mod condition;
pub mod date;
pub mod engine;
pub mod error;

use serde::{Deserialize, Serialize};

pub use action::Action;
pub use automatic::{apply_automatic, match_metadata, AutomaticRule, FilterAction, FilterPattern};
pub use condition::{Comparison, Condition, Predicate, TextField, TextOp};
pub use engine::{apply_rule, matches, run_actions, trace_rule, RuleTrace};
pub use error::RuleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    MatchAll,
    MatchAny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub mode: MatchMode,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// Rules without conditions or without actions are never run.
    pub fn is_runnable(&self) -> bool {
        self.enabled && !self.conditions.is_empty() && !self.actions.is_empty()
    }
}
