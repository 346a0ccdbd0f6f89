//! Rule repository. Conditions, actions, filters and filter actions are
//! stored as JSON; a row that fails to decode is returned as an error in its
//! slot so the remaining rules still run.

use rusqlite::params;

use super::{Database, DatabaseError};
use crate::model::UserId;
use crate::rules::{AutomaticRule, MatchMode, Rule, RuleError};

fn mode_str(mode: MatchMode) -> &'static str {
    match mode {
        MatchMode::MatchAll => "match_all",
        MatchMode::MatchAny => "match_any",
    }
}

/// Inserts a rule at the end of the user's list and returns its id.
pub fn insert(db: &Database, rule: &Rule) -> Result<i64, DatabaseError> {
    let conditions = serde_json::to_string(&rule.conditions)?;
    let actions = serde_json::to_string(&rule.actions)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO rules (user_id, name, mode, enabled, position, conditions, actions)
             VALUES (?1, ?2, ?3, ?4,
                     (SELECT COALESCE(MAX(position), 0) + 1 FROM rules WHERE user_id = ?1),
                     ?5, ?6)",
            params![
                rule.user_id,
                rule.name,
                mode_str(rule.mode),
                rule.enabled,
                conditions,
                actions
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

struct RuleRow {
    id: i64,
    user_id: i64,
    name: String,
    mode: String,
    conditions: String,
    actions: String,
}

impl RuleRow {
    fn decode(self) -> Result<Rule, RuleError> {
        let decode_err = |message: String| RuleError::Decode {
            rule: self.name.clone(),
            message,
        };

        let mode = match self.mode.as_str() {
            "match_all" => MatchMode::MatchAll,
            "match_any" => MatchMode::MatchAny,
            other => return Err(decode_err(format!("unknown match mode '{}'", other))),
        };
        let conditions = serde_json::from_str(&self.conditions)
            .map_err(|e| decode_err(format!("conditions: {}", e)))?;
        let actions = serde_json::from_str(&self.actions)
            .map_err(|e| decode_err(format!("actions: {}", e)))?;

        Ok(Rule {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            mode,
            enabled: true,
            conditions,
            actions,
        })
    }
}

/// Enabled rules of the user, in stored order.
pub fn active_rules(
    db: &Database,
    user: UserId,
) -> Result<Vec<Result<Rule, RuleError>>, DatabaseError> {
    let rows: Vec<RuleRow> = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, mode, conditions, actions FROM rules
             WHERE user_id = ?1 AND enabled = 1
             ORDER BY position, id",
        )?;
        let rows = stmt
            .query_map(params![user], |r| {
                Ok(RuleRow {
                    id: r.get(0)?,
                    user_id: r.get(1)?,
                    name: r.get(2)?,
                    mode: r.get(3)?,
                    conditions: r.get(4)?,
                    actions: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    Ok(rows.into_iter().map(RuleRow::decode).collect())
}

pub fn insert_automatic(db: &Database, rule: &AutomaticRule) -> Result<i64, DatabaseError> {
    let filter = serde_json::to_string(&rule.filter)?;
    let action = serde_json::to_string(&rule.action)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO automatic_rules (user_id, name, enabled, filter, action)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![rule.user_id, rule.name, rule.enabled, filter, action],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn automatic_rules(
    db: &Database,
    user: UserId,
) -> Result<Vec<Result<AutomaticRule, RuleError>>, DatabaseError> {
    let rows: Vec<(i64, i64, String, String, String)> = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, filter, action FROM automatic_rules
             WHERE user_id = ?1 AND enabled = 1
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![user], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    Ok(rows
        .into_iter()
        .map(|(id, user_id, name, filter, action)| {
            let filter = serde_json::from_str(&filter).map_err(|e| RuleError::Decode {
                rule: name.clone(),
                message: format!("filter: {}", e),
            })?;
            let action = serde_json::from_str(&action).map_err(|e| RuleError::Decode {
                rule: name.clone(),
                message: format!("action: {}", e),
            })?;
            Ok(AutomaticRule {
                id,
                user_id,
                name,
                enabled: true,
                filter,
                action,
            })
        })
        .collect())
}
