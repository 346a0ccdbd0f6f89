//! Automatic filter rules: a single exact or regex filter over the extracted
//! content, feeding the captured value into one action.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{date, RuleError};
use crate::model::{Document, MetadataValue, TagRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum FilterPattern {
    Exact(String),
    Regex(String),
}

impl FilterPattern {
    /// Returns the captured value if the filter matches `content`.
    ///
    /// Exact filters match case-insensitively and capture the lower-cased
    /// pattern. Regex filters capture their first group when the pattern has
    /// one, the whole match otherwise.
    pub fn capture(&self, content: &str) -> Result<Option<String>, RuleError> {
        match self {
            FilterPattern::Exact(pattern) => {
                if pattern.is_empty() {
                    return Ok(None);
                }
                let needle = pattern.to_lowercase();
                if content.to_lowercase().contains(&needle) {
                    Ok(Some(needle))
                } else {
                    Ok(None)
                }
            }
            FilterPattern::Regex(pattern) => {
                let re = Regex::new(pattern).map_err(|source| RuleError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })?;
                let Some(caps) = re.captures(content) else {
                    return Ok(None);
                };
                let capture = if re.captures_len() > 1 {
                    caps.get(1)
                } else {
                    caps.get(0)
                };
                Ok(capture.map(|m| m.as_str().to_string()))
            }
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, FilterPattern::Regex(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterAction {
    Rename,
    /// Without a `value_id` the captured text becomes the metadata value.
    AddMetadata {
        key_id: i64,
        #[serde(default)]
        value_id: Option<i64>,
    },
    AddTag {
        tag_id: i64,
    },
    SetDate {
        format: String,
        #[serde(default)]
        separator: Option<String>,
    },
    AppendDescription {
        #[serde(default)]
        label: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomaticRule {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    pub filter: FilterPattern,
    pub action: FilterAction,
}

/// Applies one automatic rule. `resolve_value` maps `(key_id, captured)` to a
/// metadata value id, creating the value if needed.
///
/// Returns whether the filter matched and the action ran.
pub fn apply_automatic<F>(
    rule: &AutomaticRule,
    doc: &mut Document,
    mut resolve_value: F,
) -> Result<bool, RuleError>
where
    F: FnMut(i64, &str) -> Result<i64, RuleError>,
{
    let captured = match rule.filter.capture(&doc.content)? {
        Some(c) if !c.is_empty() => c,
        _ => return Ok(false),
    };

    match &rule.action {
        FilterAction::Rename => doc.name = captured,
        FilterAction::AddMetadata { key_id, value_id } => {
            let value_id = match value_id {
                Some(id) => *id,
                None => resolve_value(*key_id, &captured)?,
            };
            doc.add_metadata(*key_id, value_id);
        }
        FilterAction::AddTag { tag_id } => doc.tags.push(TagRef {
            id: *tag_id,
            name: String::new(),
        }),
        FilterAction::SetDate { format, separator } => {
            let value = match separator.as_deref() {
                Some(sep) => date::pad_components(&captured, sep),
                None => captured,
            };
            doc.date = Some(date::parse_date(&value, format)?);
        }
        FilterAction::AppendDescription { label } => {
            let text = match label.as_deref() {
                Some(label) if rule.filter.is_regex() && !label.is_empty() => {
                    format!("{}: {}", label, captured)
                }
                _ => captured,
            };
            if doc.description.is_empty() {
                doc.description = text;
            } else {
                doc.description = format!("{}\n\n{}", doc.description, text);
            }
        }
    }

    Ok(true)
}

/// Attaches every metadata value whose filter matches the document content.
///
/// Values are matched independently; a broken filter is returned with the
/// value id in the error list while the remaining values still apply.
pub fn match_metadata(values: &[MetadataValue], doc: &mut Document) -> Vec<(i64, RuleError)> {
    let mut errors = Vec::new();

    for value in values {
        let Some(filter) = &value.filter else {
            continue;
        };
        match filter.capture(&doc.content) {
            Ok(Some(captured)) if !captured.is_empty() => {
                doc.add_metadata(value.key_id, value.id);
            }
            Ok(_) => {}
            Err(e) => errors.push((value.id, e)),
        }
    }

    errors
}
