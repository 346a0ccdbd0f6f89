use std::fmt;

use serde::{Deserialize, Serialize};

use super::{date, RuleError};
use crate::model::{Document, TagRef};

/// A document mutation run when a rule matches. Stored as JSON tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SetName { value: String },
    AppendName { value: String },
    SetDescription { value: String },
    AppendDescription { value: String },
    AddMetadata { key_id: i64, value_id: i64 },
    AddTag { tag_id: i64 },
    SetDate { value: String, format: String },
}

impl Action {
    pub fn apply(&self, doc: &mut Document) -> Result<(), RuleError> {
        match self {
            Action::SetName { value } => doc.name = value.clone(),
            Action::AppendName { value } => doc.name.push_str(value),
            Action::SetDescription { value } => doc.description = value.clone(),
            Action::AppendDescription { value } => doc.description.push_str(value),
            Action::AddMetadata { key_id, value_id } => {
                doc.add_metadata(*key_id, *value_id);
            }
            Action::AddTag { tag_id } => doc.tags.push(TagRef {
                id: *tag_id,
                name: String::new(),
            }),
            Action::SetDate { value, format } => {
                doc.date = Some(date::parse_date(value, format)?);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SetName { value } => write!(f, "set name to \"{}\"", value),
            Action::AppendName { value } => write!(f, "append \"{}\" to name", value),
            Action::SetDescription { value } => write!(f, "set description to \"{}\"", value),
            Action::AppendDescription { value } => {
                write!(f, "append \"{}\" to description", value)
            }
            Action::AddMetadata { key_id, value_id } => {
                write!(f, "add metadata {}={}", key_id, value_id)
            }
            Action::AddTag { tag_id } => write!(f, "add tag {}", tag_id),
            Action::SetDate { value, format } => {
                write!(f, "set date from \"{}\" using \"{}\"", value, format)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_name_and_description_actions() {
        let mut doc = Document::new(1, "scan.pdf", "application/pdf", 1, "h");

        Action::SetName { value: "Invoice".into() }.apply(&mut doc).unwrap();
        Action::AppendName { value: " 2024".into() }.apply(&mut doc).unwrap();
        Action::SetDescription { value: "ACME".into() }.apply(&mut doc).unwrap();
        Action::AppendDescription { value: " Corp".into() }.apply(&mut doc).unwrap();

        assert_eq!(doc.name, "Invoice 2024");
        assert_eq!(doc.description, "ACME Corp");
    }

    #[test]
    fn test_add_metadata_twice_keeps_one_entry() {
        let mut doc = Document::new(1, "scan.pdf", "application/pdf", 1, "h");
        let action = Action::AddMetadata { key_id: 4, value_id: 9 };

        action.apply(&mut doc).unwrap();
        action.apply(&mut doc).unwrap();

        assert_eq!(doc.metadata.len(), 1);
    }

    #[test]
    fn test_add_tag_appends_unconditionally() {
        let mut doc = Document::new(1, "scan.pdf", "application/pdf", 1, "h");
        let action = Action::AddTag { tag_id: 2 };

        action.apply(&mut doc).unwrap();
        action.apply(&mut doc).unwrap();

        assert_eq!(doc.tags.len(), 2);
    }

    #[test]
    fn test_set_date() {
        let mut doc = Document::new(1, "scan.pdf", "application/pdf", 1, "h");
        Action::SetDate {
            value: "24.12.2023".into(),
            format: "02.01.2006".into(),
        }
        .apply(&mut doc)
        .unwrap();

        let date = doc.date.unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2023, 12, 24));

        let bad = Action::SetDate {
            value: "soon".into(),
            format: "2006".into(),
        };
        assert!(bad.apply(&mut doc).is_err());
        assert_eq!(doc.date, Some(date));
    }
}
