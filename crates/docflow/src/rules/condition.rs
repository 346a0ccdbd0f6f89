use std::fmt;

use serde::{Deserialize, Serialize};

use super::RuleError;
use crate::model::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Name,
    Description,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextOp {
    Is,
    Starts,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Equal,
    Less,
    Greater,
}

/// What a condition tests. Stored as JSON tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    Text {
        field: TextField,
        op: TextOp,
        value: String,
    },
    MetadataHasKey {
        key_id: i64,
    },
    MetadataHasKeyValue {
        key_id: i64,
        value_id: i64,
    },
    /// `value` is kept as entered by the user and parsed on evaluation.
    MetadataCount {
        comparison: Comparison,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub inverse: bool,
    #[serde(flatten)]
    pub predicate: Predicate,
}

impl Condition {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            enabled: true,
            case_insensitive: false,
            inverse: false,
            predicate,
        }
    }

    pub fn text(field: TextField, op: TextOp, value: &str) -> Self {
        Self::new(Predicate::Text {
            field,
            op,
            value: value.to_string(),
        })
    }

    pub fn inverted(mut self) -> Self {
        self.inverse = !self.inverse;
        self
    }

    pub fn ignoring_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Evaluates the predicate and applies the inversion flag.
    pub fn evaluate(&self, doc: &Document) -> Result<bool, RuleError> {
        let raw = self.evaluate_raw(doc)?;
        Ok(raw != self.inverse)
    }

    fn evaluate_raw(&self, doc: &Document) -> Result<bool, RuleError> {
        match &self.predicate {
            Predicate::Text { field, op, value } => {
                let subject = match field {
                    TextField::Name => doc.name.as_str(),
                    TextField::Description => doc.description.as_str(),
                    TextField::Content => doc.content.as_str(),
                };
                Ok(compare_text(subject, value, *op, self.case_insensitive))
            }
            Predicate::MetadataHasKey { key_id } => {
                Ok(doc.metadata.iter().any(|m| m.key_id == *key_id))
            }
            Predicate::MetadataHasKeyValue { key_id, value_id } => {
                Ok(doc.has_metadata(*key_id, *value_id))
            }
            Predicate::MetadataCount { comparison, value } => {
                let expected: usize = value
                    .trim()
                    .parse()
                    .map_err(|_| RuleError::NonNumericCount(value.clone()))?;
                let count = doc.metadata.len();
                Ok(match comparison {
                    Comparison::Equal => count == expected,
                    Comparison::Less => count < expected,
                    Comparison::Greater => count > expected,
                })
            }
        }
    }
}

fn compare_text(subject: &str, value: &str, op: TextOp, case_insensitive: bool) -> bool {
    let (subject, value) = if case_insensitive {
        (subject.to_lowercase(), value.to_lowercase())
    } else {
        (subject.to_string(), value.to_string())
    };

    match op {
        TextOp::Is => subject == value,
        TextOp::Starts => subject.starts_with(&value),
        TextOp::Contains => subject.contains(&value),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverse {
            f.write_str("not ")?;
        }
        match &self.predicate {
            Predicate::Text { field, op, value } => {
                let field = match field {
                    TextField::Name => "name",
                    TextField::Description => "description",
                    TextField::Content => "content",
                };
                let op = match op {
                    TextOp::Is => "is",
                    TextOp::Starts => "starts with",
                    TextOp::Contains => "contains",
                };
                write!(f, "{} {} \"{}\"", field, op, value)?;
            }
            Predicate::MetadataHasKey { key_id } => write!(f, "has metadata key {}", key_id)?,
            Predicate::MetadataHasKeyValue { key_id, value_id } => {
                write!(f, "has metadata {}={}", key_id, value_id)?
            }
            Predicate::MetadataCount { comparison, value } => {
                let op = match comparison {
                    Comparison::Equal => "==",
                    Comparison::Less => "<",
                    Comparison::Greater => ">",
                };
                write!(f, "metadata count {} {}", op, value)?;
            }
        }
        if self.case_insensitive {
            f.write_str(" (ignore case)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        let mut doc = Document::new(1, "Invoice.pdf", "application/pdf", 1, "h");
        doc.description = "Monthly ACME invoice".to_string();
        doc.content = "Total due: 42 EUR".to_string();
        doc
    }

    #[test]
    fn test_text_operators() {
        let d = doc();
        assert!(Condition::text(TextField::Name, TextOp::Is, "Invoice")
            .evaluate(&d)
            .unwrap());
        assert!(!Condition::text(TextField::Name, TextOp::Is, "invoice")
            .evaluate(&d)
            .unwrap());
        assert!(Condition::text(TextField::Description, TextOp::Starts, "Monthly")
            .evaluate(&d)
            .unwrap());
        assert!(Condition::text(TextField::Content, TextOp::Contains, "42 EUR")
            .evaluate(&d)
            .unwrap());
    }

    #[test]
    fn test_case_insensitive_applies_to_both_operands() {
        let d = doc();
        let cond = Condition::text(TextField::Description, TextOp::Contains, "acme").ignoring_case();
        assert!(cond.evaluate(&d).unwrap());

        let cond = Condition::text(TextField::Name, TextOp::Is, "INVOICE").ignoring_case();
        assert!(cond.evaluate(&d).unwrap());
    }

    #[test]
    fn test_inverse_negates_result() {
        let d = doc();
        let cond = Condition::text(TextField::Name, TextOp::Is, "Invoice").inverted();
        assert!(!cond.evaluate(&d).unwrap());
    }

    #[test]
    fn test_metadata_predicates() {
        let mut d = doc();
        d.add_metadata(1, 10);
        d.add_metadata(2, 20);

        assert!(Condition::new(Predicate::MetadataHasKey { key_id: 2 })
            .evaluate(&d)
            .unwrap());
        assert!(!Condition::new(Predicate::MetadataHasKeyValue { key_id: 2, value_id: 10 })
            .evaluate(&d)
            .unwrap());

        let count = |comparison, value: &str| {
            Condition::new(Predicate::MetadataCount {
                comparison,
                value: value.to_string(),
            })
        };
        assert!(count(Comparison::Equal, "2").evaluate(&d).unwrap());
        assert!(count(Comparison::Less, "3").evaluate(&d).unwrap());
        assert!(!count(Comparison::Greater, "2").evaluate(&d).unwrap());
    }

    #[test]
    fn test_non_numeric_count_is_an_error() {
        let cond = Condition::new(Predicate::MetadataCount {
            comparison: Comparison::Equal,
            value: "many".to_string(),
        });
        assert!(matches!(
            cond.evaluate(&doc()),
            Err(RuleError::NonNumericCount(v)) if v == "many"
        ));
    }

    #[test]
    fn test_condition_json_shape() {
        let json = r#"{"type":"text","field":"name","op":"starts","value":"Inv","inverse":true}"#;
        let cond: Condition = serde_json::from_str(json).unwrap();
        assert!(cond.enabled);
        assert!(cond.inverse);
        assert!(!cond.case_insensitive);
        assert_eq!(
            cond.predicate,
            Predicate::Text {
                field: TextField::Name,
                op: TextOp::Starts,
                value: "Inv".to_string()
            }
        );

        let unknown = r#"{"type":"filesize","value":"1"}"#;
        assert!(serde_json::from_str::<Condition>(unknown).is_err());
    }
}
