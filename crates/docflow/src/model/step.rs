use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DocumentId;

/// One stage of the document pipeline. The declaration order is the
/// canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Hash,
    Thumbnail,
    ParseContent,
    Rules,
    IndexForSearch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown processing step: {0}")]
pub struct UnknownStep(pub String);

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Hash,
        Step::Thumbnail,
        Step::ParseContent,
        Step::Rules,
        Step::IndexForSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Hash => "hash",
            Step::Thumbnail => "thumbnail",
            Step::ParseContent => "parse_content",
            Step::Rules => "rules",
            Step::IndexForSearch => "index_for_search",
        }
    }

    /// Whether a failed execution drops the step from the pending set.
    ///
    /// Hash and ParseContent stay pending so a later pass retries them.
    pub fn removed_on_failure(&self) -> bool {
        matches!(self, Step::Thumbnail | Step::Rules | Step::IndexForSearch)
    }

    /// Returns the given steps deduplicated and in canonical order, whatever
    /// order storage reported them in.
    pub fn in_canonical_order<I>(steps: I) -> Vec<Step>
    where
        I: IntoIterator<Item = Step>,
    {
        let mut ordered: Vec<Step> = steps.into_iter().collect();
        ordered.sort();
        ordered.dedup();
        ordered
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Awaiting,
    Running,
    Finished,
    Failure,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Awaiting => "awaiting",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failure => "failure",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting" => Ok(JobStatus::Awaiting),
            "running" => Ok(JobStatus::Running),
            "finished" => Ok(JobStatus::Finished),
            "failure" => Ok(JobStatus::Failure),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Execution record of one (document, step) attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub document_id: DocumentId,
    pub step: Step,
    pub status: JobStatus,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_open(&self) -> bool {
        matches!(self.status, JobStatus::Awaiting | JobStatus::Running)
    }
}
