//! Pending steps and job records.

use rusqlite::{params, OptionalExtension, Row};

use super::{from_ts, now, to_ts, Database, DatabaseError};
use crate::model::{DocumentId, Job, JobStatus, Step};

fn parse_step(raw: &str) -> Option<Step> {
    match raw.parse::<Step>() {
        Ok(step) => Some(step),
        Err(e) => {
            log::warn!("{}, skipping", e);
            None
        }
    }
}

pub fn add_pending(db: &Database, id: DocumentId, steps: &[Step]) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("INSERT OR IGNORE INTO pending_steps (document_id, step) VALUES (?1, ?2)")?;
        for step in steps {
            stmt.execute(params![id, step.as_str()])?;
        }
        Ok(())
    })
}

/// Pending steps of a document in canonical order. Unknown step names are
/// logged and skipped.
pub fn pending_for_document(db: &Database, id: DocumentId) -> Result<Vec<Step>, DatabaseError> {
    let raw: Vec<String> = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT step FROM pending_steps WHERE document_id = ?1")?;
        let rows = stmt
            .query_map(params![id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(rows)
    })?;

    Ok(Step::in_canonical_order(
        raw.iter().filter_map(|s| parse_step(s)),
    ))
}

/// Every pending (document, step) pair, oldest document first.
pub fn all_pending(db: &Database) -> Result<Vec<(DocumentId, Step)>, DatabaseError> {
    let raw: Vec<(DocumentId, String)> = db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT document_id, step FROM pending_steps ORDER BY document_id")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    Ok(raw
        .into_iter()
        .filter_map(|(id, step)| parse_step(&step).map(|s| (id, s)))
        .collect())
}

pub fn remove_pending(db: &Database, id: DocumentId, step: Step) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM pending_steps WHERE document_id = ?1 AND step = ?2",
            params![id, step.as_str()],
        )?;
        Ok(())
    })
}

fn job_from_row(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    let step: String = row.get("step")?;
    let status: String = row.get("status")?;
    let decode = |column: usize, reason: String| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(DatabaseError::Decode {
                column: if column == 2 { "step" } else { "status" },
                reason,
            }),
        )
    };

    Ok(Job {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        step: step.parse().map_err(|e: crate::model::UnknownStep| decode(2, e.to_string()))?,
        status: status.parse().map_err(|e: String| decode(3, e))?,
        message: row.get("message")?,
        started_at: from_ts(row.get("started_at")?),
        stopped_at: from_ts(row.get("stopped_at")?),
    })
}

const JOB_COLUMNS: &str = "id, document_id, step, status, message, started_at, stopped_at";

/// Reactivates the newest awaiting job for (document, step) or inserts a new
/// one, marking it running.
pub fn start_job(
    db: &Database,
    id: DocumentId,
    step: Step,
    message: &str,
) -> Result<Job, DatabaseError> {
    db.with_conn(|conn| {
        let started = now();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM jobs WHERE document_id = ?1 AND step = ?2 AND status = 'awaiting'
                 ORDER BY id DESC LIMIT 1",
                params![id, step.as_str()],
                |r| r.get(0),
            )
            .optional()?;

        let job_id = match existing {
            Some(job_id) => {
                conn.execute(
                    "UPDATE jobs SET status = 'running', message = ?2, started_at = ?3,
                     stopped_at = NULL WHERE id = ?1",
                    params![job_id, message, started],
                )?;
                job_id
            }
            None => {
                conn.execute(
                    "INSERT INTO jobs (document_id, step, status, message, started_at)
                     VALUES (?1, ?2, 'running', ?3, ?4)",
                    params![id, step.as_str(), message, started],
                )?;
                conn.last_insert_rowid()
            }
        };

        let job = conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
            params![job_id],
            job_from_row,
        )?;
        Ok(job)
    })
}

pub fn update_job(db: &Database, job: &Job) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = ?2, message = ?3, started_at = ?4, stopped_at = ?5
             WHERE id = ?1",
            params![
                job.id,
                job.status.as_str(),
                job.message,
                to_ts(job.started_at),
                to_ts(job.stopped_at),
            ],
        )?;
        Ok(())
    })
}

pub fn jobs_for_document(db: &Database, id: DocumentId) -> Result<Vec<Job>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM jobs WHERE document_id = ?1 ORDER BY id",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(params![id], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    })
}

/// Running jobs left over from a previous process go back to awaiting.
pub fn reset_running(db: &Database) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute(
            "UPDATE jobs SET status = 'awaiting' WHERE status = 'running'",
            [],
        )?;
        Ok(n)
    })
}

/// Fails the document's open jobs and drops all of its pending steps.
pub fn cancel_document(db: &Database, id: DocumentId) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE jobs SET status = ?2, message = 'processing cancelled', stopped_at = ?3
             WHERE document_id = ?1 AND status IN ('awaiting', 'running')",
            params![id, JobStatus::Failure.as_str(), now()],
        )?;
        tx.execute(
            "DELETE FROM pending_steps WHERE document_id = ?1",
            params![id],
        )?;
        tx.commit()?;
        Ok(())
    })
}
