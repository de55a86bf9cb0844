//! Durable job persistence.
//!
//! Jobs are stored as JSON strings under `job:<id>`. The record format is
//! validated on every read: a status outside the four known values, a missing
//! field, or a status/field mismatch is reported as
//! [`AnimatorError::CorruptRecord`], never as "not found".

#[cfg(test)]
pub mod memory;
pub mod redis_store;

use std::future::Future;

use crate::error::AnimatorError;
use crate::state_machine::Job;

pub use redis_store::RedisJobStore;

const KEY_PREFIX: &str = "job:";

/// Key-value persistence for job records.
pub trait JobStore: Send + Sync + 'static {
    /// Write `job`, replacing any record with the same id.
    fn put(&self, job: &Job) -> impl Future<Output = Result<(), AnimatorError>> + Send;

    /// Write `job` only if no record with its id exists. Returns `false`,
    /// leaving the existing record untouched, when one does. The check and
    /// the write are a single atomic step.
    fn put_if_absent(&self, job: &Job) -> impl Future<Output = Result<bool, AnimatorError>> + Send;

    /// Read the job with `id`, `None` if no record exists.
    fn get(&self, id: &str) -> impl Future<Output = Result<Option<Job>, AnimatorError>> + Send;
}

pub fn job_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

pub fn encode(job: &Job) -> Result<String, AnimatorError> {
    Ok(serde_json::to_string(job)?)
}

/// Parse and validate a stored record read under `id`.
pub fn decode(id: &str, raw: &str) -> Result<Job, AnimatorError> {
    let job: Job =
        serde_json::from_str(raw).map_err(|e| AnimatorError::corrupt(id, e.to_string()))?;
    if job.id != id {
        return Err(AnimatorError::corrupt(
            id,
            format!("record carries id {}", job.id),
        ));
    }
    job.check_invariants()
        .map_err(|reason| AnimatorError::corrupt(id, reason))?;
    Ok(job)
}
