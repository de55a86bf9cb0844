use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Externally visible lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `Completed` and `Failed` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One image-to-animation request and its persisted state.
///
/// The nullable fields are always written, so a record missing
/// `animatedUrl` or `completedAt` is rejected rather than read as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub original_url: String,
    #[serde(deserialize_with = "nullable")]
    pub animated_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "nullable")]
    pub completed_at: Option<DateTime<Utc>>,
}

// Present-but-null is `None`; an absent key is a missing-field error.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

impl Job {
    pub fn new(original_url: String) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), original_url)
    }

    pub fn with_id(id: String, original_url: String) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            original_url,
            animated_url: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Checks the field invariants tied to `status`.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.animated_url.is_some() != (self.status == JobStatus::Completed) {
            return Err(format!(
                "animatedUrl must be set exactly when completed (status {})",
                self.status
            ));
        }
        if self.completed_at.is_some() != self.status.is_terminal() {
            return Err(format!(
                "completedAt must be set exactly when terminal (status {})",
                self.status
            ));
        }
        Ok(())
    }
}

/// Acknowledgement handed back to a submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTicket {
    pub job_id: String,
    pub status: JobStatus,
}

impl From<&Job> for JobTicket {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
        }
    }
}
