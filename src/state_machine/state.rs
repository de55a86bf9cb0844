use chrono::Utc;

use super::job::{Job, JobStatus};
use crate::error::AnimatorError;

/// An event that moves a job forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A worker picked the job up.
    Start,
    /// The result artifact was uploaded to `animated_url`.
    Complete { animated_url: String },
    /// Processing gave up.
    Fail,
}

impl Transition {
    fn target(&self) -> JobStatus {
        match self {
            Transition::Start => JobStatus::Processing,
            Transition::Complete { .. } => JobStatus::Completed,
            Transition::Fail => JobStatus::Failed,
        }
    }
}

/// Drives a `Job` through the lifecycle:
///
/// `pending -> processing -> completed | failed`
///
/// A pending job may also fail directly (e.g. cancelled before a worker
/// slot was free). Nothing leaves a terminal state.
pub struct StateMachine;

impl StateMachine {
    /// Apply `transition` to `job`, stamping `completed_at` on terminal moves.
    pub fn apply(job: &mut Job, transition: Transition) -> Result<(), AnimatorError> {
        let allowed = matches!(
            (job.status, &transition),
            (JobStatus::Pending, Transition::Start)
                | (JobStatus::Pending, Transition::Fail)
                | (JobStatus::Processing, Transition::Complete { .. })
                | (JobStatus::Processing, Transition::Fail)
        );
        if !allowed {
            return Err(AnimatorError::InvalidTransition {
                id: job.id.clone(),
                from: job.status,
                to: transition.target(),
            });
        }

        job.status = transition.target();
        match transition {
            Transition::Start => {}
            Transition::Complete { animated_url } => {
                job.animated_url = Some(animated_url);
                job.completed_at = Some(Utc::now());
            }
            Transition::Fail => {
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}
