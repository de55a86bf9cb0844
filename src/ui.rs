//! Terminal output for `animator submit --wait`: a spinner while the job is
//! in flight and a coloured verdict once it is terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{Job, JobStatus};

/// Spinner tracking one job until it reaches a terminal state.
pub struct JobProgress {
    /// Spinner showing the current status.
    pb: ProgressBar,
    /// Style for a completed job.
    green: Style,
    /// Style for a failed job.
    red: Style,
}

impl JobProgress {
    /// Show a spinner for `job_id` in the pending state.
    pub fn start(job_id: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{job_id}: {}", JobStatus::Pending));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Refresh the spinner with the job's latest status.
    pub fn update(&self, job: &Job) {
        self.pb.set_message(format!("{}: {}", job.id, job.status));
    }

    /// Clear the spinner and print the final verdict and record.
    pub fn finish(&self, job: &Job) {
        self.pb.finish_and_clear();
        match (job.status, &job.animated_url) {
            (JobStatus::Completed, Some(url)) => {
                println!("  {} Animation ready: {url}", self.green.apply_to("✓"));
            }
            _ => {
                println!("  {} Job {} {}", self.red.apply_to("✗"), job.id, job.status);
            }
        }
        println!("{}", render_job(job));
    }
}

/// Pretty JSON of the record, in the stored wire format.
pub fn render_job(job: &Job) -> String {
    serde_json::to_string_pretty(job).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_job_uses_wire_format() {
        let job = Job::with_id("j1".into(), "http://x/cat.png".into());
        let out = render_job(&job);
        assert!(out.contains(r#""status": "pending""#));
        assert!(out.contains(r#""animatedUrl": null"#));
    }
}
