use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::tier::Invocation;
use crate::error::AnimatorError;

/// How a single executable run ended. A non-zero exit is a normal outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExitReport {
    /// `None` when the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ExitReport {
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Default::default()
        }
    }

    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Default::default()
        }
    }

    pub fn succeeded_with(&self, success_code: i32) -> bool {
        !self.timed_out && self.exit_code == Some(success_code)
    }
}

/// Runs one external executable to completion.
///
/// `Err` is reserved for the process never starting (missing program,
/// permissions) and for cancellation; exit status is reported in the
/// [`ExitReport`].
pub trait PipelineRunner: Send + Sync + 'static {
    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ExitReport, AnimatorError>> + Send;
}

/// Spawns real child processes. The child is killed if the run is cancelled,
/// times out, or the future is dropped.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PipelineRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ExitReport, AnimatorError> {
        debug!(
            tier = %invocation.tier,
            program = %invocation.program,
            args = ?invocation.args,
            "spawning pipeline"
        );
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Losing either race drops `child`, which kills it.
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(AnimatorError::Cancelled),
            waited = tokio::time::timeout(self.timeout, child.wait_with_output()) => match waited {
                Ok(output) => output?,
                Err(_) => {
                    warn!(
                        tier = %invocation.tier,
                        timeout_secs = self.timeout.as_secs_f64(),
                        "pipeline timed out"
                    );
                    return Ok(ExitReport::timed_out());
                }
            },
        };

        Ok(ExitReport {
            exit_code: output.status.code(),
            timed_out: false,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation {
            tier: "sh".into(),
            program: "/bin/sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    #[tokio::test]
    async fn reports_zero_exit_and_output() {
        let runner = ProcessRunner::new(Duration::from_secs(10));
        let report = runner
            .run(&sh("echo hello; echo oops >&2"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.exit_code, Some(0));
        assert!(!report.timed_out);
        assert_eq!(report.stdout.trim(), "hello");
        assert_eq!(report.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let runner = ProcessRunner::new(Duration::from_secs(10));
        let report = runner
            .run(&sh("exit 3"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.exit_code, Some(3));
        assert!(!report.succeeded_with(0));
        assert!(report.succeeded_with(3));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let runner = ProcessRunner::new(Duration::from_secs(10));
        let inv = Invocation {
            tier: "ghost".into(),
            program: "/definitely/not/here".into(),
            args: vec![],
        };
        let err = runner.run(&inv, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AnimatorError::Io(_)));
    }

    #[tokio::test]
    async fn slow_process_times_out() {
        let runner = ProcessRunner::new(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let report = runner
            .run(&sh("sleep 5"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.timed_out);
        assert_eq!(report.exit_code, None);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn cancellation_stops_the_wait() {
        let runner = ProcessRunner::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = runner.run(&sh("sleep 5"), &cancel).await.unwrap_err();
        assert!(matches!(err, AnimatorError::Cancelled));
    }
}
