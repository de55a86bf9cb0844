use std::io::ErrorKind;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};

use super::runner::{ExitReport, PipelineRunner};
use super::tier::Tier;
use crate::error::AnimatorError;

/// The tier that produced the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSuccess {
    pub tier: String,
    /// Zero-based position in the chain.
    pub position: usize,
    pub output_bytes: u64,
}

/// Tries tiers in order until one produces a usable artifact.
pub struct FallbackChain<R> {
    runner: R,
}

impl<R: PipelineRunner> FallbackChain<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Run `tiers` in order against `input`, stopping at the first success.
    ///
    /// Each tier gets exactly one attempt against the original input, and
    /// any file left at `output` is removed before each attempt. Returns
    /// [`AnimatorError::AllTiersFailed`] when no tier succeeds;
    /// [`AnimatorError::Cancelled`] is passed through immediately.
    pub async fn run(
        &self,
        input: &Path,
        output: &Path,
        tiers: &[Tier],
        cancel: &CancellationToken,
    ) -> Result<TierSuccess, AnimatorError> {
        for (position, tier) in tiers.iter().enumerate() {
            remove_stale_output(output).await?;

            let invocation = tier.invocation(input, output);
            let report = match self.runner.run(&invocation, cancel).await {
                Ok(report) => report,
                Err(AnimatorError::Cancelled) => return Err(AnimatorError::Cancelled),
                Err(err) => {
                    warn!(tier = %tier.name, error = %err, "tier failed to start");
                    continue;
                }
            };
            let exited_ok = report.succeeded_with(tier.success_code);
            log_streams(&tier.name, &report, exited_ok);

            if !exited_ok {
                warn!(
                    tier = %tier.name,
                    exit_code = ?report.exit_code,
                    timed_out = report.timed_out,
                    "tier failed, escalating"
                );
                continue;
            }

            match output_size(output).await? {
                Some(bytes) if bytes > 0 => {
                    info!(tier = %tier.name, position, bytes, "tier produced artifact");
                    return Ok(TierSuccess {
                        tier: tier.name.clone(),
                        position,
                        output_bytes: bytes,
                    });
                }
                _ => {
                    warn!(
                        tier = %tier.name,
                        output = %output.display(),
                        "tier exited cleanly without output, escalating"
                    );
                }
            }
        }

        Err(AnimatorError::AllTiersFailed {
            attempted: tiers.len(),
        })
    }
}

async fn remove_stale_output(output: &Path) -> Result<(), AnimatorError> {
    match tokio::fs::remove_file(output).await {
        Ok(()) => {
            debug!(output = %output.display(), "removed stale output");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// Size of the regular file at `path`, `None` if there is none.
async fn output_size(path: &Path) -> Result<Option<u64>, AnimatorError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Stderr of a failed tier is the only clue to why it failed.
fn stderr_level(exited_ok: bool) -> Level {
    if exited_ok {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

fn log_streams(tier: &str, report: &ExitReport, exited_ok: bool) {
    for line in report.stdout.lines().filter(|l| !l.trim().is_empty()) {
        debug!(tier, "stdout: {line}");
    }
    let level = stderr_level(exited_ok);
    for line in report.stderr.lines().filter(|l| !l.trim().is_empty()) {
        if level == Level::WARN {
            warn!(tier, "stderr: {line}");
        } else {
            debug!(tier, "stderr: {line}");
        }
    }
}
