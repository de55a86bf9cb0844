//! Redis list consumer feeding the job manager.
//!
//! Producers `RPUSH` JSON messages such as
//! `{"jobId": "order-42", "imageUrl": "http://x/cat.png"}` onto the queue key.
//! Messages carrying a `jobId` keep it; others get a generated id.

use std::time::Duration;

use redis::AsyncCommands;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AnimatorError;
use crate::manager::JobManager;
use crate::pipeline::PipelineRunner;
use crate::state_machine::JobTicket;
use crate::storage::StorageClient;
use crate::store::JobStore;

// Seconds a single BLPOP may block before the loop re-checks cancellation.
const POLL_TIMEOUT_SECS: f64 = 5.0;

// Pause after a failed read before reconnecting.
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationTask {
    #[serde(default)]
    pub job_id: Option<String>,
    pub image_url: String,
}

/// Parse one queue message and submit it.
pub async fn dispatch<S, C, R>(
    manager: &JobManager<S, C, R>,
    payload: &str,
) -> Result<JobTicket, AnimatorError>
where
    S: JobStore,
    C: StorageClient,
    R: PipelineRunner,
{
    let task: AnimationTask = serde_json::from_str(payload)?;
    match task.job_id {
        Some(job_id) => manager.create_job_with_id(&job_id, &task.image_url).await,
        None => manager.create_job(&task.image_url).await,
    }
}

/// Pop messages from `queue_key` until `cancel` fires. Bad messages are
/// logged and dropped. Read errors are logged and retried on a fresh
/// connection; only the initial connection failing is returned.
pub async fn consume<S, C, R>(
    manager: &JobManager<S, C, R>,
    client: &redis::Client,
    queue_key: &str,
    cancel: &CancellationToken,
) -> Result<(), AnimatorError>
where
    S: JobStore,
    C: StorageClient,
    R: PipelineRunner,
{
    // BLPOP parks the connection, so the consumer gets its own.
    let mut conn = client.get_multiplexed_async_connection().await?;
    info!(queue_key, "consuming animation tasks");

    loop {
        let popped: redis::RedisResult<Option<(String, String)>> = tokio::select! {
            _ = cancel.cancelled() => break,
            popped = conn.blpop(queue_key, POLL_TIMEOUT_SECS) => popped,
        };
        let popped = match popped {
            Ok(popped) => popped,
            Err(err) => {
                warn!(error = %err, queue_key, "queue read failed, retrying");
                if !wait_before_retry(cancel, RETRY_DELAY).await {
                    break;
                }
                match client.get_multiplexed_async_connection().await {
                    Ok(fresh) => conn = fresh,
                    Err(err) => warn!(error = %err, "queue reconnect failed"),
                }
                continue;
            }
        };
        let Some((_, payload)) = popped else {
            continue;
        };

        match dispatch(manager, &payload).await {
            Ok(ticket) => info!(job_id = %ticket.job_id, "queued task accepted"),
            Err(err) => warn!(error = %err, payload = %payload, "dropping queued task"),
        }
    }

    info!(queue_key, "queue consumer stopped");
    Ok(())
}

/// Sleep for `delay`; `false` if `cancel` fired first.
async fn wait_before_retry(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
