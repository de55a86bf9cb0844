use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::{debug, instrument};

use super::{JobStore, decode, encode, job_key};
use crate::error::AnimatorError;
use crate::state_machine::Job;

/// Redis-backed [`JobStore`]; every process pointed at the same server sees
/// the same jobs.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: MultiplexedConnection,
}

impl RedisJobStore {
    pub async fn connect(redis_url: &str) -> Result<Self, AnimatorError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        debug!(redis_url, "connected job store");
        Ok(Self { conn })
    }
}

impl JobStore for RedisJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status))]
    async fn put(&self, job: &Job) -> Result<(), AnimatorError> {
        let raw = encode(job)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(job_key(&job.id), raw).await?;
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn put_if_absent(&self, job: &Job) -> Result<bool, AnimatorError> {
        let raw = encode(job)?;
        let mut conn = self.conn.clone();
        let written: bool = conn.set_nx(job_key(&job.id), raw).await?;
        Ok(written)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<Job>, AnimatorError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(job_key(id)).await?;
        raw.map(|raw| decode(id, &raw)).transpose()
    }
}
