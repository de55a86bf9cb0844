//! In-process store double for tests. Records go through the same encoding
//! as the Redis store so tests exercise the wire format.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use super::{JobStore, decode, encode, job_key};
use crate::error::AnimatorError;
use crate::state_machine::Job;

#[derive(Clone, Default)]
pub struct MemoryJobStore {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryJobStore {
    /// Store a raw value under `job:<id>`, bypassing encoding.
    pub fn insert_raw(&self, id: &str, raw: &str) {
        self.records
            .lock()
            .unwrap()
            .insert(job_key(id), raw.to_string());
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl JobStore for MemoryJobStore {
    async fn put(&self, job: &Job) -> Result<(), AnimatorError> {
        let raw = encode(job)?;
        self.records.lock().unwrap().insert(job_key(&job.id), raw);
        Ok(())
    }

    async fn put_if_absent(&self, job: &Job) -> Result<bool, AnimatorError> {
        let raw = encode(job)?;
        match self.records.lock().unwrap().entry(job_key(&job.id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(raw);
                Ok(true)
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, AnimatorError> {
        let raw = self.records.lock().unwrap().get(&job_key(id)).cloned();
        raw.map(|raw| decode(id, &raw)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_if_absent_keeps_the_first_record() {
        let store = MemoryJobStore::default();
        let first = Job::with_id("j1".into(), "http://x/a.png".into());
        let second = Job::with_id("j1".into(), "http://x/b.png".into());

        assert!(store.put_if_absent(&first).await.unwrap());
        assert!(!store.put_if_absent(&second).await.unwrap());
        assert_eq!(store.get("j1").await.unwrap().unwrap().original_url, "http://x/a.png");
    }
}
