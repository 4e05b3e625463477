//! In-memory job store: the latest snapshot per job id.
//!
//! One writer (the executing job's driver) and arbitrarily many readers.
//! Reads never block on an executing job; they clone whatever snapshot was
//! last written. Retention/TTL is a concern of whoever owns the store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::job::{JobId, JobSnapshot};

/// Concurrent map of job id to latest snapshot.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobSnapshot>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot for a job, or `None` if the id is unknown.
    pub fn get(&self, id: &str) -> Option<JobSnapshot> {
        self.jobs.read().unwrap().get(id).cloned()
    }

    /// Replace (or insert) the snapshot for its job id.
    pub fn upsert(&self, snapshot: JobSnapshot) {
        self.jobs
            .write()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    /// Drop a job's record (retention is managed by the caller).
    pub fn remove(&self, id: &str) {
        self.jobs.write().unwrap().remove(id);
    }
}
