//! Best-effort snapshot fan-out to per-job subscribers.
//!
//! Delivery is fire-and-forget: a slow subscriber lags and loses intermediate
//! snapshots, an absent subscriber costs nothing. Anyone who needs the
//! authoritative latest state reads the store instead.

use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

use crate::job::{JobId, JobSnapshot};

/// Buffered snapshots per topic before a lagging receiver starts losing them.
const TOPIC_CAPACITY: usize = 32;

/// Registry of job id -> broadcast topic.
#[derive(Default)]
pub struct ProgressPublisher {
    topics: RwLock<HashMap<JobId, broadcast::Sender<JobSnapshot>>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a job's snapshots, creating the topic if needed.
    pub fn subscribe(&self, id: &str) -> broadcast::Receiver<JobSnapshot> {
        let mut topics = self.topics.write().unwrap();
        topics
            .entry(id.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Publish a snapshot to its job's topic. No-op without subscribers,
    /// never blocks, never fails the publisher.
    pub fn publish(&self, snapshot: &JobSnapshot) {
        if let Some(tx) = self.topics.read().unwrap().get(&snapshot.id) {
            let _ = tx.send(snapshot.clone());
        }
    }

    /// Drop a job's topic after its terminal publish; subscribers drain what
    /// is buffered and then observe end-of-stream.
    pub fn retire(&self, id: &str) {
        self.topics.write().unwrap().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobKind, JobStatus};

    #[tokio::test]
    async fn subscriber_receives_published_snapshot() {
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe("j1");

        let mut snap = JobSnapshot::queued("j1".into(), JobKind::Merge);
        snap.status = JobStatus::Started;
        publisher.publish(&snap);

        let got = rx.recv().await.unwrap();
        assert_eq!(got.status, JobStatus::Started);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let publisher = ProgressPublisher::new();
        let snap = JobSnapshot::queued("j2".into(), JobKind::Progressive);
        publisher.publish(&snap); // must not panic or block
    }

    #[tokio::test]
    async fn retire_closes_the_topic_after_draining() {
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe("j3");

        let snap = JobSnapshot::queued("j3".into(), JobKind::Progressive);
        publisher.publish(&snap);
        publisher.retire("j3");

        assert!(rx.recv().await.is_ok(), "buffered snapshot still drains");
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
