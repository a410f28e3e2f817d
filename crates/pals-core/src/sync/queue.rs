//! Durable FIFO of pending mutations.

use std::collections::HashMap;

use crate::db::LocalRecordStore;
use crate::error::Result;
use crate::models::{MutationId, MutationRecord};

/// Result of uploading one queued mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Remote accepted the mutation; remove it
    Uploaded(MutationId),
    /// Retries exhausted; bump the retry count and evict at the ceiling
    Failed(MutationId),
    /// The mutation can never succeed; evict immediately
    Rejected(MutationId),
}

/// What [`SyncQueue::commit_upload`] did to the persisted queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub uploaded: usize,
    pub retained: usize,
    pub evicted: Vec<MutationRecord>,
}

/// FIFO view over the queue document in the [`LocalRecordStore`].
///
/// Every operation is a read-modify-write under the store's write lock, so
/// mutations enqueued while an upload is in flight are never lost.
#[derive(Clone)]
pub struct SyncQueue {
    store: LocalRecordStore,
}

impl SyncQueue {
    pub const fn new(store: LocalRecordStore) -> Self {
        Self { store }
    }

    /// Append `record` to the tail of the queue
    pub async fn enqueue(&self, record: MutationRecord) -> Result<()> {
        tracing::debug!(
            mutation_id = %record.id,
            entity_type = %record.entity_type,
            action = %record.action,
            "Enqueueing mutation"
        );
        self.store
            .update_queue(move |queue| queue.push(record))
            .await
    }

    /// Remove and return the oldest pending mutation
    pub async fn dequeue_front(&self) -> Result<Option<MutationRecord>> {
        self.store
            .update_queue(|queue| (!queue.is_empty()).then(|| queue.remove(0)))
            .await
    }

    /// Remove the mutation with `id`, reporting whether it was present
    pub async fn remove_by_id(&self, id: MutationId) -> Result<bool> {
        self.store
            .update_queue(move |queue| {
                let before = queue.len();
                queue.retain(|record| record.id != id);
                queue.len() != before
            })
            .await
    }

    /// Pending mutations in enqueue order
    pub async fn snapshot(&self) -> Result<Vec<MutationRecord>> {
        self.store.load_queue().await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.store.load_queue().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Apply upload outcomes to the freshly loaded queue.
    ///
    /// Records without an outcome (enqueued after the upload started) are
    /// left untouched. A failed record whose retry count reaches
    /// `retry_ceiling` is evicted along with every rejected record.
    pub async fn commit_upload(
        &self,
        outcomes: &[UploadOutcome],
        retry_ceiling: u32,
    ) -> Result<CommitSummary> {
        let outcomes: HashMap<MutationId, UploadOutcome> = outcomes
            .iter()
            .map(|outcome| match *outcome {
                UploadOutcome::Uploaded(id)
                | UploadOutcome::Failed(id)
                | UploadOutcome::Rejected(id) => (id, *outcome),
            })
            .collect();

        self.store
            .update_queue(move |queue| {
                let mut summary = CommitSummary::default();
                let mut kept = Vec::with_capacity(queue.len());

                for mut record in queue.drain(..) {
                    match outcomes.get(&record.id) {
                        Some(UploadOutcome::Uploaded(_)) => summary.uploaded += 1,
                        Some(UploadOutcome::Rejected(_)) => summary.evicted.push(record),
                        Some(UploadOutcome::Failed(_)) => {
                            record.retry_count = record.retry_count.saturating_add(1);
                            if record.retry_count >= retry_ceiling {
                                summary.evicted.push(record);
                            } else {
                                summary.retained += 1;
                                kept.push(record);
                            }
                        }
                        None => {
                            summary.retained += 1;
                            kept.push(record);
                        }
                    }
                }

                *queue = kept;
                summary
            })
            .await
    }
}
