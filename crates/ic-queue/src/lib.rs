// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded, priority-aware queue of batch jobs waiting to run.
//!
//! [`JobQueue`] holds only scheduling metadata ([`QueuedJob`]); the
//! batch engine owns the job bodies and results. `dequeue` returns the
//! highest-priority entry first, FIFO among entries of equal priority,
//! per the `high > normal > low` scheduling rule.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Priority levels for queued batch jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    /// Lowest priority.
    Low,
    /// Default priority.
    Normal,
    /// Highest priority — processed before all others.
    High,
}

/// A batch job waiting to be picked up by a worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Job identifier, matching `BatchJob::job_id`.
    pub job_id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Scheduling priority.
    pub priority: JobPriority,
    /// Monotonic sequence number assigned at enqueue time, used to
    /// break priority ties in FIFO order.
    pub sequence: u64,
}

/// Errors returned by [`JobQueue`] operations.
#[derive(Debug)]
pub enum QueueError {
    /// The queue has reached its configured depth threshold.
    Backpressure {
        /// Current queue depth.
        depth: usize,
        /// Threshold that was exceeded.
        threshold: usize,
    },
    /// A job with the given id is already enqueued.
    DuplicateJob(Uuid),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Backpressure { depth, threshold } => {
                write!(f, "queue depth {depth} exceeds backpressure threshold {threshold}")
            }
            QueueError::DuplicateJob(id) => write!(f, "duplicate job in queue: {id}"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Snapshot statistics for a [`JobQueue`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of jobs currently queued.
    pub depth: usize,
    /// Backpressure threshold.
    pub threshold: usize,
    /// Breakdown of queued jobs per priority level.
    pub by_priority: BTreeMap<String, usize>,
}

/// A bounded, priority-aware FIFO queue of pending batch jobs.
///
/// Enforces backpressure rather than a hard cap:
/// `enqueue` still succeeds past `threshold`'s soft warning point up to
/// the point the caller decides to reject, which the batch engine does
/// by checking [`JobQueue::would_backpressure`] before calling
/// `submit`'s validation through to enqueue.
pub struct JobQueue {
    entries: Vec<QueuedJob>,
    threshold: usize,
    next_sequence: u64,
}

impl JobQueue {
    /// Create a new queue with the given backpressure threshold.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            entries: Vec::new(),
            threshold,
            next_sequence: 0,
        }
    }

    /// Return `true` if enqueuing one more job would exceed the
    /// backpressure threshold.
    #[must_use]
    pub fn would_backpressure(&self) -> bool {
        self.entries.len() >= self.threshold
    }

    /// Add a job to the queue, assigning it the next sequence number.
    ///
    /// Returns [`QueueError::Backpressure`] if the queue is already at
    /// or above threshold, or [`QueueError::DuplicateJob`] if the id is
    /// already present.
    pub fn enqueue(
        &mut self,
        job_id: Uuid,
        tenant_id: Uuid,
        priority: JobPriority,
    ) -> Result<(), QueueError> {
        if self.would_backpressure() {
            return Err(QueueError::Backpressure {
                depth: self.entries.len(),
                threshold: self.threshold,
            });
        }
        if self.entries.iter().any(|j| j.job_id == job_id) {
            return Err(QueueError::DuplicateJob(job_id));
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(QueuedJob {
            job_id,
            tenant_id,
            priority,
            sequence,
        });
        Ok(())
    }

    /// Remove and return the highest-priority job, FIFO among equal
    /// priorities.
    pub fn dequeue(&mut self) -> Option<QueuedJob> {
        let max_pri = self.entries.iter().map(|j| j.priority).max()?;
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, j)| j.priority == max_pri)
            .min_by_key(|(_, j)| j.sequence)
            .map(|(idx, _)| idx)?;
        Some(self.entries.remove(idx))
    }

    /// Remove a specific job by id, used when a job is cancelled before
    /// a worker has picked it up.
    pub fn remove(&mut self, job_id: Uuid) -> Option<QueuedJob> {
        let pos = self.entries.iter().position(|j| j.job_id == job_id)?;
        Some(self.entries.remove(pos))
    }

    /// Number of jobs currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the queue holds no jobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot statistics.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let mut by_priority = BTreeMap::new();
        for entry in &self.entries {
            let key = match entry.priority {
                JobPriority::Low => "low",
                JobPriority::Normal => "normal",
                JobPriority::High => "high",
            };
            *by_priority.entry(key.to_string()).or_insert(0usize) += 1;
        }
        QueueStats {
            depth: self.entries.len(),
            threshold: self.threshold,
            by_priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dequeues_highest_priority_first_then_fifo_within_priority() {
        let mut q = JobQueue::new(100);
        let low = Uuid::new_v4();
        let high_first = Uuid::new_v4();
        let high_second = Uuid::new_v4();
        q.enqueue(low, Uuid::new_v4(), JobPriority::Low).unwrap();
        q.enqueue(high_first, Uuid::new_v4(), JobPriority::High).unwrap();
        q.enqueue(high_second, Uuid::new_v4(), JobPriority::High).unwrap();

        assert_eq!(q.dequeue().unwrap().job_id, high_first);
        assert_eq!(q.dequeue().unwrap().job_id, high_second);
        assert_eq!(q.dequeue().unwrap().job_id, low);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn backpressure_rejects_past_threshold() {
        let mut q = JobQueue::new(2);
        q.enqueue(Uuid::new_v4(), Uuid::new_v4(), JobPriority::Normal).unwrap();
        q.enqueue(Uuid::new_v4(), Uuid::new_v4(), JobPriority::Normal).unwrap();
        let err = q.enqueue(Uuid::new_v4(), Uuid::new_v4(), JobPriority::Normal).unwrap_err();
        assert!(matches!(err, QueueError::Backpressure { .. }));
    }

    #[test]
    fn duplicate_job_id_is_rejected() {
        let mut q = JobQueue::new(10);
        let id = Uuid::new_v4();
        q.enqueue(id, Uuid::new_v4(), JobPriority::Normal).unwrap();
        let err = q.enqueue(id, Uuid::new_v4(), JobPriority::Normal).unwrap_err();
        assert!(matches!(err, QueueError::DuplicateJob(_)));
    }

    #[test]
    fn remove_pulls_a_job_out_before_it_is_dequeued() {
        let mut q = JobQueue::new(10);
        let id = Uuid::new_v4();
        q.enqueue(id, Uuid::new_v4(), JobPriority::Normal).unwrap();
        assert!(q.remove(id).is_some());
        assert!(q.dequeue().is_none());
    }
}
