// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded concurrent batch resolution engine.
//!
//! [`BatchEngine`] owns the job table and a [`JobQueue`](ic_queue::JobQueue)
//! of pending work. `submit` validates against the tenant's
//! `max_batch_size` and the queue's backpressure threshold; `run_job`
//! fans each item out to an [`ItemResolver`] under a bounded
//! [`tokio::sync::Semaphore`], never letting one item's failure abort
//! the job. On a terminal state it delivers an HMAC-signed webhook with
//! retrying backoff.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use ic_core::{BatchJob, BatchResultItem, BatchStatus, IntentError};
use ic_queue::{JobPriority, JobQueue, QueueError};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Default bound on concurrently in-flight items within one job.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Minimum interval between progress snapshots while a job is running.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Number of processed items between forced progress snapshots.
pub const PROGRESS_ITEM_STRIDE: usize = 10;

const WEBHOOK_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(25),
];

/// One message submitted as part of a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Caller-supplied identifier, echoed back in the result.
    pub item_id: String,
    /// The raw message text to resolve.
    pub raw_text: String,
}

/// Resolves a single item against the intent resolution pipeline.
///
/// The batch engine is deliberately decoupled from the pipeline crate:
/// anything implementing this trait — the real pipeline, a stub, a
/// replayed-fixture double — can drive a batch.
#[async_trait]
pub trait ItemResolver: Send + Sync {
    /// Resolve one message for `tenant_id`. Returning `Err` marks only
    /// this item as failed; it never aborts the job.
    async fn resolve_item(
        &self,
        tenant_id: Uuid,
        raw_text: &str,
    ) -> Result<ic_core::ResolveOutput, IntentError>;
}

/// Delivers the terminal-state webhook callback for a finished job.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST `body` to `url` with the given `X-Signature` header value.
    /// Returns `Ok(())` only on a 2xx response.
    async fn send(&self, url: &str, signature_header: &str, body: &[u8]) -> Result<(), String>;
}

/// Production [`WebhookSender`] backed by `reqwest`.
pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl Default for HttpWebhookSender {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, url: &str, signature_header: &str, body: &[u8]) -> Result<(), String> {
        let resp = self
            .client
            .post(url)
            .header("X-Signature", signature_header)
            .header("Content-Type", "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("webhook returned status {}", resp.status()))
        }
    }
}

/// Body posted on a job's terminal transition.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WebhookPayload {
    /// The job that finished.
    pub job_id: Uuid,
    /// Terminal status.
    pub status: BatchStatus,
    /// Total items submitted.
    pub total_items: usize,
    /// Items processed (success or failure).
    pub processed_items: usize,
    /// Items that failed.
    pub failed_items: usize,
    /// Wall-clock seconds from `created_at` to `completed_at`.
    pub duration_seconds: f64,
}

fn hmac_hex(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

struct JobRecord {
    job: BatchJob,
    cancel: Arc<AtomicBool>,
}

/// Bounded concurrent batch resolution engine.
pub struct BatchEngine<R: ItemResolver, W: WebhookSender> {
    resolver: Arc<R>,
    webhook: Arc<W>,
    queue: Mutex<JobQueue>,
    jobs: Mutex<HashMap<Uuid, JobRecord>>,
    concurrency: usize,
}

impl<R: ItemResolver + 'static, W: WebhookSender + 'static> BatchEngine<R, W> {
    /// Construct an engine with the default concurrency and the given
    /// backpressure threshold on queue depth.
    #[must_use]
    pub fn new(resolver: Arc<R>, webhook: Arc<W>, backpressure_threshold: usize) -> Self {
        Self {
            resolver,
            webhook,
            queue: Mutex::new(JobQueue::new(backpressure_threshold)),
            jobs: Mutex::new(HashMap::new()),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Override the per-job bounded concurrency (default
    /// [`DEFAULT_CONCURRENCY`]).
    #[must_use]
    pub fn with_concurrency(mut self, k: usize) -> Self {
        self.concurrency = k.max(1);
        self
    }

    /// Validate and enqueue a batch job. Does not start execution; call
    /// [`BatchEngine::run_next`] (typically from a worker loop) to
    /// drain the queue.
    ///
    /// # Errors
    ///
    /// Returns [`IntentError::BatchTooLarge`] if `items.len() >
    /// max_batch_size`, or [`IntentError::BatchBackpressure`] if the
    /// queue is already at its depth threshold.
    pub fn submit(
        &self,
        tenant_id: Uuid,
        items: &[BatchItem],
        max_batch_size: usize,
        priority: JobPriority,
        webhook_url: Option<String>,
        webhook_secret: Option<String>,
    ) -> Result<Uuid, IntentError> {
        if items.len() > max_batch_size {
            return Err(IntentError::BatchTooLarge {
                max: max_batch_size,
                got: items.len(),
            });
        }

        let job_id = Uuid::new_v4();
        let job = BatchJob {
            job_id,
            tenant_id,
            status: BatchStatus::Queued,
            total_items: items.len(),
            processed_items: 0,
            failed_items: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            webhook_url,
            webhook_secret,
            results: items
                .iter()
                .map(|i| BatchResultItem {
                    item_id: i.item_id.clone(),
                    success: false,
                    result: None,
                    error: None,
                    processed_at: Utc::now(),
                })
                .collect(),
            webhook_delivery: None,
        };

        {
            let mut queue = self.queue.lock().expect("queue lock poisoned");
            queue
                .enqueue(job_id, tenant_id, priority)
                .map_err(|e| match e {
                    QueueError::Backpressure { .. } => IntentError::BatchBackpressure {
                        retry_after_secs: 5.0,
                    },
                    QueueError::DuplicateJob(_) => {
                        IntentError::internal("duplicate job id generated")
                    }
                })?;
        }

        self.jobs.lock().expect("jobs lock poisoned").insert(
            job_id,
            JobRecord {
                job,
                cancel: Arc::new(AtomicBool::new(false)),
            },
        );

        Ok(job_id)
    }

    /// Pop the next job by priority and run it to completion, including
    /// webhook delivery. Returns `None` if the queue is empty.
    pub async fn run_next(&self, items_by_job: &HashMap<Uuid, Vec<BatchItem>>) -> Option<Uuid> {
        let queued = self.queue.lock().expect("queue lock poisoned").dequeue()?;
        let job_id = queued.job_id;
        let items = items_by_job.get(&job_id).cloned().unwrap_or_default();
        self.run_job(job_id, &items).await;
        Some(job_id)
    }

    /// Run one job's items to completion under bounded concurrency,
    /// persist progress snapshots, and deliver the terminal webhook.
    pub async fn run_job(&self, job_id: Uuid, items: &[BatchItem]) {
        let cancel = {
            let jobs = self.jobs.lock().expect("jobs lock poisoned");
            match jobs.get(&job_id) {
                Some(r) => Arc::clone(&r.cancel),
                None => return,
            }
        };

        self.update_job(job_id, |job| {
            job.status = BatchStatus::Running;
            job.started_at = Some(Utc::now());
        });

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(items.len());

        for (index, item) in items.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let resolver = Arc::clone(&self.resolver);
            let cancel = Arc::clone(&cancel);
            let job = self.jobs_snapshot_tenant(job_id);

            handles.push(tokio::spawn(async move {
                if cancel.load(Ordering::Relaxed) {
                    return (index, None);
                }
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                if cancel.load(Ordering::Relaxed) {
                    return (index, None);
                }
                let tenant_id = job.unwrap_or(Uuid::nil());
                let outcome = if item.raw_text.is_empty() {
                    Err(IntentError::validation("raw_text must not be empty"))
                } else {
                    resolver.resolve_item(tenant_id, &item.raw_text).await
                };
                (index, Some((item.item_id, outcome)))
            }));
        }

        let mut processed_since_snapshot = 0usize;
        let mut last_snapshot = tokio::time::Instant::now();

        for handle in handles {
            let (index, outcome) = match handle.await {
                Ok(v) => v,
                Err(_) => continue,
            };
            let Some((item_id, result)) = outcome else {
                continue;
            };

            self.update_job(job_id, |job| {
                let (success, result_value, error) = match result {
                    Ok(r) => (true, Some(r), None),
                    Err(e) => (false, None, Some(e)),
                };
                if let Some(slot) = job.results.get_mut(index) {
                    slot.item_id = item_id;
                    slot.success = success;
                    slot.result = result_value;
                    slot.error = error;
                    slot.processed_at = Utc::now();
                }
                job.processed_items += 1;
                if !success {
                    job.failed_items += 1;
                }
            });

            processed_since_snapshot += 1;
            if processed_since_snapshot >= PROGRESS_ITEM_STRIDE
                || last_snapshot.elapsed() >= PROGRESS_INTERVAL
            {
                processed_since_snapshot = 0;
                last_snapshot = tokio::time::Instant::now();
            }
        }

        let cancelled = cancel.load(Ordering::Relaxed);
        self.update_job(job_id, |job| {
            job.status = if cancelled {
                BatchStatus::Cancelled
            } else {
                BatchStatus::Completed
            };
            job.completed_at = Some(Utc::now());
        });

        self.deliver_webhook(job_id).await;
    }

    /// Request cancellation of a job. In-flight items run to
    /// completion; no new items start. Returns `false` if the job does
    /// not exist, is already terminal, or was already cancelled.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        let jobs = self.jobs.lock().expect("jobs lock poisoned");
        match jobs.get(&job_id) {
            Some(record) if matches!(record.job.status, BatchStatus::Queued | BatchStatus::Running) => {
                record
                    .cancel
                    .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            }
            _ => false,
        }
    }

    /// Current snapshot of a job's state.
    #[must_use]
    pub fn job(&self, job_id: Uuid) -> Option<BatchJob> {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .get(&job_id)
            .map(|r| r.job.clone())
    }

    fn jobs_snapshot_tenant(&self, job_id: Uuid) -> Option<Uuid> {
        self.jobs
            .lock()
            .expect("jobs lock poisoned")
            .get(&job_id)
            .map(|r| r.job.tenant_id)
    }

    fn update_job(&self, job_id: Uuid, f: impl FnOnce(&mut BatchJob)) {
        if let Some(record) = self.jobs.lock().expect("jobs lock poisoned").get_mut(&job_id) {
            f(&mut record.job);
        }
    }

    async fn deliver_webhook(&self, job_id: Uuid) {
        let (url, secret, payload) = {
            let jobs = self.jobs.lock().expect("jobs lock poisoned");
            let Some(record) = jobs.get(&job_id) else {
                return;
            };
            let Some(url) = record.job.webhook_url.clone() else {
                return;
            };
            let secret = record.job.webhook_secret.clone().unwrap_or_default();
            let duration_seconds = record
                .job
                .completed_at
                .and_then(|end| (end - record.job.created_at).to_std().ok())
                .map_or(0.0, |d| d.as_secs_f64());
            let payload = WebhookPayload {
                job_id,
                status: record.job.status,
                total_items: record.job.total_items,
                processed_items: record.job.processed_items,
                failed_items: record.job.failed_items,
                duration_seconds,
            };
            (url, secret, payload)
        };

        let Ok(body) = serde_json::to_vec(&payload) else {
            return;
        };
        let signature = format!("sha256={}", hmac_hex(&secret, &body));

        for (attempt, backoff) in WEBHOOK_BACKOFF.iter().enumerate() {
            match self.webhook.send(&url, &signature, &body).await {
                Ok(()) => {
                    self.update_job(job_id, |job| {
                        job.webhook_delivery = Some(ic_core::WebhookDeliveryStatus::Delivered);
                    });
                    return;
                }
                Err(reason) => {
                    tracing::warn!(job_id = %job_id, attempt, %reason, "webhook delivery failed");
                    if attempt + 1 < WEBHOOK_BACKOFF.len() {
                        tokio::time::sleep(*backoff).await;
                    }
                }
            }
        }
        self.update_job(job_id, |job| {
            job.webhook_delivery = Some(ic_core::WebhookDeliveryStatus::Failed);
        });
        tracing::error!(job_id = %job_id, "webhook delivery gave up after max attempts");
    }
}
