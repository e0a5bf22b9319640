//! Retry & quarantine coordinator
//!
//! Failed processing units land on dead-letter queues with a retry count
//! in their attributes. Each sweep drains a bounded batch per queue and
//! re-dispatches every unit to its target handler. A unit at or past the
//! retry ceiling is quarantined into the manual-review queue with a full
//! diagnostic envelope and removed from its source, never dispatched
//! again automatically.
//!
//! Nothing raises past the coordinator: every unit's outcome is
//! accounted independently and rolled up into a summary.

use crate::events::ObjectEvent;
use crate::lifecycle::LifecycleEngine;
use crate::queue::{QueueMessage, WorkQueue, RETRY_COUNT_ATTR};
use crate::reconcile::ReconcileEngine;
use async_trait::async_trait;
use docio_common::{now_millis, Error, Result, RetryConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Handler a retry unit is re-dispatched to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerTarget {
    /// Object-created reconciliation
    Reconcile,
    /// Restore-completed processing
    RestoreEvents,
}

impl fmt::Display for HandlerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconcile => write!(f, "reconcile"),
            Self::RestoreEvents => write!(f, "restore-events"),
        }
    }
}

/// Re-dispatches a unit's payload to its target handler
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Process `payload` with the handler behind `target`. `sync` asks
    /// for the handler's result to be awaited where the transport makes
    /// that optional.
    async fn dispatch(&self, target: HandlerTarget, payload: &str, sync: bool) -> Result<()>;
}

/// Dispatcher backed by the in-process engines.
/// In-process calls are always awaited, so `sync` makes no difference.
pub struct EngineDispatcher {
    reconcile: Arc<ReconcileEngine>,
    lifecycle: Arc<LifecycleEngine>,
}

impl EngineDispatcher {
    /// Create a dispatcher over the two engines
    pub fn new(reconcile: Arc<ReconcileEngine>, lifecycle: Arc<LifecycleEngine>) -> Self {
        Self {
            reconcile,
            lifecycle,
        }
    }
}

#[async_trait]
impl Dispatcher for EngineDispatcher {
    async fn dispatch(&self, target: HandlerTarget, payload: &str, _sync: bool) -> Result<()> {
        let event = ObjectEvent::from_json(payload)?;
        match (target, event) {
            (HandlerTarget::Reconcile, ObjectEvent::ObjectCreated { bucket, key }) => {
                self.reconcile.on_object_created(&bucket, &key).await?;
                Ok(())
            }
            (
                HandlerTarget::RestoreEvents,
                ObjectEvent::RestoreCompleted {
                    bucket,
                    key,
                    expiry,
                },
            ) => self.lifecycle.on_restore_completed(&bucket, &key, expiry).await,
            (target, event) => Err(Error::Dispatch(format!(
                "event {event:?} is not routable to handler {target}"
            ))),
        }
    }
}

/// A dead-letter queue wired to the handler its units should be retried
/// against
#[derive(Clone)]
pub struct QueueBinding {
    pub queue: Arc<dyn WorkQueue>,
    pub target: HandlerTarget,
    /// Await the handler result during re-dispatch
    pub synchronous: bool,
}

/// Diagnostic envelope written to the quarantine queue
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuarantineEnvelope {
    /// The unit's payload, parsed as JSON when possible
    pub original_message: serde_json::Value,
    pub error: String,
    pub source_queue: String,
    pub retry_count: u32,
    /// Epoch milliseconds of the quarantine decision
    pub failed_at: u64,
    pub requires_manual_review: bool,
}

/// Per-queue sweep accounting
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub queue: String,
    pub processed: usize,
    /// Units whose re-dispatch succeeded
    pub retried: usize,
    /// Units re-queued with an incremented retry count
    pub requeued: usize,
    pub quarantined: usize,
    pub errors: usize,
}

/// Roll-up over all queues of one sweep
#[derive(Clone, Debug, Default)]
pub struct SweepSummary {
    pub queues: Vec<QueueSummary>,
}

impl SweepSummary {
    /// Total units handled across all queues
    #[must_use]
    pub fn total_processed(&self) -> usize {
        self.queues.iter().map(|q| q.processed).sum()
    }

    /// Total units quarantined across all queues
    #[must_use]
    pub fn total_quarantined(&self) -> usize {
        self.queues.iter().map(|q| q.quarantined).sum()
    }
}

enum UnitOutcome {
    Retried,
    Requeued,
    Quarantined,
    Errored,
}

/// Polls dead-letter queues and re-dispatches or quarantines their units
pub struct RetryCoordinator {
    dispatcher: Arc<dyn Dispatcher>,
    quarantine: Arc<dyn WorkQueue>,
    bindings: Vec<QueueBinding>,
    config: RetryConfig,
}

impl RetryCoordinator {
    /// Create a coordinator over the given queue bindings
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        quarantine: Arc<dyn WorkQueue>,
        bindings: Vec<QueueBinding>,
        config: RetryConfig,
    ) -> Self {
        Self {
            dispatcher,
            quarantine,
            bindings,
            config,
        }
    }

    /// One full sweep over all bound queues
    pub async fn run_sweep(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for binding in &self.bindings {
            summary.queues.push(self.process_queue(binding).await);
        }

        let processed = summary.total_processed();
        let quarantined = summary.total_quarantined();
        metrics::counter!("docio_retry_processed_total").increment(processed as u64);
        metrics::counter!("docio_retry_quarantined_total").increment(quarantined as u64);
        info!(
            processed,
            quarantined,
            queues = summary.queues.len(),
            "retry sweep completed"
        );
        summary
    }

    /// Drain one bounded batch from a single queue.
    /// Unit failures are accounted, never propagated.
    pub async fn process_queue(&self, binding: &QueueBinding) -> QueueSummary {
        let mut summary = QueueSummary {
            queue: binding.queue.name().to_string(),
            ..Default::default()
        };

        let messages = match binding.queue.receive(self.config.batch_size).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(queue = binding.queue.name(), "receive failed: {e}");
                summary.errors += 1;
                return summary;
            }
        };
        info!(
            queue = binding.queue.name(),
            count = messages.len(),
            "processing dead-letter batch"
        );

        for message in messages {
            summary.processed += 1;
            match self.process_message(binding, &message).await {
                UnitOutcome::Retried => summary.retried += 1,
                UnitOutcome::Requeued => summary.requeued += 1,
                UnitOutcome::Quarantined => summary.quarantined += 1,
                UnitOutcome::Errored => summary.errors += 1,
            }
        }
        summary
    }

    async fn process_message(&self, binding: &QueueBinding, message: &QueueMessage) -> UnitOutcome {
        let queue = binding.queue.as_ref();
        let retry_count = message.retry_count();

        if retry_count >= self.config.max_retry_attempts {
            // Exceeded before we even dispatch: straight to quarantine
            warn!(
                queue = queue.name(),
                retry_count, "retry ceiling already reached, quarantining"
            );
            return self
                .quarantine_and_remove(queue, message, "Max retries exceeded", retry_count)
                .await;
        }

        match self
            .dispatcher
            .dispatch(binding.target, &message.body, binding.synchronous)
            .await
        {
            Ok(()) => {
                info!(queue = queue.name(), target = %binding.target, "re-dispatch succeeded");
                match queue.delete(&message.receipt).await {
                    Ok(()) => UnitOutcome::Retried,
                    Err(e) => {
                        error!(queue = queue.name(), "delete after dispatch failed: {e}");
                        UnitOutcome::Errored
                    }
                }
            }
            Err(e) => {
                let new_count = retry_count + 1;
                warn!(
                    queue = queue.name(),
                    target = %binding.target,
                    retry_count = new_count,
                    "re-dispatch failed: {e}"
                );
                if new_count >= self.config.max_retry_attempts {
                    self.quarantine_and_remove(queue, message, &e.to_string(), new_count)
                        .await
                } else {
                    // Replace, not append: send the incremented copy, then
                    // remove the original
                    let mut attrs = message.attributes.clone();
                    attrs.insert(RETRY_COUNT_ATTR.to_string(), new_count.to_string());
                    if let Err(e) = queue.send(&message.body, attrs).await {
                        error!(queue = queue.name(), "re-enqueue failed: {e}");
                        return UnitOutcome::Errored;
                    }
                    match queue.delete(&message.receipt).await {
                        Ok(()) => UnitOutcome::Requeued,
                        Err(e) => {
                            error!(queue = queue.name(), "delete after re-enqueue failed: {e}");
                            UnitOutcome::Errored
                        }
                    }
                }
            }
        }
    }

    async fn quarantine_and_remove(
        &self,
        source: &dyn WorkQueue,
        message: &QueueMessage,
        error_message: &str,
        retry_count: u32,
    ) -> UnitOutcome {
        let envelope = QuarantineEnvelope {
            original_message: serde_json::from_str(&message.body)
                .unwrap_or_else(|_| serde_json::Value::String(message.body.clone())),
            error: error_message.to_string(),
            source_queue: source.name().to_string(),
            retry_count,
            failed_at: now_millis(),
            requires_manual_review: true,
        };
        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(e) => {
                error!("quarantine envelope serialization failed: {e}");
                return UnitOutcome::Errored;
            }
        };

        let mut attrs = HashMap::new();
        attrs.insert("source_queue".to_string(), envelope.source_queue.clone());
        attrs.insert(RETRY_COUNT_ATTR.to_string(), retry_count.to_string());
        attrs.insert("error_type".to_string(), "MaxRetriesExceeded".to_string());

        if let Err(e) = self.quarantine.send(&body, attrs).await {
            // Leave the unit on its source queue for a later sweep rather
            // than dropping it silently
            error!(source = source.name(), "quarantine send failed: {e}");
            return UnitOutcome::Errored;
        }
        info!(
            source = source.name(),
            retry_count, "unit moved to quarantine"
        );

        match source.delete(&message.receipt).await {
            Ok(()) => UnitOutcome::Quarantined,
            Err(e) => {
                error!(source = source.name(), "delete after quarantine failed: {e}");
                UnitOutcome::Errored
            }
        }
    }
}
