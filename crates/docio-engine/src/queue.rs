//! Bounded work queues
//!
//! Queue semantics follow the usual at-least-once shape: `receive` leases
//! messages under a receipt handle, and a message is only gone once
//! `delete` is called with that receipt. The retry coordinator deletes on
//! every terminal path (success, replace, quarantine), so a crash between
//! receive and delete redelivers.

use async_trait::async_trait;
use docio_common::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Message attribute carrying the retry count
pub const RETRY_COUNT_ATTR: &str = "retry_count";

/// A message leased from a queue
#[derive(Clone, Debug)]
pub struct QueueMessage {
    /// Lease handle used to delete the message
    pub receipt: String,
    pub body: String,
    pub attributes: HashMap<String, String>,
}

impl QueueMessage {
    /// Retry count from message attributes, defaulting to 0 when absent
    /// or unparseable
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.attributes
            .get(RETRY_COUNT_ATTR)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// A bounded work queue
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Queue name, for routing and diagnostics
    fn name(&self) -> &str;

    /// Lease up to `max` messages
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>>;

    /// Append a message
    async fn send(&self, body: &str, attributes: HashMap<String, String>) -> Result<()>;

    /// Remove a leased message by its receipt handle
    async fn delete(&self, receipt: &str) -> Result<()>;
}

#[derive(Clone, Debug)]
struct PendingMessage {
    body: String,
    attributes: HashMap<String, String>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingMessage>,
    in_flight: HashMap<String, PendingMessage>,
}

/// In-memory queue backend for tests and the dev sweeper
pub struct MemoryQueue {
    name: String,
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    /// Create an empty named queue
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Number of messages waiting to be received
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of leased, undeleted messages
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>> {
        let mut state = self.state.lock();
        let mut messages = Vec::new();
        while messages.len() < max {
            let Some(pending) = state.pending.pop_front() else {
                break;
            };
            let receipt = Uuid::new_v4().to_string();
            messages.push(QueueMessage {
                receipt: receipt.clone(),
                body: pending.body.clone(),
                attributes: pending.attributes.clone(),
            });
            state.in_flight.insert(receipt, pending);
        }
        Ok(messages)
    }

    async fn send(&self, body: &str, attributes: HashMap<String, String>) -> Result<()> {
        self.state.lock().pending.push_back(PendingMessage {
            body: body.to_string(),
            attributes,
        });
        Ok(())
    }

    async fn delete(&self, receipt: &str) -> Result<()> {
        match self.state.lock().in_flight.remove(receipt) {
            Some(_) => Ok(()),
            None => Err(Error::queue(format!(
                "unknown receipt handle on queue '{}': {receipt}",
                self.name
            ))),
        }
    }
}
