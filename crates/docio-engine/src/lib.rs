//! DocIO Engine - event reconciliation and lifecycle consistency
//!
//! Three cooperating subsystems:
//!
//! - [`reconcile`]: merges the two independently-arriving creation events
//!   (content object, metadata object) into exactly one document record,
//!   tolerating arbitrary arrival order and concurrent delivery.
//! - [`lifecycle`]: drives a document's storage tier through
//!   archive/restore and resolves tier and restore state against the live
//!   object store on read.
//! - [`retry`]: re-dispatches failed processing units from dead-letter
//!   queues and quarantines units that exceed the retry budget.

pub mod events;
pub mod lifecycle;
pub mod queue;
pub mod reconcile;
pub mod retry;

pub use events::ObjectEvent;
pub use lifecycle::{
    ArchiveReceipt, LifecycleEngine, ReconcileSweepReport, ResolvedDocument, RestoreReceipt,
};
pub use queue::{MemoryQueue, QueueMessage, WorkQueue, RETRY_COUNT_ATTR};
pub use reconcile::{Disposition, ReconcileEngine, ReconcileOutcome};
pub use retry::{
    Dispatcher, EngineDispatcher, HandlerTarget, QuarantineEnvelope, QueueBinding, QueueSummary,
    RetryCoordinator, SweepSummary,
};
