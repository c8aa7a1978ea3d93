//! Serial dispatcher: the only task that touches a [`Conversation`].
//!
//! Transports enqueue shouts through a cloneable [`DispatcherHandle`]; a
//! single worker drains the bounded queue in FIFO order and runs each shout
//! to completion before taking the next, so all state transitions are
//! serialized without locks. A stop sentinel queued behind pending shouts
//! lets [`Dispatcher::shutdown`] finish the backlog and hand the
//! conversation back.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{DispatchError, DispatchResult};
use crate::machine::Conversation;
use crate::transport::IncomingShout;

enum QueueItem {
    Shout(IncomingShout),
    Stop,
}

/// Enqueue side of a dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<QueueItem>,
}

impl DispatcherHandle {
    /// Queue a shout, waiting for capacity when the queue is full.
    pub async fn handle_incoming_shout(&self, shout: IncomingShout) -> DispatchResult<()> {
        self.tx
            .send(QueueItem::Shout(shout))
            .await
            .map_err(|_| DispatchError::Stopped)
    }

    /// Queue a shout without waiting.
    pub fn try_handle_incoming_shout(&self, shout: IncomingShout) -> DispatchResult<()> {
        self.tx
            .try_send(QueueItem::Shout(shout))
            .map_err(|e| match e {
                TrySendError::Full(_) => DispatchError::QueueFull,
                TrySendError::Closed(_) => DispatchError::Stopped,
            })
    }

    /// Queue a shout from a thread outside the runtime.
    pub fn blocking_handle_incoming_shout(&self, shout: IncomingShout) -> DispatchResult<()> {
        self.tx
            .blocking_send(QueueItem::Shout(shout))
            .map_err(|_| DispatchError::Stopped)
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct Dispatcher {
    handle: DispatcherHandle,
    worker: JoinHandle<Conversation>,
}

impl Dispatcher {
    /// Start the worker. The conversation's `start` runs on the worker
    /// before the first queued shout.
    pub fn spawn(conversation: Conversation) -> Self {
        let capacity = conversation.config().queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_worker(conversation, rx));

        Self {
            handle: DispatcherHandle { tx },
            worker,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Finish every shout queued so far, stop the worker and return the
    /// conversation.
    pub async fn shutdown(self) -> DispatchResult<Conversation> {
        // A closed queue means the worker is already gone; joining reports why.
        let _ = self.handle.tx.send(QueueItem::Stop).await;
        self.worker
            .await
            .map_err(|e| DispatchError::WorkerPanicked(e.to_string()))
    }
}

async fn run_worker(
    mut conversation: Conversation,
    mut rx: mpsc::Receiver<QueueItem>,
) -> Conversation {
    conversation.start().await;

    while let Some(item) = rx.recv().await {
        match item {
            QueueItem::Shout(shout) => conversation.handle_shout(shout).await,
            QueueItem::Stop => {
                debug!(nick = conversation.nick(), "Stop sentinel received");
                break;
            }
        }
    }

    info!(nick = conversation.nick(), phase = %conversation.phase(), "Dispatcher stopped");
    conversation
}
