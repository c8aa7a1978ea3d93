//! Transport seam for the chat service that delivers shouts in and out.
//!
//! The core only needs [`Transport::send`]; inbound delivery is the
//! transport's job (it pushes [`IncomingShout`]s into a
//! [`DispatcherHandle`](crate::dispatcher::DispatcherHandle)). Socket or
//! message-queue clients implement the trait outside this crate;
//! [`LoopbackRoom`] runs a whole room in-process.

pub mod loopback;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

pub use loopback::{LoopbackRoom, LoopbackTransport};

/// Timestamp format used on shouts.
pub const TIMESTAMP_FORMAT: &str = "%I:%M:%S %p";

/// One inbound shout as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingShout {
    pub user: String,
    pub shout: String,
    pub conversation_id: String,
    pub domain: String,
    pub timestamp: String,
}

impl IncomingShout {
    pub fn new(
        user: impl Into<String>,
        shout: impl Into<String>,
        conversation_id: impl Into<String>,
        domain: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            shout: shout.into(),
            conversation_id: conversation_id.into(),
            domain: domain.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Shout stamped with the current local time.
    pub fn now(
        user: impl Into<String>,
        shout: impl Into<String>,
        conversation_id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self::new(
            user,
            shout,
            conversation_id,
            domain,
            Local::now().format(TIMESTAMP_FORMAT).to_string(),
        )
    }
}

/// One outbound shout. `None` routing fields mean the participant's
/// current conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingShout {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl OutgoingShout {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            conversation_id: None,
            domain: None,
        }
    }

    pub fn routed(text: impl Into<String>, conversation_id: &str, domain: &str) -> Self {
        Self {
            text: text.into(),
            conversation_id: Some(conversation_id.to_string()),
            domain: Some(domain.to_string()),
        }
    }
}

/// Outbound half of a chat transport. Sends are fire-and-forget from the
/// core's point of view; retries and acks belong to the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, shout: OutgoingShout) -> TransportResult<()>;
}

/// Transport that keeps every shout in memory.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingShout>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with [`TransportError::Closed`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingShout> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.text).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, shout: OutgoingShout) -> TransportResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent
            .lock()
            .map_err(|e| TransportError::SendFailed(format!("recorder poisoned: {e}")))?
            .push(shout);
        Ok(())
    }
}
