//! In-process chat room over a tokio broadcast channel.
//!
//! Every shout published to the room is delivered to every attached
//! participant, the sender included, which is how real chat transports
//! echo a participant's own shouts back to it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{IncomingShout, OutgoingShout, Transport};
use crate::dispatcher::DispatcherHandle;
use crate::error::TransportResult;

/// Channel capacity for the room broadcast.
const ROOM_CAPACITY: usize = 256;

/// A single conversation room shared by several participants.
pub struct LoopbackRoom {
    sender: broadcast::Sender<IncomingShout>,
    conversation_id: String,
    domain: String,
}

impl LoopbackRoom {
    pub fn new(conversation_id: impl Into<String>, domain: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(ROOM_CAPACITY);
        Self {
            sender,
            conversation_id: conversation_id.into(),
            domain: domain.into(),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Outbound transport that shouts into this room as `nick`.
    pub fn transport_for(self: &Arc<Self>, nick: &str) -> LoopbackTransport {
        LoopbackTransport {
            nick: nick.to_string(),
            room: Arc::clone(self),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IncomingShout> {
        self.sender.subscribe()
    }

    /// Deliver a shout to every attached participant.
    pub fn publish(&self, shout: IncomingShout) {
        match self.sender.send(shout) {
            Ok(receivers) => debug!(receivers, "Shout published"),
            // No participants attached yet is not an error.
            Err(_) => debug!("Shout published (no receivers)"),
        }
    }

    /// Forward every room shout into a participant's dispatcher queue.
    ///
    /// Subscribes before returning, so nothing published after `attach`
    /// is missed. The forwarder stops when the room closes or the
    /// dispatcher stops accepting shouts.
    pub fn attach(&self, handle: DispatcherHandle) -> JoinHandle<()> {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(shout) => {
                        if handle.handle_incoming_shout(shout).await.is_err() {
                            debug!("Dispatcher stopped; detaching from room");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Participant lagged behind the room");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Outbound half bound to one participant nick.
#[derive(Clone)]
pub struct LoopbackTransport {
    nick: String,
    room: Arc<LoopbackRoom>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, shout: OutgoingShout) -> TransportResult<()> {
        let conversation_id = shout
            .conversation_id
            .unwrap_or_else(|| self.room.conversation_id.clone());
        let domain = shout.domain.unwrap_or_else(|| self.room.domain.clone());
        self.room.publish(IncomingShout::now(
            self.nick.clone(),
            shout.text,
            conversation_id,
            domain,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shouts_reach_every_subscriber_including_sender() {
        let room = LoopbackRoom::new("cid-1", "Private").shared();
        let mut alice_rx = room.subscribe();
        let mut bob_rx = room.subscribe();

        room.transport_for("alice")
            .send(OutgoingShout::new("hello"))
            .await
            .unwrap();

        let seen_by_alice = alice_rx.recv().await.unwrap();
        let seen_by_bob = bob_rx.recv().await.unwrap();
        assert_eq!(seen_by_alice.user, "alice");
        assert_eq!(seen_by_bob.shout, "hello");
        assert_eq!(seen_by_bob.conversation_id, "cid-1");
        assert_eq!(seen_by_bob.domain, "Private");
    }

    #[tokio::test]
    async fn test_send_without_receivers_is_ok() {
        let room = LoopbackRoom::new("cid-1", "Private").shared();
        assert!(room
            .transport_for("alice")
            .send(OutgoingShout::new("anyone?"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_routed_shout_keeps_its_conversation() {
        let room = LoopbackRoom::new("cid-1", "Private").shared();
        let mut rx = room.subscribe();
        room.transport_for("bob")
            .send(OutgoingShout::routed("psst", "cid-9", "Public"))
            .await
            .unwrap();
        let shout = rx.recv().await.unwrap();
        assert_eq!(shout.conversation_id, "cid-9");
        assert_eq!(shout.domain, "Public");
    }
}
