//! Config-sync publish/subscribe bus.
//!
//! Uses a [`tokio::sync::broadcast`] channel so that every subscriber sees
//! every [`SyncMessage`] without any single subscriber blocking the others.
//! Coordinators in the same process can share one bus directly; across
//! processes the peer link relays messages between buses.

use armada_types::SyncMessage;
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (messages buffered before slow subscribers start
/// lagging).
const DEFAULT_CAPACITY: usize = 256;

/// Shared sync bus. Clones share the same channel.
#[derive(Clone, Debug)]
pub struct SyncBus {
    sender: broadcast::Sender<SyncMessage>,
}

impl SyncBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `message` to every current subscriber.
    ///
    /// Returns the number of subscribers handed the message; `0` when nobody
    /// is listening, which is a normal condition.
    pub fn publish(&self, message: SyncMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> SyncSubscriber {
        SyncSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

pub struct SyncSubscriber {
    receiver: broadcast::Receiver<SyncMessage>,
}

impl SyncSubscriber {
    /// Wait for the next message.
    ///
    /// Returns `None` when the bus is closed.  Lag is logged and skipped:
    /// missed advertisements are repaired by the next request round.
    pub async fn recv(&mut self) -> Option<SyncMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "sync subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_every_message() -> Result<(), Box<dyn std::error::Error>> {
        let bus = SyncBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(SyncMessage::request("lab")), 2);

        let got_a = a.recv().await.ok_or("a got nothing")?;
        let got_b = b.recv().await.ok_or("b got nothing")?;
        assert_eq!(got_a, SyncMessage::request("lab"));
        assert_eq!(got_b, got_a);
        Ok(())
    }

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let bus = SyncBus::default();
        assert_eq!(bus.publish(SyncMessage::request("lab")), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let bus = SyncBus::new(4);
        let mut slow = bus.subscribe();
        for i in 0..20 {
            bus.publish(SyncMessage::advertise("lab", format!("Robots: [] # {i}")));
        }
        let message = slow.recv().await.unwrap();
        assert_eq!(message.payload, "Robots: [] # 16");
    }
}
