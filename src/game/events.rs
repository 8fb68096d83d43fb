//! Round lifecycle events for real-time clients

use super::types::{RoundId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundEvent {
    RoundStarted {
        round_id: RoundId,
        ends_at: DateTime<Utc>,
    },
    ParticipantJoined {
        round_id: RoundId,
        user_id: UserId,
        queued: bool,
    },
    ParticipantLeft {
        round_id: RoundId,
        user_id: UserId,
    },
    ParticipantPromoted {
        round_id: RoundId,
        user_id: UserId,
    },
    /// The pick itself stays private until the draw
    NumberChosen {
        round_id: RoundId,
        user_id: UserId,
    },
    RoundCompleted {
        round_id: RoundId,
        winning_number: u8,
        winners: Vec<UserId>,
    },
}

impl RoundEvent {
    pub fn round_id(&self) -> RoundId {
        match self {
            RoundEvent::RoundStarted { round_id, .. }
            | RoundEvent::ParticipantJoined { round_id, .. }
            | RoundEvent::ParticipantLeft { round_id, .. }
            | RoundEvent::ParticipantPromoted { round_id, .. }
            | RoundEvent::NumberChosen { round_id, .. }
            | RoundEvent::RoundCompleted { round_id, .. } => *round_id,
        }
    }
}

/// Fan-out of round events; publishing with no subscribers is not an error
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RoundEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: RoundEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let round_id = RoundId::new();

        bus.publish(RoundEvent::ParticipantLeft {
            round_id,
            user_id: UserId::from("alice"),
        });

        let event = rx.recv().await.expect("event should arrive");
        assert_eq!(event.round_id(), round_id);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(RoundEvent::NumberChosen {
            round_id: RoundId::new(),
            user_id: UserId::from("bob"),
        });
    }

    #[test]
    fn test_event_json_shape() {
        let event = RoundEvent::RoundCompleted {
            round_id: RoundId::new(),
            winning_number: 7,
            winners: vec![UserId::from("bob")],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "round_completed");
        assert_eq!(json["winning_number"], 7);
        assert_eq!(json["winners"][0], "bob");
    }
}
