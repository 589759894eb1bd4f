//! "Game state changed" push channel.
//!
//! The engine emits a settled-game event to the acting user's session on every
//! terminal transition. The channel is transport-agnostic: whatever serves the
//! client (WebSocket, SSE, polling) subscribes here.

use crate::games::types::GameSettled;
use tokio::sync::broadcast;

/// Notification seam consumed by the engine.
pub trait GameNotifier: Send + Sync {
    fn game_settled(&self, event: &GameSettled);
}

/// Broadcast-channel notifier. Receivers filter by `user_id`; a send with no
/// live receivers is not an error.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<GameSettled>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameSettled> {
        self.sender.subscribe()
    }
}

impl GameNotifier for BroadcastNotifier {
    fn game_settled(&self, event: &GameSettled) {
        let _ = self.sender.send(event.clone());
    }
}

/// No-op notifier for embedders without a push channel.
pub struct NullNotifier;

impl GameNotifier for NullNotifier {
    fn game_settled(&self, _event: &GameSettled) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{Deck, GameOutcome};
    use crate::games::variant::GameVariant;
    use std::collections::BTreeSet;

    fn sample_event() -> GameSettled {
        GameSettled {
            game_id: "g1".to_string(),
            user_id: "alice".to_string(),
            variant: GameVariant::Mines,
            outcome: GameOutcome::Busted,
            multiplier: 0.0,
            payout: 0.0,
            bet_amount: 1.0,
            deck: Deck::new(Vec::new()),
            played: BTreeSet::new(),
            closed_bet: None,
            settled_at: 0,
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_settled_events() {
        let notifier = BroadcastNotifier::new(16);
        let mut receiver = notifier.subscribe();

        notifier.game_settled(&sample_event());
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.game_id, "g1");
        assert_eq!(event.outcome, GameOutcome::Busted);
    }

    #[test]
    fn test_send_without_receivers_is_fine() {
        let notifier = BroadcastNotifier::new(16);
        notifier.game_settled(&sample_event());
    }
}
