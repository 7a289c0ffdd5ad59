//! Fan-out of world snapshots to every live session

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, trace};

use crate::game::snapshot::SnapshotStats;
use crate::game::World;
use crate::ws::protocol::{ServerMsg, StatePayload};

/// Serialized frame, shared by every recipient of one publish
pub type Frame = Arc<str>;

/// Per-session outbound queue, drained by the session's writer task
pub type Outbound = mpsc::Sender<Frame>;

/// Frames buffered per session before new ones are dropped
pub const OUTBOUND_BUFFER: usize = 64;

/// Result of handing one frame to one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Queue full; this frame is lost, the session stays
    Dropped,
    /// Writer is gone; the session is treated as disconnected
    Disconnected,
}

/// Offer a frame to a session without waiting
pub fn deliver(outbound: &Outbound, frame: &Frame) -> Delivery {
    match outbound.try_send(frame.clone()) {
        Ok(()) => Delivery::Delivered,
        Err(TrySendError::Full(_)) => Delivery::Dropped,
        Err(TrySendError::Closed(_)) => Delivery::Disconnected,
    }
}

/// Fans out state updates to every registered session
pub struct Broadcaster {
    world: Arc<World>,
    sessions: DashMap<String, Outbound>,
    stats: Mutex<SnapshotStats>,
}

impl Broadcaster {
    pub fn new(world: Arc<World>) -> Self {
        Self {
            world,
            sessions: DashMap::new(),
            stats: Mutex::new(SnapshotStats::default()),
        }
    }

    pub fn register(&self, name: &str, outbound: Outbound) {
        self.sessions.insert(name.to_string(), outbound);
    }

    pub fn unregister(&self, name: &str) {
        self.sessions.remove(name);
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop `name`'s registration if it is still `outbound` and flag the
    /// player. A newer session under the same name is left alone.
    fn evict(&self, name: &str, outbound: &Outbound) -> bool {
        let removed = self
            .sessions
            .remove_if(name, |_, current| current.same_channel(outbound))
            .is_some();
        if removed {
            debug!(player = %name, "Delivery failed, marking disconnected");
            self.world.mark_disconnected(name);
        }
        removed
    }

    /// Serialize `snapshot` once and offer it to every session. Sessions
    /// whose writer is gone are flagged disconnected in the world; nothing
    /// is retried and nothing is reported to the caller.
    pub fn publish(&self, snapshot: StatePayload) {
        let player_count = snapshot.players.len();
        let frame: Frame = match serde_json::to_string(&ServerMsg::State(snapshot)) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "Failed to serialize state");
                return;
            }
        };

        let mut dead: Vec<(String, Outbound)> = Vec::new();
        for entry in self.sessions.iter() {
            match deliver(entry.value(), &frame) {
                Delivery::Delivered => {}
                Delivery::Dropped => {
                    debug!(player = %entry.key(), "Outbound queue full, frame dropped");
                }
                Delivery::Disconnected => {
                    dead.push((entry.key().clone(), entry.value().clone()));
                }
            }
        }

        for (name, outbound) in dead {
            self.evict(&name, &outbound);
        }

        let mut stats = self.stats.lock();
        stats.record(player_count, frame.len());
        trace!(
            bytes = frame.len(),
            total_snapshots = stats.total_snapshots,
            total_bytes = stats.total_bytes,
            avg_players = stats.avg_players_per_snapshot,
            "Published state"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;

    fn setup(names: &[&str]) -> (Arc<World>, Broadcaster) {
        let world = Arc::new(World::new(Some(3)));
        for name in names {
            world
                .try_add_player(Player::new(name, "#FF6B6B", 100.0, 100.0))
                .unwrap();
        }
        let broadcaster = Broadcaster::new(world.clone());
        (world, broadcaster)
    }

    #[test]
    fn deliver_reports_status() {
        let (tx, rx) = mpsc::channel(1);
        let frame: Frame = "x".into();
        assert_eq!(deliver(&tx, &frame), Delivery::Delivered);
        assert_eq!(deliver(&tx, &frame), Delivery::Dropped);
        drop(rx);
        assert_eq!(deliver(&tx, &frame), Delivery::Disconnected);
    }

    #[tokio::test]
    async fn publish_reaches_every_session() {
        let (world, broadcaster) = setup(&["a", "b"]);
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        broadcaster.register("a", tx_a);
        broadcaster.register("b", tx_b);

        broadcaster.publish(world.snapshot());

        for rx in [&mut rx_a, &mut rx_b] {
            let frame = rx.recv().await.unwrap();
            let msg: ServerMsg = serde_json::from_str(&frame).unwrap();
            let ServerMsg::State(state) = msg else {
                panic!("expected state");
            };
            assert_eq!(state.players.len(), 2);
        }
    }

    #[tokio::test]
    async fn failed_session_is_isolated() {
        let (world, broadcaster) = setup(&["a", "b"]);
        let (tx_a, rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        broadcaster.register("a", tx_a);
        broadcaster.register("b", tx_b);
        drop(rx_a);

        broadcaster.publish(world.snapshot());

        assert!(rx_b.recv().await.is_some());
        assert!(!world.player("a").unwrap().connected);
        assert!(world.player("b").unwrap().connected);
        assert_eq!(broadcaster.session_count(), 1);

        // Next snapshot no longer lists the dead session
        broadcaster.publish(world.snapshot());
        let frame = rx_b.recv().await.unwrap();
        let ServerMsg::State(state) = serde_json::from_str::<ServerMsg>(&frame).unwrap() else {
            panic!("expected state");
        };
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].name, "b");
    }

    #[test]
    fn slow_session_only_loses_frames() {
        let (world, broadcaster) = setup(&["a"]);
        let (tx, _rx) = mpsc::channel(1);
        broadcaster.register("a", tx);

        broadcaster.publish(world.snapshot());
        broadcaster.publish(world.snapshot());

        assert!(world.player("a").unwrap().connected);
        assert_eq!(broadcaster.session_count(), 1);
    }

    #[tokio::test]
    async fn stale_failure_spares_newer_registration() {
        let (world, broadcaster) = setup(&["a"]);
        let (old_tx, old_rx) = mpsc::channel::<Frame>(1);
        broadcaster.register("a", old_tx.clone());
        drop(old_rx);

        // Reconnect under the same name after the old writer died
        let (new_tx, mut new_rx) = mpsc::channel(4);
        broadcaster.register("a", new_tx.clone());

        assert!(!broadcaster.evict("a", &old_tx));
        assert_eq!(broadcaster.session_count(), 1);
        assert!(world.player("a").unwrap().connected);

        broadcaster.publish(world.snapshot());
        assert!(new_rx.recv().await.is_some());

        assert!(broadcaster.evict("a", &new_tx));
        assert_eq!(broadcaster.session_count(), 0);
        assert!(!world.player("a").unwrap().connected);
    }

    #[test]
    fn dead_registration_is_evicted_on_publish() {
        let (world, broadcaster) = setup(&["a"]);
        let (tx, rx) = mpsc::channel::<Frame>(1);
        broadcaster.register("a", tx.clone());
        drop(rx);

        broadcaster.publish(world.snapshot());

        assert_eq!(broadcaster.session_count(), 0);
        assert!(!world.player("a").unwrap().connected);
        // Already gone: a second eviction is a no-op
        assert!(!broadcaster.evict("a", &tx));
    }
}
