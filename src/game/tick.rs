//! Fixed-rate authoritative simulation loop

use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::util::time::{tick_period, DeltaClock};
use crate::ws::broadcast::Broadcaster;

use super::World;

/// Drives `World::tick` and the broadcast of its result
pub struct SimulationLoop {
    world: Arc<World>,
    broadcaster: Arc<Broadcaster>,
    tick_rate: u32,
}

impl SimulationLoop {
    pub fn new(world: Arc<World>, broadcaster: Arc<Broadcaster>, tick_rate: u32) -> Self {
        Self {
            world,
            broadcaster,
            tick_rate,
        }
    }

    /// One iteration: resolve the tick, then publish it
    pub fn step(&self, dt: f64) {
        let hits = self.world.tick(dt);
        for hit in &hits {
            debug!(
                projectile = %hit.projectile_id,
                shooter = %hit.shooter,
                target = %hit.target,
                killed = hit.target_killed,
                "Hit"
            );
        }

        let snapshot = self.world.snapshot();
        trace!(
            dt,
            hits = hits.len(),
            players = snapshot.players.len(),
            bullets = snapshot.bullets.len(),
            "Tick"
        );
        self.broadcaster.publish(snapshot);
    }

    /// Run for the lifetime of the process
    pub async fn run(self) {
        info!(tick_rate = self.tick_rate, "Simulation loop started");

        let mut ticker = interval(tick_period(self.tick_rate));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = DeltaClock::new();

        loop {
            ticker.tick().await;
            let dt = clock.delta(Instant::now());
            self.step(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Player;
    use crate::ws::protocol::{Direction, ServerMsg};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<World>, Arc<Broadcaster>) {
        let world = Arc::new(World::new(Some(11)));
        let broadcaster = Arc::new(Broadcaster::new(world.clone()));
        (world, broadcaster)
    }

    #[tokio::test]
    async fn step_publishes_resolved_tick() {
        let (world, broadcaster) = setup();
        world
            .try_add_player(Player::new("a", "#FF6B6B", 0.0, 100.0))
            .unwrap();
        world
            .try_add_player(Player::new("b", "#4ECDC4", 500.0, 100.0))
            .unwrap();
        world.add_projectile("b", 4.0, 120.0, Direction::Left);

        let (tx, mut rx) = mpsc::channel(4);
        broadcaster.register("a", tx);

        SimulationLoop::new(world.clone(), broadcaster, 60).step(0.0);

        let frame = rx.recv().await.unwrap();
        let ServerMsg::State(state) = serde_json::from_str::<ServerMsg>(&frame).unwrap() else {
            panic!("expected state");
        };
        // The hit is already applied and the bullet consumed
        assert!(state.bullets.is_empty());
        let a = state.players.iter().find(|p| p.name == "a").unwrap();
        assert_eq!(a.health, 2);
    }

    #[tokio::test]
    async fn run_keeps_publishing() {
        let (world, broadcaster) = setup();
        world
            .try_add_player(Player::new("a", "#FF6B6B", 0.0, 100.0))
            .unwrap();
        let (tx, mut rx) = mpsc::channel(64);
        broadcaster.register("a", tx);

        let handle = tokio::spawn(SimulationLoop::new(world, broadcaster, 60).run());
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        let mut frames = 0;
        while rx.try_recv().is_ok() {
            frames += 1;
        }
        assert!(frames >= 2, "only {frames} frames published");
    }
}
