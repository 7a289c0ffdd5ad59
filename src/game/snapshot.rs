//! Snapshot building

use crate::ws::protocol::{BulletSnapshot, PlayerSnapshot, StatePayload};

use super::combat::Projectile;
use super::world::Player;

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            name: p.name.clone(),
            color: p.color.clone(),
            x: p.x,
            y: p.y,
            vel_x: p.vel_x,
            vel_y: p.vel_y,
            facing: p.facing,
            on_ground: p.on_ground,
            health: p.health,
            kill_count: p.kills,
        }
    }
}

impl From<&Projectile> for BulletSnapshot {
    fn from(b: &Projectile) -> Self {
        Self {
            id: b.id.clone(),
            owner_name: b.owner.clone(),
            x: b.x,
            y: b.y,
            direction: b.direction,
        }
    }
}

/// Copy the visible state out of live entities. Disconnected players are
/// left out; the result shares nothing with the world.
pub fn build<'a>(
    players: impl IntoIterator<Item = &'a Player>,
    projectiles: impl IntoIterator<Item = &'a Projectile>,
) -> StatePayload {
    StatePayload {
        players: players
            .into_iter()
            .filter(|p| p.connected)
            .map(PlayerSnapshot::from)
            .collect(),
        bullets: projectiles.into_iter().map(BulletSnapshot::from).collect(),
    }
}

/// Snapshot size stats for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::Direction;
    use std::time::Instant;

    #[test]
    fn disconnected_players_are_excluded() {
        let mut gone = Player::new("gone", "#4ECDC4", 0.0, 0.0);
        gone.connected = false;
        let here = Player::new("here", "#FF6B6B", 10.0, 20.0);
        let bullet = Projectile::new("here", 1, 5.0, 6.0, Direction::Left, Instant::now());

        let state = build([&gone, &here], [&bullet]);
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].name, "here");
        assert_eq!(state.players[0].health, 3);
        assert_eq!(state.bullets[0].id, "here_1");
        assert_eq!(state.bullets[0].direction, Direction::Left);
    }

    #[test]
    fn stats_running_average() {
        let mut stats = SnapshotStats::default();
        stats.record(2, 100);
        stats.record(4, 300);
        assert_eq!(stats.total_snapshots, 2);
        assert_eq!(stats.total_bytes, 400);
        assert!((stats.avg_players_per_snapshot - 3.0).abs() < 1e-6);
    }
}
