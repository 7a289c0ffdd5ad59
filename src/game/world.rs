//! Shared world state and the authoritative simulation step

use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

use crate::ws::protocol::{Direction, PositionPayload, StatePayload};

use super::combat::{CombatSystem, HitResult, Hitbox, Projectile, MAX_HEALTH};
use super::physics::{PhysicsSystem, SKY_SPAWN_Y, SPAWN_MAX_X, SPAWN_MIN_X};
use super::snapshot;

/// Player state in the world (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub name: String,
    pub color: String,

    // Client-reported kinematics
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub facing: i32,
    pub on_ground: bool,

    // Server-owned
    pub health: u8,
    pub kills: u32,
    pub last_hit_by: Option<String>,
    pub connected: bool,
}

impl Player {
    pub fn new(name: &str, color: &str, spawn_x: f64, spawn_y: f64) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            x: spawn_x,
            y: spawn_y,
            vel_x: 0.0,
            vel_y: 0.0,
            facing: 1,
            on_ground: false,
            health: MAX_HEALTH,
            kills: 0,
            last_hit_by: None,
            connected: true,
        }
    }

    fn place(&mut self, (x, y): (f64, f64)) {
        self.x = x;
        self.y = y;
        self.vel_x = 0.0;
        self.vel_y = 0.0;
    }

    /// Drop from the sky with full health
    fn respawn(&mut self, projectile_counter: u64) {
        self.place(PhysicsSystem::sky_respawn(projectile_counter));
        self.health = MAX_HEALTH;
    }
}

/// World errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("player {0} is already in the world")]
    NameTaken(String),
}

/// State behind the world lock
#[derive(Debug, Default)]
struct WorldState {
    players: HashMap<String, Player>,
    projectiles: HashMap<String, Projectile>,
    projectile_counter: u64,
}

/// The shared arena. Every method locks internally; no lock outlives a call.
pub struct World {
    state: RwLock<WorldState>,
    spawn_rng: Mutex<ChaCha8Rng>,
}

impl World {
    pub fn new(spawn_seed: Option<u64>) -> Self {
        let rng = match spawn_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            state: RwLock::new(WorldState::default()),
            spawn_rng: Mutex::new(rng),
        }
    }

    /// Pick a join spawn: random X across the arena, falling from the sky
    pub fn generate_spawn_position(&self) -> (f64, f64) {
        let x = self.spawn_rng.lock().gen_range(SPAWN_MIN_X..SPAWN_MAX_X).floor();
        (x, SKY_SPAWN_Y)
    }

    /// Insert a player unless its name is already registered
    pub fn try_add_player(&self, player: Player) -> Result<(), WorldError> {
        let mut state = self.state.write();
        if state.players.contains_key(&player.name) {
            return Err(WorldError::NameTaken(player.name));
        }

        let name = player.name.clone();
        state.players.insert(name.clone(), player);
        info!(player = %name, total = state.players.len(), "Player added to world");
        Ok(())
    }

    pub fn remove_player(&self, name: &str) -> Option<Player> {
        let mut state = self.state.write();
        let removed = state.players.remove(name);
        if removed.is_some() {
            info!(player = %name, total = state.players.len(), "Player removed from world");
        }
        removed
    }

    pub fn contains_player(&self, name: &str) -> bool {
        self.state.read().players.contains_key(name)
    }

    /// Copy of a single player
    #[cfg(test)]
    pub fn player(&self, name: &str) -> Option<Player> {
        self.state.read().players.get(name).cloned()
    }

    /// Flag a player as unreachable; it stops being simulated or broadcast
    pub fn mark_disconnected(&self, name: &str) {
        if let Some(player) = self.state.write().players.get_mut(name) {
            player.connected = false;
        }
    }

    /// Apply client-reported kinematics, keeping the server's health, then
    /// enforce the death zone.
    pub fn update_position(&self, name: &str, reported: &PositionPayload) {
        let mut state = self.state.write();
        let counter = state.projectile_counter;
        let Some(player) = state.players.get_mut(name) else {
            return;
        };

        player.x = reported.x;
        player.y = reported.y;
        player.vel_x = reported.vel_x;
        player.vel_y = reported.vel_y;
        player.facing = reported.facing;
        player.on_ground = reported.on_ground;

        if !PhysicsSystem::in_death_zone(player.y) {
            return;
        }

        let (health, dead) = CombatSystem::apply_damage(player.health);
        player.health = health;
        info!(player = %name, health, "Player fell off the map");

        if dead {
            player.respawn(counter);
            info!(player = %name, x = player.x, y = player.y, "Player respawned");
        } else {
            player.place(PhysicsSystem::ledge_respawn(health));
        }
    }

    /// Spawn a projectile for `owner`. Returns its id, or `None` if the owner
    /// is not in the world.
    pub fn add_projectile(&self, owner: &str, x: f64, y: f64, direction: Direction) -> Option<String> {
        self.add_projectile_at(owner, x, y, direction, Instant::now())
    }

    pub fn add_projectile_at(
        &self,
        owner: &str,
        x: f64,
        y: f64,
        direction: Direction,
        now: Instant,
    ) -> Option<String> {
        let mut state = self.state.write();
        if !state.players.contains_key(owner) {
            return None;
        }

        state.projectile_counter += 1;
        let projectile = Projectile::new(owner, state.projectile_counter, x, y, direction, now);
        let id = projectile.id.clone();
        state.projectiles.insert(id.clone(), projectile);
        Some(id)
    }

    /// Advance the simulation by `dt` seconds
    pub fn tick(&self, dt: f64) -> Vec<HitResult> {
        self.tick_at(dt, Instant::now())
    }

    /// Simulation step against an explicit clock. The whole step runs under
    /// one write lock, so readers only ever see fully resolved ticks.
    pub fn tick_at(&self, dt: f64, now: Instant) -> Vec<HitResult> {
        let mut guard = self.state.write();
        let WorldState {
            players,
            projectiles,
            projectile_counter,
        } = &mut *guard;

        let mut hits = Vec::new();
        let mut spent: Vec<String> = Vec::new();

        for (id, projectile) in projectiles.iter_mut() {
            if !projectile.update(dt, now) {
                spent.push(id.clone());
                continue;
            }

            let bullet_box = projectile.hitbox();
            let Some(target) = players.values_mut().find(|p| {
                p.connected
                    && p.name != projectile.owner
                    && bullet_box.overlaps(&Hitbox::player(p.x, p.y))
            }) else {
                continue;
            };

            let (health, killed) = CombatSystem::apply_damage(target.health);
            target.health = health;
            target.last_hit_by = Some(projectile.owner.clone());

            if killed {
                target.respawn(*projectile_counter);
                target.last_hit_by = None;
                info!(
                    player = %target.name,
                    x = target.x,
                    y = target.y,
                    "Player respawned"
                );
            }

            hits.push(HitResult {
                projectile_id: id.clone(),
                shooter: projectile.owner.clone(),
                target: target.name.clone(),
                target_killed: killed,
            });
            spent.push(id.clone());
        }

        for hit in hits.iter().filter(|h| h.target_killed) {
            if let Some(shooter) = players.get_mut(&hit.shooter) {
                shooter.kills += 1;
                info!(
                    shooter = %hit.shooter,
                    victim = %hit.target,
                    kills = shooter.kills,
                    "Kill"
                );
            }
        }

        for id in spent {
            projectiles.remove(&id);
        }

        hits
    }

    /// Immutable copy of everything clients can see
    pub fn snapshot(&self) -> StatePayload {
        let state = self.state.read();
        snapshot::build(state.players.values(), state.projectiles.values())
    }

    pub fn player_count(&self) -> usize {
        self.state.read().players.len()
    }

    pub fn projectile_count(&self) -> usize {
        self.state.read().projectiles.len()
    }

    #[cfg(test)]
    pub fn projectile_counter(&self) -> u64 {
        self.state.read().projectile_counter
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(None)
    }
}
