//! Combat system - projectiles, hitboxes, damage

use std::time::{Duration, Instant};

use crate::ws::protocol::Direction;

use super::physics::PhysicsSystem;

/// Projectile horizontal speed (units per second)
pub const PROJECTILE_SPEED: f64 = 600.0;
/// Projectile time-to-live
pub const PROJECTILE_TTL: Duration = Duration::from_secs(2);

pub const PROJECTILE_WIDTH: f64 = 8.0;
pub const PROJECTILE_HEIGHT: f64 = 4.0;
pub const PLAYER_WIDTH: f64 = 32.0;
pub const PLAYER_HEIGHT: f64 = 48.0;

/// Health a player spawns and respawns with
pub const MAX_HEALTH: u8 = 3;

/// Axis-aligned box anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Hitbox {
    pub fn player(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
        }
    }

    pub fn projectile(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            width: PROJECTILE_WIDTH,
            height: PROJECTILE_HEIGHT,
        }
    }

    /// Strict overlap; touching edges do not collide
    pub fn overlaps(&self, other: &Hitbox) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

/// Projectile in flight
#[derive(Debug, Clone)]
pub struct Projectile {
    /// `<owner>_<counter>`
    pub id: String,
    pub owner: String,
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub direction: Direction,
    pub created_at: Instant,
}

impl Projectile {
    pub fn new(
        owner: &str,
        counter: u64,
        x: f64,
        y: f64,
        direction: Direction,
        created_at: Instant,
    ) -> Self {
        Self {
            id: format!("{owner}_{counter}"),
            owner: owner.to_string(),
            x,
            y,
            vel_x: direction.sign() * PROJECTILE_SPEED,
            direction,
            created_at,
        }
    }

    /// Advance by `dt` seconds. Returns false once the projectile is expired
    /// or out of the arena.
    pub fn update(&mut self, dt: f64, now: Instant) -> bool {
        self.x += self.vel_x * dt;
        let age = now.saturating_duration_since(self.created_at);
        age <= PROJECTILE_TTL && PhysicsSystem::in_bounds(self.x)
    }

    pub fn hitbox(&self) -> Hitbox {
        Hitbox::projectile(self.x, self.y)
    }
}

/// Combat rules
pub struct CombatSystem;

impl CombatSystem {
    /// Apply one point of damage, returns (new_health, is_dead)
    pub fn apply_damage(current_health: u8) -> (u8, bool) {
        let new_health = current_health.saturating_sub(1);
        (new_health, new_health == 0)
    }
}

/// Outcome of a projectile striking a player
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub projectile_id: String,
    pub shooter: String,
    pub target: String,
    pub target_killed: bool,
}
