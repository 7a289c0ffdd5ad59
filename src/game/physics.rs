//! Arena geometry: bounds, the death zone and respawn points

/// Arena width; projectiles leaving [0, ARENA_WIDTH] are discarded
pub const ARENA_WIDTH: f64 = 3200.0;
/// Players below this Y have fallen off the map
pub const DEATH_ZONE_Y: f64 = 1800.0;
/// "Fall from the sky" spawn height
pub const SKY_SPAWN_Y: f64 = 100.0;
/// Height of the safety ledge used after a non-fatal fall
pub const LEDGE_Y: f64 = 1600.0;

/// Join spawn X is drawn from [SPAWN_MIN_X, SPAWN_MAX_X)
pub const SPAWN_MIN_X: f64 = 100.0;
pub const SPAWN_MAX_X: f64 = 3100.0;

const RESPAWN_BASE_X: u64 = 100;
const RESPAWN_SPREAD_X: u64 = 3000;

/// Stateless arena rules
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Is the player below the death threshold
    pub fn in_death_zone(y: f64) -> bool {
        y > DEATH_ZONE_Y
    }

    /// Is a projectile X inside the arena
    pub fn in_bounds(x: f64) -> bool {
        (0.0..=ARENA_WIDTH).contains(&x)
    }

    /// Full respawn point, spread by the world's projectile counter.
    /// Not uniform and may coincide for two players.
    pub fn sky_respawn(projectile_counter: u64) -> (f64, f64) {
        let x = RESPAWN_BASE_X + projectile_counter.wrapping_mul(200) % RESPAWN_SPREAD_X;
        (x as f64, SKY_SPAWN_Y)
    }

    /// Safety ledge for a fall that left the player alive
    pub fn ledge_respawn(health: u8) -> (f64, f64) {
        let x = RESPAWN_BASE_X + (u64::from(health) * 500) % RESPAWN_SPREAD_X;
        (x as f64, LEDGE_Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sky_respawn_wraps_with_counter() {
        assert_eq!(PhysicsSystem::sky_respawn(0), (100.0, 100.0));
        assert_eq!(PhysicsSystem::sky_respawn(3), (700.0, 100.0));
        // 16 * 200 = 3200 -> 200
        assert_eq!(PhysicsSystem::sky_respawn(16), (300.0, 100.0));
        assert_eq!(PhysicsSystem::sky_respawn(15), (100.0, 100.0));
    }

    #[test]
    fn ledge_respawn_depends_on_remaining_health() {
        assert_eq!(PhysicsSystem::ledge_respawn(2), (1100.0, 1600.0));
        assert_eq!(PhysicsSystem::ledge_respawn(1), (600.0, 1600.0));
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(PhysicsSystem::in_bounds(0.0));
        assert!(PhysicsSystem::in_bounds(3200.0));
        assert!(!PhysicsSystem::in_bounds(-0.1));
        assert!(!PhysicsSystem::in_bounds(3200.1));
        assert!(!PhysicsSystem::in_death_zone(1800.0));
        assert!(PhysicsSystem::in_death_zone(1800.5));
    }
}
