//! Player color pool

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::info;

/// The 8 distinct default colors, in assignment order
pub const PLAYER_COLORS: [&str; 8] = [
    "#FF6B6B", // Red
    "#4ECDC4", // Cyan
    "#45B7D1", // Blue
    "#FFA07A", // Orange
    "#98D8C8", // Mint
    "#F7DC6F", // Yellow
    "#BB8FCE", // Purple
    "#85C1E2", // Sky Blue
];

/// Color handed out once the pool is exhausted. Duplicates are accepted.
pub const FALLBACK_COLOR: &str = PLAYER_COLORS[0];

#[derive(Debug)]
struct PoolState {
    available: VecDeque<&'static str>,
    assigned: HashMap<String, &'static str>,
}

/// Finite pool of colors, one per active player
#[derive(Debug)]
pub struct ColorPool {
    state: Mutex<PoolState>,
}

impl ColorPool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState {
                available: PLAYER_COLORS.into_iter().collect(),
                assigned: HashMap::new(),
            }),
        }
    }

    /// Take the head of the pool for `name`.
    ///
    /// Falls back to [`FALLBACK_COLOR`] without touching the pool when every
    /// color is held. A name that already holds a color gets it back.
    pub fn assign(&self, name: &str) -> &'static str {
        let mut state = self.state.lock();

        if let Some(held) = state.assigned.get(name) {
            return *held;
        }

        let Some(color) = state.available.pop_front() else {
            info!(player = %name, color = FALLBACK_COLOR, "Color pool exhausted, using fallback");
            return FALLBACK_COLOR;
        };

        state.assigned.insert(name.to_string(), color);
        info!(
            player = %name,
            color,
            available = state.available.len(),
            "Assigned color"
        );
        color
    }

    /// Return `name`'s color to the tail of the pool. No-op if it holds none.
    pub fn release(&self, name: &str) {
        let mut state = self.state.lock();

        if let Some(color) = state.assigned.remove(name) {
            state.available.push_back(color);
            info!(
                player = %name,
                color,
                available = state.available.len(),
                "Released color"
            );
        }
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.state.lock().available.len()
    }
}

impl Default for ColorPool {
    fn default() -> Self {
        Self::new()
    }
}
