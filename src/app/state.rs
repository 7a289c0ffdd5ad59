//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{ColorPool, World};
use crate::ws::Broadcaster;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub world: Arc<World>,
    pub colors: Arc<ColorPool>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize the arena
        let world = Arc::new(World::new(config.spawn_seed));

        // Initialize color pool
        let colors = Arc::new(ColorPool::new());

        // Initialize broadcaster (flags dead sessions in the world)
        let broadcaster = Arc::new(Broadcaster::new(world.clone()));

        Self {
            config,
            world,
            colors,
            broadcaster,
        }
    }
}
