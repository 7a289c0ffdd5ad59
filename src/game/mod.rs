//! Game simulation modules

pub mod color;
pub mod combat;
pub mod physics;
pub mod snapshot;
pub mod tick;
pub mod world;

pub use color::ColorPool;
pub use tick::SimulationLoop;
pub use world::{Player, World, WorldError};
