//! WebSocket transport: wire protocol, sessions and state fan-out

pub mod broadcast;
pub mod handler;
pub mod protocol;
pub mod session;

pub use broadcast::Broadcaster;
