//! HTTP surface: WebSocket upgrade, health check, static client

pub mod routes;

pub use routes::build_router;
