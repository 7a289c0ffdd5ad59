//! WebSocket upgrade handler

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use futures::StreamExt;
use tracing::{debug, info};

use crate::app::AppState;
use crate::ws::session::Session;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let session = Session::new(
            state.world.clone(),
            state.colors.clone(),
            state.broadcaster.clone(),
            state.config.input_rate_limit,
        );
        let session_id = session.id();
        info!(session_id = %session_id, "Client connected, waiting for join message");

        let (sink, stream) = socket.split();
        let end = session.run(stream, sink).await;

        debug!(session_id = %session_id, state = ?end, "WebSocket connection closed");
    })
}
