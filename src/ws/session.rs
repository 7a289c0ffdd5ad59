//! Per-connection session: join handshake, message dispatch, cleanup
//!
//! The session is generic over the two halves of the transport so it can be
//! driven by a WebSocket in production and by in-memory channels in tests.

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{ColorPool, Player, World, WorldError};
use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::broadcast::{Broadcaster, Frame, OUTBOUND_BUFFER};
use crate::ws::protocol::{ClientMsg, DecodeError, JoinPayload, ServerMsg, MSG_JOIN};

/// Longest accepted display name, in characters
pub const MAX_NAME_LEN: usize = 10;

/// How long the writer gets to flush queued frames on shutdown
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport handshake in progress
    Connecting,
    /// Waiting for the join request
    AwaitingJoin,
    /// Player is in the world
    Active,
    /// Done; no further world interaction
    Terminated,
}

/// Reasons a join is refused. The message is sent to the client verbatim.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("First message must be a join request")]
    NotAJoin,

    #[error("Invalid join payload format")]
    InvalidPayload,

    #[error("Name must be between 1 and {MAX_NAME_LEN} characters")]
    InvalidName,

    #[error("Name already taken")]
    NameTaken,
}

impl From<WorldError> for JoinError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::NameTaken(_) => Self::NameTaken,
        }
    }
}

/// Failure writing directly to the transport
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport write failed: {0}")]
    Transport(String),
}

/// How the inbound side ended; only used to pick a log level
#[derive(Debug, Clone, PartialEq, Eq)]
enum CloseKind {
    Clean,
    Abnormal(String),
}

pub fn validate_name(name: &str) -> Result<(), JoinError> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(JoinError::InvalidName);
    }
    Ok(())
}

/// One client connection
pub struct Session {
    id: Uuid,
    state: SessionState,
    world: Arc<World>,
    colors: Arc<ColorPool>,
    broadcaster: Arc<Broadcaster>,
    rate_limiter: SessionRateLimiter,
}

impl Session {
    pub fn new(
        world: Arc<World>,
        colors: Arc<ColorPool>,
        broadcaster: Arc<Broadcaster>,
        input_rate_limit: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            world,
            colors,
            broadcaster,
            rate_limiter: SessionRateLimiter::new(input_rate_limit),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session_id = %self.id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
    }

    /// Drive the session over an upgraded transport until it terminates
    pub async fn run<S, E, K>(mut self, mut stream: S, mut sink: K) -> SessionState
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
        K: Sink<Message> + Unpin + Send + 'static,
        K::Error: Display + Send,
    {
        self.transition(SessionState::AwaitingJoin);

        let name = match self.await_join(&mut stream, &mut sink).await {
            Some(name) => name,
            None => {
                let _ = sink.close().await;
                self.transition(SessionState::Terminated);
                return self.state;
            }
        };
        self.transition(SessionState::Active);

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let mut writer = tokio::spawn(write_loop(self.id, sink, outbound_rx));
        self.broadcaster.register(&name, outbound_tx);

        // Newcomer and peers see the join right away
        self.broadcaster.publish(self.world.snapshot());

        let close = self.receive_loop(&name, &mut stream).await;
        self.terminate(&name);

        match close {
            CloseKind::Clean => {
                info!(session_id = %self.id, player = %name, "Player disconnected cleanly")
            }
            CloseKind::Abnormal(reason) => {
                warn!(session_id = %self.id, player = %name, error = %reason, "Player disconnected")
            }
        }

        // Unregistering dropped the last sender, so the writer drains and closes
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            debug!(session_id = %self.id, "Writer did not drain in time");
            writer.abort();
        }

        self.state
    }

    /// Read the first data message and register the player. Returns the
    /// player's name, or `None` if the session must end.
    async fn await_join<S, E, K>(&mut self, stream: &mut S, sink: &mut K) -> Option<String>
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
        K: Sink<Message> + Unpin,
        K::Error: Display,
    {
        let text = loop {
            match stream.next().await? {
                Ok(Message::Text(text)) => break text,
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Binary(_)) => {
                    self.refuse(sink, JoinError::NotAJoin).await;
                    return None;
                }
                Ok(Message::Close(_)) => {
                    debug!(session_id = %self.id, "Closed before joining");
                    return None;
                }
                Err(e) => {
                    debug!(session_id = %self.id, error = %e, "Transport error before joining");
                    return None;
                }
            }
        };

        let join = match parse_join(&text) {
            Ok(join) => join,
            Err(e) => {
                self.refuse(sink, e).await;
                return None;
            }
        };
        let name = join.name;
        if self.world.contains_player(&name) {
            self.refuse(sink, JoinError::NameTaken).await;
            return None;
        }

        let color = self.colors.assign(&name);
        let (spawn_x, spawn_y) = self.world.generate_spawn_position();
        let player = Player::new(&name, color, spawn_x, spawn_y);

        if let Err(e) = self.world.try_add_player(player) {
            // The existing holder of this name keeps its color
            self.refuse(sink, e.into()).await;
            return None;
        }

        let joined = ServerMsg::Joined {
            name: name.clone(),
            color: color.to_string(),
        };
        if let Err(e) = send_msg(sink, &joined).await {
            warn!(session_id = %self.id, player = %name, error = %e, "Failed to send join confirmation");
            self.vacate(&name);
            return None;
        }

        info!(session_id = %self.id, player = %name, color, "Player joined");
        Some(name)
    }

    async fn refuse<K>(&self, sink: &mut K, reason: JoinError)
    where
        K: Sink<Message> + Unpin,
        K::Error: Display,
    {
        info!(session_id = %self.id, reason = %reason, "Join refused");
        if let Err(e) = send_msg(sink, &ServerMsg::error(reason.to_string())).await {
            debug!(session_id = %self.id, error = %e, "Failed to send join error");
        }
    }

    async fn receive_loop<S, E>(&self, name: &str, stream: &mut S) -> CloseKind
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if !self.rate_limiter.check_input() {
                        debug!(session_id = %self.id, player = %name, "Rate limited input message");
                        continue;
                    }
                    self.handle_text(name, &text);
                }
                Ok(Message::Binary(_)) => {
                    info!(session_id = %self.id, player = %name, "Received binary message, ignoring");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => return CloseKind::Clean,
                Err(e) => return CloseKind::Abnormal(e.to_string()),
            }
        }
        CloseKind::Clean
    }

    /// Apply one in-session text frame to the world
    fn handle_text(&self, name: &str, text: &str) {
        match ClientMsg::decode(text) {
            Ok(ClientMsg::Position(position)) => {
                self.world.update_position(name, &position);
            }
            Ok(ClientMsg::Fire(fire)) => {
                if let Some(id) = self
                    .world
                    .add_projectile(name, fire.x, fire.y, fire.direction)
                {
                    debug!(player = %name, projectile = %id, x = fire.x, y = fire.y, "Fired");
                }
            }
            Ok(ClientMsg::Join(_)) => {
                info!(session_id = %self.id, player = %name, "Ignoring join from active session");
            }
            Err(DecodeError::UnknownType(kind)) => {
                info!(session_id = %self.id, player = %name, kind = %kind, "Unknown message type");
            }
            Err(e) => {
                debug!(session_id = %self.id, player = %name, error = %e, "Dropping malformed message");
            }
        }
    }

    /// Flag, unregister, vacate, then tell everyone
    fn terminate(&mut self, name: &str) {
        self.world.mark_disconnected(name);
        self.broadcaster.unregister(name);
        self.vacate(name);
        self.broadcaster.publish(self.world.snapshot());
        self.transition(SessionState::Terminated);
    }

    /// Give back the color, then the name. While the name is still in the
    /// world no rejoin under it can reach the pool, so a rejoin never
    /// inherits a color that is about to be released.
    fn vacate(&self, name: &str) {
        self.colors.release(name);
        self.world.remove_player(name);
    }
}

fn parse_join(text: &str) -> Result<JoinPayload, JoinError> {
    let join = match ClientMsg::decode(text) {
        Ok(ClientMsg::Join(join)) => join,
        Ok(_) | Err(DecodeError::UnknownType(_)) | Err(DecodeError::Envelope(_)) => {
            return Err(JoinError::NotAJoin)
        }
        Err(DecodeError::Payload { kind, .. }) if kind == MSG_JOIN => {
            return Err(JoinError::InvalidPayload)
        }
        Err(DecodeError::Payload { .. }) => return Err(JoinError::NotAJoin),
    };
    validate_name(&join.name)?;
    Ok(join)
}

/// Forward broadcast frames to the transport until the queue closes or a
/// write fails. Dropping the receiver is what the broadcaster sees as a
/// disconnect.
async fn write_loop<K>(session_id: Uuid, mut sink: K, mut outbound: mpsc::Receiver<Frame>)
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
            debug!(session_id = %session_id, error = %e, "WebSocket send failed");
            return;
        }
    }
    let _ = sink.close().await;
}

/// Send a message over the transport
async fn send_msg<K>(sink: &mut K, msg: &ServerMsg) -> Result<(), SendError>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| SendError::Transport(e.to_string()))
}
