//! WebSocket session lifecycle: admission, upgrade, and the two pumps.
//!
//! `Authenticating → Upgrading → Active → Unregistering → Closed`
//!
//! The reader forwards inbound text to the hub and owns unregistration. The
//! writer drains the outbound queue and pings on an interval. Whichever pump
//! stops first cancels the shared token so the other one follows.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use huddle_auth::{AuthError, Identity, bearer_token_from_header};
use huddle_core::{ConnectionId, RoomId};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::SessionError;
use crate::hub::{Hub, RoomMessage};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_REJECTIONS_TOTAL,
};
use crate::server::AppState;

/// Query parameters of `GET /ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Room to join, used verbatim.
    pub room: Option<String>,
    /// Credential fallback for clients that cannot set headers.
    pub token: Option<String>,
}

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Validating room and credential.
    Authenticating,
    /// Handing the request to the WebSocket upgrade.
    Upgrading,
    /// Registered and pumping frames.
    Active,
    /// Reader stopped, removal requested.
    Unregistering,
    /// Both pumps finished.
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authenticating => "authenticating",
            Self::Upgrading => "upgrading",
            Self::Active => "active",
            Self::Unregistering => "unregistering",
            Self::Closed => "closed",
        })
    }
}

/// Why the reader stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadEnd {
    /// The client sent a Close frame.
    ClientClosed,
    /// The stream ended without a Close frame.
    StreamEnded,
    /// The transport reported an error.
    ReadError,
    /// No frame arrived within the idle timeout.
    IdleTimeout,
    /// The writer stopped first.
    WriterGone,
    /// The hub is no longer accepting events.
    HubGone,
}

impl fmt::Display for ReadEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClientClosed => "client_closed",
            Self::StreamEnded => "stream_ended",
            Self::ReadError => "read_error",
            Self::IdleTimeout => "idle_timeout",
            Self::WriterGone => "writer_gone",
            Self::HubGone => "hub_gone",
        })
    }
}

/// `GET /ws?room=<room>[&token=<jwt>]`
///
/// Room and credential are checked before the upgrade is accepted, so a
/// rejected request never creates any hub state.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let (room, identity) = match admit(&state, &params, &headers).await {
        Ok(admitted) => admitted,
        Err(err) => {
            counter!(WS_REJECTIONS_TOTAL, "reason" => err.code()).increment(1);
            info!(code = err.code(), error = %err, "connection rejected");
            return err.into_response();
        }
    };

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            counter!(WS_REJECTIONS_TOTAL, "reason" => "not_upgrade").increment(1);
            debug!(error = %rejection, "request passed admission but is not an upgrade");
            return rejection.into_response();
        }
    };

    debug!(phase = %SessionPhase::Upgrading, room = %room, user_id = %identity.user_id);
    let hub = state.hub.clone();
    let config = state.config.clone();
    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| run_session(socket, hub, identity, room, config))
}

async fn admit(
    state: &AppState,
    params: &ConnectParams,
    headers: &HeaderMap,
) -> Result<(RoomId, Identity), SessionError> {
    debug!(phase = %SessionPhase::Authenticating);
    let room = params
        .room
        .as_deref()
        .filter(|r| !r.is_empty())
        .ok_or(SessionError::MissingRoom)?;
    let token = credential(headers, params.token.as_deref())?;
    let identity = state.authenticator.authenticate(token).await?;
    Ok((RoomId::from(room), identity))
}

/// Pick the bearer credential: the `Authorization` header if present,
/// otherwise the `token` query parameter.
///
/// A present but malformed header is an error even when a query token exists.
pub fn credential<'a>(
    headers: &'a HeaderMap,
    query_token: Option<&'a str>,
) -> Result<&'a str, AuthError> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
        return bearer_token_from_header(value);
    }
    query_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingCredential)
}

/// Drive an upgraded socket until either pump stops.
pub async fn run_session(
    socket: WebSocket,
    hub: Hub,
    identity: Identity,
    room: RoomId,
    config: Arc<ServerConfig>,
) {
    let id = ConnectionId::new();
    let span = info_span!("session", conn_id = %id, room = %room, user_id = %identity.user_id);
    drive(socket, hub, identity, room, id, &config)
        .instrument(span)
        .await;
}

async fn drive(
    socket: WebSocket,
    hub: Hub,
    identity: Identity,
    room: RoomId,
    id: ConnectionId,
    config: &ServerConfig,
) {
    let origin = Origin {
        conn_id: id.clone(),
        room: room.clone(),
        display_name: identity.display_name.clone(),
    };
    let (connection, outbound) =
        Connection::new(id.clone(), identity, room, config.send_queue_capacity);
    if hub.register(connection).await.is_err() {
        warn!("hub not running, dropping connection");
        return;
    }

    let started = Instant::now();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(phase = %SessionPhase::Active, "client connected");

    let (sink, stream) = socket.split();
    let cancel = CancellationToken::new();
    let writer = tokio::spawn(
        write_pump(sink, outbound, config.heartbeat_interval, cancel.clone()).in_current_span(),
    );

    let end = read_pump(stream, &hub, &origin, config.idle_timeout, &cancel).await;

    debug!(phase = %SessionPhase::Unregistering, reason = %end);
    let _ = hub.unregister(id).await;
    cancel.cancel();
    let _ = writer.await;

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    info!(phase = %SessionPhase::Closed, reason = %end, "client disconnected");
}

/// Sender-side tags attached to every inbound message.
struct Origin {
    conn_id: ConnectionId,
    room: RoomId,
    display_name: String,
}

impl Origin {
    fn message(&self, content: String) -> RoomMessage {
        RoomMessage {
            room: self.room.clone(),
            content,
            sender_name: self.display_name.clone(),
            sender: Some(self.conn_id.clone()),
        }
    }
}

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    hub: &Hub,
    origin: &Origin,
    idle: Option<Duration>,
    cancel: &CancellationToken,
) -> ReadEnd {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return ReadEnd::WriterGone,
            next = next_frame(&mut stream, idle) => next,
        };

        let frame = match next {
            Err(_) => return ReadEnd::IdleTimeout,
            Ok(None) => return ReadEnd::StreamEnded,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "read failed");
                return ReadEnd::ReadError;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match classify(frame) {
            Inbound::Text(content) => {
                if hub.broadcast(origin.message(content)).await.is_err() {
                    return ReadEnd::HubGone;
                }
            }
            Inbound::Ignore => {}
            Inbound::Close => return ReadEnd::ClientClosed,
        }
    }
}

async fn next_frame(
    stream: &mut SplitStream<WebSocket>,
    idle: Option<Duration>,
) -> Result<Option<Result<Message, axum::Error>>, tokio::time::error::Elapsed> {
    match idle {
        Some(limit) => tokio::time::timeout(limit, stream.next()).await,
        None => Ok(stream.next().await),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Text(String),
    Ignore,
    Close,
}

fn classify(frame: Message) -> Inbound {
    match frame {
        Message::Text(text) => Inbound::Text(text.to_string()),
        Message::Binary(data) => match std::str::from_utf8(&data) {
            Ok(text) => Inbound::Text(text.to_owned()),
            Err(_) => {
                debug!(len = data.len(), "dropping non-UTF-8 binary frame");
                Inbound::Ignore
            }
        },
        Message::Close(_) => Inbound::Close,
        // Pongs only matter for the idle timer, which any frame resets.
        Message::Ping(_) | Message::Pong(_) => Inbound::Ignore,
    }
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Utf8Bytes>,
    heartbeat: Duration,
    cancel: CancellationToken,
) {
    let mut ping = tokio::time::interval(heartbeat);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            msg = outbound.recv() => {
                let Some(text) = msg else {
                    debug!("outbound queue closed");
                    break;
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(error = %e, "write failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    debug!(error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    cancel.cancel();
    let _ = sink.close().await;
}
