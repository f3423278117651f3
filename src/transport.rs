//! WebSocket transport.
//!
//! Clients connect to `/ws?token=...`; the token is validated by the
//! injected [`AuthProvider`] and the connection is bound to that identity
//! for its lifetime. Events claiming another user id are rejected before
//! they reach a session. Each table is a room: room-wide events fan out to
//! every subscriber, targeted events only to their addressee.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use tokio::sync::broadcast;

use crate::error::SessionError;
use crate::events::{ClientEvent, ServerEvent};
use crate::session::{GameServer, Outbound, TableSession};
use crate::table::Table;

/// An identity established by token validation.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    /// Stable opaque identifier.
    pub user_id: String,
    /// Display name.
    pub username: String,
}

/// Token validation seam; JWT verification lives outside the core.
pub trait AuthProvider: Send + Sync {
    /// Resolves a bearer token to an identity, or `None` to reject.
    fn validate(&self, token: &str) -> Option<AuthedUser>;
}

/// Shared state for the transport routes.
#[derive(Clone)]
pub struct AppState {
    /// The table registry.
    pub server: Arc<GameServer>,
    /// Token validation.
    pub auth: Arc<dyn AuthProvider>,
}

/// Builds the transport router: `/ws` for game traffic, `/tables` for the
/// lobby listing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/tables", get(tables_handler))
        .with_state(state)
}

async fn tables_handler(State(state): State<AppState>) -> Json<Vec<Table>> {
    Json(state.server.tables())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let Some(token) = params.get("token") else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(identity) = state.auth.validate(token) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// The user id an event claims to act as, when it claims one.
fn event_user(event: &ClientEvent) -> Option<&str> {
    match event {
        ClientEvent::JoinTable { user_id, .. }
        | ClientEvent::LeaveTable { user_id, .. }
        | ClientEvent::RequestLeaveTable { user_id, .. }
        | ClientEvent::DrawCard { user_id, .. }
        | ClientEvent::DiscardCard { user_id, .. }
        | ClientEvent::Spread { user_id, .. }
        | ClientEvent::Hit { user_id, .. }
        | ClientEvent::Drop { user_id, .. } => Some(user_id),
        ClientEvent::RequestInitialGameState { .. } => None,
    }
}

async fn send_event(sink: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sink.send(Message::Text(json)).await.is_ok(),
        Err(err) => {
            warn!("failed to encode server event: {err}");
            true
        }
    }
}

/// Receives the next room message, or waits forever without a room.
async fn recv_room(room: &mut Option<broadcast::Receiver<Outbound>>) -> Option<Outbound> {
    match room {
        Some(rx) => match rx.recv().await {
            Ok(out) => Some(out),
            // A slow client skipped messages; the next full state
            // broadcast resynchronises it.
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("room subscriber lagged by {skipped}");
                None
            }
            Err(broadcast::error::RecvError::Closed) => futures::future::pending().await,
        },
        None => futures::future::pending().await,
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: AuthedUser) {
    let (mut sink, mut stream) = socket.split();
    let mut room: Option<broadcast::Receiver<Outbound>> = None;
    let mut current: Option<Arc<TableSession>> = None;

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!("socket error for {}: {err}", identity.user_id);
                        break;
                    }
                };

                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        let reply = ServerEvent::GameError {
                            message: format!("malformed event: {err}"),
                        };
                        if !send_event(&mut sink, &reply).await {
                            break;
                        }
                        continue;
                    }
                };

                // The connection may only act as its authenticated user.
                if event_user(&event).is_some_and(|id| id != identity.user_id) {
                    let reply = ServerEvent::GameError {
                        message: "event user does not match connection identity".to_string(),
                    };
                    if !send_event(&mut sink, &reply).await {
                        break;
                    }
                    continue;
                }

                let Some(session) = state.server.session(event.table_id()) else {
                    let reply = ServerEvent::GameError {
                        message: SessionError::TableNotFound.to_string(),
                    };
                    if !send_event(&mut sink, &reply).await {
                        break;
                    }
                    continue;
                };

                // Joining binds this socket to the table's room before the
                // join is processed, so its broadcasts are not missed.
                if matches!(event, ClientEvent::JoinTable { .. }) {
                    room = Some(session.subscribe());
                    current = Some(Arc::clone(&session));
                }

                match session.handle_event(event).await {
                    Ok(replies) => {
                        for reply in &replies {
                            if !send_event(&mut sink, reply).await {
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        let reply = ServerEvent::GameError {
                            message: err.to_string(),
                        };
                        if !send_event(&mut sink, &reply).await {
                            break;
                        }
                    }
                }
            }
            outbound = recv_room(&mut room) => {
                let Some(out) = outbound else { continue };
                let for_us = out
                    .target
                    .as_ref()
                    .is_none_or(|target| *target == identity.user_id);
                if for_us && !send_event(&mut sink, &out.event).await {
                    break;
                }
            }
        }
    }

    // A dropped socket is an immediate leave for its bound table.
    if let Some(session) = current {
        session.disconnect(&identity.user_id).await;
    }
}
