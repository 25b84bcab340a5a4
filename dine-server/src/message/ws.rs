//! WebSocket bridge between [`RoomHub`] and display clients.
//!
//! `GET /ws?restaurant_id=1&role=kitchen&rooms=kitchen` upgrades the
//! connection, joins the requested rooms (all rooms the role may join when
//! `rooms` is omitted) and streams [`ServerFrame::Event`] frames. Clients
//! send JSON `ping` frames and get `pong` back with the same nonce.
//!
//! Membership lives exactly as long as the connection: each joined room has
//! a forwarding task that is aborted when the socket goes away.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use shared::error::ErrorCode;
use shared::message::{
    ClientFrame, PROTOCOL_VERSION, RecentIds, Role, Room, RoomMessage, ServerFrame,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::RoomHub;
use crate::core::ServerState;
use crate::utils::AppError;

/// Buffer between room forwarders and the socket writer
const FORWARD_BUFFER: usize = 64;

/// Event ids remembered per connection for duplicate suppression
const RECENT_EVENT_IDS: usize = 512;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub restaurant_id: i64,
    pub role: Role,
    /// Comma separated room list
    #[serde(default)]
    pub rooms: Option<String>,
}

/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<ServerState>,
) -> Result<Response, AppError> {
    let rooms = parse_rooms(params.role, params.rooms.as_deref())?;
    let hub = state.hub.clone();
    Ok(ws
        .on_upgrade(move |socket| {
            handle_socket(socket, hub, params.restaurant_id, params.role, rooms)
        })
        .into_response())
}

/// Resolve the requested rooms against what the role may join
pub fn parse_rooms(role: Role, requested: Option<&str>) -> Result<Vec<Room>, AppError> {
    let requested = requested.map(str::trim).filter(|s| !s.is_empty());
    let Some(list) = requested else {
        return Ok(role.default_rooms());
    };

    let mut rooms = Vec::new();
    for part in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let room: Room = part
            .parse()
            .map_err(|e: String| AppError::with_message(ErrorCode::InvalidRequest, e))?;
        if !role.can_join(room) {
            return Err(AppError::new(ErrorCode::RoomNotAllowed).with_detail("room", room.as_str()));
        }
        if !rooms.contains(&room) {
            rooms.push(room);
        }
    }
    Ok(rooms)
}

/// One socket's room membership
struct Connection {
    id: Uuid,
    restaurant_id: i64,
    role: Role,
    hub: Arc<RoomHub>,
    tx: mpsc::Sender<RoomMessage>,
    forwarders: HashMap<Room, JoinHandle<()>>,
}

impl Connection {
    fn join(&mut self, room: Room) -> Result<(), AppError> {
        if !self.role.can_join(room) {
            return Err(AppError::new(ErrorCode::RoomNotAllowed).with_detail("room", room.as_str()));
        }
        if !self.forwarders.contains_key(&room) {
            let rx = self.hub.subscribe(self.restaurant_id, room);
            let handle = spawn_forwarder(rx, self.tx.clone(), self.id, room);
            self.forwarders.insert(room, handle);
        }
        Ok(())
    }

    fn leave(&mut self, room: Room) {
        if let Some(handle) = self.forwarders.remove(&room) {
            handle.abort();
        }
    }

    fn rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.forwarders.keys().copied().collect();
        rooms.sort();
        rooms
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
    }
}

fn spawn_forwarder(
    mut rx: broadcast::Receiver<RoomMessage>,
    tx: mpsc::Sender<RoomMessage>,
    connection_id: Uuid,
    room: Room,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(%connection_id, room = %room, skipped = n, "Client lagged, skipping ahead");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> bool {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            tracing::warn!("Failed to serialize server frame: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

fn error_frame(err: &AppError) -> ServerFrame {
    ServerFrame::Error {
        code: err.code.code(),
        message: err.message.clone(),
    }
}

/// Reply to one client frame; `false` once the socket is gone
async fn handle_client_frame(socket: &mut WebSocket, conn: &mut Connection, text: &str) -> bool {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(f) => f,
        Err(e) => {
            let err = AppError::with_message(ErrorCode::InvalidFormat, e.to_string());
            return send_frame(socket, &error_frame(&err)).await;
        }
    };

    match frame {
        ClientFrame::Ping { nonce } => send_frame(socket, &ServerFrame::Pong { nonce }).await,
        ClientFrame::Join { room } => match conn.join(room) {
            Ok(()) => send_frame(socket, &ServerFrame::Rooms { rooms: conn.rooms() }).await,
            Err(err) => send_frame(socket, &error_frame(&err)).await,
        },
        ClientFrame::Leave { room } => {
            conn.leave(room);
            send_frame(socket, &ServerFrame::Rooms { rooms: conn.rooms() }).await
        }
    }
}

async fn handle_socket(
    mut socket: WebSocket,
    hub: Arc<RoomHub>,
    restaurant_id: i64,
    role: Role,
    rooms: Vec<Room>,
) {
    let (tx, mut rx) = mpsc::channel(FORWARD_BUFFER);
    let mut conn = Connection {
        id: Uuid::new_v4(),
        restaurant_id,
        role,
        hub,
        tx,
        forwarders: HashMap::new(),
    };
    for room in rooms {
        // parse_rooms already checked the role
        let _ = conn.join(room);
    }
    let mut seen = RecentIds::new(RECENT_EVENT_IDS);

    tracing::info!(
        connection_id = %conn.id,
        restaurant_id,
        role = ?role,
        rooms = ?conn.rooms(),
        "WebSocket client connected"
    );

    let welcome = ServerFrame::Welcome {
        connection_id: conn.id,
        protocol_version: PROTOCOL_VERSION,
        rooms: conn.rooms(),
    };
    if !send_frame(&mut socket, &welcome).await {
        return;
    }

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                if !seen.insert(msg.event_id) {
                    continue;
                }
                if !send_frame(&mut socket, &ServerFrame::Event(msg)).await {
                    tracing::debug!(connection_id = %conn.id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_client_frame(&mut socket, &mut conn, text.as_str()).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %conn.id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!(connection_id = %conn.id, restaurant_id, "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rooms_defaults_to_role() {
        assert_eq!(parse_rooms(Role::Kitchen, None).unwrap(), vec![Room::Kitchen]);
        assert_eq!(parse_rooms(Role::Admin, Some("  ")).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_rooms_checks_role() {
        let rooms = parse_rooms(Role::Admin, Some("kitchen, service,kitchen")).unwrap();
        assert_eq!(rooms, vec![Room::Kitchen, Room::Service]);

        let err = parse_rooms(Role::Kitchen, Some("admin")).unwrap_err();
        assert_eq!(err.code, ErrorCode::RoomNotAllowed);

        let err = parse_rooms(Role::Admin, Some("bar")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_connection_drop_ends_membership() {
        let hub = Arc::new(RoomHub::new(8));
        let (tx, _rx) = mpsc::channel(8);
        let mut conn = Connection {
            id: Uuid::new_v4(),
            restaurant_id: 1,
            role: Role::Admin,
            hub: hub.clone(),
            tx,
            forwarders: HashMap::new(),
        };
        conn.join(Room::Kitchen).unwrap();
        conn.join(Room::Admin).unwrap();
        assert_eq!(conn.rooms(), vec![Room::Kitchen, Room::Admin]);
        assert_eq!(hub.member_count(1, Room::Kitchen), 1);

        conn.leave(Room::Kitchen);
        drop(conn);
        // aborted forwarders release their receivers once the runtime drops them
        for _ in 0..100 {
            if hub.member_count(1, Room::Kitchen) == 0 && hub.member_count(1, Room::Admin) == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(hub.member_count(1, Room::Kitchen), 0);
        assert_eq!(hub.member_count(1, Room::Admin), 0);
    }
}
