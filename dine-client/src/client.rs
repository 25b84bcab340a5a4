//! Reconnecting fan-out client
//!
//! One background task owns the socket. It reconnects forever with
//! [`ReconnectPolicy`] backoff, pings on a fixed cadence, publishes
//! [`ClientStatus`] on a `watch` channel and hands deduplicated events to
//! the application through [`FanoutClient::next_event`].
//!
//! Delivery is best effort: events published while disconnected are lost,
//! so applications re-fetch state after [`ClientStatus::connected`] flips
//! back to `true`.

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use shared::message::{ClientFrame, RecentIds, Room, RoomMessage, ServerFrame};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::heartbeat::{ConnectionHealth, LatencyWindow};

/// Event ids remembered for duplicate suppression
const RECENT_EVENT_IDS: usize = 1024;

/// Snapshot of the connection for UI
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientStatus {
    pub connected: bool,
    pub health: ConnectionHealth,
    /// Average RTT over the window
    pub rtt: Option<Duration>,
    /// Rooms confirmed by the server
    pub rooms: Vec<Room>,
    /// Successful connections so far
    pub connections: u32,
    /// Last connect / socket error
    pub last_error: Option<String>,
}

enum Command {
    Join(Room),
    Leave(Room),
}

/// How a connection ended
enum Disconnect {
    /// Socket closed or errored: reconnect
    Lost(String),
    /// Shutdown requested or the application dropped its receiver
    Stop,
}

pub struct FanoutClient {
    events: mpsc::Receiver<RoomMessage>,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ClientStatus>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl FanoutClient {
    /// Start the background connection task
    pub fn spawn(config: ClientConfig) -> Self {
        let (event_tx, events) = mpsc::channel(config.event_buffer.max(1));
        let (commands, command_rx) = mpsc::channel(16);
        let (status_tx, status) = watch::channel(ClientStatus::default());
        let shutdown = CancellationToken::new();

        let worker = Worker {
            rooms: config.rooms.clone(),
            window: config.latency_window(),
            config,
            events: event_tx,
            commands: command_rx,
            status: status_tx,
            shutdown: shutdown.clone(),
            seen: RecentIds::new(RECENT_EVENT_IDS),
            next_nonce: 0,
        };
        let handle = tokio::spawn(worker.run());

        Self {
            events,
            commands,
            status,
            shutdown,
            handle,
        }
    }

    /// Next event, `None` once the client stopped
    pub async fn next_event(&mut self) -> Option<RoomMessage> {
        self.events.recv().await
    }

    /// Status channel; `changed().await` to follow it
    pub fn status(&self) -> watch::Receiver<ClientStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> ClientStatus {
        self.status.borrow().clone()
    }

    /// Wait until connected (or the client stops)
    pub async fn wait_connected(&self) -> ClientResult<()> {
        let mut status = self.status.clone();
        status
            .wait_for(|s| s.connected)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::Stopped)
    }

    /// Join a room; remembered across reconnects
    pub async fn join(&self, room: Room) -> ClientResult<()> {
        self.commands
            .send(Command::Join(room))
            .await
            .map_err(|_| ClientError::Stopped)
    }

    pub async fn leave(&self, room: Room) -> ClientResult<()> {
        self.commands
            .send(Command::Leave(room))
            .await
            .map_err(|_| ClientError::Stopped)
    }

    /// Close the socket and stop reconnecting
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = ?e, "Fan-out client task ended abnormally");
        }
    }
}

struct Worker {
    config: ClientConfig,
    /// Current room selection, `None` = role defaults
    rooms: Option<Vec<Room>>,
    window: LatencyWindow,
    events: mpsc::Sender<RoomMessage>,
    commands: mpsc::Receiver<Command>,
    status: watch::Sender<ClientStatus>,
    shutdown: CancellationToken,
    seen: RecentIds,
    next_nonce: u64,
}

impl Worker {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let url = self.config.socket_url(self.rooms.as_deref());
            let connect = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = connect_async(url.as_str()) => result,
            };

            match connect {
                Ok((socket, _)) => {
                    attempt = 0;
                    self.window.reset();
                    match self.drive(socket).await {
                        Disconnect::Stop => break,
                        Disconnect::Lost(reason) => {
                            tracing::warn!(reason = %reason, "Fan-out connection lost");
                            self.set_disconnected(Some(reason));
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(url = %url, attempt, error = %e, "Fan-out connect failed");
                    self.set_disconnected(Some(e.to_string()));
                }
            }

            let delay = self.config.reconnect.delay(attempt);
            attempt = attempt.saturating_add(1);
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_disconnected(None);
        tracing::debug!("Fan-out client stopped");
    }

    fn set_disconnected(&self, error: Option<String>) {
        self.status.send_modify(|s| {
            s.connected = false;
            s.rooms.clear();
            s.rtt = None;
            if error.is_some() {
                s.last_error = error;
            }
        });
    }

    fn publish_health(&self) {
        let health = self.window.health();
        let rtt = self.window.average();
        self.status.send_if_modified(|s| {
            let changed = s.health != health || s.rtt != rtt;
            s.health = health;
            s.rtt = rtt;
            changed
        });
    }

    async fn drive<S>(&mut self, socket: S) -> Disconnect
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        let (mut sink, mut stream) = socket.split();
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick fires immediately
        ticker.tick().await;
        let mut pending_ping: Option<(u64, Instant)> = None;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Disconnect::Stop;
                }
                _ = ticker.tick() => {
                    if pending_ping.is_some() {
                        self.window.record_miss();
                        self.publish_health();
                    }
                    self.next_nonce += 1;
                    let nonce = self.next_nonce;
                    if let Err(e) = send_frame(&mut sink, &ClientFrame::Ping { nonce }).await {
                        return Disconnect::Lost(e.to_string());
                    }
                    pending_ping = Some((nonce, Instant::now()));
                }
                command = self.commands.recv() => {
                    let frame = match command {
                        Some(Command::Join(room)) => {
                            let rooms = self.rooms.get_or_insert_with(|| self.config.role.default_rooms());
                            if !rooms.contains(&room) {
                                rooms.push(room);
                            }
                            ClientFrame::Join { room }
                        }
                        Some(Command::Leave(room)) => {
                            let rooms = self.rooms.get_or_insert_with(|| self.config.role.default_rooms());
                            rooms.retain(|r| *r != room);
                            ClientFrame::Leave { room }
                        }
                        // FanoutClient dropped
                        None => return Disconnect::Stop,
                    };
                    if let Err(e) = send_frame(&mut sink, &frame).await {
                        return Disconnect::Lost(e.to_string());
                    }
                }
                incoming = stream.next() => {
                    let text = match incoming {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => {
                            return Disconnect::Lost("closed by server".into());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Disconnect::Lost(e.to_string()),
                    };
                    let frame = match serde_json::from_str::<ServerFrame>(text.as_str()) {
                        Ok(f) => f,
                        Err(e) => {
                            tracing::warn!(error = %e, "Unreadable server frame");
                            continue;
                        }
                    };
                    if let Some(stop) = self.handle_frame(frame, &mut pending_ping).await {
                        return stop;
                    }
                }
            }
        }
    }

    async fn handle_frame(
        &mut self,
        frame: ServerFrame,
        pending_ping: &mut Option<(u64, Instant)>,
    ) -> Option<Disconnect> {
        match frame {
            ServerFrame::Welcome {
                connection_id,
                rooms,
                ..
            } => {
                tracing::info!(%connection_id, rooms = ?rooms, "Fan-out connected");
                self.status.send_modify(|s| {
                    s.connected = true;
                    s.rooms = rooms;
                    s.connections += 1;
                    s.health = ConnectionHealth::Healthy;
                });
            }
            ServerFrame::Pong { nonce } => {
                if let Some((expected, sent_at)) = *pending_ping
                    && expected == nonce
                {
                    self.window.record(sent_at.elapsed());
                    *pending_ping = None;
                    self.publish_health();
                }
            }
            ServerFrame::Rooms { rooms } => {
                self.status.send_modify(|s| s.rooms = rooms);
            }
            ServerFrame::Event(msg) => {
                if self.seen.insert(msg.event_id) && self.events.send(msg).await.is_err() {
                    return Some(Disconnect::Stop);
                }
            }
            ServerFrame::Error { code, message } => {
                let err = ClientError::Server { code, message };
                tracing::warn!(error = %err, "Server rejected a request");
                self.status.send_modify(|s| s.last_error = Some(err.to_string()));
            }
        }
        None
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ClientFrame) -> ClientResult<()>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(frame)?;
    sink.send(Message::text(json)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::ReconnectPolicy;
    use shared::message::Role;

    #[tokio::test]
    async fn test_unreachable_server_keeps_retrying() {
        // nothing listens on port 9 locally
        let config = ClientConfig::lan("ws://127.0.0.1:9", 1, Role::Kitchen).with_reconnect(
            ReconnectPolicy::new(Duration::from_millis(5), Duration::from_millis(20)),
        );
        let client = FanoutClient::spawn(config);
        let mut status = client.status();

        tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.last_error.is_some()))
            .await
            .unwrap()
            .unwrap();
        assert!(!client.current_status().connected);
        assert!(!client.handle.is_finished());

        client.shutdown().await;
    }
}
