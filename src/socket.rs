// ABOUTME: WebSocket endpoint attaching each connected agent to the notification relay
// ABOUTME: Pushes incoming-call events; the subscription lives exactly as long as the socket

use agentline_core::{config::ServerConfig, metrics, IncomingCallEvent, NotificationRelay};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::server::AppState;

/// Events pushed from the server to the client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "incoming-call")]
    IncomingCall(IncomingCallEvent),
}

/// Liveness settings for real-time connections. A peer that sends nothing,
/// not even a pong, for `idle_timeout` is treated as gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketKeepalive {
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
}

impl SocketKeepalive {
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(server.ping_interval_secs),
            idle_timeout: Duration::from_secs(server.idle_timeout_secs),
        }
    }
}

impl Default for SocketKeepalive {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// WebSocket upgrade handler at /socket
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let relay = Arc::clone(&state.relay);
    let keepalive = state.keepalive;
    ws.on_upgrade(move |socket| handle_socket(socket, relay, keepalive))
}

fn event_frame(event: IncomingCallEvent) -> Option<Message> {
    match serde_json::to_string(&ServerMessage::IncomingCall(event)) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize event");
            None
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    relay: Arc<NotificationRelay>,
    keepalive: SocketKeepalive,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<IncomingCallEvent>(16);

    // Dropped when this function returns, whichever side closed first
    let subscription = relay.subscribe(tx);
    let connection = subscription.id();
    tracing::info!(connection = %connection, "Real-time client connected");

    // Writer task: relay events and pings -> client
    let mut writer_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval_at(
            Instant::now() + keepalive.ping_interval,
            keepalive.ping_interval,
        );
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => match event_frame(event) {
                        Some(frame) => frame,
                        None => continue,
                    },
                    None => break,
                },
                _ = ping.tick() => Message::Ping(Default::default()),
            };
            if let Err(e) = ws_sink.send(frame).await {
                tracing::warn!(connection = %connection, error = %e, "Push failed, closing connection");
                metrics::record_transport_error();
                break;
            }
        }
    });

    // Reader task: watches for close and liveness; client payloads carry no meaning
    let mut reader_task = tokio::spawn(async move {
        loop {
            let msg = match tokio::time::timeout(keepalive.idle_timeout, ws_stream.next()).await {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        connection = %connection,
                        idle_secs = keepalive.idle_timeout.as_secs_f64(),
                        "Client went silent, closing connection"
                    );
                    metrics::record_transport_error();
                    break;
                }
            };
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => {
                    tracing::debug!(connection = %connection, len = text.len(), "Ignoring client message");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(connection = %connection, error = %e, "Socket read error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer_task => reader_task.abort(),
        _ = &mut reader_task => writer_task.abort(),
    }

    drop(subscription);
    tracing::info!(connection = %connection, "Real-time client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_call_frame_shape() {
        let msg = ServerMessage::IncomingCall(IncomingCallEvent {
            caller: "+1234567890".to_string(),
            name: "John Doe".to_string(),
        });
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "incoming-call");
        assert_eq!(json["data"]["caller"], "+1234567890");
        assert_eq!(json["data"]["name"], "John Doe");
    }

    #[test]
    fn test_keepalive_defaults_ping_well_inside_idle_timeout() {
        let keepalive = SocketKeepalive::default();
        assert_eq!(keepalive.ping_interval, Duration::from_secs(20));
        assert_eq!(keepalive.idle_timeout, Duration::from_secs(60));
    }
}
