use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::daemon::{Event, EventSender, Intent};
use crate::pomodoro::session::SessionSnapshot;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Response {
        success: bool,
        message: Option<String>,
    },
    Snapshot(SessionSnapshot),
}

impl ServerFrame {
    fn response(success: bool, message: impl Into<String>) -> Self {
        ServerFrame::Response {
            success,
            message: Some(message.into()),
        }
    }
}

pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "control server listening");
    Ok(listener)
}

/// Accepts control connections until the listener fails.
pub async fn serve(
    listener: TcpListener,
    events: EventSender,
    updates: watch::Receiver<SessionSnapshot>,
) {
    while let Ok((stream, peer_addr)) = listener.accept().await {
        tracing::debug!(peer = %peer_addr, "new control connection");
        tokio::spawn(handle_connection(
            stream,
            peer_addr,
            events.clone(),
            updates.clone(),
        ));
    }
}

fn encode(frame: &ServerFrame) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode frame");
            None
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    events: EventSender,
    mut updates: watch::Receiver<SessionSnapshot>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(peer = %peer_addr, error = %e, "websocket handshake failed");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let initial = ServerFrame::Snapshot(updates.borrow_and_update().clone());
    if let Some(msg) = encode(&initial) {
        if ws_sender.send(msg).await.is_err() {
            return;
        }
    }

    loop {
        let outgoing = tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    // session is gone, daemon is shutting down
                    break;
                }
                ServerFrame::Snapshot(updates.borrow_and_update().clone())
            }
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<Intent>(&text) {
                    Ok(Intent::Snapshot) => ServerFrame::Snapshot(updates.borrow().clone()),
                    Ok(intent) => {
                        tracing::debug!(peer = %peer_addr, ?intent, "received intent");
                        if events.send(Event::Intent(intent)).is_err() {
                            break;
                        }
                        // applied later on the dispatcher; the outcome shows in the next snapshot
                        ServerFrame::response(true, "queued")
                    }
                    Err(e) => ServerFrame::response(false, format!("parse error: {e}")),
                },
                Some(Ok(Message::Ping(data))) => {
                    if ws_sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(peer = %peer_addr, error = %e, "websocket error");
                    break;
                }
            },
        };

        if let Some(msg) = encode(&outgoing) {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    }

    tracing::debug!(peer = %peer_addr, "control connection closed");
}
