use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time::{interval, timeout, Duration},
};

use crate::{
    api::{sessions::validate_session_id, AppState},
    constants::{KEY_PIXEL_UPDATES, KEY_SELECTED_COLOR, WS_CLIENT_TIMEOUT_SECS, WS_HEARTBEAT_INTERVAL_SECS},
    error::{AppError, Result},
    models::{Color, PixelPatch},
    services::realtime::{SessionHandle, SharedKeyValueChannel, SyncMessage, SyncOp},
};

/// Write sent by a peer.
#[derive(Debug, Deserialize)]
pub struct ClientWrite {
    pub key: String,
    #[serde(default = "default_op")]
    pub op: SyncOp,
    pub value: Value,
}

fn default_op() -> SyncOp {
    SyncOp::Merge
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Connected { session_id: String, client_id: String },
    Sync(SyncMessage),
    Error { message: String },
}

impl ServerFrame {
    fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Apply one text frame from the peer to the session.
async fn handle_client_text(handle: &SessionHandle, text: &str) -> Result<()> {
    let write: ClientWrite = serde_json::from_str(text)
        .map_err(|e| AppError::BadRequest(format!("Malformed session write: {}", e)))?;
    validate_write(&write)?;
    handle.publish(&write.key, write.op, write.value).await
}

// Peers may only write the two shared keys, in their expected shapes.
fn validate_write(write: &ClientWrite) -> Result<()> {
    match write.key.as_str() {
        KEY_PIXEL_UPDATES => {
            if write.op != SyncOp::Merge {
                return Err(AppError::BadRequest("pixelUpdates only accepts merges".to_string()));
            }
            PixelPatch::try_from_value(&write.value)
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
        }
        KEY_SELECTED_COLOR => {
            let raw = write
                .value
                .as_str()
                .ok_or_else(|| AppError::BadRequest("selectedColor must be a string".to_string()))?;
            Color::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;
        }
        other => return Err(AppError::BadRequest(format!("Unknown session key: {}", other))),
    }
    Ok(())
}

/// WebSocket relay for one realtime session
pub async fn handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    validate_session_id(&session_id)?;
    let handle = state.hub.join(&session_id).await?;
    // subscribed before the upgrade so the session counts as live
    let rx = handle.subscribe();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, handle, rx, session_id)))
}

async fn handle_socket(
    socket: WebSocket,
    handle: SessionHandle,
    mut rx: broadcast::Receiver<SyncMessage>,
    session_id: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let client_id = handle.client_id().to_string();
    tracing::info!("Peer {} joined session {}", client_id, session_id);

    let connected = ServerFrame::Connected {
        session_id: session_id.clone(),
        client_id: client_id.clone(),
    };
    let mut greeting = vec![connected];
    greeting.extend(handle.session().snapshot().await.into_iter().map(ServerFrame::Sync));
    for frame in greeting {
        if sender.send(Message::Text(frame.to_text().into())).await.is_err() {
            return;
        }
    }

    let (error_tx, mut error_rx) = tokio::sync::mpsc::channel::<String>(8);
    let own_id = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECS));

        loop {
            let frame = tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    continue;
                }
                Some(message) = error_rx.recv() => ServerFrame::Error { message },
                result = rx.recv() => match result {
                    Ok(message) if message.origin == own_id => continue,
                    Ok(message) => ServerFrame::Sync(message),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Peer {} lagged by {} messages", own_id, skipped);
                        ServerFrame::Error { message: format!("lagged by {skipped} messages; rejoin to resync") }
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            if sender.send(Message::Text(frame.to_text().into())).await.is_err() {
                break;
            }
        }
    });

    let writer = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            let next_msg = timeout(Duration::from_secs(WS_CLIENT_TIMEOUT_SECS), receiver.next()).await;
            let msg = match next_msg {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(_))) | Ok(None) => break,
                Err(_) => {
                    tracing::info!("WebSocket client timeout");
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    if let Err(err) = handle_client_text(&writer, text.as_str()).await {
                        tracing::warn!("Rejected session write: {}", err);
                        let _ = error_tx.send(err.to_string()).await;
                    }
                }
                Message::Close(_) => {
                    tracing::debug!("Client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::info!("Peer {} left session {}", client_id, session_id);
}
