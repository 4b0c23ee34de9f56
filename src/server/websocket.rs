/// WebSocket handler for live dashboard snapshots

use axum::{
    extract::{State, WebSocketUpgrade},
    extract::ws::{Message, WebSocket},
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::routes::AppState;

/// Client text message that forces an immediate snapshot
const REFRESH_MESSAGE: &str = "refresh";

/// What the socket loop should do with one inbound frame
#[derive(Debug, PartialEq)]
enum ClientEvent {
    Close,
    Ping(Vec<u8>),
    Refresh,
    Ignore,
}

impl ClientEvent {
    fn from_frame(frame: Option<Result<Message, axum::Error>>) -> Self {
        match frame {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => ClientEvent::Close,
            Some(Ok(Message::Ping(data))) => ClientEvent::Ping(data),
            Some(Ok(Message::Text(text))) if text.trim() == REFRESH_MESSAGE => ClientEvent::Refresh,
            Some(Ok(_)) => ClientEvent::Ignore,
        }
    }
}

pub async fn ws_snapshot_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_snapshot_websocket(socket, state))
}

async fn handle_snapshot_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (refresh_tx, refresh_rx) = mpsc::channel(1);
    let mut snapshots = state.controller.subscribe(refresh_rx);

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => {
                let Some(snapshot) = snapshot else { break };
                match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to encode snapshot"),
                }
            }

            frame = receiver.next() => {
                match ClientEvent::from_frame(frame) {
                    ClientEvent::Close => break,
                    ClientEvent::Ping(data) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    ClientEvent::Refresh => {
                        // A pending refresh already covers this one
                        let _ = refresh_tx.try_send(());
                    }
                    ClientEvent::Ignore => {}
                }
            }
        }
    }

    debug!("snapshot websocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<Result<Message, axum::Error>> {
        Some(Ok(Message::Text(s.to_string())))
    }

    #[test]
    fn test_refresh_message_is_recognised() {
        assert_eq!(ClientEvent::from_frame(text("refresh")), ClientEvent::Refresh);
        assert_eq!(ClientEvent::from_frame(text(" refresh\n")), ClientEvent::Refresh);
        assert_eq!(ClientEvent::from_frame(text("reload")), ClientEvent::Ignore);
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(ClientEvent::from_frame(None), ClientEvent::Close);
        assert_eq!(ClientEvent::from_frame(Some(Ok(Message::Close(None)))), ClientEvent::Close);
        assert_eq!(
            ClientEvent::from_frame(Some(Ok(Message::Ping(vec![1, 2])))),
            ClientEvent::Ping(vec![1, 2])
        );
        assert_eq!(
            ClientEvent::from_frame(Some(Ok(Message::Binary(vec![0])))),
            ClientEvent::Ignore
        );
    }
}
