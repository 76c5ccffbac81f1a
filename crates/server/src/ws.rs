//! WebSocket endpoint: one reader task per connection, writes drained
//! through the connection's outbox by a dedicated writer task.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use openclaw_protocol::ClientMessage;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::gateway::SharedGateway;

/// `GET /ws` upgrade handler.
pub async fn ws_route(State(gateway): State<SharedGateway>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(socket, gateway))
}

async fn handle_socket(socket: WebSocket, gateway: SharedGateway) {
    let (mut sink, mut stream) = socket.split();
    let (sender, mut outbox) = mpsc::unbounded_channel::<Message>();
    let connection_id = gateway.register_connection(sender);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(next) = stream.next().await {
        let message = match next {
            Ok(message) => message,
            Err(error) => {
                debug!(connection_id, %error, "websocket read failed");
                break;
            }
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_message) => gateway.handle_message(connection_id, client_message),
                // Malformed or unknown frames are skipped, not fatal.
                Err(error) => trace!(connection_id, %error, "ignoring undecodable frame"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    gateway.unregister_connection(connection_id);
    writer.abort();
    debug!(connection_id, "websocket closed");
}
