//! WebSocket transport
//!
//! One task reads client frames and dispatches them in arrival order; a
//! second task drains the session's outbound queue into the socket. The
//! connection is accepted before identity resolution finishes, and ends
//! when either side stops.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};

use clickrank_core::ClientEvent;
use clickrank_identity::IdentityVerifier;
use clickrank_runtime::{Connection, Runtime, Session};
use clickrank_store::ScoreStore;

use crate::AppState;

/// Credential from the handshake: `token` query parameter, else a bearer
/// `Authorization` header.
pub fn handshake_credential(query: &HashMap<String, String>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query.get("token").filter(|t| !t.is_empty()) {
        return Some(token.clone());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// GET /ws
pub async fn upgrade<V: IdentityVerifier, S: ScoreStore>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<V, S>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let credential = handshake_credential(&query, &headers);
    let runtime = Arc::clone(&state.runtime);
    ws.on_upgrade(move |socket| serve_socket(socket, runtime, credential))
}

async fn serve_socket<V: IdentityVerifier, S: ScoreStore>(
    socket: WebSocket,
    runtime: Arc<Runtime<V, S>>,
    credential: Option<String>,
) {
    let (sink, stream) = socket.split();
    run_connection(runtime, credential, sink, stream).await;
}

/// Drive one connection over any frame sink and stream.
///
/// Returns once the client closes, the stream fails, or the outbound side
/// stops (socket write failure or the session was dropped as too slow). The
/// session is disconnected before returning.
pub async fn run_connection<V, S, W, R, E>(
    runtime: Arc<Runtime<V, S>>,
    credential: Option<String>,
    mut sink: W,
    mut stream: R,
) where
    V: IdentityVerifier,
    S: ScoreStore,
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let Connection {
        session,
        mut events,
        resolution: _,
    } = runtime.connect(credential);
    let id = session.id();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match event.encode() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(connection = %id, error = %e, "failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text(&runtime, &session, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection = %id, error = %e, "socket error");
                    break;
                }
            },
            _ = &mut writer => {
                tracing::debug!(connection = %id, "outbound side closed");
                break;
            }
        }
    }

    runtime.disconnect(id);
    writer.abort();
}

/// Decode and dispatch one text frame. Malformed frames are logged and
/// ignored; they never close the connection.
pub async fn handle_text<V: IdentityVerifier, S: ScoreStore>(
    runtime: &Runtime<V, S>,
    session: &Session,
    text: &str,
) {
    match ClientEvent::decode(text) {
        Ok(event) => runtime.dispatch(session, event).await,
        Err(e) => tracing::debug!(connection = %session.id(), error = %e, "ignoring frame"),
    }
}
