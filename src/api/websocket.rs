//! WebSocket handler for the collaborative session channel.
//!
//! Each frame carries the whole document. On connect the participant gets
//! the stored content of its file, then every snapshot its peers send.
//! A frame is saved and fanned out under the session's lock, so the stored
//! document always equals the last snapshot the peers were sent.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

use super::handlers::AppState;
use crate::error::CollabError;
use crate::session::{Inbox, ParticipantHandle};

/// Time the writer gets to flush its close frame after the participant leaves.
const WRITER_GRACE: Duration = Duration::from_secs(1);

/// `/ws/{project_id}`: the default file of the project.
pub async fn ws_project_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    upgrade(ws, state, project_id, None)
}

/// `/ws/{project_id}/{file}`.
pub async fn ws_file_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((project_id, file)): Path<(String, String)>,
) -> impl IntoResponse {
    upgrade(ws, state, project_id, Some(file))
}

fn upgrade(
    ws: WebSocketUpgrade,
    state: AppState,
    project_id: String,
    file: Option<String>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(|err: axum::Error| {
        warn!(error = %CollabError::ConnectionRejected(err.to_string()), "handshake failed");
    })
    .on_upgrade(move |socket| handle_socket(socket, state, project_id, file))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    project_id: String,
    file: Option<String>,
) {
    let key = state
        .key_mode
        .key_for(&project_id, file.as_deref(), &state.default_file);
    // Edits land in the named file even when the session spans the project.
    let document = file.unwrap_or_else(|| state.default_file.clone());

    let (handle, inbox) = match state.registry.connect(key) {
        Ok(joined) => joined,
        Err(e) => {
            warn!(project = %project_id, error = %e, "failed to join session");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    match state.store.load_document(&project_id, &document) {
        Ok(content) => {
            if sink.send(Message::Text(content.into())).await.is_err() {
                leave(&state, &handle);
                return;
            }
        }
        Err(e) => debug!(key = %handle.key(), error = %e, "no initial content"),
    }

    let mut writer = tokio::spawn(forward(inbox, sink));
    let mut writer_done = false;

    loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(
                            participant = %handle.id(),
                            error = %CollabError::ConnectionLost(e.to_string()),
                            "transport error"
                        );
                        break;
                    }
                };

                let relayed = state.registry.send_with(&handle, text.as_str(), |content| {
                    persist(&state, &project_id, &document, content)
                });
                if let Err(e) = relayed {
                    debug!(participant = %handle.id(), error = %e, "relay stopped");
                    break;
                }
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    // Closing the outbox lets the writer send a close frame and finish.
    leave(&state, &handle);
    if !writer_done && tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
}

/// Drain the participant's outbox into its socket.
async fn forward(mut inbox: Inbox, mut sink: SplitSink<WebSocket, Message>) {
    while let Some(content) = inbox.recv().await {
        if sink.send(Message::Text(content.to_string().into())).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

fn persist(state: &AppState, project_id: &str, document: &str, content: &str) {
    match state.store.save_document(project_id, document, content) {
        Ok(()) | Err(CollabError::ProjectNotFound(_)) => {}
        Err(e) => warn!(project = %project_id, file = %document, error = %e, "failed to persist"),
    }
}

fn leave(state: &AppState, handle: &ParticipantHandle) {
    if let Err(e) = state.registry.disconnect(handle) {
        warn!(participant = %handle.id(), error = %e, "disconnect failed");
    }
}
