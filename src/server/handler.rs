//! Connection and message handling
//!
//! Request/response for operator, remote and status messages; a subscribe
//! turns the connection into a frame stream for a projector viewer.

use crate::control::ControlSurface;
use crate::protocol::{ClientMessage, OperatorAction, RemoteInput, ServerMessage};
use crate::slides::SlideListing;
use crate::transport::{AsyncConnection, SocketError};
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::ServerInner;

type ServerResult<T> = std::result::Result<T, SocketError>;

pub(super) async fn handle_connection(
    stream: UnixStream,
    inner: Arc<ServerInner>,
) -> ServerResult<()> {
    let mut conn = AsyncConnection::new(stream);

    while let Some(request) = conn.read_client_message().await? {
        tracing::debug!(?request, "received request");

        match request {
            ClientMessage::Subscribe { id } => return stream_frames(conn, id, &inner).await,
            request => {
                let response = process_message(request, &inner).await;
                conn.write_server_message(&response).await?;
            }
        }
    }

    Ok(())
}

/// Forward projector frames until the viewer goes away
async fn stream_frames(
    mut conn: AsyncConnection,
    id: Uuid,
    inner: &ServerInner,
) -> ServerResult<()> {
    let (current, mut frames) = inner.broadcast.subscribe();
    tracing::info!(viewers = inner.broadcast.viewer_count(), "projector viewer connected");

    conn.write_server_message(&ServerMessage::Subscribed { id })
        .await?;
    if let Some(line) = current {
        conn.write_raw(line.as_bytes()).await?;
    }

    loop {
        match frames.recv().await {
            Ok(line) => conn.write_raw(line.as_bytes()).await?,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "projector viewer fell behind, skipping frames");
            }
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}

async fn process_message(request: ClientMessage, inner: &ServerInner) -> ServerMessage {
    match request {
        ClientMessage::Operator { id, action } => operator_action(id, action, inner).await,

        ClientMessage::Remote { id, token } => {
            let input = RemoteInput::parse(&token);
            match input {
                Some(input) => {
                    if inner.remote_tx.send(input).is_err() {
                        tracing::warn!(token = input.token(), "remote channel closed, input dropped");
                    }
                }
                None => tracing::debug!(%token, "ignoring unknown remote token"),
            }
            ServerMessage::Accepted { id, input }
        }

        ClientMessage::Status { id } => {
            let status = inner.control.lock().await.status();
            ServerMessage::Status {
                id,
                status,
                uptime_seconds: inner.uptime_seconds(),
                started_at: inner.started_at.to_string(),
            }
        }

        ClientMessage::Subscribe { id } => {
            // Handled in handle_connection
            ServerMessage::new_error(id, "Subscribe should be handled at connection level")
        }
    }
}

async fn operator_action(id: Uuid, action: OperatorAction, inner: &ServerInner) -> ServerMessage {
    let query = match action {
        OperatorAction::Search { query } => query,
        action => {
            let mut control = inner.control.lock().await;
            return apply_operator(&mut control, id, action);
        }
    };

    let version = inner.control.lock().await.search_request(&query);
    let Some(version) = version else {
        let control = inner.control.lock().await;
        return ServerMessage::Results {
            id,
            items: Vec::new(),
            preview: control.preview().clone(),
        };
    };

    // Key and bible ids are read fresh so a saved settings panel applies to the next search
    let settings = inner.store.load();
    let outcome = inner
        .bible
        .search_verses(&settings, version, query.trim())
        .await;

    let mut control = inner.control.lock().await;
    let items = control.apply_search(version, outcome).items();
    ServerMessage::Results {
        id,
        items,
        preview: control.preview().clone(),
    }
}

/// Apply every operator action except search, which needs the network
fn apply_operator(control: &mut ControlSurface, id: Uuid, action: OperatorAction) -> ServerMessage {
    match action {
        OperatorAction::Slides => slides_message(control, id),
        OperatorAction::ReloadSlides => match control.reload_slides() {
            Ok(()) => slides_message(control, id),
            Err(e) => ServerMessage::new_error(id, format!("{:#}", e)),
        },
        OperatorAction::Select { index } => {
            control.select_slide(index);
            ack(control, id)
        }
        OperatorAction::Pick { index } => {
            if control.pick_result(index) {
                ack(control, id)
            } else {
                ServerMessage::new_error(id, format!("No search result #{}", index + 1))
            }
        }
        OperatorAction::Project => {
            control.project();
            ack(control, id)
        }
        OperatorAction::Next => {
            control.next();
            ack(control, id)
        }
        OperatorAction::Prev => {
            control.prev();
            ack(control, id)
        }
        OperatorAction::Black => {
            control.black();
            ack(control, id)
        }
        OperatorAction::Clear => {
            control.clear();
            ack(control, id)
        }
        OperatorAction::Lock => {
            control.toggle_lock();
            ack(control, id)
        }
        OperatorAction::CloseProjector => {
            control.close_display();
            ack(control, id)
        }
        OperatorAction::Search { .. } => {
            ServerMessage::new_error(id, "Search should be handled asynchronously")
        }
    }
}

fn ack(control: &ControlSurface, id: Uuid) -> ServerMessage {
    ServerMessage::Ack {
        id,
        preview: control.preview().clone(),
    }
}

fn slides_message(control: &ControlSurface, id: Uuid) -> ServerMessage {
    ServerMessage::Slides {
        id,
        folder_missing: matches!(control.listing(), SlideListing::Missing(_)),
        slides: control.slide_entries(),
        preview: control.preview().clone(),
    }
}
