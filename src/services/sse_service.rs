use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the events of one session.
///
/// The handshake is returned separately so it reaches only the new subscriber.
pub async fn subscribe_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, ServerEvent), ServiceError> {
    let runtime = state.lock_session(session_id).await?;
    // Subscribe under the session lock so no state change slips between handshake and stream.
    let receiver = state.sse().subscribe();
    let handshake = ServerEvent::json(
        session_id,
        Some(EVENT_HANDSHAKE.to_string()),
        &Handshake {
            session_id,
            state: runtime.state().into(),
            message: "session stream connected".into(),
        },
    )
    .map_err(|err| ServiceError::InvalidState(format!("failed to encode handshake: {err}")))?;
    Ok((receiver, handshake))
}

/// Convert a broadcast receiver into an SSE response, forwarding only the
/// events of `session_id` until the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    session_id: Uuid,
    handshake: ServerEvent,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if tx.send(Ok(to_event(handshake))).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) if payload.session_id == session_id => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => continue,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(%session_id, skipped, "session SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(%session_id, "session SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}
