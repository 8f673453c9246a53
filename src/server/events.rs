//! `/events`: server-sent event stream of a session's updates

use super::AppState;
use crate::broadcast::HubFrame;
use crate::error::ApiError;
use crate::protocol::ServerEvent;
use crate::types::ClientId;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Extension;
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error};

/// Open the caller's push channel. The first frame is always `connected`,
/// followed by the session's cached state (if any) and every later publish.
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.service.subscribe(client)?;
    debug!(
        client_id = %client,
        session_id = %subscription.session_id(),
        "Event stream opened"
    );

    let updates = subscription.map(|frame| match frame {
        HubFrame::Envelope(envelope) => ServerEvent::Update(envelope.as_ref().clone()),
        HubFrame::SessionClosed(session_id) => ServerEvent::SessionClosed { session_id },
    });
    let stream = tokio_stream::once(ServerEvent::Connected)
        .chain(updates)
        .map(|event| Ok(to_sse(&event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &ServerEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        error!(error = %e, "Failed to encode event");
        Event::default().comment("encoding error")
    })
}
