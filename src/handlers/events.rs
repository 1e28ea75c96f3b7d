use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

/// Stream of revalidated route paths. Clients refetch a route when its
/// path arrives as a `revalidate` event.
/// GET /api/v1/events
pub async fn revalidation_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.revalidator.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(path) => {
                    let event = Event::default().event("revalidate").data(path);
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event stream lagged, skipped {} paths", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
