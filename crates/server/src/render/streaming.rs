//! Server-sent events: one `row` event per processed row.

use std::sync::Arc;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use cmdgate_engine::{ParsedLayers, RowStream, StructuredCommand};
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Stream the rows of `command` as they are produced.
///
/// The producer runs on its own task behind a channel of `capacity` rows.
/// When the client disconnects the response stream is dropped, which drops the
/// [`RowStream`] and cancels the producer.
pub fn stream_rows(command: Arc<dyn StructuredCommand>, parameters: Arc<ParsedLayers>, capacity: usize, cancellation: &CancellationToken) -> Response {
    let rows = RowStream::spawn(command, parameters, capacity, cancellation);
    let events = stream::unfold(Some(rows), |state| async move {
        let mut rows = state?;
        match rows.next().await {
            Some(row) => Some((Event::default().event("row").json_data(&row), Some(rows))),
            None => match rows.finish().await {
                Ok(()) => {
                    debug!("row stream complete");
                    None
                }
                Err(error) => {
                    warn!("row stream failed: {error:#}");
                    Some((Ok(Event::default().event("error").data(format!("{error:#}"))), None))
                }
            },
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}
