//! `GET /v1/matches/:id/stream`: the match feed as Server-Sent Events.
//!
//! Each connection registers a `ChannelSubscriber`; when the client goes
//! away the receiver is dropped and the broadcaster retires the
//! subscription on its next delivery.

use crate::api::{parse_match_id, AppState};
use crate::broadcast::{ChannelSubscriber, FeedMessage};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub async fn stream_match(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let match_id = parse_match_id(&id)?;
    let (subscriber, receiver) = ChannelSubscriber::new(state.stream_buffer);
    let subscription = state.registry.subscribe(match_id, Arc::new(subscriber))?;
    debug!(match_id = %match_id, subscriber_id = %subscription, "stream opened");

    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));

    let events = feed_to_sse(receiver);
    Ok((headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response())
}

fn feed_to_sse(
    receiver: mpsc::Receiver<Arc<FeedMessage>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            let message = receiver.recv().await?;
            match serde_json::to_string(message.as_ref()) {
                Ok(json) => {
                    let event = Event::default().event(message.kind()).data(json);
                    return Some((Ok(event), receiver));
                }
                Err(err) => {
                    warn!(match_id = %message.match_id(), error = %err, "feed message not serializable");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchId;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_ends_when_feed_closes() {
        let (tx, rx) = mpsc::channel(4);
        let state = crate::test_support::sample_state(MatchId::new());
        tx.send(Arc::new(FeedMessage::snapshot(&state))).await.unwrap();
        drop(tx);

        let items: Vec<_> = feed_to_sse(rx).collect().await;
        assert_eq!(items.len(), 1);
    }
}
