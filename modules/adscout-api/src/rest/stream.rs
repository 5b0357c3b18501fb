use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tracing::info;

use adscout_pipeline::{EventBus, PipelineEvent, SubscriberId};

use crate::AppState;

/// Keepalive interval while no event is pending.
const KEEPALIVE: Duration = Duration::from_secs(30);

/// Unsubscribes when the stream is dropped, however the client went away.
struct StreamGuard {
    bus: Arc<EventBus>,
    keyword: String,
    id: SubscriberId,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let bus = self.bus.clone();
        let keyword = std::mem::take(&mut self.keyword);
        let id = self.id;
        tokio::spawn(async move {
            bus.unsubscribe(&keyword, id).await;
            info!(keyword = keyword.as_str(), subscriber_id = %id, "SSE stream closed");
        });
    }
}

/// Live event stream for a keyword: a connection ack, then pipeline events
/// (with a state_sync first for late joiners), until the run reaches a
/// terminal state or the client disconnects. Disconnecting only drops the
/// subscription — the underlying run is unaffected.
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
    Path(keyword): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let bus = state.runner.bus().clone();
    let (id, mut rx) = bus.subscribe(&keyword).await;
    info!(keyword = keyword.as_str(), subscriber_id = %id, "SSE stream connected");

    let guard = StreamGuard {
        bus,
        keyword: keyword.clone(),
        id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;

        yield Ok(Event::default().event("connected").data(
            serde_json::json!({ "keyword": keyword, "subscriber_id": id }).to_string(),
        ));

        while let Some(envelope) = rx.recv().await {
            let kind = envelope.event.kind();
            let ended = match &envelope.event {
                event if event.is_terminal() => true,
                // A late joiner on an already-finished run gets the sync and
                // the stream ends.
                PipelineEvent::StateSync { state } => {
                    state.status != adscout_pipeline::StreamStatus::Running
                }
                _ => false,
            };

            let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
            yield Ok(Event::default().event(kind).data(data));

            if ended {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEPALIVE).text("ping"))
}
