//! EventBus behavior: ordering, late-join sync, eviction, snapshot lifecycle.

use chrono::Utc;
use uuid::Uuid;

use adscout_pipeline::{Envelope, EventBus, PipelineEvent, StreamStatus};

fn envelope(event: PipelineEvent) -> Envelope {
    Envelope {
        event,
        correlation_id: Some(Uuid::new_v4()),
        timestamp: Utc::now(),
    }
}

fn start_event() -> PipelineEvent {
    PipelineEvent::PipelineStart {
        config: serde_json::json!({"keyword": "demo"}),
        message: "Starting pipeline for keyword: demo".to_string(),
    }
}

fn log_event(message: &str) -> PipelineEvent {
    PipelineEvent::Log {
        level: "info".to_string(),
        message: message.to_string(),
    }
}

#[tokio::test]
async fn events_arrive_in_publish_order() {
    let bus = EventBus::new();
    let (_id, mut rx) = bus.subscribe("demo").await;

    bus.publish("demo", envelope(start_event())).await;
    bus.publish("demo", envelope(log_event("first"))).await;
    bus.publish("demo", envelope(log_event("second"))).await;

    assert_eq!(rx.recv().await.unwrap().event.kind(), "pipeline_start");
    match rx.recv().await.unwrap().event {
        PipelineEvent::Log { message, .. } => assert_eq!(message, "first"),
        other => panic!("unexpected event {other:?}"),
    }
    match rx.recv().await.unwrap().event {
        PipelineEvent::Log { message, .. } => assert_eq!(message, "second"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn late_subscriber_receives_state_sync_before_live_events() {
    let bus = EventBus::new();

    bus.publish("demo", envelope(start_event())).await;
    bus.publish(
        "demo",
        envelope(PipelineEvent::StepStart {
            step: 1,
            step_name: "Facebook Ad Scraping".to_string(),
            details: "scrape".to_string(),
            message: "Step 1 started".to_string(),
        }),
    )
    .await;

    let (_id, mut rx) = bus.subscribe("demo").await;
    bus.publish("demo", envelope(log_event("live"))).await;

    let first = rx.recv().await.unwrap();
    match first.event {
        PipelineEvent::StateSync { state } => {
            assert_eq!(state.status, StreamStatus::Running);
            assert_eq!(state.current_step, 1);
            assert_eq!(state.events.len(), 2, "history holds start + step_start");
            assert_eq!(state.events[0].event.kind(), "pipeline_start");
        }
        other => panic!("expected state_sync first, got {other:?}"),
    }

    let second = rx.recv().await.unwrap();
    assert_eq!(second.event.kind(), "log");
}

#[tokio::test]
async fn subscriber_without_snapshot_gets_no_sync() {
    let bus = EventBus::new();
    let (_id, mut rx) = bus.subscribe("demo").await;

    bus.publish("demo", envelope(log_event("only"))).await;
    // No snapshot existed, so the first delivery is the live event.
    assert_eq!(rx.recv().await.unwrap().event.kind(), "log");
}

#[tokio::test]
async fn stalled_subscriber_is_evicted_and_bus_keeps_working() {
    let bus = EventBus::new();
    // Never drained: fills its queue at 100, then times out the publisher once.
    let (_id, _stalled_rx) = bus.subscribe("demo").await;

    for i in 0..101 {
        bus.publish("demo", envelope(log_event(&format!("event {i}")))).await;
    }

    assert_eq!(bus.subscriber_count("demo").await, 0, "stalled subscriber dropped");

    let (_id, mut rx) = bus.subscribe("demo").await;
    bus.publish("demo", envelope(log_event("after eviction"))).await;
    match rx.recv().await.unwrap().event {
        PipelineEvent::Log { message, .. } => assert_eq!(message, "after eviction"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn unsubscribe_drops_entry_but_snapshot_survives_until_cleared() {
    let bus = EventBus::new();
    let (id, _rx) = bus.subscribe("demo").await;
    bus.publish("demo", envelope(start_event())).await;

    bus.unsubscribe("demo", id).await;
    assert_eq!(bus.subscriber_count("demo").await, 0);
    assert!(bus.snapshot("demo").await.is_some(), "snapshot retained");

    bus.clear_snapshot("demo").await;
    assert!(bus.snapshot("demo").await.is_none());
}

#[tokio::test]
async fn terminal_events_mark_the_snapshot() {
    let bus = EventBus::new();

    bus.publish("demo", envelope(start_event())).await;
    bus.publish(
        "demo",
        envelope(PipelineEvent::PipelineError {
            error: "boom".to_string(),
            step: None,
            message: "Pipeline error: boom".to_string(),
        }),
    )
    .await;

    let snapshot = bus.snapshot("demo").await.unwrap();
    assert_eq!(snapshot.status, StreamStatus::Failed);

    bus.publish("other", envelope(start_event())).await;
    bus.publish(
        "other",
        envelope(PipelineEvent::PipelineComplete {
            summary: serde_json::json!({}),
            total_duration_seconds: 1.0,
            message: "done".to_string(),
        }),
    )
    .await;

    let snapshot = bus.snapshot("other").await.unwrap();
    assert_eq!(snapshot.status, StreamStatus::Completed);
}

#[tokio::test]
async fn keywords_are_isolated() {
    let bus = EventBus::new();
    let (_a, mut rx_a) = bus.subscribe("alpha").await;
    let (_b, mut rx_b) = bus.subscribe("beta").await;

    bus.publish("alpha", envelope(log_event("for alpha"))).await;
    bus.publish("beta", envelope(log_event("for beta"))).await;

    match rx_a.recv().await.unwrap().event {
        PipelineEvent::Log { message, .. } => assert_eq!(message, "for alpha"),
        other => panic!("unexpected event {other:?}"),
    }
    match rx_b.recv().await.unwrap().event {
        PipelineEvent::Log { message, .. } => assert_eq!(message, "for beta"),
        other => panic!("unexpected event {other:?}"),
    }
}
