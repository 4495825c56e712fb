use async_trait::async_trait;
use gridiron_live::broadcast::{ChannelSubscriber, DeliveryError};
use gridiron_live::config::{BroadcastConfig, EngineConfig};
use gridiron_live::domain::{Attributes, PlayerId, RosterPlayer, TeamId, FORMATION_SLOTS};
use gridiron_live::{
    CreateMatch, EventBroadcaster, FeedMessage, MatchId, MatchRegistry, MatchStatus,
    MockMatchStore, Subscriber, TeamRoster,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

fn roster(name: &str) -> TeamRoster {
    TeamRoster {
        team_id: TeamId::new(Uuid::new_v4()),
        name: name.to_string(),
        players: FORMATION_SLOTS
            .iter()
            .enumerate()
            .map(|(i, role)| RosterPlayer {
                id: PlayerId::new(Uuid::new_v4()),
                name: format!("{} {}", name, i + 1),
                role: *role,
                attributes: Attributes::new(68, 62, 71, 59),
                endurance: 100,
                retired: false,
            })
            .collect(),
    }
}

/// Never finishes a delivery.
#[derive(Debug, Default)]
struct Stalled {
    attempts: AtomicU32,
}

#[async_trait]
impl Subscriber for Stalled {
    async fn deliver(&self, _message: Arc<FeedMessage>) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Rejects every message.
#[derive(Debug, Default)]
struct Rejecting {
    attempts: AtomicU32,
}

#[async_trait]
impl Subscriber for Rejecting {
    async fn deliver(&self, _message: Arc<FeedMessage>) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Rejected("bad gateway".into()))
    }
}

fn setup() -> MatchRegistry {
    MatchRegistry::new(
        EngineConfig {
            max_match_seconds: 200,
            ..Default::default()
        },
        EventBroadcaster::new(BroadcastConfig {
            queue_capacity: 10_000,
            max_consecutive_failures: 3,
            delivery_timeout: Duration::from_secs(2),
        }),
        Arc::new(MockMatchStore::new()),
    )
}

fn create(registry: &MatchRegistry, seed: u64) -> MatchId {
    let mut req = CreateMatch::new(roster("Cedars"), roster("Pilots"));
    req.seed = Some(seed);
    registry.create(req).unwrap().match_id
}

#[tokio::test(start_paused = true)]
async fn test_failing_subscribers_are_dropped_without_stalling_the_match() {
    let registry = setup();
    let id = create(&registry, 17);

    let stalled = Arc::new(Stalled::default());
    let rejecting = Arc::new(Rejecting::default());
    let (healthy, mut rx) = ChannelSubscriber::new(10_000);
    registry.subscribe(id, stalled.clone()).unwrap();
    registry.subscribe(id, rejecting.clone()).unwrap();
    registry.subscribe(id, Arc::new(healthy)).unwrap();
    assert_eq!(registry.broadcaster().subscriber_count(id), 3);

    sleep(Duration::from_millis(30_500)).await;
    let state = registry.get(id).await.unwrap();
    assert_eq!(state.game_time, 30);

    // three timeouts of two seconds, three rejections
    assert_eq!(registry.broadcaster().subscriber_count(id), 1);
    assert_eq!(stalled.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(rejecting.attempts.load(Ordering::SeqCst), 3);

    let mut received = Vec::new();
    while let Ok(message) = rx.try_recv() {
        received.push(message);
    }
    let ticks: Vec<u64> = received
        .iter()
        .filter_map(|m| match m.as_ref() {
            FeedMessage::Event { event, .. } => Some(event.tick),
            _ => None,
        })
        .collect();
    // kickoff at tick 0, then one event per tick
    assert_eq!(ticks.len(), 31);
    assert_eq!(ticks.last(), Some(&30));

    registry.stop(id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_feeds_of_different_matches_do_not_mix() {
    let registry = setup();
    let first = create(&registry, 1);
    let second = create(&registry, 2);

    let (sub_a, mut rx_a) = ChannelSubscriber::new(10_000);
    let (sub_b, mut rx_b) = ChannelSubscriber::new(10_000);
    registry.subscribe(first, Arc::new(sub_a)).unwrap();
    registry.subscribe(second, Arc::new(sub_b)).unwrap();
    registry.subscribe(second, Arc::new(Rejecting::default())).unwrap();

    let mut count_a = 0;
    while let Some(message) = rx_a.recv().await {
        assert_eq!(message.match_id(), first);
        count_a += 1;
    }
    let mut last_b = None;
    while let Some(message) = rx_b.recv().await {
        assert_eq!(message.match_id(), second);
        last_b = Some(message);
    }

    assert!(count_a > 200);
    match last_b.as_deref() {
        Some(FeedMessage::Snapshot { state, .. }) => {
            assert_eq!(state.status, MatchStatus::Completed)
        }
        other => panic!("expected a final snapshot, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_delivery() {
    let registry = setup();
    let id = create(&registry, 9);
    let (subscriber, mut rx) = ChannelSubscriber::new(10_000);
    let sub = registry.subscribe(id, Arc::new(subscriber)).unwrap();

    sleep(Duration::from_millis(5_500)).await;
    assert!(registry.unsubscribe(id, sub));
    assert!(!registry.unsubscribe(id, sub));

    let mut before = 0;
    while rx.try_recv().is_ok() {
        before += 1;
    }
    assert!(before > 0);

    sleep(Duration::from_secs(10)).await;
    // the worker exits and drops the sender
    assert!(rx.recv().await.is_none());
    registry.stop(id).await.unwrap();
}
