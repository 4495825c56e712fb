//! Per-match fan-out of snapshots and events.
//!
//! Each open match owns one `broadcast` channel. Every subscriber gets its
//! own receiver and a worker task that drains it, so `publish` never waits
//! and a slow or failing subscriber can delay nobody but itself. A receiver
//! that falls more than `queue_capacity` messages behind loses the oldest
//! ones. A worker that fails `max_consecutive_failures` deliveries in a row
//! removes its subscription.

pub mod channel;

pub use channel::ChannelSubscriber;

use crate::config::BroadcastConfig;
use crate::domain::{MatchEvent, MatchId, MatchState};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// One message on a match feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Full state, published at the broadcast cadence and on high-priority events.
    #[serde(rename_all = "camelCase")]
    Snapshot {
        match_id: MatchId,
        state: Box<MatchState>,
    },
    /// A discrete event together with the score it produced.
    #[serde(rename_all = "camelCase")]
    Event {
        match_id: MatchId,
        home_score: u32,
        away_score: u32,
        event: MatchEvent,
    },
}

impl FeedMessage {
    pub fn snapshot(state: &MatchState) -> Self {
        FeedMessage::Snapshot {
            match_id: state.match_id,
            state: Box::new(state.clone()),
        }
    }

    pub fn event(state: &MatchState, event: MatchEvent) -> Self {
        FeedMessage::Event {
            match_id: state.match_id,
            home_score: state.home_score,
            away_score: state.away_score,
            event,
        }
    }

    /// Same string as the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedMessage::Snapshot { .. } => "snapshot",
            FeedMessage::Event { .. } => "event",
        }
    }

    pub fn match_id(&self) -> MatchId {
        match self {
            FeedMessage::Snapshot { match_id, .. } | FeedMessage::Event { match_id, .. } => {
                *match_id
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("subscriber closed")]
    Closed,
    #[error("delivery timed out")]
    TimedOut,
    #[error("subscriber rejected message: {0}")]
    Rejected(String),
}

/// An external observer of a match feed.
#[async_trait]
pub trait Subscriber: Send + Sync + fmt::Debug {
    async fn deliver(&self, message: Arc<FeedMessage>) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    worker: AbortHandle,
}

#[derive(Debug)]
struct Channel {
    sender: broadcast::Sender<Arc<FeedMessage>>,
    subscriptions: Vec<Subscription>,
}

#[derive(Debug)]
struct Inner {
    config: BroadcastConfig,
    channels: DashMap<MatchId, Channel>,
    next_id: AtomicU64,
}

impl Inner {
    fn detach(&self, match_id: MatchId, id: SubscriptionId) -> Option<Subscription> {
        let mut channel = self.channels.get_mut(&match_id)?;
        let pos = channel.subscriptions.iter().position(|s| s.id == id)?;
        Some(channel.subscriptions.remove(pos))
    }
}

#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    inner: Arc<Inner>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

impl EventBroadcaster {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                channels: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start accepting subscriptions for `match_id`.
    pub fn open(&self, match_id: MatchId) {
        let capacity = self.inner.config.queue_capacity.max(1);
        self.inner.channels.entry(match_id).or_insert_with(|| {
            let (sender, _) = broadcast::channel(capacity);
            Channel {
                sender,
                subscriptions: Vec::new(),
            }
        });
    }

    pub fn is_open(&self, match_id: MatchId) -> bool {
        self.inner.channels.contains_key(&match_id)
    }

    /// Hand `message` to every current subscriber of its match. Never
    /// waits. Returns how many receivers it reached.
    pub fn publish(&self, message: FeedMessage) -> usize {
        let match_id = message.match_id();
        let Some(channel) = self.inner.channels.get(&match_id) else {
            return 0;
        };
        // no receivers yet is not an error
        channel.sender.send(Arc::new(message)).unwrap_or(0)
    }

    /// Attach `subscriber` to an open match. `None` if the match is not open.
    /// It sees every message published after this call returns.
    pub fn subscribe(
        &self,
        match_id: MatchId,
        subscriber: Arc<dyn Subscriber>,
    ) -> Option<SubscriptionId> {
        let mut channel = self.inner.channels.get_mut(&match_id)?;
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let worker = tokio::spawn(run_worker(
            Arc::downgrade(&self.inner),
            match_id,
            id,
            channel.sender.subscribe(),
            subscriber,
            self.inner.config.clone(),
        ));
        channel.subscriptions.push(Subscription {
            id,
            worker: worker.abort_handle(),
        });

        debug!(match_id = %match_id, subscriber_id = %id, "subscriber attached");
        Some(id)
    }

    /// Detach a subscriber; anything still buffered for it is discarded.
    pub fn unsubscribe(&self, match_id: MatchId, id: SubscriptionId) -> bool {
        match self.inner.detach(match_id, id) {
            Some(subscription) => {
                subscription.worker.abort();
                debug!(match_id = %match_id, subscriber_id = %id, "subscriber detached");
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self, match_id: MatchId) -> usize {
        self.inner
            .channels
            .get(&match_id)
            .map_or(0, |channel| channel.subscriptions.len())
    }

    /// End the match feed. Dropping the sender lets workers deliver what is
    /// already buffered before their receivers report `Closed`.
    pub fn close(&self, match_id: MatchId) {
        self.inner.channels.remove(&match_id);
    }
}

async fn run_worker(
    broadcaster: Weak<Inner>,
    match_id: MatchId,
    id: SubscriptionId,
    mut rx: broadcast::Receiver<Arc<FeedMessage>>,
    subscriber: Arc<dyn Subscriber>,
    config: BroadcastConfig,
) {
    let mut failures = 0u32;
    loop {
        let message = match rx.recv().await {
            Ok(message) => message,
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    match_id = %match_id,
                    subscriber_id = %id,
                    skipped,
                    "subscriber lagged, oldest messages dropped"
                );
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let result =
            match tokio::time::timeout(config.delivery_timeout, subscriber.deliver(message)).await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::TimedOut),
            };
        let err = match result {
            Ok(()) => {
                failures = 0;
                continue;
            }
            Err(err) => err,
        };

        failures += 1;
        warn!(
            match_id = %match_id,
            subscriber_id = %id,
            failures,
            error = %err,
            "subscriber delivery failed"
        );
        if err == DeliveryError::Closed || failures >= config.max_consecutive_failures {
            warn!(match_id = %match_id, subscriber_id = %id, "dropping subscriber");
            if let Some(inner) = broadcaster.upgrade() {
                inner.detach(match_id, id);
            }
            return;
        }
    }
    debug!(match_id = %match_id, subscriber_id = %id, "subscriber feed ended");
}
