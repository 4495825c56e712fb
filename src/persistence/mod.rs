//! Completion write-back.
//!
//! A completed match is condensed into a `FinalMatchRecord` and handed to a
//! `MatchStore` through an upsert keyed by match id, retried with
//! exponential backoff for transient failures.

use crate::domain::{
    MatchEvent, MatchId, MatchState, MatchStatus, Money, PlayerId, PlayerStats, TeamId, TeamStats,
};
use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub mod mock;

pub use mock::MockMatchStore;

/// What survives a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalMatchRecord {
    pub match_id: MatchId,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_score: u32,
    pub away_score: u32,
    pub status: MatchStatus,
    pub game_time: u32,
    pub attendance: u32,
    /// Sum over the retained revenue history.
    pub total_revenue: Money,
    /// Most recent first.
    pub events: Vec<MatchEvent>,
    pub player_stats: BTreeMap<PlayerId, PlayerStats>,
    pub team_stats: BTreeMap<TeamId, TeamStats>,
    pub completed_at: DateTime<Utc>,
}

impl FinalMatchRecord {
    pub fn from_state(state: &MatchState, event_limit: usize, completed_at: DateTime<Utc>) -> Self {
        Self {
            match_id: state.match_id,
            home_team_id: state.home.team_id,
            away_team_id: state.away.team_id,
            home_score: state.home_score,
            away_score: state.away_score,
            status: state.status,
            game_time: state.game_time,
            attendance: state.attendance,
            total_revenue: state.per_tick_revenue.iter().map(|r| r.total).sum(),
            events: state.game_events.iter().take(event_limit).cloned().collect(),
            player_stats: state.player_stats.clone(),
            team_stats: state.team_stats.clone(),
            completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Worth retrying (store unavailable, timeouts, busy database).
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("permanent store failure: {0}")]
    Permanent(String),
}

/// External data store for finished matches.
#[async_trait]
pub trait MatchStore: Send + Sync + fmt::Debug {
    /// Insert or replace the record for `record.match_id`.
    async fn upsert_match_result(&self, record: &FinalMatchRecord) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("persisting match {match_id} failed after {attempts} attempt(s): {source}")]
pub struct PersistError {
    pub match_id: MatchId,
    pub attempts: u32,
    pub source: StoreError,
}

/// Upsert `record`, retrying transient failures until `policy.max_attempts`
/// is reached. Returns the number of attempts used.
pub async fn persist_with_retry(
    store: &dyn MatchStore,
    record: &FinalMatchRecord,
    policy: &RetryPolicy,
) -> Result<u32, PersistError> {
    let max_attempts = policy.max_attempts.max(1);
    let attempts = AtomicU32::new(0);
    let backoff = ExponentialBackoff {
        current_interval: policy.initial_backoff,
        initial_interval: policy.initial_backoff,
        max_interval: policy.max_backoff.max(policy.initial_backoff),
        max_elapsed_time: None,
        ..Default::default()
    };

    let result = retry_notify(
        backoff,
        || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match store.upsert_match_result(record).await {
                Ok(()) => Ok(()),
                Err(err @ StoreError::Transient(_)) if attempt < max_attempts => {
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        },
        |err: StoreError, wait: Duration| {
            warn!(
                match_id = %record.match_id,
                attempt = attempts.load(Ordering::SeqCst),
                retry_in_ms = wait.as_millis() as u64,
                error = %err,
                "match result write failed; retrying"
            );
        },
    )
    .await;

    let attempts = attempts.load(Ordering::SeqCst);
    result.map(|()| attempts).map_err(|source| PersistError {
        match_id: record.match_id,
        attempts,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventId, EventKind, Priority, RevenueSnapshot};
    use crate::test_support::sample_state;
    use uuid::Uuid;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
        }
    }

    fn record() -> FinalMatchRecord {
        let mut state = sample_state(MatchId::new());
        state.status = MatchStatus::Completed;
        FinalMatchRecord::from_state(&state, 20, Utc::now())
    }

    #[test]
    fn test_record_truncates_events_newest_first() {
        let mut state = sample_state(MatchId::new());
        for tick in 1..=30u64 {
            state.game_events.push(MatchEvent {
                id: EventId(Uuid::new_v4()),
                timestamp: tick as u32,
                tick,
                kind: EventKind::Advance,
                description: String::new(),
                priority: Priority::Low,
                field_position: 0,
                side: None,
                primary_player: None,
                points: 0,
            });
            state.per_tick_revenue.push(RevenueSnapshot::new(
                tick,
                Money::from_str_canonical("1.50").unwrap(),
                Money::zero(),
                Money::zero(),
                Money::zero(),
                Money::zero(),
            ));
        }
        let rec = FinalMatchRecord::from_state(&state, 5, Utc::now());
        let ticks: Vec<u64> = rec.events.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![30, 29, 28, 27, 26]);
        assert_eq!(rec.total_revenue, Money::from_str_canonical("45").unwrap());
        assert_eq!(rec.player_stats.len(), state.player_stats.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let store = MockMatchStore::new().failing_first(2);
        let rec = record();
        let attempts = persist_with_retry(&store, &rec, &fast_policy(5))
            .await
            .unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(store.upsert_calls(), 3);
        assert_eq!(store.get(rec.match_id), Some(rec));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion() {
        let store = MockMatchStore::new().always_failing();
        let rec = record();
        let err = persist_with_retry(&store, &rec, &fast_policy(4))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 4);
        assert!(matches!(err.source, StoreError::Transient(_)));
        assert_eq!(store.upsert_calls(), 4);
        assert!(store.get(rec.match_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let store = MockMatchStore::new().permanently_failing();
        let rec = record();
        let err = persist_with_retry(&store, &rec, &fast_policy(5))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.source, StoreError::Permanent(_)));
    }
}
