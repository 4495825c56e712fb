//! Process-wide index of active matches.
//!
//! The registry is an ordinary owned value (cheap to clone, shared state
//! behind an `Arc`). Each entry is a handle to one scheduler task; the
//! `DashMap` entry API makes create-if-absent atomic per match id without
//! serializing operations on different ids.

use super::scheduler::{Command, Reply, SchedulerSettings, TickScheduler};
use crate::broadcast::{EventBroadcaster, Subscriber, SubscriptionId};
use crate::config::EngineConfig;
use crate::domain::{FacilityLevels, MatchId, MatchParams, MatchState, Side, TeamRoster};
use crate::engine::{build_team_sheet, MatchRunner, RevenueAccumulator, RunnerSettings};
use crate::error::MatchError;
use crate::persistence::{MatchStore, RetryPolicy};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

const COMMAND_BUFFER: usize = 32;

/// Everything needed to start a match.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatch {
    #[serde(default)]
    pub match_id: Option<MatchId>,
    pub home: TeamRoster,
    pub away: TeamRoster,
    #[serde(default)]
    pub facility_levels: FacilityLevels,
    #[serde(default)]
    pub max_time_seconds: Option<u32>,
    #[serde(default)]
    pub speed: Option<f64>,
    /// Seed for the match RNG; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl CreateMatch {
    pub fn new(home: TeamRoster, away: TeamRoster) -> Self {
        Self {
            match_id: None,
            home,
            away,
            facility_levels: FacilityLevels::default(),
            max_time_seconds: None,
            speed: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
struct MatchHandle {
    commands: mpsc::Sender<Command>,
}

struct RegistryInner {
    matches: DashMap<MatchId, MatchHandle>,
    broadcaster: EventBroadcaster,
    store: Arc<dyn MatchStore>,
    config: EngineConfig,
    revenue: RevenueAccumulator,
}

#[derive(Clone)]
pub struct MatchRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for MatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchRegistry")
            .field("active", &self.inner.matches.len())
            .finish()
    }
}

impl MatchRegistry {
    pub fn new(
        config: EngineConfig,
        broadcaster: EventBroadcaster,
        store: Arc<dyn MatchStore>,
    ) -> Self {
        Self::with_revenue(config, broadcaster, store, RevenueAccumulator::default())
    }

    pub fn with_revenue(
        config: EngineConfig,
        broadcaster: EventBroadcaster,
        store: Arc<dyn MatchStore>,
        revenue: RevenueAccumulator,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                matches: DashMap::new(),
                broadcaster,
                store,
                config,
                revenue,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.inner.broadcaster
    }

    /// Build the initial state and start its scheduler. Must be called from
    /// within a tokio runtime.
    pub fn create(&self, request: CreateMatch) -> Result<MatchState, MatchError> {
        let config = &self.inner.config;
        let match_id = request.match_id.unwrap_or_default();
        if self.inner.matches.contains_key(&match_id) {
            return Err(MatchError::DuplicateMatch(match_id));
        }

        let max_time = request.max_time_seconds.unwrap_or(config.max_match_seconds);
        if max_time < 2 {
            return Err(MatchError::InvalidParameter(format!(
                "max time must be at least 2 seconds, got {}",
                max_time
            )));
        }
        let speed = request.speed.unwrap_or(config.default_speed);
        if !speed.is_finite() || speed < config.min_speed || speed > config.max_speed {
            return Err(MatchError::InvalidParameter(format!(
                "speed must be between {} and {}, got {}",
                config.min_speed, config.max_speed, speed
            )));
        }

        let roster_error = |side: Side| {
            move |e: crate::engine::RosterError| MatchError::InsufficientRoster {
                side,
                eligible: e.eligible,
                required: e.required,
            }
        };
        let home = build_team_sheet(&request.home).map_err(roster_error(Side::Home))?;
        let away = build_team_sheet(&request.away).map_err(roster_error(Side::Away))?;
        let seed = request.seed.unwrap_or_else(rand::random);

        let state = MatchState::new(
            match_id,
            home,
            away,
            request.facility_levels,
            MatchParams {
                max_time,
                speed,
                event_history_cap: config.event_history_cap,
                revenue_history_cap: config.revenue_history_cap,
                seed,
            },
        );

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        match self.inner.matches.entry(match_id) {
            Entry::Occupied(_) => return Err(MatchError::DuplicateMatch(match_id)),
            Entry::Vacant(slot) => {
                slot.insert(MatchHandle { commands: tx });
            }
        }
        self.inner.broadcaster.open(match_id);

        let runner = MatchRunner::new(
            state.clone(),
            self.inner.revenue,
            RunnerSettings {
                broadcast_cadence: config.broadcast_cadence_ticks,
                min_speed: config.min_speed,
                max_speed: config.max_speed,
            },
        );
        let scheduler = TickScheduler::new(
            runner,
            rx,
            self.inner.broadcaster.clone(),
            self.inner.store.clone(),
            self.clone(),
            SchedulerSettings {
                intermission: config.halftime_intermission,
                persisted_event_limit: config.persisted_event_limit,
                retry: RetryPolicy {
                    max_attempts: config.persist_max_attempts,
                    initial_backoff: config.persist_initial_backoff,
                    ..Default::default()
                },
            },
        );
        tokio::spawn(scheduler.run());

        info!(
            match_id = %match_id,
            seed,
            max_time,
            speed,
            home = %state.home.name,
            away = %state.away.name,
            "match created"
        );
        Ok(state)
    }

    /// Current state of an active match.
    pub async fn get(&self, match_id: MatchId) -> Result<MatchState, MatchError> {
        self.request(match_id, Command::Snapshot).await
    }

    pub fn contains(&self, match_id: MatchId) -> bool {
        self.inner.matches.contains_key(&match_id)
    }

    /// Ids of every active match, sorted.
    pub fn list(&self) -> Vec<MatchId> {
        let mut ids: Vec<MatchId> = self.inner.matches.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.matches.is_empty()
    }

    /// Complete the match now. Stopping a match that already completed,
    /// or is no longer active, does nothing.
    pub async fn stop(&self, match_id: MatchId) -> Result<(), MatchError> {
        match self.request(match_id, Command::Stop).await {
            Ok(()) => Ok(()),
            Err(MatchError::MatchNotFound(_)) => {
                debug!(match_id = %match_id, "stop on inactive match ignored");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub fn subscribe(
        &self,
        match_id: MatchId,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<SubscriptionId, MatchError> {
        if !self.contains(match_id) {
            return Err(MatchError::MatchNotFound(match_id));
        }
        self.inner
            .broadcaster
            .subscribe(match_id, subscriber)
            .ok_or(MatchError::MatchNotFound(match_id))
    }

    pub fn unsubscribe(&self, match_id: MatchId, id: SubscriptionId) -> bool {
        self.inner.broadcaster.unsubscribe(match_id, id)
    }

    /// Send a command to the match's scheduler and wait for its reply.
    pub(crate) async fn request<T>(
        &self,
        match_id: MatchId,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, MatchError> {
        let handle = self
            .inner
            .matches
            .get(&match_id)
            .map(|h| h.value().clone())
            .ok_or(MatchError::MatchNotFound(match_id))?;
        let (tx, rx) = oneshot::channel();
        handle
            .commands
            .send(command(tx))
            .await
            .map_err(|_| MatchError::MatchNotFound(match_id))?;
        rx.await.map_err(|_| MatchError::MatchNotFound(match_id))
    }

    /// Called by the scheduler once its final state has been handed off.
    pub(crate) fn remove_finished(&self, match_id: MatchId) {
        self.inner.matches.remove(&match_id);
    }
}
