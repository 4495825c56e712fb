//! The per-match actor.
//!
//! A `TickScheduler` task owns one `MatchRunner` outright. Control commands
//! arrive over an mpsc channel with a oneshot reply; ticks fire from a
//! deadline that exists only while the match is live, so pausing simply
//! drops the deadline and no tick can fire until resume sets a new one.

use super::registry::MatchRegistry;
use crate::broadcast::{EventBroadcaster, FeedMessage};
use crate::config::SPEED_FLOOR;
use crate::domain::{MatchEvent, MatchId, MatchState, MatchStatus};
use crate::engine::MatchRunner;
use crate::error::MatchError;
use crate::persistence::{persist_with_retry, FinalMatchRecord, MatchStore, RetryPolicy};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

pub(crate) type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub(crate) enum Command {
    Pause(Reply<Result<(), MatchError>>),
    Resume(Reply<Result<(), MatchError>>),
    SetSpeed(f64, Reply<Result<(), MatchError>>),
    Seek(u32, Reply<Result<(), MatchError>>),
    Stop(Reply<()>),
    Snapshot(Reply<MatchState>),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SchedulerSettings {
    pub intermission: Duration,
    pub persisted_event_limit: usize,
    pub retry: RetryPolicy,
}

pub(crate) struct TickScheduler {
    match_id: MatchId,
    runner: MatchRunner,
    commands: mpsc::Receiver<Command>,
    broadcaster: EventBroadcaster,
    store: Arc<dyn MatchStore>,
    registry: MatchRegistry,
    settings: SchedulerSettings,
    next_tick: Option<Instant>,
    intermission_ends: Option<Instant>,
}

impl TickScheduler {
    pub(crate) fn new(
        runner: MatchRunner,
        commands: mpsc::Receiver<Command>,
        broadcaster: EventBroadcaster,
        store: Arc<dyn MatchStore>,
        registry: MatchRegistry,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            match_id: runner.state().match_id,
            runner,
            commands,
            broadcaster,
            store,
            registry,
            settings,
            next_tick: None,
            intermission_ends: None,
        }
    }

    pub(crate) async fn run(mut self) {
        match self.runner.start() {
            Ok(kickoff) => {
                self.publish(vec![kickoff], true);
                self.next_tick = Some(Instant::now() + self.period());
            }
            Err(err) => error!(match_id = %self.match_id, error = %err, "match failed to start"),
        }

        while !self.runner.status().is_terminal() {
            let tick_at = self.next_tick;
            let second_half_at = self.intermission_ends;
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    // every handle is gone; nobody can observe or stop us
                    None => self.stop(),
                },
                _ = sleep_until(tick_at.unwrap_or_else(Instant::now)), if tick_at.is_some() => {
                    self.on_tick();
                }
                _ = sleep_until(second_half_at.unwrap_or_else(Instant::now)), if second_half_at.is_some() => {
                    self.on_intermission_over();
                }
            }
        }

        self.finish().await;
    }

    /// Real time between ticks at the current speed.
    fn period(&self) -> Duration {
        let speed = self.runner.state().simulation_speed.max(SPEED_FLOOR);
        Duration::from_secs_f64(1.0 / speed)
    }

    fn on_tick(&mut self) {
        let report = self.runner.tick();
        self.publish(report.events, report.snapshot_due);

        match self.runner.status() {
            MatchStatus::Halftime => {
                self.next_tick = None;
                self.intermission_ends = Some(Instant::now() + self.settings.intermission);
            }
            MatchStatus::Live => {
                // measured from the previous deadline so pacing does not drift
                let period = self.period();
                self.next_tick = self.next_tick.map(|at| at + period);
            }
            _ => self.next_tick = None,
        }
    }

    fn on_intermission_over(&mut self) {
        self.intermission_ends = None;
        match self.runner.begin_second_half() {
            Ok(event) => {
                self.publish(vec![event], true);
                self.next_tick = Some(Instant::now() + self.period());
            }
            Err(err) => error!(match_id = %self.match_id, error = %err, "second half did not start"),
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Pause(reply) => {
                let result = self.runner.pause();
                if result.is_ok() {
                    self.next_tick = None;
                    self.publish(Vec::new(), true);
                }
                debug!(match_id = %self.match_id, ok = result.is_ok(), "pause");
                let _ = reply.send(result);
            }
            Command::Resume(reply) => {
                let result = self.runner.resume();
                if result.is_ok() {
                    self.next_tick = Some(Instant::now() + self.period());
                    self.publish(Vec::new(), true);
                }
                debug!(match_id = %self.match_id, ok = result.is_ok(), "resume");
                let _ = reply.send(result);
            }
            Command::SetSpeed(multiplier, reply) => {
                let result = self.runner.set_speed(multiplier);
                if result.is_ok() && self.next_tick.is_some() {
                    self.next_tick = Some(Instant::now() + self.period());
                }
                debug!(match_id = %self.match_id, multiplier, ok = result.is_ok(), "set speed");
                let _ = reply.send(result);
            }
            Command::Seek(target, reply) => {
                let result = self.runner.seek(target);
                if result.is_ok() {
                    self.publish(Vec::new(), true);
                }
                debug!(match_id = %self.match_id, target, ok = result.is_ok(), "seek");
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                self.stop();
                let _ = reply.send(());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.runner.state().clone());
            }
        }
    }

    fn stop(&mut self) {
        if let Some(event) = self.runner.stop() {
            debug!(match_id = %self.match_id, "stopped");
            self.next_tick = None;
            self.intermission_ends = None;
            self.publish(vec![event], true);
        }
    }

    /// Events go out immediately and in order; a snapshot, when due,
    /// follows the events of the same tick.
    fn publish(&self, events: Vec<MatchEvent>, snapshot: bool) {
        let state = self.runner.state();
        for event in events {
            self.broadcaster.publish(FeedMessage::event(state, event));
        }
        if snapshot {
            self.broadcaster.publish(FeedMessage::snapshot(state));
        }
    }

    /// Hand the final state to the store, keep answering commands while the
    /// write is retried, then close the feed and leave the registry.
    async fn finish(mut self) {
        let record = FinalMatchRecord::from_state(
            self.runner.state(),
            self.settings.persisted_event_limit,
            Utc::now(),
        );
        let store = self.store.clone();
        let policy = self.settings.retry;
        let persist = persist_with_retry(store.as_ref(), &record, &policy);
        tokio::pin!(persist);

        loop {
            tokio::select! {
                result = &mut persist => {
                    match result {
                        Ok(attempts) => info!(
                            match_id = %self.match_id,
                            attempts,
                            home = record.home_score,
                            away = record.away_score,
                            "match result persisted"
                        ),
                        Err(err) => error!(
                            match_id = %self.match_id,
                            attempts = err.attempts,
                            error = %err.source,
                            "match result could not be persisted; final state is lost"
                        ),
                    }
                    break;
                }
                Some(command) = self.commands.recv() => self.handle(command),
            }
        }

        self.broadcaster.close(self.match_id);
        self.registry.remove_finished(self.match_id);
        info!(match_id = %self.match_id, "match removed from registry");
    }
}
