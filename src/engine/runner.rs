//! Synchronous per-match state machine.
//!
//! `MatchRunner` owns a `MatchState` and everything needed to advance it:
//! the step engine, the revenue accumulator and the match's seeded RNG.
//! It knows nothing about time or channels; the scheduler decides when to
//! call `tick` and what to do with the events it returns.

use super::commentary::CommentaryContext;
use super::revenue::RevenueAccumulator;
use super::step::{SimulationStepEngine, StepOutcome};
use super::StepError;
use crate::domain::{
    EventId, EventKind, MatchEvent, MatchState, MatchStatus, PlayerId, Priority, Role, Side,
    TeamSheet,
};
use crate::error::MatchError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Reverse;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info};

/// Stamina lost per live tick by a runner; other slots lose `BASE_DRAIN`.
const RUNNER_DRAIN: f32 = 0.03;
const BASE_DRAIN: f32 = 0.02;
/// Stamina recovered over the halftime break.
const HALFTIME_RECOVERY: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerSettings {
    /// Publish a full snapshot every this many ticks.
    pub broadcast_cadence: u64,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            broadcast_cadence: 5,
            min_speed: 0.1,
            max_speed: 100.0,
        }
    }
}

/// What one tick produced, in publication order.
#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<MatchEvent>,
    pub snapshot_due: bool,
    pub step_error: Option<StepError>,
}

#[derive(Debug)]
pub struct MatchRunner {
    state: MatchState,
    engine: SimulationStepEngine,
    revenue: RevenueAccumulator,
    rng: ChaCha8Rng,
    settings: RunnerSettings,
}

impl MatchRunner {
    pub fn new(state: MatchState, revenue: RevenueAccumulator, settings: RunnerSettings) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(state.seed);
        Self {
            state,
            engine: SimulationStepEngine::default(),
            revenue,
            rng,
            settings: RunnerSettings {
                broadcast_cadence: settings.broadcast_cadence.max(1),
                ..settings
            },
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn status(&self) -> MatchStatus {
        self.state.status
    }

    /// preparing -> live, with the kickoff event.
    pub fn start(&mut self) -> Result<MatchEvent, MatchError> {
        self.require(MatchStatus::Preparing, "start")?;
        self.enter(MatchStatus::Live, "start")?;
        info!(match_id = %self.state.match_id, "kickoff");
        Ok(self.lifecycle_event(EventKind::Kickoff, Side::Home))
    }

    /// Advance one simulated second. A no-op unless live.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.state.status != MatchStatus::Live {
            return report;
        }

        self.state.match_tick += 1;
        self.state.game_time += 1;
        let tick = self.state.match_tick;

        match self.compute_step().and_then(|outcome| self.apply(outcome)) {
            Ok(event) => {
                report.snapshot_due |= event.priority == Priority::High;
                report.events.push(event);
            }
            Err(err) => {
                error!(
                    match_id = %self.state.match_id,
                    tick,
                    error = %err,
                    "step computation failed; skipping event"
                );
                report.step_error = Some(err);
            }
        }

        let mut revenue = self
            .revenue
            .compute_tick(self.state.attendance, &self.state.facility_levels);
        revenue.tick = tick;
        self.state.per_tick_revenue.push(revenue);

        self.drain_stamina();
        report.snapshot_due |= tick % self.settings.broadcast_cadence == 0;

        if self.state.game_time >= self.state.max_time {
            report.events.push(self.complete());
            report.snapshot_due = true;
        } else if self.state.current_half == 1 && self.state.game_time >= self.state.halftime_at()
        {
            if let Ok(event) = self.halftime() {
                report.events.push(event);
                report.snapshot_due = true;
            }
        }
        report
    }

    /// halftime -> live for the second half.
    pub fn begin_second_half(&mut self) -> Result<MatchEvent, MatchError> {
        self.require(MatchStatus::Halftime, "begin second half")?;
        self.enter(MatchStatus::Live, "begin second half")?;
        self.state.current_half = 2;
        self.state.possession = Side::Away;
        self.state.ball_position = crate::domain::state::RESTART_POSITION;
        for side in [Side::Home, Side::Away] {
            for p in self.state.sheet_mut(side).formation.players.iter_mut() {
                if !p.injured {
                    p.stamina = (p.stamina + HALFTIME_RECOVERY).min(100.0);
                }
            }
        }
        info!(match_id = %self.state.match_id, "second half underway");
        Ok(self.lifecycle_event(EventKind::SecondHalf, Side::Away))
    }

    pub fn pause(&mut self) -> Result<(), MatchError> {
        self.require(MatchStatus::Live, "pause")?;
        self.enter(MatchStatus::Paused, "pause")
    }

    pub fn resume(&mut self) -> Result<(), MatchError> {
        self.require(MatchStatus::Paused, "resume")?;
        self.enter(MatchStatus::Live, "resume")?;
        self.state.display_cursor = None;
        Ok(())
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<(), MatchError> {
        if self.state.status.is_terminal() {
            return Err(self.invalid_state("set speed"));
        }
        let RunnerSettings {
            min_speed,
            max_speed,
            ..
        } = self.settings;
        if !multiplier.is_finite() || multiplier < min_speed || multiplier > max_speed {
            return Err(MatchError::InvalidParameter(format!(
                "speed must be between {} and {}, got {}",
                min_speed, max_speed, multiplier
            )));
        }
        self.state.simulation_speed = multiplier;
        Ok(())
    }

    /// Move the display cursor of a paused match. No ticks are replayed.
    pub fn seek(&mut self, target_second: u32) -> Result<(), MatchError> {
        self.require(MatchStatus::Paused, "seek")?;
        if target_second > self.state.game_time {
            return Err(MatchError::InvalidParameter(format!(
                "cannot seek to {}s, game time is {}s",
                target_second, self.state.game_time
            )));
        }
        self.state.display_cursor = Some(target_second);
        Ok(())
    }

    /// Complete the match now. `None` when it already was.
    pub fn stop(&mut self) -> Option<MatchEvent> {
        if self.state.status.is_terminal() {
            return None;
        }
        Some(self.complete())
    }

    fn compute_step(&mut self) -> Result<StepOutcome, StepError> {
        let engine = &self.engine;
        let state = &self.state;
        let rng = &mut self.rng;
        catch_unwind(AssertUnwindSafe(|| engine.step(state, rng))).map_err(|payload| {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            StepError::Panicked(msg)
        })
    }

    /// Validate the whole outcome, then apply it. Nothing is written when
    /// validation fails.
    fn apply(&mut self, outcome: StepOutcome) -> Result<MatchEvent, StepError> {
        let carries_points = outcome.points > 0
            || outcome.player_deltas.iter().any(|(_, d)| d.points > 0)
            || outcome.team_deltas.iter().any(|(_, d)| d.points > 0);
        if carries_points && outcome.kind != EventKind::Score {
            return Err(StepError::ScoreWithoutScoringEvent(outcome.kind));
        }
        if let Some((id, _)) = outcome
            .player_deltas
            .iter()
            .find(|(id, _)| !self.state.player_stats.contains_key(id))
        {
            return Err(StepError::UnknownEntity(format!("player {}", id)));
        }
        if let Some((side, id)) = outcome.injured {
            if self.state.sheet(side).formation.get(&id).is_none() {
                return Err(StepError::UnknownEntity(format!("{} field player {}", side, id)));
            }
        }

        if outcome.kind == EventKind::Score {
            match outcome.side {
                Side::Home => self.state.home_score += outcome.points,
                Side::Away => self.state.away_score += outcome.points,
            }
        }
        for (id, delta) in &outcome.player_deltas {
            if let Some(stats) = self.state.player_stats.get_mut(id) {
                stats.absorb(delta);
            }
        }
        for (side, delta) in &outcome.team_deltas {
            let team_id = self.state.team_id(*side);
            if let Some(stats) = self.state.team_stats.get_mut(&team_id) {
                stats.absorb(delta);
            }
        }
        if let Some((side, id)) = outcome.injured {
            substitute(self.state.sheet_mut(side), id);
        }
        self.state.possession = outcome.next_possession;
        self.state.ball_position = outcome.next_ball_position;

        let event = MatchEvent {
            id: self.next_event_id(),
            timestamp: self.state.game_time,
            tick: self.state.match_tick,
            kind: outcome.kind,
            description: outcome.description,
            priority: outcome.priority,
            field_position: outcome.next_ball_position,
            side: Some(outcome.side),
            primary_player: outcome.primary,
            points: outcome.points,
        };
        self.state.game_events.push(event.clone());
        Ok(event)
    }

    fn halftime(&mut self) -> Result<MatchEvent, MatchError> {
        self.enter(MatchStatus::Halftime, "halftime")?;
        info!(
            match_id = %self.state.match_id,
            home = self.state.home_score,
            away = self.state.away_score,
            "halftime"
        );
        let leader = leading_side(&self.state);
        Ok(self.lifecycle_event(EventKind::Halftime, leader))
    }

    fn complete(&mut self) -> MatchEvent {
        self.state.status = MatchStatus::Completed;
        info!(
            match_id = %self.state.match_id,
            game_time = self.state.game_time,
            home = self.state.home_score,
            away = self.state.away_score,
            "match completed"
        );
        let leader = leading_side(&self.state);
        self.lifecycle_event(EventKind::FullTime, leader)
    }

    fn lifecycle_event(&mut self, kind: EventKind, side: Side) -> MatchEvent {
        let ctx = CommentaryContext::for_state(&self.state, side);
        let description = self.engine.commentary().narrate(kind, &ctx, &mut self.rng);
        let event = MatchEvent {
            id: self.next_event_id(),
            timestamp: self.state.game_time,
            tick: self.state.match_tick,
            kind,
            description,
            priority: kind.default_priority(),
            field_position: self.state.ball_position,
            side: None,
            primary_player: None,
            points: 0,
        };
        self.state.game_events.push(event.clone());
        event
    }

    fn next_event_id(&mut self) -> EventId {
        EventId(uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid())
    }

    fn drain_stamina(&mut self) {
        for side in [Side::Home, Side::Away] {
            for p in self.state.sheet_mut(side).formation.players.iter_mut() {
                if p.injured {
                    continue;
                }
                let drain = if p.slot == Role::Runner {
                    RUNNER_DRAIN
                } else {
                    BASE_DRAIN
                };
                p.stamina = (p.stamina - drain).max(0.0);
            }
        }
    }

    fn require(&self, status: MatchStatus, command: &'static str) -> Result<(), MatchError> {
        if self.state.status == status {
            Ok(())
        } else {
            Err(self.invalid_state(command))
        }
    }

    fn enter(&mut self, next: MatchStatus, command: &'static str) -> Result<(), MatchError> {
        self.state
            .transition(next)
            .map_err(|_| self.invalid_state(command))
    }

    fn invalid_state(&self, command: &'static str) -> MatchError {
        MatchError::InvalidState {
            match_id: self.state.match_id,
            status: self.state.status,
            command,
        }
    }
}

/// Home on a tie.
fn leading_side(state: &MatchState) -> Side {
    if state.score(Side::Away) > state.score(Side::Home) {
        Side::Away
    } else {
        Side::Home
    }
}

/// Take `injured` off the field and bring on the best-fitting healthy bench
/// player for the vacated slot. With an empty bench the injured player
/// stays in the formation, flagged, and the slot resolves to a fallback.
fn substitute(sheet: &mut TeamSheet, injured: PlayerId) {
    let Some(pos) = sheet.formation.players.iter().position(|p| p.id == injured) else {
        return;
    };
    let slot = sheet.formation.players[pos].slot;
    let best = sheet
        .bench
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.injured)
        .max_by_key(|(i, p)| (p.attributes.fit_for(slot), Reverse(*i)))
        .map(|(i, _)| i);

    match best {
        Some(i) => {
            let mut sub = sheet.bench.remove(i);
            sub.slot = slot;
            let mut off = std::mem::replace(&mut sheet.formation.players[pos], sub);
            off.injured = true;
            off.stamina = 0.0;
            off.slot = off.role;
            sheet.bench.push(off);
        }
        None => {
            let p = &mut sheet.formation.players[pos];
            p.injured = true;
            p.stamina = 0.0;
        }
    }
}
