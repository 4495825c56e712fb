//! The per-match aggregate and its status state machine.

use super::event::MatchEvent;
use super::facility::FacilityLevels;
use super::history::{BoundedHistory, HistoryOrder};
use super::primitives::{MatchId, PlayerId, Side, TeamId};
use super::revenue::RevenueSnapshot;
use super::roster::TeamSheet;
use super::stats::{PlayerStats, TeamStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Ball position a side receives after conceding.
pub const RESTART_POSITION: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Preparing,
    Live,
    Halftime,
    Paused,
    Completed,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed)
    }

    /// Valid edges:
    /// preparing -> live; live -> halftime -> live; live <-> paused;
    /// any non-terminal -> completed.
    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        use MatchStatus::*;
        match (self, next) {
            (Completed, _) => false,
            (_, Completed) => true,
            (Preparing, Live) => true,
            (Live, Halftime) | (Halftime, Live) => true,
            (Live, Paused) | (Paused, Live) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStatus::Preparing => "preparing",
            MatchStatus::Live => "live",
            MatchStatus::Halftime => "halftime",
            MatchStatus::Paused => "paused",
            MatchStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: MatchStatus,
    pub to: MatchStatus,
}

/// Capacities and pacing a new match starts with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub max_time: u32,
    pub speed: f64,
    pub event_history_cap: usize,
    pub revenue_history_cap: usize,
    pub seed: u64,
}

/// Everything about one running match. Owned and mutated by exactly one
/// scheduler task; everyone else sees clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub game_time: u32,
    pub max_time: u32,
    pub current_half: u8,
    pub home_score: u32,
    pub away_score: u32,
    pub home: TeamSheet,
    pub away: TeamSheet,
    pub possession: Side,
    pub ball_position: u8,
    pub facility_levels: FacilityLevels,
    pub attendance: u32,
    pub per_tick_revenue: BoundedHistory<RevenueSnapshot>,
    pub game_events: BoundedHistory<MatchEvent>,
    pub player_stats: BTreeMap<PlayerId, PlayerStats>,
    pub team_stats: BTreeMap<TeamId, TeamStats>,
    pub match_tick: u64,
    pub simulation_speed: f64,
    /// Replay cursor set by `seek` while paused; cleared on resume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_cursor: Option<u32>,
    pub seed: u64,
}

impl MatchState {
    /// Build the initial (preparing) state. Stat keys are fixed here: one
    /// entry per rostered player (field and bench) and one per team.
    pub fn new(
        match_id: MatchId,
        home: TeamSheet,
        away: TeamSheet,
        facility_levels: FacilityLevels,
        params: MatchParams,
    ) -> Self {
        let facility_levels = facility_levels.clamped();

        let mut player_stats = BTreeMap::new();
        for sheet in [&home, &away] {
            for player in sheet.formation.players.iter().chain(sheet.bench.iter()) {
                player_stats.insert(player.id, PlayerStats::default());
            }
        }

        let mut team_stats = BTreeMap::new();
        team_stats.insert(home.team_id, TeamStats::default());
        team_stats.insert(away.team_id, TeamStats::default());

        Self {
            match_id,
            status: MatchStatus::Preparing,
            game_time: 0,
            max_time: params.max_time,
            current_half: 1,
            home_score: 0,
            away_score: 0,
            home,
            away,
            possession: Side::Home,
            ball_position: RESTART_POSITION,
            attendance: facility_levels.attendance(),
            facility_levels,
            per_tick_revenue: BoundedHistory::new(
                params.revenue_history_cap,
                HistoryOrder::OldestFirst,
            ),
            game_events: BoundedHistory::new(params.event_history_cap, HistoryOrder::NewestFirst),
            player_stats,
            team_stats,
            match_tick: 0,
            simulation_speed: params.speed,
            display_cursor: None,
            seed: params.seed,
        }
    }

    /// Move to `next` if the state machine allows it.
    pub fn transition(&mut self, next: MatchStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Game second at which the first half ends.
    pub fn halftime_at(&self) -> u32 {
        self.max_time / 2
    }

    pub fn sheet(&self, side: Side) -> &TeamSheet {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn sheet_mut(&mut self, side: Side) -> &mut TeamSheet {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }

    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::Home => self.home_score,
            Side::Away => self.away_score,
        }
    }

    pub fn team_id(&self, side: Side) -> TeamId {
        self.sheet(side).team_id
    }
}
