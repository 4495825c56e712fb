//! Fixtures shared by unit tests.

use crate::domain::{
    Attributes, FacilityLevels, MatchId, MatchParams, MatchState, PlayerId, RosterPlayer, TeamId,
    TeamRoster, FORMATION_SLOTS,
};
use crate::engine::build_team_sheet;
use uuid::Uuid;

/// A roster filling every formation slot by role, plus `bench` extra runners.
pub fn roster(name: &str, bench: usize) -> TeamRoster {
    let roles = FORMATION_SLOTS
        .iter()
        .copied()
        .chain(std::iter::repeat(crate::domain::Role::Runner).take(bench));
    TeamRoster {
        team_id: TeamId::new(Uuid::new_v4()),
        name: name.to_string(),
        players: roles
            .enumerate()
            .map(|(i, role)| RosterPlayer {
                id: PlayerId::new(Uuid::new_v4()),
                name: format!("{} #{}", name, i + 1),
                role,
                attributes: Attributes::new(65, 65, 65, 65),
                endurance: 100,
                retired: false,
            })
            .collect(),
    }
}

pub fn sample_state(match_id: MatchId) -> MatchState {
    MatchState::new(
        match_id,
        build_team_sheet(&roster("Hawks", 1)).unwrap(),
        build_team_sheet(&roster("Owls", 1)).unwrap(),
        FacilityLevels::default(),
        MatchParams {
            max_time: 2400,
            speed: 1.0,
            event_history_cap: 50,
            revenue_history_cap: 120,
            seed: 7,
        },
    )
}
