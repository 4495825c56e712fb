//! Roster -> formation selection.

use crate::domain::{
    FieldPlayer, Formation, RosterPlayer, TeamRoster, TeamSheet, FORMATION_SIZE, FORMATION_SLOTS,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("roster has {eligible} eligible players, {required} required")]
pub struct RosterError {
    pub eligible: usize,
    pub required: usize,
}

/// Fill the six slots from the eligible (non-retired) players.
///
/// Each slot first takes the best-fitting unused player whose natural role
/// matches; slots left open after that pass take the best-fitting player of
/// any role. Remaining eligible players form the bench in roster order.
pub fn build_team_sheet(roster: &TeamRoster) -> Result<TeamSheet, RosterError> {
    let eligible: Vec<_> = roster.players.iter().filter(|p| p.is_eligible()).collect();
    if eligible.len() < FORMATION_SIZE {
        return Err(RosterError {
            eligible: eligible.len(),
            required: FORMATION_SIZE,
        });
    }

    let mut used = vec![false; eligible.len()];
    let mut slots: [Option<usize>; FORMATION_SIZE] = [None; FORMATION_SIZE];

    for (slot_idx, slot) in FORMATION_SLOTS.iter().enumerate() {
        slots[slot_idx] = best_unused(&eligible, &used, |p| {
            (p.role == *slot).then(|| p.attributes.fit_for(*slot))
        });
        if let Some(i) = slots[slot_idx] {
            used[i] = true;
        }
    }

    for (slot_idx, slot) in FORMATION_SLOTS.iter().enumerate() {
        if slots[slot_idx].is_some() {
            continue;
        }
        slots[slot_idx] = best_unused(&eligible, &used, |p| Some(p.attributes.fit_for(*slot)));
        if let Some(i) = slots[slot_idx] {
            used[i] = true;
        }
    }

    let players = FORMATION_SLOTS
        .iter()
        .zip(slots.iter())
        .filter_map(|(slot, idx)| idx.map(|i| FieldPlayer::from_roster(eligible[i], *slot)))
        .collect();

    let bench = eligible
        .iter()
        .enumerate()
        .filter(|(i, _)| !used[*i])
        .map(|(_, p)| FieldPlayer::from_roster(p, p.role))
        .collect();

    Ok(TeamSheet {
        team_id: roster.team_id,
        name: roster.name.clone(),
        formation: Formation::new(players),
        bench,
    })
}

/// Index of the unused player with the highest score; earlier roster
/// entries win ties.
fn best_unused<P>(
    eligible: &[&RosterPlayer],
    used: &[bool],
    score: P,
) -> Option<usize>
where
    P: Fn(&RosterPlayer) -> Option<u16>,
{
    let mut best: Option<(usize, u16)> = None;
    for (i, p) in eligible.iter().enumerate() {
        if used[i] {
            continue;
        }
        if let Some(s) = score(*p) {
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((i, s));
            }
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attributes, PlayerId, Role, TeamId};
    use uuid::Uuid;

    fn rp(role: Role, rating: u8) -> RosterPlayer {
        RosterPlayer {
            id: PlayerId::new(Uuid::new_v4()),
            name: format!("{}-{}", role, rating),
            role,
            attributes: Attributes::new(rating, rating, rating, rating),
            endurance: 100,
            retired: false,
        }
    }

    fn roster(players: Vec<RosterPlayer>) -> TeamRoster {
        TeamRoster {
            team_id: TeamId::new(Uuid::new_v4()),
            name: "Testers".to_string(),
            players,
        }
    }

    #[test]
    fn test_standard_roster_fills_every_slot_by_role() {
        let r = roster(vec![
            rp(Role::Passer, 70),
            rp(Role::Runner, 60),
            rp(Role::Runner, 65),
            rp(Role::Blocker, 80),
            rp(Role::Blocker, 75),
            rp(Role::Wildcard, 50),
        ]);
        let sheet = build_team_sheet(&r).unwrap();
        let slots: Vec<Role> = sheet.formation.players.iter().map(|p| p.slot).collect();
        assert_eq!(slots, FORMATION_SLOTS.to_vec());
        for p in &sheet.formation.players {
            assert_eq!(p.role, p.slot);
        }
        assert!(sheet.bench.is_empty());
    }

    #[test]
    fn test_best_player_starts_and_rest_go_to_bench() {
        let weak = rp(Role::Passer, 30);
        let strong = rp(Role::Passer, 90);
        let r = roster(vec![
            weak.clone(),
            strong.clone(),
            rp(Role::Runner, 60),
            rp(Role::Runner, 60),
            rp(Role::Blocker, 60),
            rp(Role::Blocker, 60),
            rp(Role::Wildcard, 60),
        ]);
        let sheet = build_team_sheet(&r).unwrap();
        assert_eq!(sheet.formation.players[0].id, strong.id);
        assert_eq!(sheet.bench.len(), 1);
        assert_eq!(sheet.bench[0].id, weak.id);
    }

    #[test]
    fn test_missing_roles_are_filled_from_other_roles() {
        let r = roster((0..6).map(|i| rp(Role::Blocker, 50 + i)).collect());
        let sheet = build_team_sheet(&r).unwrap();
        assert_eq!(sheet.formation.players.len(), FORMATION_SIZE);
        assert_eq!(sheet.formation.players[0].slot, Role::Passer);
        assert_eq!(sheet.formation.players[0].role, Role::Blocker);
    }

    #[test]
    fn test_retired_players_do_not_count() {
        let mut players: Vec<_> = (0..6).map(|_| rp(Role::Runner, 50)).collect();
        players[0].retired = true;
        let err = build_team_sheet(&roster(players)).unwrap_err();
        assert_eq!(
            err,
            RosterError {
                eligible: 5,
                required: 6
            }
        );
    }
}
