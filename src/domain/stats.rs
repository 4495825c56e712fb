//! Per-player and per-team counters.
//!
//! Delta records reuse the counter types: applying a delta adds every field.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub passes_attempted: u32,
    pub passes_completed: u32,
    pub receptions: u32,
    pub rushes: u32,
    pub yards: u32,
    pub tackles: u32,
    pub scores: u32,
    pub points: u32,
    pub turnovers_forced: u32,
    pub injuries: u32,
}

impl PlayerStats {
    pub fn absorb(&mut self, delta: &PlayerStats) {
        self.passes_attempted += delta.passes_attempted;
        self.passes_completed += delta.passes_completed;
        self.receptions += delta.receptions;
        self.rushes += delta.rushes;
        self.yards += delta.yards;
        self.tackles += delta.tackles;
        self.scores += delta.scores;
        self.points += delta.points;
        self.turnovers_forced += delta.turnovers_forced;
        self.injuries += delta.injuries;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStats {
    pub plays: u32,
    pub passes: u32,
    pub rushes: u32,
    pub yards: u32,
    pub tackles: u32,
    pub turnovers: u32,
    pub injuries: u32,
    pub scores: u32,
    pub points: u32,
}

impl TeamStats {
    pub fn absorb(&mut self, delta: &TeamStats) {
        self.plays += delta.plays;
        self.passes += delta.passes;
        self.rushes += delta.rushes;
        self.yards += delta.yards;
        self.tackles += delta.tackles;
        self.turnovers += delta.turnovers;
        self.injuries += delta.injuries;
        self.scores += delta.scores;
        self.points += delta.points;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_absorb_adds_fields() {
        let mut stats = PlayerStats {
            yards: 10,
            ..Default::default()
        };
        stats.absorb(&PlayerStats {
            yards: 5,
            rushes: 1,
            ..Default::default()
        });
        assert_eq!(stats.yards, 15);
        assert_eq!(stats.rushes, 1);
    }

    #[test]
    fn test_team_absorb_adds_fields() {
        let mut stats = TeamStats::default();
        stats.absorb(&TeamStats {
            points: 3,
            scores: 1,
            ..Default::default()
        });
        stats.absorb(&TeamStats {
            points: 2,
            scores: 1,
            ..Default::default()
        });
        assert_eq!(stats.points, 5);
        assert_eq!(stats.scores, 2);
    }
}
