//! Roster snapshots supplied at match creation and the on-field copies the
//! engine mutates during play.

use super::primitives::{PlayerId, TeamId};
use serde::{Deserialize, Serialize};

/// Number of on-field slots per side.
pub const FORMATION_SIZE: usize = 6;

/// Slot order of a formation: one passer, two runners, two blockers, one wildcard.
pub const FORMATION_SLOTS: [Role; FORMATION_SIZE] = [
    Role::Passer,
    Role::Runner,
    Role::Runner,
    Role::Blocker,
    Role::Blocker,
    Role::Wildcard,
];

/// On-field role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passer,
    Runner,
    Blocker,
    Wildcard,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Passer => write!(f, "passer"),
            Role::Runner => write!(f, "runner"),
            Role::Blocker => write!(f, "blocker"),
            Role::Wildcard => write!(f, "wildcard"),
        }
    }
}

/// Player ratings on a 0-100 scale. Deserialized ratings are clamped the
/// same way as [`Attributes::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawAttributes")]
pub struct Attributes {
    pub speed: u8,
    pub strength: u8,
    pub skill: u8,
    pub passing: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttributes {
    speed: u8,
    strength: u8,
    skill: u8,
    passing: u8,
}

impl From<RawAttributes> for Attributes {
    fn from(raw: RawAttributes) -> Self {
        Self::new(raw.speed, raw.strength, raw.skill, raw.passing)
    }
}

impl Attributes {
    pub fn new(speed: u8, strength: u8, skill: u8, passing: u8) -> Self {
        Self {
            speed: speed.min(100),
            strength: strength.min(100),
            skill: skill.min(100),
            passing: passing.min(100),
        }
    }

    pub fn clamped(self) -> Self {
        Self::new(self.speed, self.strength, self.skill, self.passing)
    }

    /// Unweighted mean of all ratings.
    pub fn overall(&self) -> u8 {
        let sum = self.speed as u16 + self.strength as u16 + self.skill as u16 + self.passing as u16;
        (sum / 4) as u8
    }

    /// How well these ratings suit a slot.
    pub fn fit_for(&self, role: Role) -> u16 {
        match role {
            Role::Passer => self.passing as u16 * 2 + self.skill as u16,
            Role::Runner => self.speed as u16 * 2 + self.skill as u16,
            Role::Blocker => self.strength as u16 * 2 + self.speed as u16,
            Role::Wildcard => self.overall() as u16 * 3,
        }
    }
}

/// A player as supplied by the external roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterPlayer {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    pub attributes: Attributes,
    /// Maximum stamina (0-100); the match starts every player at this value.
    #[serde(default = "default_endurance")]
    pub endurance: u8,
    #[serde(default)]
    pub retired: bool,
}

fn default_endurance() -> u8 {
    100
}

impl RosterPlayer {
    /// Whether the player may take the field.
    pub fn is_eligible(&self) -> bool {
        !self.retired
    }
}

/// Ordered team roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRoster {
    pub team_id: TeamId,
    pub name: String,
    pub players: Vec<RosterPlayer>,
}

/// A match-local copy of a player. Nothing here is written back to the
/// player record; only the aggregated stats leave the match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPlayer {
    pub id: PlayerId,
    pub name: String,
    /// Natural role from the roster.
    pub role: Role,
    /// Slot the player currently fills.
    pub slot: Role,
    pub attributes: Attributes,
    pub stamina: f32,
    pub injured: bool,
}

impl FieldPlayer {
    pub fn from_roster(player: &RosterPlayer, slot: Role) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            role: player.role,
            slot,
            // struct literals can bypass `Attributes::new`
            attributes: player.attributes.clamped(),
            stamina: player.endurance.min(100) as f32,
            injured: false,
        }
    }

    /// A rating scaled down by fatigue: a drained player plays at half strength.
    pub fn effective(&self, rating: u8) -> f32 {
        let stamina = self.stamina.clamp(0.0, 100.0);
        rating as f32 * (0.5 + 0.5 * stamina / 100.0)
    }

    pub fn impact(&self) -> u16 {
        self.attributes.fit_for(self.slot)
    }
}

/// The six on-field players of one side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Formation {
    pub players: Vec<FieldPlayer>,
}

impl Formation {
    pub fn new(players: Vec<FieldPlayer>) -> Self {
        Self { players }
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Healthy players currently filling `slot`.
    pub fn in_slot(&self, slot: Role) -> impl Iterator<Item = &FieldPlayer> {
        self.players
            .iter()
            .filter(move |p| p.slot == slot && !p.injured)
    }

    pub fn least_impactful(&self) -> Option<&FieldPlayer> {
        self.players
            .iter()
            .filter(|p| !p.injured)
            .min_by_key(|p| (p.impact(), p.id))
    }

    pub fn get(&self, id: &PlayerId) -> Option<&FieldPlayer> {
        self.players.iter().find(|p| p.id == *id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut FieldPlayer> {
        self.players.iter_mut().find(|p| p.id == *id)
    }

    /// Mean effective rating of a slot group, 0 when the group is empty.
    pub fn mean_effective(&self, slot: Role, rating: impl Fn(&Attributes) -> u8) -> f32 {
        let (sum, n) = self
            .in_slot(slot)
            .fold((0.0f32, 0u32), |(s, n), p| (s + p.effective(rating(&p.attributes)), n + 1));
        if n == 0 {
            0.0
        } else {
            sum / n as f32
        }
    }
}

/// One side's formation plus its available substitutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSheet {
    pub team_id: TeamId,
    pub name: String,
    pub formation: Formation,
    pub bench: Vec<FieldPlayer>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn player(slot: Role, attrs: Attributes) -> FieldPlayer {
        FieldPlayer {
            id: PlayerId::new(Uuid::new_v4()),
            name: "p".to_string(),
            role: slot,
            slot,
            attributes: attrs,
            stamina: 100.0,
            injured: false,
        }
    }

    #[test]
    fn test_attributes_clamped() {
        let a = Attributes::new(150, 20, 30, 40);
        assert_eq!(a.speed, 100);
    }

    #[test]
    fn test_effective_rating_halves_when_exhausted() {
        let mut p = player(Role::Runner, Attributes::new(80, 50, 50, 50));
        assert_eq!(p.effective(80), 80.0);
        p.stamina = 0.0;
        assert_eq!(p.effective(80), 40.0);
    }

    #[test]
    fn test_deserialized_ratings_are_clamped() {
        let a: Attributes = serde_json::from_str(
            r#"{"speed": 255, "strength": 101, "skill": 100, "passing": 7}"#,
        )
        .unwrap();
        assert_eq!(a, Attributes::new(100, 100, 100, 7));
    }

    #[test]
    fn test_field_copy_clamps_literal_ratings() {
        let raw = RosterPlayer {
            id: PlayerId::new(Uuid::new_v4()),
            name: "p".to_string(),
            role: Role::Runner,
            attributes: Attributes {
                speed: 250,
                strength: 40,
                skill: 140,
                passing: 60,
            },
            endurance: 100,
            retired: false,
        };
        let fielded = FieldPlayer::from_roster(&raw, Role::Runner);
        assert_eq!(fielded.attributes, Attributes::new(100, 40, 100, 60));
    }

    #[test]
    fn test_least_impactful_skips_injured() {
        let mut weak = player(Role::Blocker, Attributes::new(10, 10, 10, 10));
        weak.injured = true;
        let strong = player(Role::Blocker, Attributes::new(90, 90, 90, 90));
        let middling = player(Role::Runner, Attributes::new(40, 40, 40, 40));
        let formation = Formation::new(vec![weak, strong, middling.clone()]);

        assert_eq!(formation.least_impactful().unwrap().id, middling.id);
        assert_eq!(formation.in_slot(Role::Blocker).count(), 1);
    }

    #[test]
    fn test_empty_formation_has_no_player() {
        let formation = Formation::default();
        assert!(formation.least_impactful().is_none());
        assert_eq!(formation.mean_effective(Role::Blocker, |a| a.strength), 0.0);
    }
}
