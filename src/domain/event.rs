//! Discrete match events.

use super::primitives::{EventId, PlayerId, Side};
use serde::{Deserialize, Serialize};

/// What happened on the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Advance,
    Pass,
    Run,
    Tackle,
    Score,
    Turnover,
    Injury,
    Kickoff,
    Halftime,
    SecondHalf,
    FullTime,
}

impl EventKind {
    /// The on-field action categories the step engine chooses between.
    pub const ACTIONS: [EventKind; 7] = [
        EventKind::Advance,
        EventKind::Pass,
        EventKind::Run,
        EventKind::Tackle,
        EventKind::Score,
        EventKind::Turnover,
        EventKind::Injury,
    ];

    pub fn default_priority(&self) -> Priority {
        match self {
            EventKind::Advance => Priority::Low,
            EventKind::Pass | EventKind::Run | EventKind::Tackle => Priority::Normal,
            EventKind::Score
            | EventKind::Turnover
            | EventKind::Injury
            | EventKind::Kickoff
            | EventKind::Halftime
            | EventKind::SecondHalf
            | EventKind::FullTime => Priority::High,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Advance => "advance",
            EventKind::Pass => "pass",
            EventKind::Run => "run",
            EventKind::Tackle => "tackle",
            EventKind::Score => "score",
            EventKind::Turnover => "turnover",
            EventKind::Injury => "injury",
            EventKind::Kickoff => "kickoff",
            EventKind::Halftime => "halftime",
            EventKind::SecondHalf => "second_half",
            EventKind::FullTime => "full_time",
        };
        write!(f, "{}", s)
    }
}

/// Feed pacing tag. `High` events force an immediate full-state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Immutable record of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub id: EventId,
    /// Game time (seconds) when the event was created.
    pub timestamp: u32,
    pub tick: u64,
    pub kind: EventKind,
    pub description: String,
    pub priority: Priority,
    /// Ball position 0-100, measured from the acting side's own goal line.
    pub field_position: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_player: Option<PlayerId>,
    /// Points awarded; non-zero only on `Score` events.
    #[serde(default)]
    pub points: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities() {
        assert_eq!(EventKind::Advance.default_priority(), Priority::Low);
        assert_eq!(EventKind::Tackle.default_priority(), Priority::Normal);
        assert_eq!(EventKind::Score.default_priority(), Priority::High);
        assert!(Priority::High > Priority::Normal);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&EventKind::FullTime).unwrap();
        assert_eq!(json, "\"full_time\"");
        assert_eq!(EventKind::SecondHalf.to_string(), "second_half");
    }
}
