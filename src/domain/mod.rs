//! Domain types for the live match engine.
//!
//! This module provides:
//! - Canonical ids: MatchId, TeamId, PlayerId, EventId
//! - Roster snapshots and the match-local field players built from them
//! - Lossless currency via the Money wrapper
//! - MatchEvent, RevenueSnapshot and the bounded histories holding them
//! - MatchState and its status state machine

pub mod event;
pub mod facility;
pub mod history;
pub mod money;
pub mod primitives;
pub mod revenue;
pub mod roster;
pub mod state;
pub mod stats;

pub use event::{EventKind, MatchEvent, Priority};
pub use facility::FacilityLevels;
pub use history::{BoundedHistory, HistoryOrder};
pub use money::Money;
pub use primitives::{EventId, MatchId, PlayerId, Side, TeamId};
pub use revenue::RevenueSnapshot;
pub use roster::{
    Attributes, FieldPlayer, Formation, Role, RosterPlayer, TeamRoster, TeamSheet, FORMATION_SIZE,
    FORMATION_SLOTS,
};
pub use state::{MatchParams, MatchState, MatchStatus, TransitionError};
pub use stats::{PlayerStats, TeamStats};
