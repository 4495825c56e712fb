//! Pure match computation: formation selection, the per-second step, revenue,
//! commentary, and the synchronous runner that ties them to a `MatchState`.

use crate::domain::EventKind;
use thiserror::Error;

pub mod commentary;
pub mod formation;
pub mod revenue;
pub mod runner;
pub mod step;

pub use commentary::{CommentaryContext, CommentaryGenerator, Tone};
pub use formation::{build_team_sheet, RosterError};
pub use revenue::{RevenueAccumulator, RevenueRates};
pub use runner::{MatchRunner, RunnerSettings, TickReport};
pub use step::{SimulationStepEngine, StepOutcome};

/// A step that could not be applied. Caught at the tick boundary; the tick
/// still counts, the event is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("{0} event carried points")]
    ScoreWithoutScoringEvent(EventKind),
    #[error("step panicked: {0}")]
    Panicked(String),
}
