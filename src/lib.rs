pub mod api;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod persistence;

#[cfg(test)]
mod test_support;

pub use broadcast::{ChannelSubscriber, EventBroadcaster, FeedMessage, Subscriber, SubscriptionId};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{MatchEvent, MatchId, MatchState, MatchStatus, Money, Side, TeamRoster};
pub use error::{AppError, MatchError};
pub use orchestration::{ControlCommand, ControlPlane, CreateMatch, MatchRegistry};
pub use persistence::{FinalMatchRecord, MatchStore, MockMatchStore, StoreError};
