//! Commands against a running match.
//!
//! Whoever calls in here has already been authorized for the match.

use super::registry::MatchRegistry;
use super::scheduler::Command;
use crate::domain::MatchId;
use crate::error::MatchError;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ControlCommand {
    Pause,
    Resume,
    SetSpeed {
        multiplier: f64,
    },
    #[serde(rename_all = "camelCase")]
    Seek {
        target_second: u32,
    },
    Stop,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::SetSpeed { .. } => "setSpeed",
            ControlCommand::Seek { .. } => "seek",
            ControlCommand::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlPlane {
    registry: MatchRegistry,
}

impl ControlPlane {
    pub fn new(registry: MatchRegistry) -> Self {
        Self { registry }
    }

    /// Live -> paused. Game time stays where it is.
    pub async fn pause(&self, match_id: MatchId) -> Result<(), MatchError> {
        self.registry.request(match_id, Command::Pause).await?
    }

    /// Paused -> live, continuing from the stored game time.
    pub async fn resume(&self, match_id: MatchId) -> Result<(), MatchError> {
        self.registry.request(match_id, Command::Resume).await?
    }

    pub async fn set_speed(&self, match_id: MatchId, multiplier: f64) -> Result<(), MatchError> {
        self.registry
            .request(match_id, |reply| Command::SetSpeed(multiplier, reply))
            .await?
    }

    pub async fn seek(&self, match_id: MatchId, target_second: u32) -> Result<(), MatchError> {
        self.registry
            .request(match_id, |reply| Command::Seek(target_second, reply))
            .await?
    }

    pub async fn stop(&self, match_id: MatchId) -> Result<(), MatchError> {
        self.registry.stop(match_id).await
    }

    pub async fn execute(
        &self,
        match_id: MatchId,
        command: ControlCommand,
    ) -> Result<(), MatchError> {
        debug!(match_id = %match_id, command = command.name(), "control command");
        match command {
            ControlCommand::Pause => self.pause(match_id).await,
            ControlCommand::Resume => self.resume(match_id).await,
            ControlCommand::SetSpeed { multiplier } => self.set_speed(match_id, multiplier).await,
            ControlCommand::Seek { target_second } => self.seek(match_id, target_second).await,
            ControlCommand::Stop => self.stop(match_id).await,
        }
    }
}
