//! Per-match authorization for control routes.

use crate::domain::MatchId;
use crate::orchestration::ControlCommand;
use axum::http::HeaderMap;
use std::fmt;

/// Header naming the caller issuing a control command.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Decides whether an actor may issue a command against a match. Runs
/// before the command reaches the control plane.
pub trait Authorizer: Send + Sync + fmt::Debug {
    fn authorize(&self, actor: Option<&str>, match_id: MatchId, command: &ControlCommand) -> bool;
}

/// Accepts every command, with or without an actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(
        &self,
        _actor: Option<&str>,
        _match_id: MatchId,
        _command: &ControlCommand,
    ) -> bool {
        true
    }
}

pub(crate) fn actor(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_actor_header_is_trimmed() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor(&headers), None);

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("  coach-7 "));
        assert_eq!(actor(&headers), Some("coach-7"));

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("   "));
        assert_eq!(actor(&headers), None);
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.authorize(None, MatchId::new(), &ControlCommand::Stop));
    }
}
