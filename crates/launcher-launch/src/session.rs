//! Game session tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Short-lived tokens handed to the game client for an online launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    /// Session token presented to the game services.
    #[serde(default)]
    pub session_token: String,
    /// Identity token for the player.
    #[serde(default)]
    pub identity_token: String,
    /// When both tokens expire.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// Whether the session is non-empty and unexpired.
    pub fn is_valid(&self) -> bool {
        if self.session_token.is_empty() || self.identity_token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => Utc::now() < expires_at,
            None => false,
        }
    }

    /// Whether the session expires within `margin`.
    pub fn needs_refresh(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + margin >= expires_at,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_in: Duration) -> GameSession {
        GameSession {
            session_token: "st".to_string(),
            identity_token: "it".to_string(),
            expires_at: Some(Utc::now() + expires_in),
        }
    }

    #[test]
    fn test_empty_session_is_invalid() {
        assert!(!GameSession::default().is_valid());
    }

    #[test]
    fn test_unexpired_session_is_valid() {
        assert!(session(Duration::hours(1)).is_valid());
        assert!(!session(Duration::hours(-1)).is_valid());
    }

    #[test]
    fn test_needs_refresh_with_margin() {
        let s = session(Duration::minutes(2));
        assert!(!s.needs_refresh(Duration::minutes(1)));
        assert!(s.needs_refresh(Duration::minutes(5)));
    }
}
