//! Session thresholds and state classification.
//!
//! A conversation's state is a pure function of its message count:
//!
//! - NORMAL:   `count < soft`
//! - WARNING:  `soft <= count < hard`
//! - CRITICAL: `count >= hard`
//!
//! where `hard = max_messages` and `soft = floor(max_messages * warning_ratio)`.

use memora_types::config::SessionConfig;
use memora_types::conversation::SessionState;
use serde::Serialize;
use uuid::Uuid;

/// The soft/hard message-count pair a governor enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionThresholds {
    soft: u32,
    hard: u32,
}

impl SessionThresholds {
    /// Thresholds from raw settings. Invalid settings fall back to the defaults.
    pub fn new(max_messages: u32, warning_ratio: f64) -> Self {
        let config = SessionConfig {
            max_messages,
            warning_ratio,
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let config = if config.is_valid() {
            config.clone()
        } else {
            tracing::warn!(
                max_messages = config.max_messages,
                warning_ratio = config.warning_ratio,
                "Invalid session thresholds; using defaults"
            );
            SessionConfig::default()
        };
        let hard = config.max_messages;
        // Nudge before flooring so 100 * 0.29 lands on 29, not 28.
        let soft = ((hard as f64) * config.warning_ratio + 1e-9).floor() as u32;
        Self {
            soft: soft.min(hard),
            hard,
        }
    }

    pub fn soft(&self) -> u32 {
        self.soft
    }

    pub fn hard(&self) -> u32 {
        self.hard
    }

    pub fn classify(&self, message_count: u32) -> SessionState {
        if message_count >= self.hard {
            SessionState::Critical
        } else if message_count >= self.soft {
            SessionState::Warning
        } else {
            SessionState::Normal
        }
    }
}

impl Default for SessionThresholds {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Point-in-time view of one conversation against its thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub conversation_id: Uuid,
    pub state: SessionState,
    pub message_count: u32,
    pub soft_threshold: u32,
    pub hard_threshold: u32,
    /// Sends left before the next one rolls over.
    pub remaining: u32,
    pub superseded_by: Option<Uuid>,
}

impl SessionStatus {
    pub fn new(
        thresholds: &SessionThresholds,
        conversation_id: Uuid,
        message_count: u32,
        superseded_by: Option<Uuid>,
    ) -> Self {
        Self {
            conversation_id,
            state: thresholds.classify(message_count),
            message_count,
            soft_threshold: thresholds.soft(),
            hard_threshold: thresholds.hard(),
            remaining: thresholds.hard().saturating_sub(message_count),
            superseded_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pair_is_80_100() {
        let t = SessionThresholds::default();
        assert_eq!((t.soft(), t.hard()), (80, 100));
    }

    #[test]
    fn test_boundaries() {
        let t = SessionThresholds::default();
        assert_eq!(t.classify(0), SessionState::Normal);
        assert_eq!(t.classify(79), SessionState::Normal);
        assert_eq!(t.classify(80), SessionState::Warning);
        assert_eq!(t.classify(99), SessionState::Warning);
        assert_eq!(t.classify(100), SessionState::Critical);
        assert_eq!(t.classify(250), SessionState::Critical);
    }

    #[test]
    fn test_soft_threshold_floors() {
        assert_eq!(SessionThresholds::new(10, 0.75).soft(), 7);
        assert_eq!(SessionThresholds::new(100, 0.29).soft(), 29);
        assert_eq!(SessionThresholds::new(3, 1.0).soft(), 3);
    }

    #[test]
    fn test_invalid_settings_fall_back() {
        assert_eq!(SessionThresholds::new(0, 0.8), SessionThresholds::default());
        assert_eq!(SessionThresholds::new(50, 1.5), SessionThresholds::default());
        assert_eq!(SessionThresholds::new(50, 0.0), SessionThresholds::default());
    }

    #[test]
    fn test_status_remaining() {
        let t = SessionThresholds::new(4, 0.5);
        let status = SessionStatus::new(&t, Uuid::nil(), 3, None);
        assert_eq!(status.state, SessionState::Warning);
        assert_eq!(status.remaining, 1);

        let status = SessionStatus::new(&t, Uuid::nil(), 6, None);
        assert_eq!(status.state, SessionState::Critical);
        assert_eq!(status.remaining, 0);
    }
}
