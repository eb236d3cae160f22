//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelConfig;

/// Settings for one sharing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Secure-channel tunables.
    pub channel: ChannelConfig,

    /// Optional auto-expiry: once elapsed, the channel is closed and the
    /// shared key dropped. No automatic reconnect; restarting is a fresh
    /// bootstrap with new keys. `None` (the default) keeps the session
    /// open until disconnect.
    pub session_time_limit: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            session_time_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_time_limit() {
        let config = SessionConfig::default();
        assert!(config.session_time_limit.is_none());
        assert_eq!(config.channel, ChannelConfig::default());
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = SessionConfig {
            channel: ChannelConfig {
                auth_failure_alert_threshold: 5,
                event_buffer: 8,
            },
            session_time_limit: Some(Duration::from_secs(3600)),
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
