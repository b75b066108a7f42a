//! Room limits.

use serde::{Deserialize, Serialize};

/// Limits applied to every room a [`RoomManager`](crate::RoomManager)
/// creates.
///
/// These are server-side knobs, unlike [`RoomSettings`], which the host
/// edits.
///
/// [`RoomSettings`]: beatroom_protocol::RoomSettings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum participants (spectators included).
    pub max_users: usize,

    /// Maximum non-expired playlist items one user may queue in
    /// `AllPlayers` mode.
    pub max_items_per_user: usize,

    /// Capacity of each room actor's command channel. Senders wait when
    /// it fills up.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_users: 16,
            max_items_per_user: 3,
            channel_size: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.max_users, 16);
        assert_eq!(config.max_items_per_user, 3);
        assert_eq!(config.channel_size, 64);
    }
}
