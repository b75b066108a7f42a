//! `MatchHub`: the shared room registry and its builder.
//!
//! The hub is the entry point for everything that isn't scoped to one
//! room: creating rooms, joining, leaving, listing. It wraps a
//! [`RoomManager`] in a `Mutex`, and is meant to be shared as
//! `Arc<MatchHub>` between clients.

use std::marker::PhantomData;

use beatroom_protocol::{NewPlaylistItem, RoomId, RoomSettings, UserId};
use beatroom_room::{
    JoinedRoom, RoomConfig, RoomHandle, RoomInfo, RoomManager, RulesetCatalog, StandardRulesets,
};
use tokio::sync::Mutex;

use crate::BeatroomError;

/// Builder for a [`MatchHub`].
///
/// # Example
///
/// ```rust
/// use beatroom::prelude::*;
///
/// let hub = MatchHub::builder()
///     .room_config(RoomConfig {
///         max_users: 8,
///         ..RoomConfig::default()
///     })
///     .build();
/// ```
pub struct MatchHubBuilder {
    room_config: RoomConfig,
}

impl MatchHubBuilder {
    pub fn new() -> Self {
        Self {
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the limits applied to every room.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Builds a hub validating rooms against [`StandardRulesets`].
    pub fn build(self) -> MatchHub {
        self.build_with()
    }

    /// Builds a hub validating rooms against a custom catalog.
    pub fn build_with<R: RulesetCatalog>(self) -> MatchHub<R> {
        let rooms = RoomManager::with_config(self.room_config);
        let config = rooms.config();
        tracing::debug!(
            max_users = config.max_users,
            max_items_per_user = config.max_items_per_user,
            channel_size = config.channel_size,
            "match hub built"
        );
        MatchHub {
            rooms: Mutex::new(rooms),
            _catalog: PhantomData,
        }
    }
}

impl Default for MatchHubBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of all open rooms.
pub struct MatchHub<R: RulesetCatalog = StandardRulesets> {
    rooms: Mutex<RoomManager<R>>,
    _catalog: PhantomData<R>,
}

impl MatchHub {
    pub fn builder() -> MatchHubBuilder {
        MatchHubBuilder::new()
    }

    /// A hub with default room limits.
    pub fn new() -> Self {
        MatchHubBuilder::new().build()
    }
}

impl Default for MatchHub {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RulesetCatalog> MatchHub<R> {
    /// Opens a room hosted by `host`.
    pub async fn create_room(
        &self,
        host: UserId,
        settings: RoomSettings,
        playlist: Vec<NewPlaylistItem>,
    ) -> Result<JoinedRoom, BeatroomError> {
        let mut rooms = self.rooms.lock().await;
        Ok(rooms.create_room(host, settings, playlist)?)
    }

    pub async fn join_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
        password: Option<String>,
    ) -> Result<JoinedRoom, BeatroomError> {
        let mut rooms = self.rooms.lock().await;
        Ok(rooms.join_room(user_id, room_id, password).await?)
    }

    pub async fn leave_room(&self, user_id: UserId) -> Result<(), BeatroomError> {
        let mut rooms = self.rooms.lock().await;
        Ok(rooms.leave_room(user_id).await?)
    }

    pub async fn kick_user(&self, requester: UserId, target: UserId) -> Result<(), BeatroomError> {
        let mut rooms = self.rooms.lock().await;
        Ok(rooms.kick_user(requester, target).await?)
    }

    /// Returns a handle to a room. The lock is released before returning,
    /// so callers can talk to the room without blocking the hub.
    pub async fn room(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.lock().await.room(room_id)
    }

    pub async fn user_room(&self, user_id: UserId) -> Option<RoomId> {
        self.rooms.lock().await.user_room(user_id)
    }

    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        self.rooms.lock().await.list_rooms().await
    }

    pub async fn destroy_room(&self, room_id: RoomId) -> Result<(), BeatroomError> {
        let mut rooms = self.rooms.lock().await;
        Ok(rooms.destroy_room(room_id).await?)
    }

    /// The limits applied to every room this hub opens.
    pub async fn room_config(&self) -> RoomConfig {
        self.rooms.lock().await.config().clone()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.room_count()
    }
}
