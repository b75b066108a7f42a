//! Room manager: creates rooms, tracks them, and routes users to them.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use beatroom_protocol::{NewPlaylistItem, RoomId, RoomSettings, UserId};

use crate::room::spawn_room;
use crate::{
    JoinedRoom, RoomConfig, RoomController, RoomError, RoomHandle, RoomInfo, RulesetCatalog,
    StandardRulesets,
};

/// Counter for generating unique room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Manages all open rooms and tracks which user is in which room.
///
/// A user can be in at most one room at a time. Membership therefore goes
/// through the manager; per-room operations go through the
/// [`RoomHandle`] returned by [`room`](Self::room).
pub struct RoomManager<R: RulesetCatalog = StandardRulesets> {
    config: RoomConfig,
    rooms: HashMap<RoomId, RoomHandle>,
    user_rooms: HashMap<UserId, RoomId>,
    _catalog: PhantomData<R>,
}

impl<R: RulesetCatalog> RoomManager<R> {
    pub fn new() -> Self {
        Self::with_config(RoomConfig::default())
    }

    pub fn with_config(config: RoomConfig) -> Self {
        Self {
            config,
            rooms: HashMap::new(),
            user_rooms: HashMap::new(),
            _catalog: PhantomData,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Opens a room with `host` as its first participant.
    ///
    /// # Errors
    /// [`RoomError::AlreadyInRoom`] if the host is already in a room,
    /// [`RoomError::InvalidConfig`] if the configured channel size is zero,
    /// or whatever [`RoomController::new`] rejects the playlist with.
    pub fn create_room(
        &mut self,
        host: UserId,
        settings: RoomSettings,
        playlist: Vec<NewPlaylistItem>,
    ) -> Result<JoinedRoom, RoomError> {
        self.ensure_free(host)?;
        if self.config.channel_size == 0 {
            return Err(RoomError::InvalidConfig(
                "channel_size must be at least 1".into(),
            ));
        }

        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let mut controller =
            RoomController::<R>::new(room_id, host, settings, playlist, self.config.clone())?;
        let (snapshot, updates) = controller.subscribe_with_snapshot();

        let handle = spawn_room(controller, self.config.channel_size);
        self.rooms.insert(room_id, handle);
        self.user_rooms.insert(host, room_id);
        Ok(JoinedRoom { snapshot, updates })
    }

    /// Adds a user to a room.
    pub async fn join_room(
        &mut self,
        user_id: UserId,
        room_id: RoomId,
        password: Option<String>,
    ) -> Result<JoinedRoom, RoomError> {
        self.ensure_free(user_id)?;
        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        let joined = handle.join(user_id, password).await?;
        self.user_rooms.insert(user_id, room_id);
        Ok(joined)
    }

    /// Removes a user from their current room. A room whose last user
    /// left is closed and forgotten.
    pub async fn leave_room(&mut self, user_id: UserId) -> Result<(), RoomError> {
        let room_id = self.current_room(user_id)?;

        if let Some(handle) = self.rooms.get(&room_id) {
            let state = handle.leave(user_id).await?;
            if state.is_closed() {
                self.rooms.remove(&room_id);
                tracing::info!(%room_id, "empty room removed");
            }
        }

        self.user_rooms.remove(&user_id);
        Ok(())
    }

    /// Removes `target` from `requester`'s room. Host only.
    pub async fn kick_user(&mut self, requester: UserId, target: UserId) -> Result<(), RoomError> {
        let room_id = self.current_room(requester)?;
        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        handle.kick(requester, target).await?;
        self.user_rooms.remove(&target);
        Ok(())
    }

    /// Returns a handle to a room.
    pub fn room(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.get(&room_id).cloned()
    }

    /// Returns the room a user is currently in, if any.
    pub fn user_room(&self, user_id: UserId) -> Option<RoomId> {
        self.user_rooms.get(&user_id).copied()
    }

    pub async fn get_room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        handle.get_info().await
    }

    /// Lists open rooms, ordered by ID.
    ///
    /// Rooms that fail to respond (e.g. shutting down) are skipped.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(info) = handle.get_info().await {
                if !info.state.is_closed() {
                    infos.push(info);
                }
            }
        }
        infos.sort_by_key(|info| info.room_id);
        infos
    }

    /// Closes a room and removes all its users from the index.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        let _ = handle.shutdown().await;
        self.user_rooms.retain(|_, rid| *rid != room_id);

        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn ensure_free(&self, user_id: UserId) -> Result<(), RoomError> {
        match self.user_rooms.get(&user_id) {
            Some(current) => Err(RoomError::AlreadyInRoom(user_id, *current)),
            None => Ok(()),
        }
    }

    fn current_room(&self, user_id: UserId) -> Result<RoomId, RoomError> {
        self.user_rooms.get(&user_id).copied().ok_or_else(|| {
            RoomError::InvalidState(format!("user {user_id} is not in any room"))
        })
    }
}

impl<R: RulesetCatalog> Default for RoomManager<R> {
    fn default() -> Self {
        Self::new()
    }
}
