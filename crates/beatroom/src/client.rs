//! `MultiplayerClient`: one user's view of the room they are in.
//!
//! The client keeps a local copy of the room ([`RoomSnapshot`]) and keeps
//! it current by replaying the updates the room pushes. Every request
//! method waits for the room's reply and then catches up, so after a
//! successful call [`room`](MultiplayerClient::room) already reflects the
//! change.

use std::sync::Arc;

use beatroom_protocol::{
    ApiMod, MultiplayerUserState, NewPlaylistItem, PlaylistItemId, RoomId, RoomSettings,
    RoomSnapshot, RoomUser, UserId,
};
use beatroom_room::{
    JoinedRoom, RoomError, RoomHandle, RulesetCatalog, StandardRulesets, UpdateReceiver,
};
use tokio::sync::mpsc::error::TryRecvError;

use crate::{BeatroomError, MatchHub};

/// The room a client is currently in.
struct Membership {
    handle: RoomHandle,
    room: RoomSnapshot,
    updates: UpdateReceiver,
}

pub struct MultiplayerClient<R: RulesetCatalog = StandardRulesets> {
    user_id: UserId,
    hub: Arc<MatchHub<R>>,
    membership: Option<Membership>,
}

impl<R: RulesetCatalog> MultiplayerClient<R> {
    /// A client for `user_id`, not yet in any room.
    pub fn new(user_id: UserId, hub: Arc<MatchHub<R>>) -> Self {
        Self {
            user_id,
            hub,
            membership: None,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The local copy of the current room, or `None` outside a room.
    pub fn room(&self) -> Option<&RoomSnapshot> {
        self.membership.as_ref().map(|m| &m.room)
    }

    /// This client's own entry in the room.
    pub fn local_user(&self) -> Option<&RoomUser> {
        self.room()?.user(self.user_id)
    }

    pub fn is_host(&self) -> bool {
        self.room().is_some_and(|room| room.is_host(self.user_id))
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Opens a room with this client as host.
    pub async fn create_room(
        &mut self,
        settings: RoomSettings,
        playlist: Vec<NewPlaylistItem>,
    ) -> Result<RoomId, BeatroomError> {
        let joined = self
            .hub
            .create_room(self.user_id, settings, playlist)
            .await?;
        self.attach(joined).await
    }

    pub async fn join_room(
        &mut self,
        room_id: RoomId,
        password: Option<String>,
    ) -> Result<RoomId, BeatroomError> {
        let joined = self
            .hub
            .join_room(self.user_id, room_id, password)
            .await?;
        self.attach(joined).await
    }

    /// Leaves the current room and drops the local copy.
    ///
    /// If the hub no longer places this user in the room (it was
    /// destroyed, or the user was kicked or removed), only the local copy
    /// is dropped.
    pub async fn leave_room(&mut self) -> Result<(), BeatroomError> {
        let room_id = self.membership()?.room.room_id;
        if self.hub.user_room(self.user_id).await == Some(room_id) {
            self.hub.leave_room(self.user_id).await?;
        } else {
            tracing::debug!(user_id = %self.user_id, %room_id, "room already left");
        }
        self.membership = None;
        Ok(())
    }

    /// Puts another user into this client's room, as if they had joined
    /// themselves with the room's password.
    pub async fn add_user(&mut self, user_id: UserId) -> Result<(), BeatroomError> {
        let membership = self.membership()?;
        let room_id = membership.room.room_id;
        let password = membership.room.settings.password.clone();
        // Their own update stream is not needed here.
        let _ = self.hub.join_room(user_id, room_id, password).await?;
        self.sync()
    }

    /// Takes a user out of this client's room. Removing the local user is
    /// the same as [`leave_room`](Self::leave_room).
    pub async fn remove_user(&mut self, user_id: UserId) -> Result<(), BeatroomError> {
        if user_id == self.user_id {
            return self.leave_room().await;
        }
        self.membership()?;
        self.hub.leave_room(user_id).await?;
        self.sync()
    }

    pub async fn kick_user(&mut self, target: UserId) -> Result<(), BeatroomError> {
        self.membership()?;
        self.hub.kick_user(self.user_id, target).await?;
        self.sync()
    }

    pub async fn transfer_host(&mut self, target: UserId) -> Result<(), BeatroomError> {
        let user_id = self.user_id;
        self.handle()?.transfer_host(user_id, target).await?;
        self.sync()
    }

    pub async fn change_settings(&mut self, settings: RoomSettings) -> Result<(), BeatroomError> {
        let user_id = self.user_id;
        self.handle()?.change_settings(user_id, settings).await?;
        self.sync()
    }

    // -----------------------------------------------------------------
    // States
    // -----------------------------------------------------------------

    /// Changes this client's own state.
    pub async fn change_state(&mut self, state: MultiplayerUserState) -> Result<(), BeatroomError> {
        self.change_user_state(self.user_id, state).await
    }

    /// Changes any participant's state.
    pub async fn change_user_state(
        &mut self,
        user_id: UserId,
        state: MultiplayerUserState,
    ) -> Result<(), BeatroomError> {
        self.handle()?.change_user_state(user_id, state).await?;
        self.sync()
    }

    /// Picks this client's free mods for the current item.
    pub async fn change_user_mods(&mut self, mods: Vec<ApiMod>) -> Result<(), BeatroomError> {
        let user_id = self.user_id;
        self.handle()?.change_user_mods(user_id, mods).await?;
        self.sync()
    }

    pub async fn start_match(&mut self) -> Result<(), BeatroomError> {
        let user_id = self.user_id;
        self.handle()?.start_match(user_id).await?;
        self.sync()
    }

    /// Aborts gameplay for the whole room. Returns `false` if nobody was
    /// playing.
    pub async fn abort_gameplay(&mut self) -> Result<bool, BeatroomError> {
        let aborted = self.handle()?.abort_gameplay().await?;
        self.sync()?;
        Ok(aborted)
    }

    // -----------------------------------------------------------------
    // Playlist
    // -----------------------------------------------------------------

    pub async fn add_playlist_item(
        &mut self,
        item: NewPlaylistItem,
    ) -> Result<PlaylistItemId, BeatroomError> {
        let user_id = self.user_id;
        let id = self.handle()?.add_playlist_item(user_id, item).await?;
        self.sync()?;
        Ok(id)
    }

    pub async fn remove_playlist_item(
        &mut self,
        item_id: PlaylistItemId,
    ) -> Result<(), BeatroomError> {
        let user_id = self.user_id;
        self.handle()?.remove_playlist_item(user_id, item_id).await?;
        self.sync()
    }

    // -----------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------

    /// Replays every update received so far onto the local copy.
    ///
    /// Changes made by other users show up here. Once the room has closed
    /// the local copy stays at its final state.
    ///
    /// # Errors
    /// [`BeatroomError::Protocol`] if an update doesn't fit the local copy.
    pub fn sync(&mut self) -> Result<(), BeatroomError> {
        let Some(membership) = self.membership.as_mut() else {
            return Ok(());
        };
        loop {
            match membership.updates.try_recv() {
                Ok(update) => membership.room.apply(&update)?,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }

    async fn attach(&mut self, joined: JoinedRoom) -> Result<RoomId, BeatroomError> {
        let room_id = joined.snapshot.room_id;
        let handle = self
            .hub
            .room(room_id)
            .await
            .ok_or(RoomError::NotFound(room_id))?;

        tracing::debug!(user_id = %self.user_id, %room_id, "client attached to room");
        self.membership = Some(Membership {
            handle,
            room: joined.snapshot,
            updates: joined.updates,
        });
        self.sync()?;
        Ok(room_id)
    }

    fn membership(&self) -> Result<&Membership, BeatroomError> {
        self.membership
            .as_ref()
            .ok_or(BeatroomError::NotInRoom(self.user_id))
    }

    fn handle(&self) -> Result<&RoomHandle, BeatroomError> {
        Ok(&self.membership()?.handle)
    }
}
