//! The room controller: the single mutator of one room.
//!
//! Every operation validates first and mutates second, so a rejected
//! request leaves the room untouched. Each change is pushed to observers
//! as a [`RoomUpdate`] before the method returns.
//!
//! After any change to user states the controller re-derives the room
//! state from the users (see [`RoomController::change_user_state`]).

use std::marker::PhantomData;

use beatroom_protocol::{
    ApiMod, MultiplayerRoomState, MultiplayerUserState, NewPlaylistItem, PlaylistItemId,
    QueueMode, RoomEvent, RoomId, RoomSettings, RoomSnapshot, RoomUpdate, RoomUser, UserId,
};
use tokio::sync::mpsc;

use crate::{Playlist, RoomConfig, RoomError, RulesetCatalog, StandardRulesets};

/// Sending half of an observer channel.
pub type UpdateSender = mpsc::UnboundedSender<RoomUpdate>;

/// Receiving half of an observer channel.
pub type UpdateReceiver = mpsc::UnboundedReceiver<RoomUpdate>;

/// State and rules of a single multiplayer room.
///
/// Not thread-safe on its own: it is owned by exactly one room actor
/// (see [`RoomHandle`](crate::RoomHandle)), which serializes all access.
/// Tests drive it directly.
pub struct RoomController<R: RulesetCatalog = StandardRulesets> {
    room_id: RoomId,
    state: MultiplayerRoomState,
    host: Option<UserId>,
    settings: RoomSettings,
    /// Participants in join order. The earliest remaining user inherits
    /// host when the host leaves.
    users: Vec<RoomUser>,
    playlist: Playlist,
    config: RoomConfig,
    /// Sequence number of the last emitted update.
    seq: u64,
    observers: Vec<UpdateSender>,
    _catalog: PhantomData<R>,
}

impl<R: RulesetCatalog> RoomController<R> {
    /// Creates a room with `host` as its first participant.
    ///
    /// # Errors
    /// - [`RoomError::EmptyPlaylist`] if `playlist` is empty
    /// - [`RoomError::InvalidPlaylistItem`] if any item fails validation
    pub fn new(
        room_id: RoomId,
        host: UserId,
        settings: RoomSettings,
        playlist: Vec<NewPlaylistItem>,
        config: RoomConfig,
    ) -> Result<Self, RoomError> {
        for item in &playlist {
            R::validate_item(item)?;
        }
        let playlist = Playlist::new(host, playlist)?;

        tracing::info!(%room_id, %host, items = playlist.len(), "room created");

        Ok(Self {
            room_id,
            state: MultiplayerRoomState::Idle,
            host: Some(host),
            settings,
            users: vec![RoomUser::new(host)],
            playlist,
            config,
            seq: 0,
            observers: Vec::new(),
            _catalog: PhantomData,
        })
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn state(&self) -> MultiplayerRoomState {
        self.state
    }

    pub fn host(&self) -> Option<UserId> {
        self.host
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn users(&self) -> &[RoomUser] {
        &self.users
    }

    pub fn user(&self, user_id: UserId) -> Option<&RoomUser> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// A full copy of the room as of the last emitted update.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id,
            state: self.state,
            host: self.host,
            settings: self.settings.clone(),
            users: self.users.clone(),
            playlist: self.playlist.items().to_vec(),
            current_item: self.playlist.current().id,
            seq: self.seq,
        }
    }

    /// Registers an observer. It receives every update emitted from now on.
    pub fn subscribe(&mut self) -> UpdateReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    /// Registers an observer and returns the snapshot its updates start
    /// from. Replaying every received update onto the snapshot keeps it
    /// identical to [`snapshot`](Self::snapshot).
    pub fn subscribe_with_snapshot(&mut self) -> (RoomSnapshot, UpdateReceiver) {
        (self.snapshot(), self.subscribe())
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Admits a user in state `Idle`. If the room has no host, the user
    /// becomes host.
    ///
    /// # Errors
    /// - [`RoomError::Closed`] if the room is closed
    /// - [`RoomError::DuplicateUser`] if the user is already present
    /// - [`RoomError::RoomFull`] at `RoomConfig::max_users`
    pub fn add_user(&mut self, user_id: UserId) -> Result<(), RoomError> {
        self.ensure_open()?;
        if self.user(user_id).is_some() {
            return Err(RoomError::DuplicateUser(user_id, self.room_id));
        }
        if self.users.len() >= self.config.max_users {
            return Err(RoomError::RoomFull(self.room_id));
        }

        let user = RoomUser::new(user_id);
        self.users.push(user.clone());
        self.emit(RoomEvent::UserJoined { user });
        tracing::info!(
            room_id = %self.room_id,
            %user_id,
            users = self.users.len(),
            "user joined"
        );

        if self.host.is_none() {
            self.set_host(Some(user_id));
        }
        Ok(())
    }

    /// Removes a user who left.
    ///
    /// Hands host to the earliest remaining user if the host left, closes
    /// the room if nobody is left, and otherwise re-derives the room state
    /// (a match whose last player left ends).
    ///
    /// # Errors
    /// [`RoomError::Closed`] or [`RoomError::NotInRoom`].
    pub fn remove_user(&mut self, user_id: UserId) -> Result<(), RoomError> {
        self.ensure_open()?;
        self.remove(user_id, false)
    }

    /// Removes `target` on the host's behalf.
    ///
    /// # Errors
    /// [`RoomError::NotHost`] unless `requester` is host,
    /// [`RoomError::InvalidState`] if the host targets themselves,
    /// [`RoomError::NotInRoom`] if `target` is absent.
    pub fn kick_user(&mut self, requester: UserId, target: UserId) -> Result<(), RoomError> {
        self.ensure_open()?;
        self.ensure_host(requester)?;
        if requester == target {
            return Err(RoomError::InvalidState("the host cannot kick themselves".into()));
        }
        self.remove(target, true)
    }

    /// Makes `target` the host.
    pub fn transfer_host(&mut self, requester: UserId, target: UserId) -> Result<(), RoomError> {
        self.ensure_open()?;
        self.ensure_host(requester)?;
        self.ensure_member(target)?;
        if requester != target {
            self.set_host(Some(target));
        }
        Ok(())
    }

    /// Replaces the room settings. Host only, and only between matches.
    pub fn change_settings(
        &mut self,
        requester: UserId,
        settings: RoomSettings,
    ) -> Result<(), RoomError> {
        self.ensure_open()?;
        self.ensure_host(requester)?;
        if self.state != MultiplayerRoomState::Idle {
            return Err(RoomError::InvalidState(format!(
                "cannot change settings while room is {}",
                self.state
            )));
        }
        if settings == self.settings {
            return Ok(());
        }
        self.settings = settings.clone();
        self.emit(RoomEvent::SettingsChanged { settings });
        Ok(())
    }

    // -----------------------------------------------------------------
    // User state
    // -----------------------------------------------------------------

    /// Moves a user to `state` if the transition table allows it.
    ///
    /// After the change the room state follows the users:
    ///
    /// - `Idle` room: once nobody is `Ready` any more and someone is in a
    ///   gameplay phase, the room enters `WaitingForLoad`.
    /// - `WaitingForLoad` room: with nobody in a gameplay phase it falls
    ///   back to `Idle`; once nobody is still loading it enters `Playing`
    ///   and every `Loaded` user starts playing.
    /// - `Playing` room: once nobody is in a gameplay phase, the match is
    ///   complete; the room returns to `Idle` and the playlist advances.
    ///
    /// # Errors
    /// - [`RoomError::NotInRoom`] if the user is absent
    /// - [`RoomError::InvalidTransition`] if the table rejects the edge;
    ///   the user's state is unchanged
    pub fn change_user_state(
        &mut self,
        user_id: UserId,
        state: MultiplayerUserState,
    ) -> Result<(), RoomError> {
        self.ensure_open()?;
        let index = self.user_index(user_id)?;
        let from = self.users[index].state;
        if !from.can_transition_to(state) {
            tracing::debug!(
                room_id = %self.room_id,
                %user_id,
                %from,
                to = %state,
                "rejected user state change"
            );
            return Err(RoomError::InvalidTransition {
                user: user_id,
                from,
                to: state,
            });
        }

        self.set_user_state(index, state);
        self.update_room_state();
        Ok(())
    }

    /// Sets the free mods a user plays the current item with.
    ///
    /// # Errors
    /// [`RoomError::InvalidMods`] if the catalog rejects the pick for the
    /// current item.
    pub fn change_user_mods(&mut self, user_id: UserId, mods: Vec<ApiMod>) -> Result<(), RoomError> {
        self.ensure_open()?;
        let index = self.user_index(user_id)?;
        R::validate_user_mods(self.playlist.current(), &mods)?;

        if self.users[index].mods == mods {
            return Ok(());
        }
        self.users[index].mods = mods.clone();
        self.emit(RoomEvent::UserModsChanged { user_id, mods });
        Ok(())
    }

    // -----------------------------------------------------------------
    // Match flow
    // -----------------------------------------------------------------

    /// Starts a match on the current playlist item.
    ///
    /// Every `Ready` user moves to `WaitingForLoad` and the room follows.
    /// The host doesn't have to be ready; a spectating host can start a
    /// match for the others.
    ///
    /// # Errors
    /// [`RoomError::NotHost`], or [`RoomError::InvalidState`] if a match is
    /// already running or nobody is ready.
    pub fn start_match(&mut self, requester: UserId) -> Result<(), RoomError> {
        self.ensure_open()?;
        self.ensure_host(requester)?;
        if self.state != MultiplayerRoomState::Idle {
            return Err(RoomError::InvalidState(format!(
                "cannot start a match while room is {}",
                self.state
            )));
        }
        let ready: Vec<usize> = self
            .users
            .iter()
            .enumerate()
            .filter(|(_, u)| u.state == MultiplayerUserState::Ready)
            .map(|(i, _)| i)
            .collect();
        if ready.is_empty() {
            return Err(RoomError::InvalidState("no users are ready".into()));
        }

        for &index in &ready {
            self.set_user_state(index, MultiplayerUserState::WaitingForLoad);
        }
        self.set_room_state(MultiplayerRoomState::WaitingForLoad);
        self.emit(RoomEvent::LoadRequested);

        tracing::info!(
            room_id = %self.room_id,
            item = %self.playlist.current().id,
            players = ready.len(),
            "match started"
        );
        Ok(())
    }

    /// Aborts gameplay for everyone.
    ///
    /// A no-op returning `false` unless some user is `Playing`. Otherwise
    /// every user in a gameplay phase returns to `Idle`, the room returns
    /// to `Idle`, and the current item counts as played: the pointer
    /// advances one position.
    pub fn abort_gameplay(&mut self) -> bool {
        let playing = self
            .users
            .iter()
            .any(|u| u.state == MultiplayerUserState::Playing);
        if self.state.is_closed() || !playing {
            return false;
        }

        for index in 0..self.users.len() {
            if self.users[index].state.is_gameplay() {
                self.set_user_state(index, MultiplayerUserState::Idle);
            }
        }
        self.emit(RoomEvent::GameplayAborted);
        if self.state.is_in_match() {
            self.set_room_state(MultiplayerRoomState::Idle);
        }
        tracing::info!(room_id = %self.room_id, "gameplay aborted");

        self.finish_current_item();
        true
    }

    // -----------------------------------------------------------------
    // Playlist
    // -----------------------------------------------------------------

    /// Queues a playlist item.
    ///
    /// In `HostOnly` mode only the host may add; in `AllPlayers` mode any
    /// participant may, up to `RoomConfig::max_items_per_user` unplayed
    /// items each.
    pub fn add_playlist_item(
        &mut self,
        requester: UserId,
        item: NewPlaylistItem,
    ) -> Result<PlaylistItemId, RoomError> {
        self.ensure_open()?;
        self.ensure_member(requester)?;
        match self.settings.queue_mode {
            QueueMode::HostOnly => self.ensure_host(requester)?,
            QueueMode::AllPlayers => {
                if self.playlist.pending_for(requester) >= self.config.max_items_per_user {
                    return Err(RoomError::PlaylistLimitReached(requester));
                }
            }
        }
        R::validate_item(&item)?;

        let item = self.playlist.push(requester, item).clone();
        let id = item.id;
        self.emit(RoomEvent::PlaylistItemAdded { item });
        tracing::debug!(room_id = %self.room_id, %requester, item = %id, "playlist item added");
        Ok(id)
    }

    /// Removes a queued item. Allowed for its owner and the host.
    pub fn remove_playlist_item(
        &mut self,
        requester: UserId,
        item_id: PlaylistItemId,
    ) -> Result<(), RoomError> {
        self.ensure_open()?;
        self.ensure_member(requester)?;
        let owner = self
            .playlist
            .get(item_id)
            .ok_or(RoomError::PlaylistItemNotFound(item_id))?
            .owner;
        if owner != requester && !self.is_host(requester) {
            return Err(RoomError::NotHost(requester));
        }

        self.playlist.remove(item_id)?;
        self.emit(RoomEvent::PlaylistItemRemoved { item_id });
        Ok(())
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Closes the room. Idempotent.
    pub fn close(&mut self) {
        if self.state.is_closed() {
            return;
        }
        self.set_room_state(MultiplayerRoomState::Closed);
        tracing::info!(room_id = %self.room_id, "room closed");
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn remove(&mut self, user_id: UserId, kicked: bool) -> Result<(), RoomError> {
        let index = self.user_index(user_id)?;
        self.users.remove(index);
        if kicked {
            self.emit(RoomEvent::UserKicked { user_id });
        } else {
            self.emit(RoomEvent::UserLeft { user_id });
        }
        tracing::info!(
            room_id = %self.room_id,
            %user_id,
            kicked,
            users = self.users.len(),
            "user left"
        );

        if self.users.is_empty() {
            self.set_host(None);
            self.close();
            return Ok(());
        }
        if self.host == Some(user_id) {
            let next = self.users[0].user_id;
            self.set_host(Some(next));
        }
        self.update_room_state();
        Ok(())
    }

    /// Re-derives the room state from the users until it is stable.
    fn update_room_state(&mut self) {
        loop {
            let any_ready = self.any_user(|s| s == MultiplayerUserState::Ready);
            let any_gameplay = self.any_user(MultiplayerUserState::is_gameplay);

            match self.state {
                MultiplayerRoomState::Idle => {
                    if !any_ready && any_gameplay {
                        self.set_room_state(MultiplayerRoomState::WaitingForLoad);
                        self.emit(RoomEvent::LoadRequested);
                        continue;
                    }
                }
                MultiplayerRoomState::WaitingForLoad => {
                    if !any_gameplay {
                        self.set_room_state(MultiplayerRoomState::Idle);
                    } else if !self.any_user(|s| s == MultiplayerUserState::WaitingForLoad) {
                        self.begin_gameplay();
                    }
                }
                MultiplayerRoomState::Playing => {
                    if !any_gameplay {
                        self.set_room_state(MultiplayerRoomState::Idle);
                        tracing::info!(room_id = %self.room_id, "match completed");
                        self.finish_current_item();
                    }
                }
                MultiplayerRoomState::Closed => {}
            }
            break;
        }
    }

    /// Everyone finished loading: loaded users start playing.
    fn begin_gameplay(&mut self) {
        for index in 0..self.users.len() {
            if self.users[index].state == MultiplayerUserState::Loaded {
                self.set_user_state(index, MultiplayerUserState::Playing);
            }
        }
        self.set_room_state(MultiplayerRoomState::Playing);
        self.emit(RoomEvent::GameplayStarted);
        tracing::info!(room_id = %self.room_id, "gameplay started");
    }

    /// Expires the current item, advances the pointer, and drops user mods
    /// the new item doesn't allow.
    fn finish_current_item(&mut self) {
        let advance = self.playlist.finish_current();
        self.emit(RoomEvent::PlaylistItemChanged {
            item: advance.expired,
        });
        if let Some(item) = advance.requeued {
            self.emit(RoomEvent::PlaylistItemAdded { item });
        }
        self.emit(RoomEvent::CurrentItemChanged {
            item_id: advance.current,
        });

        let current = self.playlist.current();
        let changed: Vec<(usize, Vec<ApiMod>)> = self
            .users
            .iter()
            .enumerate()
            .filter_map(|(index, user)| {
                let kept: Vec<ApiMod> =
                    user.mods.iter().filter(|m| current.allows(m)).cloned().collect();
                (kept.len() != user.mods.len()).then_some((index, kept))
            })
            .collect();
        for (index, mods) in changed {
            self.users[index].mods = mods.clone();
            let user_id = self.users[index].user_id;
            self.emit(RoomEvent::UserModsChanged { user_id, mods });
        }

        tracing::info!(
            room_id = %self.room_id,
            item = %advance.current,
            "playlist advanced"
        );
    }

    fn set_user_state(&mut self, index: usize, state: MultiplayerUserState) {
        let user = &mut self.users[index];
        user.state = state;
        let user_id = user.user_id;
        self.emit(RoomEvent::UserStateChanged { user_id, state });
    }

    /// Applies a room transition. Edges outside the room graph are
    /// refused and logged, never applied.
    fn set_room_state(&mut self, state: MultiplayerRoomState) {
        if !self.state.can_transition_to(state) {
            tracing::warn!(
                room_id = %self.room_id,
                from = %self.state,
                to = %state,
                "refused invalid room transition"
            );
            return;
        }
        self.state = state;
        self.emit(RoomEvent::RoomStateChanged { state });
    }

    fn set_host(&mut self, host: Option<UserId>) {
        self.host = host;
        self.emit(RoomEvent::HostChanged { host });
    }

    /// Pushes an update to every observer, pruning closed channels.
    fn emit(&mut self, event: RoomEvent) {
        self.seq += 1;
        let update = RoomUpdate {
            seq: self.seq,
            event,
        };
        let room_id = self.room_id;
        self.observers.retain(|tx| {
            let alive = tx.send(update.clone()).is_ok();
            if !alive {
                tracing::debug!(%room_id, "observer gone, dropping it");
            }
            alive
        });
    }

    fn any_user(&self, pred: impl Fn(MultiplayerUserState) -> bool) -> bool {
        self.users.iter().any(|u| pred(u.state))
    }

    fn is_host(&self, user_id: UserId) -> bool {
        self.host == Some(user_id)
    }

    fn user_index(&self, user_id: UserId) -> Result<usize, RoomError> {
        self.users
            .iter()
            .position(|u| u.user_id == user_id)
            .ok_or(RoomError::NotInRoom(user_id, self.room_id))
    }

    fn ensure_member(&self, user_id: UserId) -> Result<(), RoomError> {
        self.user_index(user_id).map(|_| ())
    }

    fn ensure_host(&self, user_id: UserId) -> Result<(), RoomError> {
        if self.is_host(user_id) {
            Ok(())
        } else {
            Err(RoomError::NotHost(user_id))
        }
    }

    fn ensure_open(&self) -> Result<(), RoomError> {
        if self.state.is_closed() {
            Err(RoomError::Closed(self.room_id))
        } else {
            Ok(())
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use beatroom_protocol::{
        BeatmapId, BeatmapRef, MultiplayerRoomState as RoomState,
        MultiplayerUserState as UserState, RulesetId,
    };

    const HOST: UserId = UserId(1);
    const GUEST: UserId = UserId(2);
    const OTHER: UserId = UserId(3);

    fn item(beatmap: u64) -> NewPlaylistItem {
        NewPlaylistItem::new(BeatmapRef {
            id: BeatmapId(beatmap),
            ruleset_id: RulesetId::OSU,
        })
    }

    fn mods(acronyms: &[&str]) -> Vec<ApiMod> {
        acronyms.iter().copied().map(ApiMod::new).collect()
    }

    fn room_with(playlist: Vec<NewPlaylistItem>) -> RoomController {
        RoomController::new(
            RoomId(1),
            HOST,
            RoomSettings::default(),
            playlist,
            RoomConfig::default(),
        )
        .unwrap()
    }

    fn room() -> RoomController {
        room_with(vec![item(10)])
    }

    fn room_with_guest() -> RoomController {
        let mut room = room();
        room.add_user(GUEST).unwrap();
        room
    }

    fn drain(rx: &mut UpdateReceiver) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(update) = rx.try_recv() {
            events.push(update.event);
        }
        events
    }

    fn state_of(room: &RoomController, user_id: UserId) -> UserState {
        room.user(user_id).unwrap().state
    }

    /// Host and guest both ready, match started: both `WaitingForLoad`.
    fn loading_room() -> RoomController {
        let mut room = room_with_guest();
        room.change_user_state(HOST, UserState::Ready).unwrap();
        room.change_user_state(GUEST, UserState::Ready).unwrap();
        room.start_match(HOST).unwrap();
        room
    }

    fn playing_room() -> RoomController {
        let mut room = loading_room();
        room.change_user_state(HOST, UserState::Loaded).unwrap();
        room.change_user_state(GUEST, UserState::Loaded).unwrap();
        room
    }

    // -----------------------------------------------------------------
    // Creation and membership
    // -----------------------------------------------------------------

    #[test]
    fn test_new_empty_playlist_rejected() {
        let result = RoomController::<StandardRulesets>::new(
            RoomId(1),
            HOST,
            RoomSettings::default(),
            vec![],
            RoomConfig::default(),
        );
        assert_eq!(result.err(), Some(RoomError::EmptyPlaylist));
    }

    #[test]
    fn test_new_invalid_item_rejected() {
        let swap_on_osu = item(10).with_allowed_mods(mods(&["SW"]));
        let result = RoomController::<StandardRulesets>::new(
            RoomId(1),
            HOST,
            RoomSettings::default(),
            vec![swap_on_osu],
            RoomConfig::default(),
        );
        assert!(matches!(result, Err(RoomError::InvalidPlaylistItem(_))));
    }

    #[test]
    fn test_new_host_is_first_idle_user() {
        let room = room();
        assert_eq!(room.state(), RoomState::Idle);
        assert_eq!(room.host(), Some(HOST));
        assert_eq!(room.users().len(), 1);
        assert_eq!(state_of(&room, HOST), UserState::Idle);
        assert_eq!(room.seq(), 0);
        assert_eq!(room.playlist().current().beatmap.id, BeatmapId(10));
    }

    #[test]
    fn test_add_user_emits_joined() {
        let mut room = room();
        let mut rx = room.subscribe();

        room.add_user(GUEST).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![RoomEvent::UserJoined {
                user: RoomUser::new(GUEST)
            }]
        );
        assert_eq!(room.seq(), 1);
    }

    #[test]
    fn test_add_user_duplicate_rejected() {
        let mut room = room_with_guest();
        assert_eq!(
            room.add_user(GUEST),
            Err(RoomError::DuplicateUser(GUEST, RoomId(1)))
        );
    }

    #[test]
    fn test_add_user_full_room_rejected() {
        let config = RoomConfig {
            max_users: 2,
            ..RoomConfig::default()
        };
        let mut room: RoomController =
            RoomController::new(RoomId(1), HOST, RoomSettings::default(), vec![item(10)], config)
                .unwrap();
        room.add_user(GUEST).unwrap();

        assert_eq!(room.add_user(OTHER), Err(RoomError::RoomFull(RoomId(1))));
    }

    #[test]
    fn test_remove_host_passes_host_to_earliest_user() {
        let mut room = room_with_guest();
        room.add_user(OTHER).unwrap();

        room.remove_user(HOST).unwrap();

        assert_eq!(room.host(), Some(GUEST));
        assert_eq!(room.state(), RoomState::Idle);
    }

    #[test]
    fn test_remove_last_user_closes_room() {
        let mut room = room();
        let mut rx = room.subscribe();

        room.remove_user(HOST).unwrap();

        assert_eq!(room.state(), RoomState::Closed);
        assert_eq!(room.host(), None);
        assert_eq!(
            drain(&mut rx),
            vec![
                RoomEvent::UserLeft { user_id: HOST },
                RoomEvent::HostChanged { host: None },
                RoomEvent::RoomStateChanged {
                    state: RoomState::Closed
                },
            ]
        );
    }

    #[test]
    fn test_closed_room_rejects_changes() {
        let mut room = room();
        room.close();

        assert_eq!(room.add_user(GUEST), Err(RoomError::Closed(RoomId(1))));
        assert_eq!(
            room.change_user_state(HOST, UserState::Ready),
            Err(RoomError::Closed(RoomId(1)))
        );
        assert!(!room.abort_gameplay());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut room = room();
        room.close();
        let seq = room.seq();
        room.close();
        assert_eq!(room.seq(), seq);
    }

    #[test]
    fn test_kick_user_requires_host() {
        let mut room = room_with_guest();
        assert_eq!(room.kick_user(GUEST, HOST), Err(RoomError::NotHost(GUEST)));
        assert!(matches!(
            room.kick_user(HOST, HOST),
            Err(RoomError::InvalidState(_))
        ));
    }

    #[test]
    fn test_kick_user_emits_kicked() {
        let mut room = room_with_guest();
        let mut rx = room.subscribe();

        room.kick_user(HOST, GUEST).unwrap();

        assert!(room.user(GUEST).is_none());
        assert_eq!(drain(&mut rx), vec![RoomEvent::UserKicked { user_id: GUEST }]);
    }

    #[test]
    fn test_transfer_host() {
        let mut room = room_with_guest();

        assert_eq!(room.transfer_host(GUEST, GUEST), Err(RoomError::NotHost(GUEST)));
        assert_eq!(
            room.transfer_host(HOST, OTHER),
            Err(RoomError::NotInRoom(OTHER, RoomId(1)))
        );

        room.transfer_host(HOST, GUEST).unwrap();
        assert_eq!(room.host(), Some(GUEST));
    }

    // -----------------------------------------------------------------
    // User state transitions
    // -----------------------------------------------------------------

    /// A room where HOST is in `state`. Gameplay fixtures keep GUEST in
    /// `WaitingForLoad`, so the match never progresses on its own.
    fn room_with_host_in(state: UserState) -> RoomController {
        match state {
            UserState::Idle => room_with_guest(),
            UserState::Ready | UserState::Spectating => {
                let mut room = room_with_guest();
                room.change_user_state(HOST, state).unwrap();
                room
            }
            UserState::WaitingForLoad => loading_room(),
            UserState::Loaded => {
                let mut room = loading_room();
                room.change_user_state(HOST, UserState::Loaded).unwrap();
                room
            }
            UserState::Playing => {
                let mut room = loading_room();
                room.change_user_state(HOST, UserState::Loaded).unwrap();
                room.change_user_state(HOST, UserState::Playing).unwrap();
                room
            }
        }
    }

    #[test]
    fn test_change_user_state_follows_transition_table() {
        for from in UserState::ALL {
            for to in UserState::ALL {
                let mut room = room_with_host_in(from);
                assert_eq!(state_of(&room, HOST), from, "fixture for {from}");
                let seq = room.seq();

                let result = room.change_user_state(HOST, to);

                if from.can_transition_to(to) {
                    assert_eq!(result, Ok(()), "{from} -> {to}");
                    assert_eq!(state_of(&room, HOST), to, "{from} -> {to}");
                } else {
                    assert_eq!(
                        result,
                        Err(RoomError::InvalidTransition {
                            user: HOST,
                            from,
                            to
                        }),
                        "{from} -> {to}"
                    );
                    assert_eq!(state_of(&room, HOST), from);
                    assert_eq!(room.seq(), seq, "rejected change must not emit");
                }
            }
        }
    }

    #[test]
    fn test_change_user_state_unknown_user_rejected() {
        let mut room = room();
        assert_eq!(
            room.change_user_state(OTHER, UserState::Ready),
            Err(RoomError::NotInRoom(OTHER, RoomId(1)))
        );
    }

    #[test]
    fn test_ready_user_moving_to_load_pulls_room_into_match() {
        let mut room = room_with_guest();
        room.change_user_state(GUEST, UserState::Ready).unwrap();
        let mut rx = room.subscribe();

        room.change_user_state(GUEST, UserState::WaitingForLoad).unwrap();

        assert_eq!(room.state(), RoomState::WaitingForLoad);
        assert_eq!(
            drain(&mut rx),
            vec![
                RoomEvent::UserStateChanged {
                    user_id: GUEST,
                    state: UserState::WaitingForLoad,
                },
                RoomEvent::RoomStateChanged {
                    state: RoomState::WaitingForLoad,
                },
                RoomEvent::LoadRequested,
            ]
        );
    }

    // -----------------------------------------------------------------
    // Match flow
    // -----------------------------------------------------------------

    #[test]
    fn test_start_match_requires_host() {
        let mut room = room_with_guest();
        room.change_user_state(GUEST, UserState::Ready).unwrap();
        assert_eq!(room.start_match(GUEST), Err(RoomError::NotHost(GUEST)));
    }

    #[test]
    fn test_start_match_nobody_ready_rejected() {
        let mut room = room_with_guest();
        assert!(matches!(
            room.start_match(HOST),
            Err(RoomError::InvalidState(_))
        ));
        assert_eq!(room.state(), RoomState::Idle);
    }

    #[test]
    fn test_start_match_moves_ready_users_to_loading() {
        let mut room = room_with_guest();
        room.add_user(OTHER).unwrap();
        room.change_user_state(HOST, UserState::Ready).unwrap();
        room.change_user_state(GUEST, UserState::Ready).unwrap();
        let mut rx = room.subscribe();

        room.start_match(HOST).unwrap();

        assert_eq!(room.state(), RoomState::WaitingForLoad);
        assert_eq!(state_of(&room, HOST), UserState::WaitingForLoad);
        assert_eq!(state_of(&room, GUEST), UserState::WaitingForLoad);
        assert_eq!(state_of(&room, OTHER), UserState::Idle);
        assert_eq!(drain(&mut rx).last(), Some(&RoomEvent::LoadRequested));
    }

    #[test]
    fn test_start_match_during_match_rejected() {
        let mut room = loading_room();
        assert!(matches!(
            room.start_match(HOST),
            Err(RoomError::InvalidState(_))
        ));
    }

    #[test]
    fn test_spectating_host_can_start_match() {
        let mut room = room_with_guest();
        room.change_user_state(HOST, UserState::Spectating).unwrap();
        room.change_user_state(GUEST, UserState::Ready).unwrap();

        room.start_match(HOST).unwrap();

        assert_eq!(room.state(), RoomState::WaitingForLoad);
        assert_eq!(state_of(&room, HOST), UserState::Spectating);
        assert_eq!(state_of(&room, GUEST), UserState::WaitingForLoad);
    }

    #[test]
    fn test_everyone_loaded_starts_gameplay() {
        let mut room = loading_room();
        room.change_user_state(HOST, UserState::Loaded).unwrap();
        assert_eq!(room.state(), RoomState::WaitingForLoad);
        let mut rx = room.subscribe();

        room.change_user_state(GUEST, UserState::Loaded).unwrap();

        assert_eq!(room.state(), RoomState::Playing);
        assert_eq!(state_of(&room, HOST), UserState::Playing);
        assert_eq!(state_of(&room, GUEST), UserState::Playing);
        assert_eq!(drain(&mut rx).last(), Some(&RoomEvent::GameplayStarted));
    }

    #[test]
    fn test_loading_user_dropping_out_does_not_block_others() {
        let mut room = loading_room();
        room.change_user_state(HOST, UserState::Loaded).unwrap();

        room.change_user_state(GUEST, UserState::Idle).unwrap();

        assert_eq!(room.state(), RoomState::Playing);
        assert_eq!(state_of(&room, HOST), UserState::Playing);
    }

    #[test]
    fn test_everyone_leaving_load_returns_room_to_idle() {
        let mut room = loading_room();
        let current = room.playlist().current().id;

        room.change_user_state(HOST, UserState::Idle).unwrap();
        room.change_user_state(GUEST, UserState::Idle).unwrap();

        assert_eq!(room.state(), RoomState::Idle);
        assert_eq!(room.playlist().current().id, current);
    }

    #[test]
    fn test_match_completion_advances_playlist() {
        let mut room = playing_room();
        let index = room.playlist().current_index();

        room.change_user_state(HOST, UserState::Idle).unwrap();
        assert_eq!(room.state(), RoomState::Playing);
        room.change_user_state(GUEST, UserState::Idle).unwrap();

        assert_eq!(room.state(), RoomState::Idle);
        assert_eq!(room.playlist().current_index(), index + 1);
        assert!(room.playlist().items()[index].expired);
    }

    #[test]
    fn test_last_player_leaving_completes_match() {
        let mut room = playing_room();
        room.add_user(OTHER).unwrap();

        room.remove_user(HOST).unwrap();
        room.remove_user(GUEST).unwrap();

        assert_eq!(room.state(), RoomState::Idle);
        assert_eq!(room.host(), Some(OTHER));
        assert_eq!(room.playlist().current_index(), 1);
    }

    // -----------------------------------------------------------------
    // Abort
    // -----------------------------------------------------------------

    #[test]
    fn test_abort_without_players_is_noop() {
        let mut room = loading_room();
        let seq = room.seq();

        assert!(!room.abort_gameplay());

        assert_eq!(room.seq(), seq);
        assert_eq!(room.state(), RoomState::WaitingForLoad);
        assert_eq!(room.playlist().current_index(), 0);
    }

    #[test]
    fn test_abort_returns_everyone_to_idle_and_advances() {
        let mut room = playing_room();
        room.add_user(OTHER).unwrap();
        room.change_user_state(OTHER, UserState::Spectating).unwrap();
        let mut rx = room.subscribe();

        assert!(room.abort_gameplay());

        assert_eq!(room.state(), RoomState::Idle);
        assert_eq!(state_of(&room, HOST), UserState::Idle);
        assert_eq!(state_of(&room, GUEST), UserState::Idle);
        assert_eq!(state_of(&room, OTHER), UserState::Spectating);
        assert_eq!(room.playlist().current_index(), 1);

        let events = drain(&mut rx);
        assert!(events.contains(&RoomEvent::GameplayAborted));
        assert_eq!(
            events.last(),
            Some(&RoomEvent::CurrentItemChanged {
                item_id: room.playlist().current().id
            })
        );
    }

    #[test]
    fn test_abort_moves_to_next_queued_item() {
        let mut room = room_with(vec![item(10), item(20)]);
        room.add_user(GUEST).unwrap();
        room.change_user_state(HOST, UserState::Ready).unwrap();
        room.change_user_state(GUEST, UserState::Ready).unwrap();
        room.start_match(HOST).unwrap();
        room.change_user_state(HOST, UserState::Loaded).unwrap();
        room.change_user_state(GUEST, UserState::Loaded).unwrap();

        assert!(room.abort_gameplay());

        assert_eq!(room.playlist().current().beatmap.id, BeatmapId(20));
        assert_eq!(room.playlist().len(), 2);
    }

    #[test]
    fn test_abort_on_single_item_requeues_it() {
        let mut room = playing_room();

        room.abort_gameplay();

        let current = room.playlist().current();
        assert_eq!(current.beatmap.id, BeatmapId(10));
        assert!(!current.expired);
        assert_eq!(room.playlist().len(), 2);
    }

    // -----------------------------------------------------------------
    // Settings and mods
    // -----------------------------------------------------------------

    #[test]
    fn test_change_settings_host_only_and_between_matches() {
        let mut room = room_with_guest();
        let settings = RoomSettings {
            name: "tourney".into(),
            ..RoomSettings::default()
        };

        assert_eq!(
            room.change_settings(GUEST, settings.clone()),
            Err(RoomError::NotHost(GUEST))
        );
        room.change_settings(HOST, settings.clone()).unwrap();
        assert_eq!(room.settings().name, "tourney");

        let mut room = loading_room();
        assert!(matches!(
            room.change_settings(HOST, settings),
            Err(RoomError::InvalidState(_))
        ));
    }

    #[test]
    fn test_change_user_mods_validated_against_current_item() {
        let mut room = room_with(vec![item(10).with_allowed_mods(mods(&["HD", "DT"]))]);

        room.change_user_mods(HOST, mods(&["HD"])).unwrap();
        assert_eq!(room.user(HOST).unwrap().mods, mods(&["HD"]));

        assert!(matches!(
            room.change_user_mods(HOST, mods(&["HR"])),
            Err(RoomError::InvalidMods(_))
        ));
        assert_eq!(room.user(HOST).unwrap().mods, mods(&["HD"]));
    }

    #[test]
    fn test_advance_drops_mods_next_item_disallows() {
        let mut room = room_with(vec![
            item(10).with_allowed_mods(mods(&["HD", "DT"])),
            item(20).with_allowed_mods(mods(&["HD"])),
        ]);
        room.add_user(GUEST).unwrap();
        room.change_user_mods(HOST, mods(&["HD", "DT"])).unwrap();
        room.change_user_state(HOST, UserState::Ready).unwrap();
        room.change_user_state(GUEST, UserState::Ready).unwrap();
        room.start_match(HOST).unwrap();
        room.change_user_state(HOST, UserState::Loaded).unwrap();
        room.change_user_state(GUEST, UserState::Loaded).unwrap();
        let mut rx = room.subscribe();

        room.abort_gameplay();

        assert_eq!(room.user(HOST).unwrap().mods, mods(&["HD"]));
        assert!(drain(&mut rx).contains(&RoomEvent::UserModsChanged {
            user_id: HOST,
            mods: mods(&["HD"])
        }));
    }

    // -----------------------------------------------------------------
    // Playlist
    // -----------------------------------------------------------------

    #[test]
    fn test_add_playlist_item_host_only_mode() {
        let mut room = room_with_guest();

        assert_eq!(
            room.add_playlist_item(GUEST, item(20)),
            Err(RoomError::NotHost(GUEST))
        );
        let id = room.add_playlist_item(HOST, item(20)).unwrap();
        assert_eq!(room.playlist().get(id).unwrap().owner, HOST);
    }

    #[test]
    fn test_add_playlist_item_all_players_limit() {
        let mut room = room_with_guest();
        room.change_settings(
            HOST,
            RoomSettings {
                queue_mode: QueueMode::AllPlayers,
                ..RoomSettings::default()
            },
        )
        .unwrap();

        for beatmap in 0..3 {
            room.add_playlist_item(GUEST, item(20 + beatmap)).unwrap();
        }
        assert_eq!(
            room.add_playlist_item(GUEST, item(30)),
            Err(RoomError::PlaylistLimitReached(GUEST))
        );
    }

    #[test]
    fn test_add_playlist_item_validates_item() {
        let mut room = room();
        let result = room.add_playlist_item(HOST, item(20).with_required_mods(mods(&["SW"])));
        assert!(matches!(result, Err(RoomError::InvalidPlaylistItem(_))));
        assert_eq!(room.playlist().len(), 1);
    }

    #[test]
    fn test_remove_playlist_item_owner_or_host() {
        let mut room = room_with_guest();
        room.add_user(OTHER).unwrap();
        room.change_settings(
            HOST,
            RoomSettings {
                queue_mode: QueueMode::AllPlayers,
                ..RoomSettings::default()
            },
        )
        .unwrap();
        let guest_item = room.add_playlist_item(GUEST, item(20)).unwrap();
        let other_item = room.add_playlist_item(OTHER, item(30)).unwrap();

        assert_eq!(
            room.remove_playlist_item(OTHER, guest_item),
            Err(RoomError::NotHost(OTHER))
        );
        room.remove_playlist_item(GUEST, guest_item).unwrap();
        room.remove_playlist_item(HOST, other_item).unwrap();
        assert_eq!(room.playlist().len(), 1);
    }

    // -----------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------

    #[test]
    fn test_replayed_updates_reproduce_snapshot() {
        let mut room = room();
        let (mut mirror, mut rx) = room.subscribe_with_snapshot();

        room.add_user(GUEST).unwrap();
        room.add_user(OTHER).unwrap();
        room.change_user_state(OTHER, UserState::Spectating).unwrap();
        room.add_playlist_item(HOST, item(20)).unwrap();
        room.change_user_state(HOST, UserState::Ready).unwrap();
        room.change_user_state(GUEST, UserState::Ready).unwrap();
        room.start_match(HOST).unwrap();
        room.change_user_state(HOST, UserState::Loaded).unwrap();
        room.change_user_state(GUEST, UserState::Loaded).unwrap();
        room.abort_gameplay();
        room.kick_user(HOST, OTHER).unwrap();
        room.remove_user(HOST).unwrap();

        while let Ok(update) = rx.try_recv() {
            mirror.apply(&update).unwrap();
        }
        assert_eq!(mirror, room.snapshot());
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let mut room = room();
        let rx = room.subscribe();
        let mut live = room.subscribe();
        drop(rx);

        room.add_user(GUEST).unwrap();

        assert_eq!(room.observers.len(), 1);
        assert_eq!(drain(&mut live).len(), 1);
    }

    #[test]
    fn test_failed_operation_emits_nothing() {
        let mut room = room_with_guest();
        let mut rx = room.subscribe();

        let _ = room.start_match(GUEST);
        let _ = room.change_user_state(GUEST, UserState::Playing);
        let _ = room.add_playlist_item(GUEST, item(20));

        assert!(drain(&mut rx).is_empty());
    }
}
