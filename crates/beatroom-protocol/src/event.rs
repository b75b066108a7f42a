//! Change notifications pushed from a room to its observers.
//!
//! Every successful mutation of a room produces one or more [`RoomEvent`]s.
//! Each is wrapped in a [`RoomUpdate`] carrying a per-room sequence number,
//! so an observer holding a [`RoomSnapshot`] can replay updates in order and
//! notice if one went missing.

use serde::{Deserialize, Serialize};

use crate::{
    ApiMod, MultiplayerRoomState, MultiplayerUserState, PlaylistItem, PlaylistItemId,
    ProtocolError, RoomSettings, RoomSnapshot, RoomUser, UserId,
};

/// Something that changed in a room.
///
/// `#[serde(tag = "type")]` gives internally tagged JSON:
/// `{ "type": "UserStateChanged", "user_id": 1, "state": "Ready" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomEvent {
    // -- Membership --
    UserJoined { user: RoomUser },
    UserLeft { user_id: UserId },
    /// Removed by the host rather than leaving.
    UserKicked { user_id: UserId },
    HostChanged { host: Option<UserId> },

    // -- Per-user state --
    UserStateChanged {
        user_id: UserId,
        state: MultiplayerUserState,
    },
    UserModsChanged { user_id: UserId, mods: Vec<ApiMod> },

    // -- Room --
    RoomStateChanged { state: MultiplayerRoomState },
    SettingsChanged { settings: RoomSettings },

    // -- Playlist --
    PlaylistItemAdded { item: PlaylistItem },
    PlaylistItemRemoved { item_id: PlaylistItemId },
    /// An existing item changed (for example it expired).
    PlaylistItemChanged { item: PlaylistItem },
    CurrentItemChanged { item_id: PlaylistItemId },

    // -- Match signals (no snapshot change) --
    /// Players moved to `WaitingForLoad` should start loading.
    LoadRequested,
    /// Everyone loaded; gameplay begins.
    GameplayStarted,
    /// Gameplay was aborted and everyone returned to the lobby.
    GameplayAborted,
}

/// A sequenced [`RoomEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUpdate {
    /// Starts at 1 for the first event a room ever emits.
    pub seq: u64,
    pub event: RoomEvent,
}

impl RoomSnapshot {
    /// Folds one update into this snapshot.
    ///
    /// On error the snapshot is left untouched.
    ///
    /// # Errors
    /// - [`ProtocolError::OutOfOrder`] if `update.seq` is not `self.seq + 1`
    /// - [`ProtocolError::UnknownUser`] / [`ProtocolError::UnknownPlaylistItem`]
    ///   if the event names something this snapshot doesn't contain
    pub fn apply(&mut self, update: &RoomUpdate) -> Result<(), ProtocolError> {
        let expected = self.seq + 1;
        if update.seq != expected {
            return Err(ProtocolError::OutOfOrder {
                expected,
                got: update.seq,
            });
        }

        match &update.event {
            RoomEvent::UserJoined { user } => {
                match self.user_mut(user.user_id) {
                    Some(existing) => *existing = user.clone(),
                    None => self.users.push(user.clone()),
                }
            }
            RoomEvent::UserLeft { user_id } | RoomEvent::UserKicked { user_id } => {
                let index = self
                    .users
                    .iter()
                    .position(|u| u.user_id == *user_id)
                    .ok_or(ProtocolError::UnknownUser(*user_id))?;
                self.users.remove(index);
            }
            RoomEvent::HostChanged { host } => {
                self.host = *host;
            }
            RoomEvent::UserStateChanged { user_id, state } => {
                self.user_mut(*user_id)
                    .ok_or(ProtocolError::UnknownUser(*user_id))?
                    .state = *state;
            }
            RoomEvent::UserModsChanged { user_id, mods } => {
                self.user_mut(*user_id)
                    .ok_or(ProtocolError::UnknownUser(*user_id))?
                    .mods = mods.clone();
            }
            RoomEvent::RoomStateChanged { state } => {
                self.state = *state;
            }
            RoomEvent::SettingsChanged { settings } => {
                self.settings = settings.clone();
            }
            RoomEvent::PlaylistItemAdded { item } => {
                self.playlist.push(item.clone());
            }
            RoomEvent::PlaylistItemRemoved { item_id } => {
                let index = self
                    .playlist
                    .iter()
                    .position(|i| i.id == *item_id)
                    .ok_or(ProtocolError::UnknownPlaylistItem(*item_id))?;
                self.playlist.remove(index);
            }
            RoomEvent::PlaylistItemChanged { item } => {
                let slot = self
                    .playlist
                    .iter_mut()
                    .find(|i| i.id == item.id)
                    .ok_or(ProtocolError::UnknownPlaylistItem(item.id))?;
                *slot = item.clone();
            }
            RoomEvent::CurrentItemChanged { item_id } => {
                if self.item(*item_id).is_none() {
                    return Err(ProtocolError::UnknownPlaylistItem(*item_id));
                }
                self.current_item = *item_id;
            }
            RoomEvent::LoadRequested
            | RoomEvent::GameplayStarted
            | RoomEvent::GameplayAborted => {}
        }

        self.seq = update.seq;
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BeatmapId, BeatmapRef, NewPlaylistItem, RoomId, RulesetId};

    fn item(id: u64) -> PlaylistItem {
        PlaylistItem::from_request(
            PlaylistItemId(id),
            UserId(1),
            NewPlaylistItem::new(BeatmapRef {
                id: BeatmapId(100 + id),
                ruleset_id: RulesetId::OSU,
            }),
        )
    }

    fn snapshot() -> RoomSnapshot {
        RoomSnapshot {
            room_id: RoomId(1),
            state: MultiplayerRoomState::Idle,
            host: Some(UserId(1)),
            settings: RoomSettings::default(),
            users: vec![RoomUser::new(UserId(1))],
            playlist: vec![item(1)],
            current_item: PlaylistItemId(1),
            seq: 0,
        }
    }

    fn update(seq: u64, event: RoomEvent) -> RoomUpdate {
        RoomUpdate { seq, event }
    }

    #[test]
    fn test_apply_user_state_changed_updates_user() {
        let mut snap = snapshot();
        snap.apply(&update(
            1,
            RoomEvent::UserStateChanged {
                user_id: UserId(1),
                state: MultiplayerUserState::Ready,
            },
        ))
        .unwrap();

        assert_eq!(snap.user(UserId(1)).unwrap().state, MultiplayerUserState::Ready);
        assert_eq!(snap.seq, 1);
    }

    #[test]
    fn test_apply_out_of_order_is_rejected_and_snapshot_unchanged() {
        let mut snap = snapshot();
        let before = snap.clone();

        let result = snap.apply(&update(2, RoomEvent::GameplayStarted));

        assert_eq!(result, Err(ProtocolError::OutOfOrder { expected: 1, got: 2 }));
        assert_eq!(snap, before);
    }

    #[test]
    fn test_apply_unknown_user_is_rejected_and_seq_not_advanced() {
        let mut snap = snapshot();

        let result = snap.apply(&update(1, RoomEvent::UserLeft { user_id: UserId(9) }));

        assert_eq!(result, Err(ProtocolError::UnknownUser(UserId(9))));
        assert_eq!(snap.seq, 0);
    }

    #[test]
    fn test_apply_membership_events() {
        let mut snap = snapshot();
        snap.apply(&update(1, RoomEvent::UserJoined { user: RoomUser::new(UserId(2)) }))
            .unwrap();
        snap.apply(&update(2, RoomEvent::HostChanged { host: Some(UserId(2)) }))
            .unwrap();
        snap.apply(&update(3, RoomEvent::UserKicked { user_id: UserId(1) }))
            .unwrap();

        assert_eq!(snap.users.len(), 1);
        assert!(snap.is_host(UserId(2)));
        assert!(snap.user(UserId(1)).is_none());
    }

    #[test]
    fn test_apply_playlist_events_track_current_item() {
        let mut snap = snapshot();
        let mut expired = item(1);
        expired.expired = true;

        snap.apply(&update(1, RoomEvent::PlaylistItemAdded { item: item(2) }))
            .unwrap();
        snap.apply(&update(2, RoomEvent::PlaylistItemChanged { item: expired }))
            .unwrap();
        snap.apply(&update(3, RoomEvent::CurrentItemChanged { item_id: PlaylistItemId(2) }))
            .unwrap();

        assert!(snap.item(PlaylistItemId(1)).unwrap().expired);
        assert_eq!(snap.current_item().unwrap().id, PlaylistItemId(2));
    }

    #[test]
    fn test_apply_current_item_must_exist() {
        let mut snap = snapshot();
        let result = snap.apply(&update(
            1,
            RoomEvent::CurrentItemChanged { item_id: PlaylistItemId(7) },
        ));
        assert_eq!(result, Err(ProtocolError::UnknownPlaylistItem(PlaylistItemId(7))));
        assert_eq!(snap.current_item, PlaylistItemId(1));
    }

    #[test]
    fn test_apply_signals_only_advance_seq() {
        let mut snap = snapshot();
        let before = snap.clone();
        snap.apply(&update(1, RoomEvent::LoadRequested)).unwrap();
        snap.apply(&update(2, RoomEvent::GameplayAborted)).unwrap();

        assert_eq!(snap.seq, 2);
        snap.seq = 0;
        assert_eq!(snap, before);
    }

    #[test]
    fn test_room_event_json_is_internally_tagged() {
        let event = RoomEvent::UserStateChanged {
            user_id: UserId(3),
            state: MultiplayerUserState::Spectating,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "UserStateChanged");
        assert_eq!(json["user_id"], 3);
        assert_eq!(json["state"], "Spectating");
    }

    #[test]
    fn test_room_event_unit_variant_json() {
        let json = serde_json::to_value(RoomEvent::GameplayAborted).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "GameplayAborted" }));
    }

    #[test]
    fn test_decode_unknown_event_type_returns_error() {
        let unknown = r#"{"type": "MatchExploded", "seq": 1}"#;
        let result: Result<RoomEvent, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
