//! Error types for the room layer.

use beatroom_protocol::{MultiplayerUserState, PlaylistItemId, RoomId, UserId};

/// Errors that can occur during room operations.
///
/// Every variant is a local validation failure: the room is left exactly
/// as it was and no events are pushed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The user is already a participant of this room.
    #[error("user {0} already in room {1}")]
    DuplicateUser(UserId, RoomId),

    /// The user is not a participant of this room.
    #[error("user {0} not in room {1}")]
    NotInRoom(UserId, RoomId),

    /// The user is already in a different room. A user can be in at most
    /// one room at a time.
    #[error("user {0} is already in room {1}")]
    AlreadyInRoom(UserId, RoomId),

    /// No more participant slots.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The requested user state change is not in the transition table.
    #[error("invalid transition for user {user}: {from} -> {to}")]
    InvalidTransition {
        user: UserId,
        from: MultiplayerUserState,
        to: MultiplayerUserState,
    },

    /// The room is in a state that doesn't allow this operation,
    /// e.g. changing settings mid-match.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// Only the host may do this.
    #[error("user {0} is not the host")]
    NotHost(UserId),

    /// A room cannot be created without at least one playlist item.
    #[error("playlist must contain at least one item")]
    EmptyPlaylist,

    /// The playlist item is incompatible with its beatmap or ruleset.
    #[error("invalid playlist item: {0}")]
    InvalidPlaylistItem(String),

    #[error("playlist item {0} not found")]
    PlaylistItemNotFound(PlaylistItemId),

    /// The user's mod selection is not allowed on the current item.
    #[error("invalid mods: {0}")]
    InvalidMods(String),

    /// The user already has the maximum number of queued items.
    #[error("user {0} has reached the playlist item limit")]
    PlaylistLimitReached(UserId),

    #[error("wrong password for room {0}")]
    InvalidPassword(RoomId),

    /// The room has been closed; it accepts no further changes.
    #[error("room {0} is closed")]
    Closed(RoomId),

    /// The manager's [`RoomConfig`](crate::RoomConfig) cannot be used to
    /// open rooms.
    #[error("invalid room config: {0}")]
    InvalidConfig(String),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
