//! Unified error type for Beatroom.

use beatroom_protocol::{ProtocolError, UserId};
use beatroom_room::RoomError;

/// Top-level error wrapping the sub-crate errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BeatroomError {
    /// A replayed update didn't fit the local copy of the room.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The room rejected the request.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The client made a room call without being in a room.
    #[error("user {0} is not in a room")]
    NotInRoom(UserId),
}
