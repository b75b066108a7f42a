//! Error types for the protocol layer.

use crate::{PlaylistItemId, UserId};

/// Errors raised while replaying room updates onto a snapshot.
///
/// Any of these means the observer's copy has diverged from the room and
/// should be replaced by a fresh snapshot.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// An update arrived out of sequence (one was lost or replayed).
    #[error("out-of-order update: expected seq {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    /// The update names a user the snapshot doesn't know about.
    #[error("update references unknown user {0}")]
    UnknownUser(UserId),

    /// The update names a playlist item the snapshot doesn't know about.
    #[error("update references unknown playlist item {0}")]
    UnknownPlaylistItem(PlaylistItemId),
}
