//! Room data model for beatroom.
//!
//! This crate defines what a multiplayer room *is*, independently of who
//! mutates it:
//!
//! - **Types** ([`RoomSnapshot`], [`RoomUser`], [`PlaylistItem`], ids):
//!   the data observers hold.
//! - **State machines** ([`MultiplayerUserState`], [`MultiplayerRoomState`])
//!   with their transition tables.
//! - **Notifications** ([`RoomEvent`], [`RoomUpdate`]) and snapshot replay
//!   ([`RoomSnapshot::apply`]).
//! - **Errors** ([`ProtocolError`]): what can go wrong during replay.
//!
//! # Architecture
//!
//! ```text
//! Room controller (beatroom-room) ──RoomUpdate──→ observers (UI, client)
//!                 └── both sides speak the types in this crate
//! ```

mod error;
mod event;
mod state;
mod types;

pub use error::ProtocolError;
pub use event::{RoomEvent, RoomUpdate};
pub use state::{MultiplayerRoomState, MultiplayerUserState};
pub use types::{
    ApiMod, BeatmapId, BeatmapRef, NewPlaylistItem, PlaylistItem, PlaylistItemId, QueueMode,
    RoomId, RoomSettings, RoomSnapshot, RoomUser, RulesetId, UserId,
};
