//! # Beatroom
//!
//! Multiplayer match rooms for rhythm games.
//!
//! A room holds a set of users, each moving through a small state machine
//! (idle, ready, loading, playing, ...), and a shared playlist of beatmaps.
//! The room state follows its users: once every ready player has loaded,
//! gameplay starts; once every player is back, the playlist advances.
//!
//! Rooms run as independent Tokio tasks. A [`MatchHub`] keeps track of
//! them, and a [`MultiplayerClient`] gives one user a locally replayed
//! copy of the room they are in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use beatroom::prelude::*;
//!
//! # async fn run() -> Result<(), BeatroomError> {
//! let hub = Arc::new(MatchHub::new());
//! let mut client = MultiplayerClient::new(UserId(1), hub);
//!
//! let beatmap = BeatmapRef { id: BeatmapId(75), ruleset_id: RulesetId::OSU };
//! client
//!     .create_room(RoomSettings::default(), vec![NewPlaylistItem::new(beatmap)])
//!     .await?;
//! client.change_state(MultiplayerUserState::Ready).await?;
//! client.start_match().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod hub;

pub use client::MultiplayerClient;
pub use error::BeatroomError;
pub use hub::{MatchHub, MatchHubBuilder};

pub use beatroom_protocol as protocol;
pub use beatroom_room as room;

pub mod prelude {
    pub use crate::{BeatroomError, MatchHub, MatchHubBuilder, MultiplayerClient};

    pub use beatroom_protocol::{
        ApiMod, BeatmapId, BeatmapRef, MultiplayerRoomState, MultiplayerUserState,
        NewPlaylistItem, PlaylistItem, PlaylistItemId, QueueMode, RoomEvent, RoomId,
        RoomSettings, RoomSnapshot, RoomUpdate, RoomUser, RulesetId, UserId,
    };
    pub use beatroom_room::{RoomConfig, RoomError, RoomHandle, RoomInfo, RulesetCatalog};
}
