//! Core data types for a multiplayer room.
//!
//! Everything here is plain data: identifiers, playlist items, users,
//! settings, and the room snapshot that observers hold. The types derive
//! `Serialize`/`Deserialize` so a network layer can ship them as-is, but
//! this crate itself never touches a socket.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{MultiplayerRoomState, MultiplayerUserState};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user (an online account).
///
/// Newtype over `u64` so a `UserId` can never be passed where a `RoomId`
/// is expected. Serialized transparently: `UserId(42)` is just `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a room (one multiplayer lobby).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Identifies one entry of a room's playlist. Unique within the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistItemId(pub u64);

impl fmt::Display for PlaylistItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I-{}", self.0)
    }
}

/// Identifies a beatmap (one difficulty of a song).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeatmapId(pub u64);

impl fmt::Display for BeatmapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B-{}", self.0)
    }
}

/// Identifies a ruleset (game mode).
///
/// The four standard rulesets have fixed online IDs, exposed as
/// associated constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulesetId(pub u32);

impl RulesetId {
    pub const OSU: Self = Self(0);
    pub const TAIKO: Self = Self(1);
    pub const CATCH: Self = Self(2);
    pub const MANIA: Self = Self(3);
}

impl fmt::Display for RulesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OSU => write!(f, "osu"),
            Self::TAIKO => write!(f, "taiko"),
            Self::CATCH => write!(f, "fruits"),
            Self::MANIA => write!(f, "mania"),
            Self(other) => write!(f, "ruleset-{other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Mods and beatmaps
// ---------------------------------------------------------------------------

/// A gameplay modifier, identified by its acronym (`"DT"`, `"HD"`, `"SW"`).
///
/// Which acronyms are meaningful depends on the ruleset; validating that
/// is the room layer's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiMod {
    pub acronym: String,
}

impl ApiMod {
    pub fn new(acronym: impl Into<String>) -> Self {
        Self {
            acronym: acronym.into(),
        }
    }
}

impl fmt::Display for ApiMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.acronym)
    }
}

/// A reference to a beatmap and the ruleset it was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeatmapRef {
    pub id: BeatmapId,
    pub ruleset_id: RulesetId,
}

// ---------------------------------------------------------------------------
// Playlist items
// ---------------------------------------------------------------------------

/// A request to add a playlist item. The room assigns the ID and owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlaylistItem {
    pub beatmap: BeatmapRef,
    pub ruleset_id: RulesetId,
    #[serde(default)]
    pub required_mods: Vec<ApiMod>,
    #[serde(default)]
    pub allowed_mods: Vec<ApiMod>,
}

impl NewPlaylistItem {
    /// An item playing `beatmap` in its own ruleset, with no mods.
    pub fn new(beatmap: BeatmapRef) -> Self {
        Self {
            beatmap,
            ruleset_id: beatmap.ruleset_id,
            required_mods: Vec::new(),
            allowed_mods: Vec::new(),
        }
    }

    /// Plays the beatmap in a different ruleset (a conversion).
    pub fn with_ruleset(mut self, ruleset_id: RulesetId) -> Self {
        self.ruleset_id = ruleset_id;
        self
    }

    pub fn with_required_mods(mut self, mods: Vec<ApiMod>) -> Self {
        self.required_mods = mods;
        self
    }

    pub fn with_allowed_mods(mut self, mods: Vec<ApiMod>) -> Self {
        self.allowed_mods = mods;
        self
    }
}

/// One entry in a room's playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: PlaylistItemId,
    /// The user who queued this item.
    pub owner: UserId,
    pub beatmap: BeatmapRef,
    pub ruleset_id: RulesetId,
    /// Mods every player must play with.
    pub required_mods: Vec<ApiMod>,
    /// Mods each player may choose freely ("free mods").
    pub allowed_mods: Vec<ApiMod>,
    /// Set once the item has been played (or its gameplay aborted).
    pub expired: bool,
}

impl PlaylistItem {
    /// Materializes a request into an item with an assigned ID and owner.
    pub fn from_request(id: PlaylistItemId, owner: UserId, request: NewPlaylistItem) -> Self {
        Self {
            id,
            owner,
            beatmap: request.beatmap,
            ruleset_id: request.ruleset_id,
            required_mods: request.required_mods,
            allowed_mods: request.allowed_mods,
            expired: false,
        }
    }

    /// Returns `true` if players may pick `m` as a free mod on this item.
    pub fn allows(&self, m: &ApiMod) -> bool {
        self.allowed_mods.contains(m)
    }
}

// ---------------------------------------------------------------------------
// Users and settings
// ---------------------------------------------------------------------------

/// A participant in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    pub user_id: UserId,
    pub state: MultiplayerUserState,
    /// The free mods this user picked for the current item.
    pub mods: Vec<ApiMod>,
}

impl RoomUser {
    /// A freshly joined user: `Idle`, no mods.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            state: MultiplayerUserState::Idle,
            mods: Vec::new(),
        }
    }
}

/// Who may add items to the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QueueMode {
    /// Only the host edits the playlist.
    #[default]
    HostOnly,
    /// Every participant may queue items; they play in insertion order.
    AllPlayers,
}

/// Host-editable room settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub name: String,
    /// When set, joining requires this password.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub queue_mode: QueueMode,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            name: "Multiplayer Room".to_string(),
            password: None,
            queue_mode: QueueMode::HostOnly,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomSnapshot
// ---------------------------------------------------------------------------

/// A full copy of a room, as handed to observers.
///
/// The controller produces one on subscription; after that, the observer
/// keeps it current by replaying [`RoomUpdate`](crate::RoomUpdate)s with
/// [`RoomSnapshot::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub state: MultiplayerRoomState,
    /// `None` only after the last user left.
    pub host: Option<UserId>,
    pub settings: RoomSettings,
    /// Participants in join order.
    pub users: Vec<RoomUser>,
    /// Playlist in insertion order, expired items included.
    pub playlist: Vec<PlaylistItem>,
    pub current_item: PlaylistItemId,
    /// Sequence number of the last update folded into this snapshot.
    pub seq: u64,
}

impl RoomSnapshot {
    pub fn user(&self, user_id: UserId) -> Option<&RoomUser> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    pub fn user_mut(&mut self, user_id: UserId) -> Option<&mut RoomUser> {
        self.users.iter_mut().find(|u| u.user_id == user_id)
    }

    pub fn item(&self, item_id: PlaylistItemId) -> Option<&PlaylistItem> {
        self.playlist.iter().find(|i| i.id == item_id)
    }

    /// The item the next match will play.
    pub fn current_item(&self) -> Option<&PlaylistItem> {
        self.item(self.current_item)
    }

    pub fn is_host(&self, user_id: UserId) -> bool {
        self.host == Some(user_id)
    }

    /// Number of users in `state`.
    pub fn count_in(&self, state: MultiplayerUserState) -> usize {
        self.users.iter().filter(|u| u.state == state).count()
    }
}

// =========================================================================
// Tests
// =========================================================================
