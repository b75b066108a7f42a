//! User and room state machines.
//!
//! Both enums carry their own transition tables. The room controller
//! consults them before every mutation and never applies an edge that
//! `can_transition_to` rejects.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MultiplayerUserState
// ---------------------------------------------------------------------------

/// A participant's readiness/gameplay phase within a room.
///
/// ```text
/// Idle ──→ Ready ──→ WaitingForLoad ──→ Loaded ──→ Playing
///  │ ↑       │              │              │          │
///  │ └───────┴──────────────┴──────────────┴──────────┘  (back to Idle)
///  ↓         ↓
/// Spectating ──→ Idle
/// ```
///
/// - **Idle**: in the lobby, not ready.
/// - **Ready**: waiting for the host to start the match.
/// - **Spectating**: watching instead of playing. Mutually exclusive
///   with the gameplay phases by construction.
/// - **WaitingForLoad**: the match started; the client is loading.
/// - **Loaded**: loaded, waiting for everyone else.
/// - **Playing**: in gameplay.
///
/// There is no terminal state: every user returns to `Idle` after a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MultiplayerUserState {
    #[default]
    Idle,
    Ready,
    Spectating,
    WaitingForLoad,
    Loaded,
    Playing,
}

impl MultiplayerUserState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Ready,
        Self::Spectating,
        Self::WaitingForLoad,
        Self::Loaded,
        Self::Playing,
    ];

    /// Returns `true` if moving from `self` to `target` is allowed.
    ///
    /// A state never transitions to itself.
    pub fn can_transition_to(self, target: Self) -> bool {
        use MultiplayerUserState::*;
        matches!(
            (self, target),
            (Idle, Ready)
                | (Idle, Spectating)
                | (Ready, Idle)
                | (Ready, Spectating)
                | (Ready, WaitingForLoad)
                | (Spectating, Idle)
                | (WaitingForLoad, Loaded)
                | (WaitingForLoad, Idle)
                | (Loaded, Playing)
                | (Loaded, Idle)
                | (Playing, Idle)
        )
    }

    /// Returns `true` for the phases of a running match:
    /// `WaitingForLoad`, `Loaded`, and `Playing`.
    pub fn is_gameplay(self) -> bool {
        matches!(self, Self::WaitingForLoad | Self::Loaded | Self::Playing)
    }
}

impl std::fmt::Display for MultiplayerUserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Ready => "Ready",
            Self::Spectating => "Spectating",
            Self::WaitingForLoad => "WaitingForLoad",
            Self::Loaded => "Loaded",
            Self::Playing => "Playing",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// MultiplayerRoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Idle → WaitingForLoad → Playing → Idle      (one match)
///            └──────────────────────→ Idle    (everyone left loading)
/// Idle | WaitingForLoad | Playing → Closed
/// ```
///
/// The room follows the aggregate state of its users; `Closed` is
/// terminal for the room instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MultiplayerRoomState {
    #[default]
    Idle,
    WaitingForLoad,
    Playing,
    Closed,
}

impl MultiplayerRoomState {
    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        use MultiplayerRoomState::*;
        match (self, target) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, WaitingForLoad)
            | (WaitingForLoad, Playing)
            | (WaitingForLoad, Idle)
            | (Playing, Idle) => true,
            _ => false,
        }
    }

    /// Returns `true` while a match is loading or being played.
    pub fn is_in_match(self) -> bool {
        matches!(self, Self::WaitingForLoad | Self::Playing)
    }

    /// Returns `true` once the room has been closed.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for MultiplayerRoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::WaitingForLoad => "WaitingForLoad",
            Self::Playing => "Playing",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}
