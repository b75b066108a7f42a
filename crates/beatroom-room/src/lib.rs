//! Multiplayer rooms for Beatroom.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns a
//! [`RoomController`], the state machine holding the room's users, their
//! states, and the playlist.
//!
//! # Key types
//!
//! - [`RoomController`]: the rules of one room, usable without an actor
//! - [`RoomManager`]: creates rooms, routes users, one room per user
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RulesetCatalog`]: which beatmaps and mods a room accepts
//! - [`Playlist`]: ordered items and the current-item pointer

mod catalog;
mod config;
mod controller;
mod error;
mod manager;
mod playlist;
mod room;

pub use catalog::{RulesetCatalog, StandardRulesets};
pub use config::RoomConfig;
pub use controller::{RoomController, UpdateReceiver, UpdateSender};
pub use error::RoomError;
pub use manager::RoomManager;
pub use playlist::{Advance, Playlist};
pub use room::{JoinedRoom, RoomHandle, RoomInfo};
