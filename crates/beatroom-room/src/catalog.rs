//! The `RulesetCatalog` trait: what rulesets and mods a room accepts.
//!
//! The room controller is generic over a catalog. It asks the catalog
//! whether a playlist item is playable and whether a user's mod pick is
//! legal; everything else about rulesets stays outside the room.

use beatroom_protocol::{ApiMod, BeatmapRef, NewPlaylistItem, PlaylistItem, RulesetId};

use crate::RoomError;

/// Knowledge about rulesets and their mods.
///
/// All methods are associated functions (no `self`): a catalog is a type,
/// chosen once when the [`RoomManager`](crate::RoomManager) is created.
/// Only [`available_mods`](Self::available_mods) is required; the
/// validation methods have defaults built on top of it.
pub trait RulesetCatalog: Send + Sync + 'static {
    /// Acronyms of every mod `ruleset` offers, or `None` if the ruleset is
    /// unknown.
    fn available_mods(ruleset: RulesetId) -> Option<&'static [&'static str]>;

    /// Pairs of mods that cannot be combined. Order within a pair is
    /// irrelevant. Default: none.
    fn incompatible_mods() -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Returns `true` if `beatmap` can be played in `ruleset`.
    ///
    /// Default: a beatmap plays in its own ruleset, and osu! standard
    /// beatmaps convert to every other known ruleset.
    fn can_play(beatmap: &BeatmapRef, ruleset: RulesetId) -> bool {
        if Self::available_mods(ruleset).is_none() {
            return false;
        }
        beatmap.ruleset_id == ruleset || beatmap.ruleset_id == RulesetId::OSU
    }

    /// Returns `true` if `a` and `b` may be active together.
    fn are_compatible(a: &ApiMod, b: &ApiMod) -> bool {
        let (a, b) = (a.acronym.as_str(), b.acronym.as_str());
        !Self::incompatible_mods()
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Validates a playlist item before it enters a room.
    ///
    /// # Errors
    /// [`RoomError::InvalidPlaylistItem`] if the ruleset is unknown, the
    /// beatmap can't be played in it, a mod doesn't exist in it, a mod is
    /// listed twice or as both required and allowed, or a required mod
    /// conflicts with another required or allowed mod.
    fn validate_item(item: &NewPlaylistItem) -> Result<(), RoomError> {
        let ruleset = item.ruleset_id;
        let mods = Self::available_mods(ruleset).ok_or_else(|| {
            RoomError::InvalidPlaylistItem(format!("unknown ruleset {ruleset}"))
        })?;

        if !Self::can_play(&item.beatmap, ruleset) {
            return Err(RoomError::InvalidPlaylistItem(format!(
                "beatmap {} ({}) cannot be played in {ruleset}",
                item.beatmap.id, item.beatmap.ruleset_id
            )));
        }

        let all = item.required_mods.iter().chain(&item.allowed_mods);
        for (i, m) in all.clone().enumerate() {
            if !mods.contains(&m.acronym.as_str()) {
                return Err(RoomError::InvalidPlaylistItem(format!(
                    "mod {m} is not available in {ruleset}"
                )));
            }
            if all.clone().skip(i + 1).any(|other| other == m) {
                return Err(RoomError::InvalidPlaylistItem(format!(
                    "mod {m} is listed more than once"
                )));
            }
        }

        for required in &item.required_mods {
            if let Some(other) = all
                .clone()
                .find(|other| *other != required && !Self::are_compatible(required, other))
            {
                return Err(RoomError::InvalidPlaylistItem(format!(
                    "required mod {required} conflicts with {other}"
                )));
            }
        }

        Ok(())
    }

    /// Validates a user's free-mod pick against the current item.
    ///
    /// # Errors
    /// [`RoomError::InvalidMods`] if a mod isn't allowed on the item, is
    /// picked twice, or conflicts with a required mod or another pick.
    fn validate_user_mods(item: &PlaylistItem, mods: &[ApiMod]) -> Result<(), RoomError> {
        for (i, m) in mods.iter().enumerate() {
            if !item.allows(m) {
                return Err(RoomError::InvalidMods(format!(
                    "mod {m} is not allowed on {}",
                    item.id
                )));
            }
            if mods[i + 1..].contains(m) {
                return Err(RoomError::InvalidMods(format!("mod {m} picked more than once")));
            }
            let conflict = item
                .required_mods
                .iter()
                .chain(&mods[i + 1..])
                .find(|other| !Self::are_compatible(m, other));
            if let Some(other) = conflict {
                return Err(RoomError::InvalidMods(format!("{m} conflicts with {other}")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StandardRulesets
// ---------------------------------------------------------------------------

/// The four standard rulesets with their common mods.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRulesets;

const OSU_MODS: &[&str] = &[
    "EZ", "NF", "HT", "DC", "HR", "SD", "PF", "DT", "NC", "HD", "FL", "RX", "AP", "SO", "TD",
];
const TAIKO_MODS: &[&str] = &[
    "EZ", "NF", "HT", "DC", "HR", "SD", "PF", "DT", "NC", "HD", "FL", "RX", "SW",
];
const CATCH_MODS: &[&str] = &[
    "EZ", "NF", "HT", "DC", "HR", "SD", "PF", "DT", "NC", "HD", "FL", "RX",
];
const MANIA_MODS: &[&str] = &[
    "EZ", "NF", "HT", "DC", "SD", "PF", "DT", "NC", "FI", "HD", "FL", "MR",
];

const INCOMPATIBLE: &[(&str, &str)] = &[
    ("DT", "HT"),
    ("DT", "DC"),
    ("DT", "NC"),
    ("NC", "HT"),
    ("NC", "DC"),
    ("HT", "DC"),
    ("EZ", "HR"),
    ("SD", "PF"),
    ("NF", "SD"),
    ("NF", "PF"),
    ("RX", "AP"),
    ("AP", "SO"),
    ("FI", "HD"),
];

impl RulesetCatalog for StandardRulesets {
    fn available_mods(ruleset: RulesetId) -> Option<&'static [&'static str]> {
        match ruleset {
            RulesetId::OSU => Some(OSU_MODS),
            RulesetId::TAIKO => Some(TAIKO_MODS),
            RulesetId::CATCH => Some(CATCH_MODS),
            RulesetId::MANIA => Some(MANIA_MODS),
            _ => None,
        }
    }

    fn incompatible_mods() -> &'static [(&'static str, &'static str)] {
        INCOMPATIBLE
    }
}
