//! A room's playlist: ordered items plus a current-item pointer.
//!
//! Items play in insertion order. Everything before the pointer has been
//! played (expired); the pointer and everything after it has not. Played
//! items stay in the list so observers can show the room's history.

use beatroom_protocol::{NewPlaylistItem, PlaylistItem, PlaylistItemId, UserId};

use crate::RoomError;

/// What [`Playlist::finish_current`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    /// The item that was just played, now expired.
    pub expired: PlaylistItem,
    /// A fresh copy of `expired`, appended because nothing else was queued.
    pub requeued: Option<PlaylistItem>,
    /// The new current item.
    pub current: PlaylistItemId,
}

#[derive(Debug, Clone)]
pub struct Playlist {
    items: Vec<PlaylistItem>,
    /// Index of the current item. Always in bounds; `items` is never empty.
    current: usize,
    next_id: u64,
}

impl Playlist {
    /// Builds a playlist from the items a room was created with.
    ///
    /// Items are not validated here; that is the catalog's job.
    ///
    /// # Errors
    /// [`RoomError::EmptyPlaylist`] if `requests` is empty.
    pub fn new(owner: UserId, requests: Vec<NewPlaylistItem>) -> Result<Self, RoomError> {
        if requests.is_empty() {
            return Err(RoomError::EmptyPlaylist);
        }
        let mut playlist = Self {
            items: Vec::with_capacity(requests.len()),
            current: 0,
            next_id: 1,
        };
        for request in requests {
            playlist.push(owner, request);
        }
        Ok(playlist)
    }

    /// All items, played ones included, in play order.
    pub fn items(&self) -> &[PlaylistItem] {
        &self.items
    }

    pub fn current(&self) -> &PlaylistItem {
        &self.items[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn get(&self, id: PlaylistItemId) -> Option<&PlaylistItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items `owner` has queued that haven't been played yet.
    pub fn pending_for(&self, owner: UserId) -> usize {
        self.items
            .iter()
            .filter(|item| item.owner == owner && !item.expired)
            .count()
    }

    /// Appends an item and returns it.
    pub fn push(&mut self, owner: UserId, request: NewPlaylistItem) -> &PlaylistItem {
        let id = self.allocate_id();
        self.items.push(PlaylistItem::from_request(id, owner, request));
        let last = self.items.len() - 1;
        &self.items[last]
    }

    /// Removes a queued item.
    ///
    /// # Errors
    /// - [`RoomError::PlaylistItemNotFound`] if there is no such item
    /// - [`RoomError::InvalidState`] if the item was already played or is
    ///   the current item
    pub fn remove(&mut self, id: PlaylistItemId) -> Result<PlaylistItem, RoomError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(RoomError::PlaylistItemNotFound(id))?;
        if self.items[index].expired {
            return Err(RoomError::InvalidState(format!(
                "item {id} has already been played"
            )));
        }
        if index == self.current {
            return Err(RoomError::InvalidState(format!(
                "item {id} is the current item"
            )));
        }
        Ok(self.items.remove(index))
    }

    /// Expires the current item and moves the pointer one position forward.
    ///
    /// If no unplayed item follows, the expired item is re-queued as a
    /// fresh copy at the end, so the room always has something to play.
    pub fn finish_current(&mut self) -> Advance {
        self.items[self.current].expired = true;
        let expired = self.items[self.current].clone();

        let requeued = if self.current + 1 == self.items.len() {
            let id = self.allocate_id();
            let mut copy = expired.clone();
            copy.id = id;
            copy.expired = false;
            self.items.push(copy.clone());
            Some(copy)
        } else {
            None
        };

        self.current += 1;
        Advance {
            expired,
            requeued,
            current: self.items[self.current].id,
        }
    }

    fn allocate_id(&mut self) -> PlaylistItemId {
        let id = PlaylistItemId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatroom_protocol::{BeatmapId, BeatmapRef, RulesetId};

    fn request(beatmap: u64) -> NewPlaylistItem {
        NewPlaylistItem::new(BeatmapRef {
            id: BeatmapId(beatmap),
            ruleset_id: RulesetId::OSU,
        })
    }

    fn host() -> UserId {
        UserId(1)
    }

    #[test]
    fn test_new_empty_playlist_rejected() {
        assert_eq!(Playlist::new(host(), vec![]).unwrap_err(), RoomError::EmptyPlaylist);
    }

    #[test]
    fn test_new_assigns_sequential_ids_and_points_at_first() {
        let playlist = Playlist::new(host(), vec![request(10), request(20)]).unwrap();

        let ids: Vec<_> = playlist.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![PlaylistItemId(1), PlaylistItemId(2)]);
        assert_eq!(playlist.current().beatmap.id, BeatmapId(10));
        assert_eq!(playlist.current().owner, host());
    }

    #[test]
    fn test_finish_current_moves_to_next_item() {
        let mut playlist = Playlist::new(host(), vec![request(10), request(20)]).unwrap();

        let advance = playlist.finish_current();

        assert_eq!(advance.expired.id, PlaylistItemId(1));
        assert!(advance.expired.expired);
        assert!(advance.requeued.is_none());
        assert_eq!(advance.current, PlaylistItemId(2));
        assert_eq!(playlist.current_index(), 1);
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn test_finish_current_last_item_requeues_copy() {
        let mut playlist = Playlist::new(host(), vec![request(10)]).unwrap();

        let advance = playlist.finish_current();

        let copy = advance.requeued.expect("last item should be re-queued");
        assert_eq!(copy.id, PlaylistItemId(2));
        assert_eq!(copy.beatmap.id, BeatmapId(10));
        assert!(!copy.expired);
        assert_eq!(advance.current, copy.id);
        assert_eq!(playlist.current_index(), 1);
        assert!(playlist.items()[0].expired);
    }

    #[test]
    fn test_finish_current_always_moves_exactly_one_position() {
        let mut playlist = Playlist::new(host(), vec![request(10), request(20)]).unwrap();
        for expected in 1..=4 {
            playlist.finish_current();
            assert_eq!(playlist.current_index(), expected);
        }
    }

    #[test]
    fn test_remove_queued_item() {
        let mut playlist = Playlist::new(host(), vec![request(10), request(20)]).unwrap();

        let removed = playlist.remove(PlaylistItemId(2)).unwrap();

        assert_eq!(removed.beatmap.id, BeatmapId(20));
        assert_eq!(playlist.len(), 1);
    }

    #[test]
    fn test_remove_current_item_rejected() {
        let mut playlist = Playlist::new(host(), vec![request(10), request(20)]).unwrap();
        assert!(matches!(
            playlist.remove(PlaylistItemId(1)),
            Err(RoomError::InvalidState(_))
        ));
    }

    #[test]
    fn test_remove_played_item_rejected() {
        let mut playlist = Playlist::new(host(), vec![request(10), request(20)]).unwrap();
        playlist.finish_current();
        assert!(matches!(
            playlist.remove(PlaylistItemId(1)),
            Err(RoomError::InvalidState(_))
        ));
    }

    #[test]
    fn test_remove_unknown_item_rejected() {
        let mut playlist = Playlist::new(host(), vec![request(10)]).unwrap();
        assert_eq!(
            playlist.remove(PlaylistItemId(9)).unwrap_err(),
            RoomError::PlaylistItemNotFound(PlaylistItemId(9))
        );
    }

    #[test]
    fn test_pending_for_counts_unplayed_items_of_owner() {
        let mut playlist = Playlist::new(host(), vec![request(10)]).unwrap();
        playlist.push(UserId(2), request(20));
        playlist.push(UserId(2), request(30));
        assert_eq!(playlist.pending_for(UserId(2)), 2);
        assert_eq!(playlist.pending_for(host()), 1);

        playlist.finish_current();
        assert_eq!(playlist.pending_for(host()), 0);
    }
}
