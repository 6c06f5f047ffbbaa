//! Playlist storage with current-index tracking.
//!
//! Items and their stream handles live in two index-aligned vectors that
//! every mutation updates in lockstep. Mutations that shift positions also
//! shift the current index so it keeps denoting the same logical slot.

use std::sync::Weak;

use super::item::{PlaylistItem, SharedItem};
use super::stream::{HandleId, StreamContext, StreamHandle};
use crate::error::{Error, Result};

/// Ordered items plus one stream handle per item.
#[derive(Debug)]
pub struct PlaylistStore {
    /// All items, insertion order significant
    items: Vec<SharedItem>,
    /// Handles, `handles[i]` belongs to `items[i]`
    handles: Vec<StreamHandle>,
    /// Active slot (`None` iff empty)
    current: Option<usize>,
    context: Weak<StreamContext>,
    next_id: u64,
}

impl PlaylistStore {
    pub(crate) fn new(context: Weak<StreamContext>) -> Self {
        Self {
            items: Vec::new(),
            handles: Vec::new(),
            current: None,
            context,
            next_id: 1,
        }
    }

    fn make_handle(&mut self, item: &dyn PlaylistItem) -> StreamHandle {
        let id = HandleId(self.next_id);
        self.next_id += 1;
        StreamHandle::new(id, item, self.context.clone())
    }

    /// Check if the playlist is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// All items in order.
    pub fn items(&self) -> &[SharedItem] {
        &self.items
    }

    /// Item at an index.
    pub fn item(&self, index: usize) -> Option<&SharedItem> {
        self.items.get(index)
    }

    /// Current slot, `None` when empty.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Item at the current slot.
    pub fn current_item(&self) -> Option<&SharedItem> {
        self.current.and_then(|i| self.items.get(i))
    }

    pub fn handle(&self, index: usize) -> Option<&StreamHandle> {
        self.handles.get(index)
    }

    pub fn handle_mut(&mut self, index: usize) -> Option<&mut StreamHandle> {
        self.handles.get_mut(index)
    }

    pub fn current_handle(&self) -> Option<&StreamHandle> {
        self.current.and_then(|i| self.handles.get(i))
    }

    pub fn current_handle_mut(&mut self) -> Option<&mut StreamHandle> {
        self.current.and_then(|i| self.handles.get_mut(i))
    }

    /// All handles, index-aligned with the items.
    pub fn handles_mut(&mut self) -> impl Iterator<Item = &mut StreamHandle> {
        self.handles.iter_mut()
    }

    /// Whether the current slot's transport reports playing.
    pub fn is_current_playing(&self) -> bool {
        self.current_handle().is_some_and(|h| h.is_playing())
    }

    /// Index of the first item with this locator.
    pub fn position_of(&self, locator: &str) -> Option<usize> {
        self.items.iter().position(|item| item.locator() == locator)
    }

    /// Replace the whole playlist.
    ///
    /// Existing handles are stopped and discarded. The current index becomes
    /// `start` when it is in range, otherwise the first item. Returns whether
    /// `start` was valid. An empty `items` is rejected with no state change.
    pub fn load(&mut self, items: Vec<SharedItem>, start: usize) -> Result<bool> {
        if items.is_empty() {
            return Err(Error::invalid_index(start, 0));
        }

        self.deactivate_all();
        self.handles.clear();
        self.items.clear();

        let handles: Vec<StreamHandle> = items
            .iter()
            .map(|item| self.make_handle(item.as_ref()))
            .collect();
        self.items = items;
        self.handles = handles;

        let valid = start < self.items.len();
        self.current = Some(if valid { start } else { 0 });
        tracing::debug!("Loaded playlist of {} items (start {})", self.items.len(), start);
        Ok(valid)
    }

    /// Add an item to the end.
    pub fn append(&mut self, item: SharedItem) {
        let handle = self.make_handle(item.as_ref());
        self.items.push(item);
        self.handles.push(handle);
        if self.current.is_none() {
            self.current = Some(0);
        }
    }

    /// Insert an item at `at` (`at <= len`).
    pub fn insert(&mut self, item: SharedItem, at: usize) -> Result<()> {
        if at > self.items.len() {
            return Err(Error::invalid_index(at, self.items.len()));
        }
        if self.items.is_empty() {
            self.append(item);
            return Ok(());
        }

        let handle = self.make_handle(item.as_ref());
        self.items.insert(at, item);
        self.handles.insert(at, handle);

        if let Some(pos) = self.current
            && at <= pos
        {
            self.current = Some(pos + 1);
        }
        Ok(())
    }

    /// Move an item from one position to another.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.items.len();
        if from >= len {
            return Err(Error::invalid_index(from, len));
        }
        if to >= len {
            return Err(Error::invalid_index(to, len));
        }
        if from == to {
            return Ok(());
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);
        let handle = self.handles.remove(from);
        self.handles.insert(to, handle);

        // Adjust current position
        if let Some(pos) = self.current {
            if from == pos {
                self.current = Some(to);
            } else if from < pos && to >= pos {
                self.current = Some(pos - 1);
            } else if from > pos && to <= pos {
                self.current = Some(pos + 1);
            }
        }
        Ok(())
    }

    /// Replace the item (and its handle) at `at`.
    ///
    /// The current slot is never replaced: that would orphan its in-flight
    /// transport.
    pub fn replace(&mut self, at: usize, item: SharedItem) -> Result<SharedItem> {
        if at >= self.items.len() {
            return Err(Error::invalid_index(at, self.items.len()));
        }
        if self.current == Some(at) {
            return Err(Error::ActiveSlotProtected(at));
        }

        let handle = self.make_handle(item.as_ref());
        // The old handle stops its transport on drop
        self.handles[at] = handle;
        Ok(std::mem::replace(&mut self.items[at], item))
    }

    /// Remove the item at `at`.
    ///
    /// Rejected when `at` is the current slot and its transport is playing.
    /// Afterwards the current index is re-resolved by the previous current
    /// item's locator. If the removed item was itself current, the current
    /// index stays on the same slot, clamped to the new length.
    pub fn remove(&mut self, at: usize) -> Result<SharedItem> {
        if at >= self.items.len() {
            return Err(Error::invalid_index(at, self.items.len()));
        }
        if self.current == Some(at) && self.handles[at].is_playing() {
            return Err(Error::ActiveSlotProtected(at));
        }

        let previous = self.current;
        let previous_locator = self.current_item().map(|item| item.locator().to_string());

        let removed = self.items.remove(at);
        self.handles.remove(at);

        self.current = match (previous, previous_locator) {
            _ if self.items.is_empty() => None,
            (Some(pos), Some(locator)) if pos != at => {
                let expected = if at < pos { pos - 1 } else { pos };
                if self.items[expected].locator() == locator {
                    Some(expected)
                } else {
                    self.position_of(&locator).or(Some(expected))
                }
            }
            (Some(pos), _) => Some(pos.min(self.items.len() - 1)),
            (None, _) => Some(0),
        };
        Ok(removed)
    }

    /// Point the current index at `index`.
    pub fn set_current(&mut self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(Error::invalid_index(index, self.items.len()));
        }
        self.current = Some(index);
        Ok(())
    }

    /// Stop every handle except the one at `active`.
    pub fn deactivate_inactive(&mut self, active: usize) {
        for (index, handle) in self.handles.iter_mut().enumerate() {
            if index != active {
                handle.deactivate();
            }
        }
    }

    /// Stop every handle.
    pub fn deactivate_all(&mut self) {
        for handle in &mut self.handles {
            handle.deactivate();
        }
    }

    /// Index of the handle with this id.
    pub fn index_of_handle(&self, id: HandleId) -> Option<usize> {
        self.handles.iter().position(|h| h.id() == id)
    }
}
