//! Playback queue with retained original order
//!
//! The queue keeps two sequences:
//! ```text
//! active:   the order playback walks (shuffled or not)
//! original: the order the queue was built in, restored when shuffle ends
//! ```
//! While unshuffled both sequences hold the same entries in the same order.
//! Entries are compared by `Arc` identity, so the same track queued twice
//! counts as two entries.

use crate::shuffle;
use aria_core::Track;
use rand::Rng;
use std::sync::Arc;

/// Ordered track list owned by the controller
#[derive(Debug, Clone, Default)]
pub struct Queue {
    active: Vec<Arc<Track>>,
    original: Vec<Arc<Track>>,
    shuffled: bool,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both orders, unshuffled
    pub fn replace(&mut self, tracks: Vec<Arc<Track>>) {
        self.active.clone_from(&tracks);
        self.original = tracks;
        self.shuffled = false;
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Track>> {
        self.active.get(index)
    }

    /// Active order
    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.active
    }

    /// Retained original order
    pub fn original(&self) -> &[Arc<Track>] {
        &self.original
    }

    /// Append to both orders
    pub fn push(&mut self, track: Arc<Track>) {
        self.original.push(Arc::clone(&track));
        self.active.push(track);
    }

    /// Remove an entry from the active order and the same entry from the original
    pub fn remove(&mut self, index: usize) -> Option<Arc<Track>> {
        if index >= self.active.len() {
            return None;
        }
        let track = self.active.remove(index);
        if let Some(pos) = self.original.iter().position(|t| Arc::ptr_eq(t, &track)) {
            self.original.remove(pos);
        }
        Some(track)
    }

    /// Swap two entries
    ///
    /// Unshuffled swaps are mirrored into the original order.
    pub fn swap(&mut self, a: usize, b: usize) -> bool {
        if a >= self.active.len() || b >= self.active.len() {
            return false;
        }
        self.active.swap(a, b);
        if !self.shuffled {
            self.original.swap(a, b);
        }
        true
    }

    /// Shuffle the active order in place
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        shuffle::shuffle_in_place(&mut self.active, rng);
        self.shuffled = true;
    }

    /// Put the active order back to the original
    pub fn restore_original_order(&mut self) {
        self.active.clone_from(&self.original);
        self.shuffled = false;
    }

    /// Position of an entry in the active order
    pub fn position_of(&self, track: &Arc<Track>) -> Option<usize> {
        self.active.iter().position(|t| Arc::ptr_eq(t, track))
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.original.clear();
        self.shuffled = false;
    }
}
