//! Pending row ring for one channel.
//!
//! Same index separation as a packet buffer:
//! - HeapRb stores slab keys in arrival order
//! - Slab stores the channel rows themselves
//!
//! Rows are fixed-size, so popped allocations are recycled for later pushes.

use std::fmt;

use ringbuf::{traits::*, HeapRb};
use slab::Slab;

use crate::error::ReconstructionError;

/// Bounded FIFO of channel rows waiting for their sibling channels
pub struct PendingRing {
    channel: usize,
    /// Slab keys in arrival order
    index: HeapRb<usize>,
    storage: Slab<Vec<u8>>,
    spare: Vec<Vec<u8>>,
    capacity: usize,
    row_bytes: usize,
    high_water: usize,
}

impl fmt::Debug for PendingRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRing")
            .field("channel", &self.channel)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("high_water", &self.high_water)
            .finish()
    }
}

impl PendingRing {
    /// Ring for `capacity` rows of `row_bytes` bytes each
    pub fn new(channel: usize, capacity: usize, row_bytes: usize) -> Self {
        Self {
            channel,
            // HeapRb cannot be zero-sized; `capacity` is enforced separately
            index: HeapRb::new(capacity.max(1)),
            storage: Slab::with_capacity(capacity),
            spare: Vec::new(),
            capacity,
            row_bytes,
            high_water: 0,
        }
    }

    /// Append a row filled in place by `fill`
    ///
    /// # Errors
    /// `RingOverflow` when the ring already holds `capacity` rows.
    pub fn push_with<F>(&mut self, fill: F) -> Result<(), ReconstructionError>
    where
        F: FnOnce(&mut [u8]),
    {
        if self.len() >= self.capacity {
            return Err(ReconstructionError::RingOverflow {
                channel: self.channel,
                capacity: self.capacity,
            });
        }

        let mut row = self.spare.pop().unwrap_or_default();
        row.resize(self.row_bytes, 0);
        fill(&mut row);

        let key = self.storage.insert(row);
        if self.index.try_push(key).is_err() {
            self.storage.remove(key);
            return Err(ReconstructionError::RingOverflow {
                channel: self.channel,
                capacity: self.capacity,
            });
        }

        self.high_water = self.high_water.max(self.len());
        Ok(())
    }

    /// Move the oldest row into `dst`; false when empty
    pub fn pop_into(&mut self, dst: &mut [u8]) -> bool {
        let Some(key) = self.index.try_pop() else {
            return false;
        };
        let row = self.storage.remove(key);
        let n = dst.len().min(row.len());
        dst[..n].copy_from_slice(&row[..n]);
        self.spare.push(row);
        true
    }

    /// Drop every pending row, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let mut discarded = 0;
        while let Some(key) = self.index.try_pop() {
            let row = self.storage.remove(key);
            self.spare.push(row);
            discarded += 1;
        }
        discarded
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest occupancy seen since creation
    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}
