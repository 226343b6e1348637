#![forbid(unsafe_code)]

//! Tracked allocation accounting and fixed-size pools.
//!
//! This is an accounting layer, not an allocator: subsystems report the
//! buffers they hold and the tracker keeps totals, a peak watermark, and
//! a leak check. The advisory ceiling turns `track` into a failure point
//! so callers surface `NoMemory` upstream instead of overcommitting a
//! small device.
//!
//! [`FixedPool`] hands out block handles in O(1) using a bitmap of
//! occupancy, for subsystems that churn through same-sized buffers.

use std::collections::HashMap;

use slate_core::error::{SysError, SysResult};
use slate_core::time::Ticks;
use tracing::warn;

/// Stable handle to a tracked allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocId(u64);

#[derive(Debug, Clone)]
struct AllocationRecord {
    size: usize,
    tag: &'static str,
    at: Ticks,
}

/// Tracked allocation registry with an advisory ceiling.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    live: HashMap<u64, AllocationRecord>,
    next_id: u64,
    total: usize,
    peak: usize,
    ceiling: usize,
    failed: u64,
}

impl MemoryTracker {
    /// Tracker with a ceiling. 0 disables the ceiling.
    #[must_use]
    pub fn new(ceiling_bytes: usize) -> Self {
        Self {
            ceiling: ceiling_bytes,
            ..Self::default()
        }
    }

    /// Record an allocation. Fails with [`SysError::NoMemory`] when it
    /// would push the total past the ceiling.
    pub fn track(&mut self, size: usize, tag: &'static str, now: Ticks) -> SysResult<AllocId> {
        if self.ceiling > 0 && self.total.saturating_add(size) > self.ceiling {
            self.failed += 1;
            warn!(size, tag, total = self.total, ceiling = self.ceiling, "allocation over ceiling");
            return Err(SysError::NoMemory);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, AllocationRecord { size, tag, at: now });
        self.total += size;
        self.peak = self.peak.max(self.total);
        Ok(AllocId(id))
    }

    /// Release a tracked allocation. Returns whether the id was live.
    pub fn release(&mut self, id: AllocId) -> bool {
        match self.live.remove(&id.0) {
            Some(record) => {
                self.total -= record.size;
                true
            }
            None => false,
        }
    }

    /// Bytes currently tracked.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total
    }

    /// High-water mark.
    #[must_use]
    pub fn peak_bytes(&self) -> usize {
        self.peak
    }

    /// Allocations alive right now: the leak check.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Allocations refused by the ceiling.
    #[must_use]
    pub fn failed_allocations(&self) -> u64 {
        self.failed
    }

    /// Allocations alive that were tracked before `cutoff`. Long-lived
    /// entries from early boot are expected; everything else is suspect.
    #[must_use]
    pub fn live_older_than(&self, cutoff: Ticks) -> usize {
        self.live
            .values()
            .filter(|r| cutoff.is_at_or_after(r.at) && cutoff != r.at)
            .count()
    }

    /// Bytes currently tracked under one tag.
    #[must_use]
    pub fn bytes_for_tag(&self, tag: &str) -> usize {
        self.live
            .values()
            .filter(|r| r.tag == tag)
            .map(|r| r.size)
            .sum()
    }
}

const BITS_PER_WORD: usize = 64;

/// Fixed-size block pool with bitmap occupancy.
///
/// Handles are block indices; the pool does not hold the blocks
/// themselves, it arbitrates which index is in use.
#[derive(Debug)]
pub struct FixedPool {
    block_size: usize,
    capacity: usize,
    bitmap: Vec<u64>,
    in_use: usize,
}

impl FixedPool {
    /// Pool of `capacity` blocks of `block_size` bytes.
    #[must_use]
    pub fn new(block_size: usize, capacity: usize) -> Self {
        Self {
            block_size,
            capacity,
            bitmap: vec![0; capacity.div_ceil(BITS_PER_WORD)],
            in_use: 0,
        }
    }

    /// Claim a free block. O(words) worst case, O(1) amortized.
    pub fn acquire(&mut self) -> SysResult<usize> {
        for (word_idx, word) in self.bitmap.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }
            let bit = word.trailing_ones() as usize;
            let index = word_idx * BITS_PER_WORD + bit;
            if index >= self.capacity {
                break;
            }
            *word |= 1 << bit;
            self.in_use += 1;
            return Ok(index);
        }
        Err(SysError::NoMemory)
    }

    /// Return a block. Returns whether the index was claimed.
    pub fn release(&mut self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        let (word_idx, bit) = (index / BITS_PER_WORD, index % BITS_PER_WORD);
        let mask = 1u64 << bit;
        if self.bitmap[word_idx] & mask == 0 {
            return false;
        }
        self.bitmap[word_idx] &= !mask;
        self.in_use -= 1;
        true
    }

    /// Blocks currently claimed.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Blocks still free.
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity - self.in_use
    }

    /// The pool's block size in bytes.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}
