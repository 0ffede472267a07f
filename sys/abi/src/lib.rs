// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared types between the reactor, the timer wheel, and the drivers that
//! notify them. These are kept in their own crate (rather than folded into
//! `runtime`) so that driver crates can depend on `Handle`/`Mask`/`Tick`
//! without pulling in the dispatch loop itself.

#![no_std]

use core::cmp::Ordering;
use core::ops::Add;

/// Upper bound on the number of handles a single reactor instance can hold.
///
/// Chosen so that the pending bitset, and therefore a `Mask`, fits in a
/// single machine word on every target this runtime cares about. Raising it
/// would require widening `Mask`'s backing integer.
pub const MAX_HANDLES: usize = 32;

/// An opaque identifier for a registered reactor callback.
///
/// Handles are allocated once, at registration time, and are never recycled:
/// there is no `unregister`. `Handle::index` exposes the underlying bit
/// position for code (the reactor, the timer wheel) that needs to index
/// parallel arrays; everyone else should treat a `Handle` as opaque.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle(u8);

impl Handle {
    /// Constructs a handle from a raw index.
    ///
    /// Only callable within this crate and `runtime`'s registration path,
    /// which is the sole source of truth for which indices are in use.
    #[doc(hidden)]
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < MAX_HANDLES);
        Handle(index as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The two priority classes a handle can be registered under.
///
/// There is deliberately no `PartialOrd`/`Ord` here: "more important" is a
/// property of *handle index*, not of this enum, once registration has
/// packed high-priority handles at the low end of the table and
/// low-priority handles at the high end. Comparing `Priority` values
/// directly would invite someone to sort by it instead of by index, which
/// is not how dispatch order actually works.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

/// A bitset over the handle space, one bit per `Handle`.
///
/// Used both as the interrupt-visible pending-notification set and, as a
/// plain value type, by the pending-request arbiter to queue requestors of
/// a shared resource. Bit 0 is the highest priority: packing high-priority
/// handles from the low end means "highest priority pending" reduces to
/// counting trailing zeros.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Mask(u32);

impl Mask {
    pub const EMPTY: Mask = Mask(0);

    pub fn mask_of(handle: Handle) -> Self {
        Mask(1 << handle.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, handle: Handle) -> bool {
        self.0 & (1 << handle.0) != 0
    }

    /// Sets the bit for `handle`. Idempotent.
    pub fn insert(&mut self, handle: Handle) {
        self.0 |= 1 << handle.0;
    }

    /// Clears every bit also set in `other`.
    pub fn remove(&mut self, other: Mask) {
        self.0 &= !other.0;
    }

    pub fn union(self, other: Mask) -> Self {
        Mask(self.0 | other.0)
    }

    /// Removes and returns the lowest-index (highest-priority) set bit.
    pub fn pop(&mut self) -> Option<Handle> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Some(Handle(index))
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(bits: u32) -> Self {
        Mask(bits)
    }
}

/// A free-running tick counter, incremented by a periodic hardware
/// interrupt. Comparisons are always relative: `Tick` wraps every 2^32
/// ticks, and `signed_diff` is the only sound way to tell which of two
/// ticks comes first once wraparound is in play.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tick(pub u32);

impl Tick {
    pub fn zero() -> Self {
        Tick(0)
    }

    /// `self - other`, as a signed quantity. Valid as long as the true
    /// separation between the two ticks is less than half the counter
    /// range, which holds for any deadline scheduled less than ~24 days
    /// out at a 1 ms tick.
    pub fn signed_diff(self, other: Tick) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }

    /// True if `self` is at or before `other` on the wraparound-correct
    /// timeline, i.e. a deadline of `self` has already arrived by `other`.
    pub fn is_at_or_before(self, other: Tick) -> bool {
        other.signed_diff(self) >= 0
    }
}

impl Add<u32> for Tick {
    type Output = Tick;

    fn add(self, ticks: u32) -> Tick {
        Tick(self.0.wrapping_add(ticks))
    }
}

impl PartialOrd for Tick {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tick {
    /// Wraparound-aware ordering, usable by the timer wheel's insertion
    /// sort. Only meaningful for ticks that are "close" to each other in
    /// real time; see `signed_diff`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.signed_diff(*other).cmp(&0)
    }
}

/// Identifies one arming of a timer wheel entry.
///
/// Distinct from `Handle`: many timers may target the same handle, and a
/// repeating timer keeps the same instance across re-arms so that
/// `TimerWheel::cancel` remains valid for its whole repeating lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TimerInstance(pub(crate) u32);

impl TimerInstance {
    #[doc(hidden)]
    pub fn from_raw(id: u32) -> Self {
        TimerInstance(id)
    }
}
