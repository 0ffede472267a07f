// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fixed-capacity, deadline-sorted ring of software timers.
//!
//! Entries live in a contiguous circular segment of a fixed-size array,
//! always sorted by deadline using wraparound-correct (signed-difference)
//! comparison. `on_tick` is meant to be called from a reactor handler
//! driven by the hardware tick, never directly from an ISR, so that
//! re-notification of expired timers' targets always happens in main
//! context.

use abi::{Handle, Tick, TimerInstance};

use crate::alert;

#[derive(Copy, Clone)]
struct Entry {
    target: Handle,
    instance: TimerInstance,
    deadline: Tick,
    repeat_interval: u32,
    arg: u32,
}

/// A software timer wheel with room for `M` simultaneously-armed timers.
pub struct TimerWheel<const M: usize> {
    entries: [Option<Entry>; M],
    /// Index of the first active entry (the earliest deadline), or `len ==
    /// 0` if none are armed. The active segment is `entries[0..len]` after
    /// every operation: we keep it compacted rather than treating it as a
    /// true ring, trading an O(M) shift on arm/cancel for a simpler
    /// invariant (this runtime's `M` is small, typically under 32).
    len: usize,
    next_instance: u32,
}

impl<const M: usize> TimerWheel<M> {
    pub const fn new() -> Self {
        TimerWheel {
            entries: [None; M],
            len: 0,
            next_instance: 0,
        }
    }

    fn fresh_instance(&mut self) -> TimerInstance {
        let id = self.next_instance;
        self.next_instance = self.next_instance.wrapping_add(1);
        TimerInstance::from_raw(id)
    }

    /// Arms a new timer, returning its instance. `deadline` is an absolute
    /// tick value. `repeat_interval == 0` means one-shot.
    pub fn arm(
        &mut self,
        target: Handle,
        deadline: Tick,
        repeat_interval: u32,
        arg: u32,
    ) -> TimerInstance {
        alert::fail_if(self.len >= M, "timer wheel full");

        let instance = self.fresh_instance();
        let entry = Entry {
            target,
            instance,
            deadline,
            repeat_interval,
            arg,
        };

        let insert_at = self.entries[..self.len]
            .iter()
            .position(|e| e.unwrap().deadline > deadline)
            .unwrap_or(self.len);

        let mut i = self.len;
        while i > insert_at {
            self.entries[i] = self.entries[i - 1];
            i -= 1;
        }
        self.entries[insert_at] = Some(entry);
        self.len += 1;

        instance
    }

    /// Cancels a pending timer instance. Returns whether it was still
    /// pending. Safe to call with an expired or unknown instance.
    pub fn cancel(&mut self, instance: TimerInstance) -> bool {
        let Some(pos) = self.entries[..self.len]
            .iter()
            .position(|e| e.unwrap().instance == instance)
        else {
            return false;
        };

        for i in pos..self.len - 1 {
            self.entries[i] = self.entries[i + 1];
        }
        self.len -= 1;
        self.entries[self.len] = None;
        true
    }

    /// Walks the sorted list from the head, popping and re-notifying every
    /// entry whose deadline has arrived (`deadline <= now`), re-arming
    /// repeating entries at `deadline + repeat_interval` under the *same*
    /// `TimerInstance`. `notify` is called once per expired entry with its
    /// target handle and stored argument.
    pub fn on_tick(&mut self, now: Tick, mut notify: impl FnMut(Handle, u32)) {
        loop {
            let Some(head) = self.entries[0] else {
                break;
            };
            if head.deadline.signed_diff(now) > 0 {
                break;
            }

            for i in 0..self.len - 1 {
                self.entries[i] = self.entries[i + 1];
            }
            self.len -= 1;
            self.entries[self.len] = None;

            notify(head.target, head.arg);

            if head.repeat_interval > 0 {
                let mut next_deadline = head.deadline + head.repeat_interval;
                if next_deadline.signed_diff(now) <= 0 {
                    next_deadline = now;
                }
                self.rearm_with_instance(
                    head.target,
                    head.instance,
                    next_deadline,
                    head.repeat_interval,
                    head.arg,
                );
            }
        }
    }

    fn rearm_with_instance(
        &mut self,
        target: Handle,
        instance: TimerInstance,
        deadline: Tick,
        repeat_interval: u32,
        arg: u32,
    ) {
        alert::fail_if(self.len >= M, "timer wheel full (repeat re-arm)");
        let entry = Entry {
            target,
            instance,
            deadline,
            repeat_interval,
            arg,
        };
        let insert_at = self.entries[..self.len]
            .iter()
            .position(|e| e.unwrap().deadline > deadline)
            .unwrap_or(self.len);
        let mut i = self.len;
        while i > insert_at {
            self.entries[i] = self.entries[i - 1];
            i -= 1;
        }
        self.entries[insert_at] = Some(entry);
        self.len += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl<const M: usize> Default for TimerWheel<M> {
    fn default() -> Self {
        Self::new()
    }
}
