// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The contract for a hardware compare/overflow timer (TCA-like) with three
//! independent channels, used by the Modbus RTU arbiter to implement its
//! T1.5/T3.5/T4.0 inter-character and inter-frame timing.
//!
//! Each received character is expected to restart the timer from zero
//! (typically by the UART driver's RX ISR calling `start` again), so the
//! three channels measure "time since the last character" rather than
//! wall-clock time.

#![cfg_attr(not(test), no_std)]

use abi::Handle;

/// A three-channel hardware compare/overflow timer.
pub trait HwTimer {
    /// Programs the three compare values, in ticks from the last `start`.
    fn set_compare(&mut self, c0: u32, c1: u32, c2: u32);

    /// Registers the handles notified when each compare channel (and the
    /// overflow channel) matches.
    fn react_on_compare(&mut self, h0: Handle, h1: Handle, h2: Handle);
    fn react_on_overflow(&mut self, handle: Handle);

    /// Restarts the timer from zero.
    ///
    /// Must, in order: stop the timer, clear any pending compare/overflow
    /// interrupt flags, purge any already-pending reactor notifications for
    /// the registered handles (so a stale event from before this restart
    /// cannot be mistaken for a fresh one), reset the counter, and
    /// re-enable. Getting this ordering wrong reintroduces exactly the race
    /// the timer exists to prevent.
    fn start(&mut self);

    fn stop(&mut self);
}

pub mod sim {
    //! An in-memory compare/overflow timer double for host tests and the
    //! demo binary.

    use super::HwTimer;
    use abi::{Handle, Mask};
    use runtime::Reactor;

    pub struct SimHwTimer<'r, const N: usize> {
        reactor: &'r Reactor<N>,
        compares: [u32; 3],
        handles: [Option<Handle>; 3],
        overflow_handle: Option<Handle>,
        running: bool,
        elapsed: u32,
    }

    impl<'r, const N: usize> SimHwTimer<'r, N> {
        pub fn new(reactor: &'r Reactor<N>) -> Self {
            SimHwTimer {
                reactor,
                compares: [0; 3],
                handles: [None; 3],
                overflow_handle: None,
                running: false,
                elapsed: 0,
            }
        }

        /// Test/demo hook: advances simulated elapsed-ticks-since-start by
        /// `ticks`, firing any compare or overflow channel crossed.
        pub fn advance(&mut self, ticks: u32) {
            if !self.running {
                return;
            }
            let before = self.elapsed;
            self.elapsed = self.elapsed.saturating_add(ticks);
            for (i, compare) in self.compares.iter().enumerate() {
                if before < *compare && self.elapsed >= *compare {
                    if let Some(h) = self.handles[i] {
                        self.reactor.notify(h, 0);
                    }
                }
            }
        }

        /// Test/demo hook: fires the overflow channel directly.
        pub fn overflow(&mut self) {
            if let Some(h) = self.overflow_handle {
                self.reactor.notify(h, 0);
            }
        }
    }

    impl<'r, const N: usize> HwTimer for SimHwTimer<'r, N> {
        fn set_compare(&mut self, c0: u32, c1: u32, c2: u32) {
            self.compares = [c0, c1, c2];
        }

        fn react_on_compare(&mut self, h0: Handle, h1: Handle, h2: Handle) {
            self.handles = [Some(h0), Some(h1), Some(h2)];
        }

        fn react_on_overflow(&mut self, handle: Handle) {
            self.overflow_handle = Some(handle);
        }

        fn start(&mut self) {
            self.stop();
            let mut stale = Mask::EMPTY;
            for h in self.handles.iter().flatten() {
                stale.insert(*h);
            }
            if let Some(h) = self.overflow_handle {
                stale.insert(h);
            }
            self.reactor.clear(stale);
            self.elapsed = 0;
            self.running = true;
        }

        fn stop(&mut self) {
            self.running = false;
        }
    }
}
