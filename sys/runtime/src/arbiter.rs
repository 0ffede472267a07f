// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A `Mask`-based FIFO-within-priority-class queue for a single shared
//! resource (an I2C controller, a half-duplex bus) that only one requestor
//! can use at a time.
//!
//! This is main-context-only: unlike the reactor's pending set, nothing
//! here is touched from an ISR, so a plain `Mask` (rather than a
//! `critical_section`-guarded one) is sufficient.

use abi::{Handle, Mask};

/// Arbitrates a single shared resource among any number of requestors.
pub struct PendingArbiter {
    queued: Mask,
    busy: bool,
}

impl PendingArbiter {
    pub const fn new() -> Self {
        PendingArbiter {
            queued: Mask::EMPTY,
            busy: false,
        }
    }

    /// Queues `requestor` for the resource (idempotent if already queued)
    /// and immediately tries to start service.
    ///
    /// Returns the handle that was notified to begin service, if the
    /// resource was idle.
    pub fn request(&mut self, requestor: Handle) -> Option<Handle> {
        self.queued.insert(requestor);
        self.check_pending()
    }

    /// If the resource is idle and a requestor is queued, pops the
    /// highest-priority one, marks the resource busy, and returns the
    /// handle that should now be notified to start its operation.
    pub fn check_pending(&mut self) -> Option<Handle> {
        if self.busy {
            return None;
        }
        let next = self.queued.pop()?;
        self.busy = true;
        Some(next)
    }

    /// Called by the driver when the in-flight operation finishes. Frees
    /// the resource and returns the next handle to service, if any.
    pub fn on_complete(&mut self) -> Option<Handle> {
        self.busy = false;
        self.check_pending()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

impl Default for PendingArbiter {
    fn default() -> Self {
        Self::new()
    }
}
