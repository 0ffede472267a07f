// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The runtime's one and only panic-adjacent facility.
//!
//! Everything that can happen because of bus traffic, a malformed frame, or a
//! queue filling up under load is a typed status code delivered through a
//! completion callback or an error handle -- never a call into this module.
//! What lands here is exclusively programmer error: registering after
//! `Reactor::run` has started, exhausting the handle table, overrunning the
//! timer ring. There is no recovery from any of these short of a restart.

use ringbuf::*;

#[derive(Copy, Clone, PartialEq)]
enum Trace {
    None,
    Stopped(&'static str),
}

ringbuf!(Trace, 8, Trace::None);

/// Halts the single execution context, after recording `reason`.
///
/// On a host build this panics, so that `#[cfg(test)]` code gets a normal
/// Rust test failure. On an embedded build there is nothing to unwind into,
/// so this spins forever with interrupts disabled; the watchdog (armed by
/// the application before calling `Reactor::run`) resets the device.
pub fn fail(reason: &'static str) -> ! {
    ringbuf_entry!(Trace::Stopped(reason));

    #[cfg(target_os = "none")]
    {
        critical_section::with(|_| loop {
            cortex_m::asm::nop();
        })
    }
    #[cfg(not(target_os = "none"))]
    {
        panic!("alert_and_stop: {}", reason);
    }
}

/// Calls `fail(reason)` iff `condition` is true. The embedded-runtime
/// equivalent of `assert!`, but spelled out because `assert!`'s default
/// panic machinery pulls in formatting code this runtime can't afford.
pub fn fail_if(condition: bool, reason: &'static str) {
    if condition {
        fail(reason);
    }
}
