// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single-core cooperative runtime: a priority-ordered reactor, a
//! software timer wheel built on top of it, and a pending-request arbiter
//! for peripherals that can only serve one requestor at a time.
//!
//! Everything here assumes exactly one execution context plus interrupts:
//! there is no preemption of application code, so the only synchronization
//! primitive in use is [`critical_section`], masking interrupts for the
//! handful of instructions it takes to set a bit or shift a fixed array.

#![cfg_attr(not(test), no_std)]

pub mod alert;
mod arbiter;
mod reactor;
mod timer;

pub use arbiter::PendingArbiter;
pub use reactor::Reactor;
pub use timer::TimerWheel;

pub use abi::{Handle, Mask, Priority, Tick, TimerInstance, MAX_HANDLES};
