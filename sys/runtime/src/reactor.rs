// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The priority-ordered, bit-pending dispatcher.
//!
//! There is exactly one execution context: interrupt service routines only
//! ever call [`Reactor::notify`] or [`Reactor::notify_from_isr`], which do
//! nothing but record a pending bit (and, for `notify`, an argument word)
//! under a critical section. All actual work happens in [`Reactor::run`],
//! which never returns and is the only caller of registered callbacks.

use core::cell::RefCell;
use critical_section::Mutex;

use abi::{Handle, Mask, Priority, MAX_HANDLES};

use crate::alert;

#[derive(Copy, Clone)]
struct HandlerRecord {
    callback: Option<fn(u32)>,
    last_argument: u32,
}

impl HandlerRecord {
    const EMPTY: Self = HandlerRecord {
        callback: None,
        last_argument: 0,
    };
}

struct Inner<const N: usize> {
    handlers: [HandlerRecord; N],
    pending: u32,
    /// Number of high-priority handles allocated so far; the next one goes
    /// at this index.
    next_high: u8,
    /// Number of low-priority handles allocated so far; the next one goes
    /// at `N - 1 - next_low`.
    next_low: u8,
    started: bool,
    current: Option<Handle>,
    idle_hook: Option<fn()>,
    watchdog_kick: Option<fn()>,
}

impl<const N: usize> Inner<N> {
    const fn new() -> Self {
        Inner {
            handlers: [HandlerRecord::EMPTY; N],
            pending: 0,
            next_high: 0,
            next_low: 0,
            started: false,
            current: None,
            idle_hook: None,
            watchdog_kick: None,
        }
    }
}

/// The dispatcher. Applications declare exactly one, sized for their handle
/// count, as a `static`:
///
/// ```ignore
/// static REACTOR: Reactor<16> = Reactor::new();
/// ```
pub struct Reactor<const N: usize> {
    inner: Mutex<RefCell<Inner<N>>>,
}

impl<const N: usize> Reactor<N> {
    pub const fn new() -> Self {
        Reactor {
            inner: Mutex::new(RefCell::new(Inner::new())),
        }
    }

    /// Installs a hook called once before the dispatch loop sleeps. Intended
    /// for a non-blocking, idempotent flush of a logging queue. Must be
    /// called before `run`.
    pub fn set_idle_hook(&self, hook: fn()) {
        critical_section::with(|cs| {
            self.inner.borrow(cs).borrow_mut().idle_hook = Some(hook);
        });
    }

    /// Installs a hook called after every dispatched handler returns,
    /// intended to kick a hardware watchdog.
    pub fn set_watchdog_hook(&self, hook: fn()) {
        critical_section::with(|cs| {
            self.inner.borrow(cs).borrow_mut().watchdog_kick = Some(hook);
        });
    }

    /// Registers a callback under the given priority class, returning its
    /// handle.
    ///
    /// High-priority handles are allocated from the low end of the handle
    /// table (index 0 upward); low-priority handles from the high end
    /// (index `N - 1` downward), so "lowest index" and "highest priority"
    /// coincide. Fatal if called after `run`, or if the two allocation
    /// fronts have met.
    pub fn register(&self, callback: fn(u32), priority: Priority) -> Handle {
        debug_assert!(N <= MAX_HANDLES, "reactor handle table wider than a Mask");
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            alert::fail_if(inner.started, "register() after run()");

            let index = match priority {
                Priority::High => inner.next_high,
                Priority::Low => (N as u8) - 1 - inner.next_low,
            };
            alert::fail_if(
                u32::from(inner.next_high) + u32::from(inner.next_low)
                    >= N as u32,
                "handle table exhausted",
            );

            match priority {
                Priority::High => inner.next_high += 1,
                Priority::Low => inner.next_low += 1,
            }

            inner.handlers[index as usize] = HandlerRecord {
                callback: Some(callback),
                last_argument: 0,
            };
            Handle::from_index(index as usize)
        })
    }

    /// Sets `handle`'s pending bit and stores `arg` as its next argument.
    /// Safe to call from interrupt context. A second notification before
    /// dispatch overwrites the previous argument; no queue is kept.
    pub fn notify(&self, handle: Handle, arg: u32) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            inner.handlers[handle.index()].last_argument = arg;
            inner.pending |= 1 << handle.index();
        });
    }

    /// Sets `handle`'s pending bit without storing an argument, resetting
    /// its argument to the null value (0). Slightly cheaper than `notify`;
    /// meant for ISRs that have no payload to deliver (e.g. a pure tick).
    pub fn notify_from_isr(&self, handle: Handle) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            inner.handlers[handle.index()].last_argument = 0;
            inner.pending |= 1 << handle.index();
        });
    }

    /// Synchronously invokes `handle`'s callback with `arg`, bypassing the
    /// pending set entirely. Must not be called from interrupt context.
    pub fn invoke(&self, handle: Handle, arg: u32) {
        let callback = critical_section::with(|cs| {
            self.inner.borrow(cs).borrow().handlers[handle.index()].callback
        });
        if let Some(callback) = callback {
            callback(arg);
        }
    }

    /// Clears the given handles' pending bits without dispatching them.
    pub fn clear(&self, mask: Mask) {
        critical_section::with(|cs| {
            self.inner.borrow(cs).borrow_mut().pending &= !mask.raw();
        });
    }

    /// Called from within a running handler to re-enqueue itself with a new
    /// argument and return to the dispatch loop, so that a higher-priority
    /// pending handler gets a chance to run first. A no-op if called
    /// outside of a dispatched handler.
    pub fn yield_now(&self, arg: u32) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if let Some(current) = inner.current {
                inner.handlers[current.index()].last_argument = arg;
                inner.pending |= 1 << current.index();
            }
        });
    }

    /// Runs one dispatch pass: finds the highest-priority pending handle (if
    /// any), clears its bit, and invokes its callback. Returns whether a
    /// handler was dispatched.
    pub fn dispatch_one(&self) -> bool {
        let next = critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let mut mask = Mask::from_raw(inner.pending);
            let handle = mask.pop()?;
            inner.pending = mask.raw();
            inner.current = Some(handle);
            let arg = inner.handlers[handle.index()].last_argument;
            let callback = inner.handlers[handle.index()].callback;
            Some((handle, arg, callback))
        });

        let Some((_handle, arg, callback)) = next else {
            return false;
        };

        if let Some(callback) = callback {
            callback(arg);
        }

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            inner.current = None;
            if let Some(kick) = inner.watchdog_kick {
                kick();
            }
        });

        true
    }

    /// The dispatch loop. Never returns. On the first call, records that
    /// registration has ended (further `register` calls are fatal).
    pub fn run(&self) -> ! {
        critical_section::with(|cs| {
            self.inner.borrow(cs).borrow_mut().started = true;
        });
        loop {
            if !self.dispatch_one() {
                self.idle();
            }
        }
    }

    fn idle(&self) {
        let hook = critical_section::with(|cs| self.inner.borrow(cs).borrow().idle_hook);
        if let Some(hook) = hook {
            hook();
        }
        critical_section::with(|cs| {
            let inner = self.inner.borrow(cs).borrow();
            if inner.pending == 0 {
                sleep_cpu();
            }
        });
    }
}

impl<const N: usize> Default for Reactor<N> {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::const_assert!(MAX_HANDLES <= 32);

#[cfg(target_os = "none")]
fn sleep_cpu() {
    cortex_m::asm::wfi();
}

#[cfg(not(target_os = "none"))]
fn sleep_cpu() {
    // Nothing to sleep on: host tests drive the reactor with explicit
    // notify()/dispatch_one() calls rather than real interrupts.
}
