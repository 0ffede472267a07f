// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! T1.5/T3.5/T4.0 inter-character and inter-frame timing thresholds,
//! derived once at startup from the UART's byte duration.
//!
//! The floors (`750us`/`1.75ms`/`2ms` at the standard's reference baud
//! rates) are expressed in the hardware timer's own tick units, since that
//! unit is a property of the concrete timer, not of this crate. Callers
//! compute the floor ticks from their timer's clock and pass them in.

/// The three silence thresholds and the master's reply-timeout, all in the
/// hardware compare/overflow timer's tick units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModbusTiming {
    pub t15: u32,
    pub t35: u32,
    pub t40: u32,
    pub reply_timeout: u32,
}

impl ModbusTiming {
    /// `byte_duration_ticks` is one character's transmission time (as
    /// returned by `Uart::byte_duration_ticks(1)`), in the hardware timer's
    /// ticks. `floor_t15`/`floor_t35`/`floor_t40` are that same timer's tick
    /// counts for 750us/1.75ms/2ms, and `reply_timeout` is the master's
    /// reply-timeout duration (conventionally 100ms) in the same units.
    pub fn new(
        byte_duration_ticks: u32,
        floor_t15: u32,
        floor_t35: u32,
        floor_t40: u32,
        reply_timeout: u32,
    ) -> Self {
        let scaled = |numerator: u32, denominator: u32| {
            (byte_duration_ticks.saturating_mul(numerator)) / denominator
        };
        ModbusTiming {
            t15: scaled(3, 2).max(floor_t15),
            t35: scaled(7, 2).max(floor_t35),
            t40: byte_duration_ticks.saturating_mul(4).max(floor_t40),
            reply_timeout,
        }
    }
}
