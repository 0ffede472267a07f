// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The frame buffer abstraction the Modbus arbiter treats opaquely.
//!
//! A `Datagram` owns a byte buffer and knows the RTU wire format (address,
//! PDU, CRC), but nothing about timing. The arbiter feeds it bytes one at a
//! time as they arrive and asks it, after the inter-frame silence, whether
//! what it accumulated is a well-formed frame addressed to us.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DatagramStatus {
    InProgress,
    GoodFrame,
    NotForMe,
    BadCrc,
}

pub trait Datagram {
    /// Clears the buffer to begin accumulating a new frame.
    fn reset(&mut self);

    /// Appends one byte as received from the wire.
    fn process_char(&mut self, byte: u8);

    /// Called once the inter-frame silence (T3.5) has elapsed: validates
    /// the accumulated frame's CRC and address match, returning the
    /// resulting status (and caching it for `get_status`).
    fn process_reply(&mut self) -> DatagramStatus;

    fn get_status(&self) -> DatagramStatus;

    /// The address byte of the frame currently in the buffer. `0` means
    /// broadcast.
    fn frame_address(&self) -> u8;

    /// The full frame currently in the buffer (address + PDU + CRC for a
    /// received frame; address + PDU with CRC appended by `finish` for one
    /// being built).
    fn get_buffer(&self) -> &[u8];

    /// True once a request has been fully assembled by `finish_request`.
    fn ready_request(&self) -> bool;

    /// True once a reply has been fully assembled by `finish_reply`.
    fn ready_reply(&self) -> bool;

    /// Appends one byte to the frame being built (request or reply).
    /// Returns `false` if the buffer is full.
    fn push_byte(&mut self, byte: u8) -> bool;

    /// Finishes building an outgoing request: writes `slave` as the address
    /// byte (if not already written via `push_byte`), appends the CRC, and
    /// marks `ready_request`.
    fn finish_request(&mut self, slave: u8);

    /// Finishes building an outgoing reply: appends the CRC and marks
    /// `ready_reply`. The address byte is assumed to already be the one
    /// the request arrived with.
    fn finish_reply(&mut self);
}
