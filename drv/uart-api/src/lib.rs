// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The narrow contract the Modbus RTU arbiter (and anything else that wants
//! byte-level serial I/O) requires of a UART driver.
//!
//! This crate does not implement a real UART: it defines the `Uart` trait
//! the arbiter is generic over, the `UartConfig` option set a concrete
//! driver is configured with, and a `sim` module providing an in-memory
//! double good enough to drive the trait from host tests (and the demo
//! binary) without touching hardware.

#![cfg_attr(not(test), no_std)]

use abi::Handle;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// The recognized configuration options for a reactor-backed UART.
#[derive(Copy, Clone, Debug)]
pub struct UartConfig {
    pub baud: u32,
    pub width: u8,
    pub parity: Parity,
    pub stop: StopBits,
    pub rs485: bool,
    pub onewire: bool,
    pub map_to_alt_position: bool,
    pub disable_rx: bool,
    pub disable_tx: bool,
}

impl UartConfig {
    pub const fn new(baud: u32) -> Self {
        UartConfig {
            baud,
            width: 8,
            parity: Parity::None,
            stop: StopBits::One,
            rs485: false,
            onewire: false,
            map_to_alt_position: false,
            disable_rx: false,
            disable_tx: false,
        }
    }

    pub const fn rs485(mut self, enabled: bool) -> Self {
        self.rs485 = enabled;
        self
    }

    pub const fn onewire(mut self, enabled: bool) -> Self {
        self.onewire = enabled;
        self
    }

    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub const fn stop_bits(mut self, stop: StopBits) -> Self {
        self.stop = stop;
        self
    }
}

/// The capability a byte-level UART driver exposes to a protocol arbiter
/// built on top of the reactor.
///
/// Half-duplex echo suppression (RS-485, one-wire) is the caller's
/// responsibility: disable RX before `send`, re-enable it once
/// `react_on_send_complete`'s handle fires.
pub trait Uart {
    /// Queues `bytes` for transmission. Non-blocking; the handle registered
    /// with `react_on_send_complete` fires once the last byte has left the
    /// shift register.
    fn send(&mut self, bytes: &[u8]);

    /// Registers the handle notified, with the received byte as its
    /// argument, each time a character arrives.
    fn react_on_character_received(&mut self, handle: Handle);

    /// Registers the handle notified once a `send` has fully drained.
    fn react_on_send_complete(&mut self, handle: Handle);

    fn enable_rx(&mut self);
    fn disable_rx(&mut self);

    /// Returns `multiplier * byte-duration` in ticks, at the currently
    /// configured baud rate. Used to derive the T1.5/T3.5/T4.0 Modbus
    /// timing constants.
    fn byte_duration_ticks(&self, multiplier: u32) -> u32;
}

pub mod sim {
    //! An in-memory stand-in for a real UART, adequate for host tests and
    //! the demo binary. Byte duration is computed from `baud` the same way
    //! a real driver would from its divisor register.

    use super::{Uart, UartConfig};
    use abi::Handle;
    use runtime::Reactor;

    pub struct SimUart<'r, const N: usize> {
        reactor: &'r Reactor<N>,
        baud: u32,
        rx_handle: Option<Handle>,
        tx_done_handle: Option<Handle>,
        rx_enabled: bool,
        pub sent: heapless::Vec<u8, 512>,
    }

    impl<'r, const N: usize> SimUart<'r, N> {
        pub fn new(reactor: &'r Reactor<N>, config: &UartConfig) -> Self {
            SimUart {
                reactor,
                baud: config.baud,
                rx_handle: None,
                tx_done_handle: None,
                rx_enabled: !config.disable_rx,
                sent: heapless::Vec::new(),
            }
        }

        /// Test/demo hook: simulate a character arriving on the wire.
        pub fn inject_received(&mut self, byte: u8) {
            if self.rx_enabled {
                if let Some(h) = self.rx_handle {
                    self.reactor.notify(h, byte as u32);
                }
            }
        }

        /// Test/demo hook: simulate the shift register draining.
        pub fn complete_send(&mut self) {
            if let Some(h) = self.tx_done_handle {
                self.reactor.notify(h, 0);
            }
        }
    }

    impl<'r, const N: usize> Uart for SimUart<'r, N> {
        fn send(&mut self, bytes: &[u8]) {
            self.sent.clear();
            let _ = self.sent.extend_from_slice(bytes);
        }

        fn react_on_character_received(&mut self, handle: Handle) {
            self.rx_handle = Some(handle);
        }

        fn react_on_send_complete(&mut self, handle: Handle) {
            self.tx_done_handle = Some(handle);
        }

        fn enable_rx(&mut self) {
            self.rx_enabled = true;
        }

        fn disable_rx(&mut self) {
            self.rx_enabled = false;
        }

        fn byte_duration_ticks(&self, multiplier: u32) -> u32 {
            // One character is (1 start + width + stop) bits; approximate
            // as 10 bits/char as the real UART driver's divisor-derived
            // calculation would for 8N1. Ticks are 1 ms; baud is bits/s.
            let bits_per_char = 10u32;
            let micros_per_char = bits_per_char * 1_000_000 / self.baud.max(1);
            (micros_per_char * multiplier / 1000).max(1)
        }
    }
}
