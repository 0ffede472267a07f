// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Modbus RTU frame arbiter: master and slave protocol state machines
//! sitting on top of the reactor, driven by the hardware compare/overflow
//! timer's T1.5/T3.5/T4.0 channels and by UART character/send-complete
//! events.
//!
//! The state machines in [`master`] and [`slave`] are deliberately free of
//! any direct dependency on [`runtime::Reactor`], a UART driver or a
//! hardware compare/overflow timer: `handle_event` takes one event and
//! returns a small fixed list of [`Action`](master::Action)s for the
//! caller's glue code to carry out against the real (or simulated)
//! peripherals. This keeps the transition tables host-testable in
//! isolation.

#![cfg_attr(not(test), no_std)]

pub mod datagram;
pub mod master;
pub mod rtu_datagram;
pub mod slave;
pub mod timing;

pub use datagram::{Datagram, DatagramStatus};
pub use master::{ModbusMaster, ModbusError};
pub use rtu_datagram::RtuDatagram;
pub use slave::ModbusSlave;
pub use timing::ModbusTiming;
