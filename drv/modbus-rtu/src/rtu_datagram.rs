// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The concrete RTU wire format: `[address][pdu...][crc_lo][crc_hi]`,
//! validated with the standard Modbus CRC-16 polynomial.

use crate::datagram::{Datagram, DatagramStatus};
use crc::{Crc, CRC_16_MODBUS};
use heapless::Vec;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// A frame buffer with room for `N` bytes (address + PDU + 2-byte CRC).
/// 256 is the conventional Modbus RTU maximum.
pub struct RtuDatagram<const N: usize> {
    buffer: Vec<u8, N>,
    status: DatagramStatus,
    ready_request: bool,
    ready_reply: bool,
}

impl<const N: usize> RtuDatagram<N> {
    pub const fn new() -> Self {
        RtuDatagram {
            buffer: Vec::new(),
            status: DatagramStatus::InProgress,
            ready_request: false,
            ready_reply: false,
        }
    }
}

impl<const N: usize> Default for RtuDatagram<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Datagram for RtuDatagram<N> {
    fn reset(&mut self) {
        self.buffer.clear();
        self.status = DatagramStatus::InProgress;
        self.ready_request = false;
        self.ready_reply = false;
    }

    fn process_char(&mut self, byte: u8) {
        let _ = self.buffer.push(byte);
    }

    fn process_reply(&mut self) -> DatagramStatus {
        self.status = if self.buffer.len() < 4 {
            DatagramStatus::BadCrc
        } else {
            let (data, crc_bytes) = self.buffer.split_at(self.buffer.len() - 2);
            let received = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
            if CRC16.checksum(data) == received {
                DatagramStatus::GoodFrame
            } else {
                DatagramStatus::BadCrc
            }
        };
        self.status
    }

    fn get_status(&self) -> DatagramStatus {
        self.status
    }

    fn frame_address(&self) -> u8 {
        self.buffer.first().copied().unwrap_or(0)
    }

    fn get_buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn ready_request(&self) -> bool {
        self.ready_request
    }

    fn ready_reply(&self) -> bool {
        self.ready_reply
    }

    fn push_byte(&mut self, byte: u8) -> bool {
        self.buffer.push(byte).is_ok()
    }

    fn finish_request(&mut self, slave: u8) {
        let _ = self.buffer.insert(0, slave);
        let crc = CRC16.checksum(&self.buffer).to_le_bytes();
        let _ = self.buffer.push(crc[0]);
        let _ = self.buffer.push(crc[1]);
        self.ready_request = true;
    }

    fn finish_reply(&mut self) {
        let crc = CRC16.checksum(&self.buffer).to_le_bytes();
        let _ = self.buffer.push(crc[0]);
        let _ = self.buffer.push(crc[1]);
        self.ready_reply = true;
    }
}
