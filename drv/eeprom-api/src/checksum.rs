// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fixed-size page of persisted bytes, guarded by a Fletcher-16 checksum
//! in its final two bytes. On boot, a checksum mismatch means the page is
//! reformatted with caller-supplied defaults rather than trusted.

/// A `SIZE`-byte page whose last two bytes are a Fletcher-16 checksum of
/// the preceding `SIZE - 2` bytes.
pub struct ChecksummedPage<const SIZE: usize> {
    bytes: [u8; SIZE],
}

impl<const SIZE: usize> ChecksummedPage<SIZE> {
    const _SIZE_HOLDS_CHECKSUM: () = assert!(SIZE > 2);

    /// Builds a page from raw bytes and writes a fresh checksum over the
    /// payload portion.
    pub fn new(payload: [u8; SIZE]) -> Self {
        let mut page = ChecksummedPage { bytes: payload };
        page.reseal();
        page
    }

    fn reseal(&mut self) {
        let checksum = fletcher::calc_fletcher16(&self.bytes[..SIZE - 2]);
        self.bytes[SIZE - 2..].copy_from_slice(&checksum.to_le_bytes());
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[..SIZE - 2]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..SIZE - 2]
    }

    pub fn raw(&self) -> &[u8; SIZE] {
        &self.bytes
    }

    /// Recomputes the checksum over the current payload and writes it into
    /// the trailing two bytes. Call after mutating `payload_mut`.
    pub fn finish(&mut self) {
        self.reseal();
    }

    fn stored_checksum(&self) -> u16 {
        u16::from_le_bytes(self.bytes[SIZE - 2..].try_into().unwrap())
    }

    pub fn is_valid(&self) -> bool {
        fletcher::calc_fletcher16(&self.bytes[..SIZE - 2]) == self.stored_checksum()
    }

    /// Loads a page read from EEPROM. If its checksum doesn't match, the
    /// page is reformatted from `defaults` (and resealed) instead of being
    /// trusted.
    pub fn load_or_default(raw: [u8; SIZE], defaults: [u8; SIZE]) -> Self {
        let candidate = ChecksummedPage { bytes: raw };
        if candidate.is_valid() {
            candidate
        } else {
            Self::new({
                let mut d = defaults;
                // Defaults may not carry a valid trailing checksum; `new`
                // will reseal over whatever payload precedes it.
                let checksum = fletcher::calc_fletcher16(&d[..SIZE - 2]);
                d[SIZE - 2..].copy_from_slice(&checksum.to_le_bytes());
                d
            })
        }
    }
}
