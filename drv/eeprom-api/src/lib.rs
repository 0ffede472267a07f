// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EEPROM-backed persistence: a minimal operation queue (the external
//! interface the reactor's eeprom-ready handle drains), a wear-leveled
//! counter, and a Fletcher-16-checksummed structured-state page.

#![cfg_attr(not(test), no_std)]

pub mod checksum;
pub mod counter;
pub mod queue;

pub use checksum::ChecksummedPage;
pub use counter::WearLevelCounter;
pub use queue::OperationQueue;
