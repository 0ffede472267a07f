// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Modbus RTU slave state machine.
//!
//! Like [`crate::master::ModbusMaster`], this is a plain transition table:
//! `handle_event` takes one [`Event`](crate::master::Event) and returns the
//! side effects the caller's glue must carry out, with no direct dependency
//! on the reactor or a concrete UART/timer.
//!
//! The source this runtime is modeled on contains two variants of this
//! machine, differing in when the reply buffer gets filled: immediately on
//! entering `ControlAndWaiting` with a good-frame guard ("anticipated"), or
//! only after the `T3.5 -> Reply` transition completes ("sequenced"). This
//! implementation is the sequenced variant: the responder callback runs
//! once, on `Reply` entry, never inside `ControlAndWaiting`. Both variants
//! satisfy the inter-frame gap requirement the same way, since neither
//! transmits before `T4.0` elapses.

use heapless::Vec;

use crate::datagram::{Datagram, DatagramStatus};
use crate::master::Event;
use crate::timing::ModbusTiming;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlaveState {
    Cold,
    Initial,
    Idle,
    Reception,
    ControlAndWaiting,
    /// A character arrived during the inter-frame silence window after
    /// `T1.5`: the in-progress frame is abandoned without a reply. Distinct
    /// from `Idle` only so that the next `T3.5` (rather than the next
    /// character) is what releases the bus back to normal listening.
    SkipFrame,
    Reply,
    Emission,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Restart the inter-character timer from zero.
    RestartTimer,
    /// Transmit the bytes currently in the datagram buffer.
    Send,
    EnableRx,
    DisableRx,
}

pub type ActionList = Vec<Action, 4>;

/// A Modbus RTU slave bound to a single device address.
///
/// `D` is the frame buffer implementation (see [`crate::Datagram`]).
pub struct ModbusSlave<D> {
    state: SlaveState,
    datagram: D,
    timing: ModbusTiming,
    own_address: u8,
    /// Builds the reply PDU into the datagram buffer (already holding the
    /// validated request) and calls `finish_reply`. Takes the request's
    /// address byte (`0` for a broadcast) so the same responder can special
    /// case broadcasts if it wants to, though broadcasts never reach
    /// `Emission` regardless of what the responder does.
    responder: Option<fn(&mut D, u8)>,
}

impl<D: Datagram + Default> ModbusSlave<D> {
    pub fn new(timing: ModbusTiming, own_address: u8) -> Self {
        ModbusSlave {
            state: SlaveState::Cold,
            datagram: D::default(),
            timing,
            own_address,
            responder: None,
        }
    }

    pub fn set_responder(&mut self, responder: fn(&mut D, u8)) {
        self.responder = Some(responder);
    }

    pub fn state(&self) -> SlaveState {
        self.state
    }

    pub fn timing(&self) -> &ModbusTiming {
        &self.timing
    }

    pub fn datagram(&self) -> &D {
        &self.datagram
    }

    pub fn handle_event(&mut self, event: Event) -> ActionList {
        let mut actions = ActionList::new();
        match (self.state, event) {
            (SlaveState::Cold, Event::CanStart) => {
                self.state = SlaveState::Initial;
                let _ = actions.push(Action::RestartTimer);
            }

            (SlaveState::Initial, Event::T35Timeout) => {
                self.state = SlaveState::Idle;
            }
            (SlaveState::Initial, Event::CharReceived(_)) => {
                let _ = actions.push(Action::RestartTimer);
            }

            (SlaveState::Idle, Event::CharReceived(byte)) => {
                self.datagram.reset();
                self.datagram.process_char(byte);
                self.state = SlaveState::Reception;
            }

            (SlaveState::Reception, Event::CharReceived(byte)) => {
                self.datagram.process_char(byte);
            }
            (SlaveState::Reception, Event::T15Timeout) => {
                self.state = SlaveState::ControlAndWaiting;
            }

            (SlaveState::ControlAndWaiting, Event::CharReceived(byte)) => {
                // A character during the silence window means the frame we
                // thought had ended hasn't: abandon it rather than risk
                // replying to a corrupted request.
                self.datagram.process_char(byte);
                self.state = SlaveState::SkipFrame;
            }
            (SlaveState::ControlAndWaiting, Event::T35Timeout) => {
                match self.datagram.process_reply() {
                    DatagramStatus::GoodFrame => {
                        let addr = self.datagram.frame_address();
                        if addr == self.own_address || addr == 0 {
                            self.state = SlaveState::Reply;
                            if let Some(responder) = self.responder {
                                responder(&mut self.datagram, addr);
                                self.datagram.finish_reply();
                            }
                        } else {
                            // NotForMe: silently back to idle, no reply.
                            self.state = SlaveState::Idle;
                        }
                    }
                    // BadCrc: silently back to idle, no reply.
                    _ => self.state = SlaveState::Idle,
                }
            }

            (SlaveState::SkipFrame, Event::T35Timeout) => {
                self.state = SlaveState::Idle;
            }
            (SlaveState::SkipFrame, Event::CharReceived(_)) => {
                // Still noise; stay put until the line falls silent.
            }

            (SlaveState::Reply, Event::T40Timeout) => {
                if self.datagram.frame_address() == 0 {
                    // Broadcasts get no reply.
                    self.state = SlaveState::Idle;
                } else {
                    self.state = SlaveState::Emission;
                    let _ = actions.push(Action::DisableRx);
                    let _ = actions.push(Action::Send);
                }
            }

            (SlaveState::Emission, Event::FrameSent) => {
                self.state = SlaveState::Initial;
                let _ = actions.push(Action::EnableRx);
                let _ = actions.push(Action::RestartTimer);
            }

            _ => {}
        }
        actions
    }
}
