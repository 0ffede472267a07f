// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The Modbus RTU master state machine.
//!
//! This is deliberately not wired to a concrete [`runtime::Reactor`], a
//! UART driver or a hardware compare/overflow timer: `handle_event` takes
//! one event and returns the (small, fixed) list of side effects the
//! caller's glue must carry out. That keeps the transition table itself
//! host-testable without assembling a full reactor/driver stack, and lets
//! one core state machine serve both a real embedded binary and the
//! in-memory scenario tests.

use crate::datagram::{Datagram, DatagramStatus};
use crate::timing::ModbusTiming;
use abi::{Handle, Mask};
use heapless::Vec;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MasterState {
    Cold,
    Initial,
    Idle,
    Sending,
    WaitingForReply,
    Reception,
    ControlAndWaiting,
    PreventRace,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    CanStart,
    CharReceived(u8),
    T15Timeout,
    T35Timeout,
    T40Timeout,
    FrameSent,
    CheckPendings,
    ReplyTimeout,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModbusError {
    ReplyTimeout,
    FrameError,
    BadCrc,
    /// A well-formed, CRC-valid reply arrived, but its address byte didn't
    /// match the slave the pending request was sent to.
    NotForMe,
}

/// A side effect the caller must carry out after a call to `handle_event`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Restart the inter-character timer from zero.
    RestartTimer,
    /// Arm the (software) reply-timeout timer.
    ArmReplyTimeout,
    /// Cancel the reply-timeout timer; a reply has started arriving.
    CancelReplyTimeout,
    /// Transmit the bytes currently in the datagram buffer.
    Send,
    EnableRx,
    DisableRx,
    /// The reply for the given requestor is sitting in the datagram buffer;
    /// read it out before the next event, which may overwrite it.
    ReplyReady { handle: Handle },
    /// Report a protocol error for `slave` to the caller's error sink.
    ReportError { slave: u8, error: ModbusError },
}

pub type ActionList = Vec<Action, 4>;

/// The master's transmit-request queue and frame state machine.
///
/// `N` bounds the number of distinct requestor handles this master can
/// serve; `D` is the frame buffer implementation (see [`crate::Datagram`]).
pub struct ModbusMaster<const N: usize, D> {
    state: MasterState,
    datagram: D,
    timing: ModbusTiming,
    queued: Mask,
    requestors: [Option<fn(&mut D) -> u8>; N],
    pending_handle: Option<Handle>,
    pending_slave: u8,
}

impl<const N: usize, D: Datagram + Default> ModbusMaster<N, D> {
    pub fn new(timing: ModbusTiming) -> Self {
        ModbusMaster {
            state: MasterState::Cold,
            datagram: D::default(),
            timing,
            queued: Mask::EMPTY,
            requestors: [None; N],
            pending_handle: None,
            pending_slave: 0,
        }
    }

    pub fn state(&self) -> MasterState {
        self.state
    }

    pub fn timing(&self) -> &ModbusTiming {
        &self.timing
    }

    pub fn datagram(&self) -> &D {
        &self.datagram
    }

    /// Registers the callback invoked to fill a request's PDU when `handle`
    /// reaches the front of the queue. The callback writes its PDU bytes via
    /// `Datagram::push_byte` and returns the target slave address.
    pub fn register_requestor(&mut self, handle: Handle, fill: fn(&mut D) -> u8) {
        runtime::alert::fail_if(
            handle.index() >= N,
            "modbus master requestor index out of range",
        );
        self.requestors[handle.index()] = Some(fill);
    }

    /// Queues a transmit request from `handle`. If the master is idle, this
    /// may immediately start sending (collapsing the `rts` hop the design
    /// otherwise routes through the reactor: there is no reactor here to
    /// hop through, and no latency requirement that needs one).
    pub fn request(&mut self, handle: Handle) -> ActionList {
        self.queued.insert(handle);
        let mut actions = ActionList::new();
        if self.state == MasterState::Idle {
            self.prepare_next(&mut actions);
        }
        actions
    }

    pub fn handle_event(&mut self, event: Event) -> ActionList {
        let mut actions = ActionList::new();
        match (self.state, event) {
            (MasterState::Cold, Event::CanStart) => {
                self.state = MasterState::Initial;
                let _ = actions.push(Action::RestartTimer);
            }

            (MasterState::Initial, Event::T35Timeout) => {
                self.state = MasterState::Idle;
                self.prepare_next(&mut actions);
            }
            (MasterState::Initial, Event::CharReceived(_)) => {
                let _ = actions.push(Action::RestartTimer);
            }

            (MasterState::Idle, Event::CheckPendings) => {
                self.prepare_next(&mut actions);
            }
            (MasterState::Idle, Event::CharReceived(_)) => {
                self.state = MasterState::Initial;
                let _ = actions.push(Action::RestartTimer);
            }

            (MasterState::Sending, Event::FrameSent) => {
                self.state = MasterState::WaitingForReply;
                self.datagram.reset();
                let _ = actions.push(Action::EnableRx);
                let _ = actions.push(Action::ArmReplyTimeout);
            }

            (MasterState::WaitingForReply, Event::ReplyTimeout) => {
                self.state = MasterState::Idle;
                let slave = self.pending_slave;
                let _ = actions.push(Action::ReportError {
                    slave,
                    error: ModbusError::ReplyTimeout,
                });
                self.finish_pending();
                self.prepare_next(&mut actions);
            }
            (MasterState::WaitingForReply, Event::CharReceived(byte)) => {
                self.state = MasterState::Reception;
                let _ = actions.push(Action::CancelReplyTimeout);
                self.datagram.process_char(byte);
            }

            (MasterState::Reception, Event::CharReceived(byte)) => {
                self.datagram.process_char(byte);
            }
            (MasterState::Reception, Event::T15Timeout) => {
                self.state = MasterState::ControlAndWaiting;
            }

            (MasterState::ControlAndWaiting, Event::CharReceived(byte)) => {
                self.datagram.process_char(byte);
                self.state = MasterState::Idle;
                let slave = self.pending_slave;
                let _ = actions.push(Action::ReportError {
                    slave,
                    error: ModbusError::FrameError,
                });
                self.finish_pending();
                self.prepare_next(&mut actions);
            }
            (MasterState::ControlAndWaiting, Event::T35Timeout) => {
                self.state = MasterState::PreventRace;
                let slave = self.pending_slave;
                match self.datagram.process_reply() {
                    DatagramStatus::GoodFrame
                        if self.datagram.frame_address() == slave =>
                    {
                        if let Some(handle) = self.pending_handle {
                            let _ = actions.push(Action::ReplyReady { handle });
                        }
                    }
                    DatagramStatus::GoodFrame => {
                        // CRC checks out but the address doesn't match the
                        // slave we sent the request to -- a stray reply
                        // crossing on the wire, not ours to accept.
                        let _ = actions.push(Action::ReportError {
                            slave,
                            error: ModbusError::NotForMe,
                        });
                    }
                    _ => {
                        let _ = actions.push(Action::ReportError {
                            slave,
                            error: ModbusError::BadCrc,
                        });
                    }
                }
                self.finish_pending();
            }

            (MasterState::PreventRace, Event::T40Timeout) => {
                self.state = MasterState::Idle;
                self.prepare_next(&mut actions);
            }

            _ => {}
        }
        actions
    }

    fn prepare_next(&mut self, actions: &mut ActionList) {
        if let Some(handle) = self.queued.pop() {
            self.begin_send(handle, actions);
        }
    }

    fn begin_send(&mut self, handle: Handle, actions: &mut ActionList) {
        self.datagram.reset();
        if let Some(fill) = self.requestors[handle.index()] {
            let slave = fill(&mut self.datagram);
            self.datagram.finish_request(slave);
            self.pending_handle = Some(handle);
            self.pending_slave = slave;
            self.state = MasterState::Sending;
            let _ = actions.push(Action::DisableRx);
            let _ = actions.push(Action::Send);
        }
    }

    fn finish_pending(&mut self) {
        self.pending_handle = None;
    }
}
