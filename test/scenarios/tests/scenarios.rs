// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios (S1-S7) exercising the reactor, timer wheel,
//! pending-request arbiter and Modbus RTU arbiter together, the way an
//! application would wire them, rather than as isolated unit tests of a
//! single module.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};

use abi::{Handle, Priority, Tick};
use critical_section::Mutex;
use drv_eeprom_api::counter::{Banks, WearLevelCounter};
use drv_gpio_api::sim::SimPin;
use drv_gpio_api::OutputPin;
use drv_hw_timer_api::sim::SimHwTimer;
use drv_hw_timer_api::HwTimer;
use drv_modbus_rtu::master::{Action as MasterAction, Event, MasterState, ModbusError};
use drv_modbus_rtu::rtu_datagram::RtuDatagram;
use drv_modbus_rtu::{Datagram, ModbusMaster, ModbusTiming};
use drv_uart_api::sim::SimUart;
use drv_uart_api::{Uart, UartConfig};
use runtime::{Reactor, TimerWheel};

// ---------------------------------------------------------------------
// S1 -- blinking LED via repeating timer
// ---------------------------------------------------------------------

static S1_REACTOR: Reactor<4> = Reactor::new();
static S1_PIN: Mutex<RefCell<SimPin>> = Mutex::new(RefCell::new(SimPin {
    high: false,
    toggle_count: 0,
}));

fn s1_toggle(_arg: u32) {
    critical_section::with(|cs| S1_PIN.borrow(cs).borrow_mut().toggle());
}

#[test]
fn s1_blinking_led_via_repeating_timer() {
    let led = S1_REACTOR.register(s1_toggle, Priority::High);
    let mut wheel: TimerWheel<4> = TimerWheel::new();

    let instance = wheel.arm(led, Tick(0) + 1_000, 1_000, 0);

    for milestone in 1..=10u32 {
        wheel.on_tick(Tick(milestone * 1_000), |h, a| S1_REACTOR.notify(h, a));
        while S1_REACTOR.dispatch_one() {}
    }

    let toggles =
        critical_section::with(|cs| S1_PIN.borrow(cs).borrow().toggle_count);
    assert_eq!(toggles, 10, "expected exactly 10 toggles over 10_000 ticks");

    // The repeating timer's instance is stable across every firing: it's
    // still the thing to pass to `cancel` after the tenth fire.
    assert!(wheel.cancel(instance));
}

// ---------------------------------------------------------------------
// S2 -- priority inversion avoided
// ---------------------------------------------------------------------

static S2_ORDER: Mutex<RefCell<heapless::Vec<u8, 2>>> =
    Mutex::new(RefCell::new(heapless::Vec::new()));

fn s2_record_hi(_arg: u32) {
    critical_section::with(|cs| {
        let _ = S2_ORDER.borrow(cs).borrow_mut().push(0);
    });
}

fn s2_record_lo(_arg: u32) {
    critical_section::with(|cs| {
        let _ = S2_ORDER.borrow(cs).borrow_mut().push(1);
    });
}

#[test]
fn s2_high_priority_handler_runs_before_low_priority() {
    static REACTOR: Reactor<8> = Reactor::new();
    let hi = REACTOR.register(s2_record_hi, Priority::High);
    let lo = REACTOR.register(s2_record_lo, Priority::Low);

    // Notify in the "wrong" order, as an ISR racing the main loop might.
    REACTOR.notify(lo, 0);
    REACTOR.notify(hi, 0);

    assert!(REACTOR.dispatch_one());
    assert!(REACTOR.dispatch_one());
    assert!(!REACTOR.dispatch_one());

    let order = critical_section::with(|cs| S2_ORDER.borrow(cs).borrow().clone());
    assert_eq!(&order[..], &[0, 1], "high priority must dispatch first");
}

// ---------------------------------------------------------------------
// S3 -- timer wraparound
// ---------------------------------------------------------------------

#[test]
fn s3_timer_fires_once_across_tick_counter_wraparound() {
    static REACTOR: Reactor<2> = Reactor::new();
    static FIRED: AtomicU32 = AtomicU32::new(0);
    fn on_fire(_arg: u32) {
        FIRED.fetch_add(1, Ordering::SeqCst);
    }

    let h = REACTOR.register(on_fire, Priority::High);
    let mut wheel: TimerWheel<2> = TimerWheel::new();

    let now = Tick(0xFFFF_FFF0);
    wheel.arm(h, now + 32, 0, 0);

    // Not due yet: still before the wrap.
    wheel.on_tick(Tick(0xFFFF_FFFF), |h, a| REACTOR.notify(h, a));
    assert!(!REACTOR.dispatch_one());

    // Due at 0x0000_0010, past the wrap.
    wheel.on_tick(Tick(0x0000_0010), |h, a| REACTOR.notify(h, a));
    assert!(REACTOR.dispatch_one());
    assert!(!REACTOR.dispatch_one());
    assert_eq!(FIRED.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------
// S4 -- Modbus master request/reply
// ---------------------------------------------------------------------

fn fill_read_holding(dg: &mut RtuDatagram<256>) -> u8 {
    dg.push_byte(0x03);
    dg.push_byte(0x00);
    dg.push_byte(0x01);
    0x11
}

#[test]
fn s4_master_request_reply_round_trip() {
    // 19200-8-N-1: byte duration ~520us; express everything in the hardware
    // timer's own tick units (here, just microseconds) as the arbiter does.
    let timing = ModbusTiming::new(520, 750, 1750, 2000, 100_000);
    let mut master: ModbusMaster<4, RtuDatagram<256>> = ModbusMaster::new(timing);
    master.register_requestor(abi::Handle::from_index(0), fill_read_holding);

    master.handle_event(Event::CanStart);
    master.handle_event(Event::T35Timeout);

    let actions = master.request(abi::Handle::from_index(0));
    assert!(actions.contains(&MasterAction::Send));

    let actions = master.handle_event(Event::FrameSent);
    assert!(actions.contains(&MasterAction::ArmReplyTimeout));

    // Slave replies 7 bytes, one CharReceived per byte.
    let mut reply: RtuDatagram<256> = RtuDatagram::new();
    reply.push_byte(0x03);
    reply.push_byte(0x02);
    reply.push_byte(0x00);
    reply.push_byte(0x2a);
    reply.finish_request(0x11);
    let bytes = reply.get_buffer().to_vec();
    assert_eq!(bytes.len(), 7);

    for b in bytes {
        master.handle_event(Event::CharReceived(b));
    }
    master.handle_event(Event::T15Timeout);
    let actions = master.handle_event(Event::T35Timeout);

    assert!(actions.iter().any(|a| matches!(
        a,
        MasterAction::ReplyReady { handle } if *handle == abi::Handle::from_index(0)
    )));
    assert!(
        !actions.iter().any(|a| matches!(a, MasterAction::ReportError { .. })),
        "a valid reply must not raise an error"
    );
}

// ---------------------------------------------------------------------
// S5 -- Modbus master reply timeout, second request dispatches cleanly
// ---------------------------------------------------------------------

#[test]
fn s5_reply_timeout_then_second_request_dispatches() {
    let timing = ModbusTiming::new(520, 750, 1750, 2000, 100_000);
    let mut master: ModbusMaster<4, RtuDatagram<256>> = ModbusMaster::new(timing);
    master.register_requestor(abi::Handle::from_index(0), fill_read_holding);
    master.register_requestor(abi::Handle::from_index(1), fill_read_holding);

    master.handle_event(Event::CanStart);
    master.handle_event(Event::T35Timeout);
    master.request(abi::Handle::from_index(0));
    master.handle_event(Event::FrameSent);

    // Queue a second request while the first is still in flight; it must
    // not be served out of turn.
    let actions = master.request(abi::Handle::from_index(1));
    assert!(actions.is_empty(), "bus is busy; second request just queues");

    let actions = master.handle_event(Event::ReplyTimeout);
    assert!(actions.iter().any(|a| matches!(
        a,
        MasterAction::ReportError { slave: 0x11, error: ModbusError::ReplyTimeout }
    )));
    // `prepare_next` runs as part of the `ReplyTimeout` transition, so the
    // queued second request dispatches in the very same step -- the bus is
    // never considered busy once the first request's outcome is settled.
    assert!(actions.contains(&MasterAction::Send));
}

// ---------------------------------------------------------------------
// S6 -- EEPROM counter wear-leveling
// ---------------------------------------------------------------------

#[derive(Clone)]
struct ScratchBanks {
    banks: [[u8; 16]; 4],
}

impl ScratchBanks {
    fn blank() -> Self {
        ScratchBanks {
            banks: [[0u8; 16]; 4],
        }
    }
}

impl Banks for ScratchBanks {
    fn read_bank(&self, bank: usize) -> [u8; 16] {
        self.banks[bank]
    }

    fn write_bank(&mut self, bank: usize, bytes: [u8; 16]) {
        self.banks[bank] = bytes;
    }
}

#[test]
fn s6_eeprom_counter_wear_levels_across_64_increments() {
    let mut counter = WearLevelCounter::new(ScratchBanks::blank());
    assert_eq!(counter.recover(), 0);

    for expected in 1..=64u64 {
        assert_eq!(counter.increment(), expected);
    }

    // Power-cycle: rebuild from the same backing bytes and recover.
    let banks = counter.into_backend();
    let mut reloaded = WearLevelCounter::new(banks);
    assert_eq!(reloaded.recover(), 64);
}

// ---------------------------------------------------------------------
// S7 -- Modbus master wired through a real reactor, simulated UART and
// simulated hardware timer, rather than driving `handle_event` directly.
// This exercises the glue code S4/S5 skip: actions turning into real
// `notify`/`send`/`start` calls, and those calls turning back into
// dispatched events.
// ---------------------------------------------------------------------

static S7_REACTOR: Reactor<8> = Reactor::new();
static S7_MASTER: Mutex<RefCell<Option<ModbusMaster<4, RtuDatagram<256>>>>> =
    Mutex::new(RefCell::new(None));
static S7_UART: Mutex<RefCell<Option<SimUart<'static, 8>>>> =
    Mutex::new(RefCell::new(None));
static S7_HW_TIMER: Mutex<RefCell<Option<SimHwTimer<'static, 8>>>> =
    Mutex::new(RefCell::new(None));
static S7_WHEEL: Mutex<RefCell<TimerWheel<2>>> =
    Mutex::new(RefCell::new(TimerWheel::new()));
static S7_REPLY_TIMEOUT_HANDLE: Mutex<RefCell<Option<Handle>>> =
    Mutex::new(RefCell::new(None));
static S7_REPLY_TIMEOUT_INSTANCE: Mutex<RefCell<Option<abi::TimerInstance>>> =
    Mutex::new(RefCell::new(None));
static S7_REPLY_SEEN: AtomicU32 = AtomicU32::new(0);
static S7_ERROR_SEEN: AtomicU32 = AtomicU32::new(0);

fn s7_apply(actions: drv_modbus_rtu::master::ActionList) {
    for action in actions {
        match action {
            MasterAction::RestartTimer => critical_section::with(|cs| {
                S7_HW_TIMER.borrow(cs).borrow_mut().as_mut().unwrap().start();
            }),
            MasterAction::ArmReplyTimeout => critical_section::with(|cs| {
                let handle = S7_REPLY_TIMEOUT_HANDLE.borrow(cs).borrow().unwrap();
                let instance =
                    S7_WHEEL.borrow(cs).borrow_mut().arm(handle, Tick(0) + 100_000, 0, 0);
                *S7_REPLY_TIMEOUT_INSTANCE.borrow(cs).borrow_mut() = Some(instance);
            }),
            MasterAction::CancelReplyTimeout => critical_section::with(|cs| {
                if let Some(instance) =
                    S7_REPLY_TIMEOUT_INSTANCE.borrow(cs).borrow_mut().take()
                {
                    S7_WHEEL.borrow(cs).borrow_mut().cancel(instance);
                }
            }),
            MasterAction::Send => critical_section::with(|cs| {
                let buf = S7_MASTER
                    .borrow(cs)
                    .borrow()
                    .as_ref()
                    .unwrap()
                    .datagram()
                    .get_buffer()
                    .to_vec();
                S7_UART.borrow(cs).borrow_mut().as_mut().unwrap().send(&buf);
            }),
            MasterAction::EnableRx => critical_section::with(|cs| {
                S7_UART.borrow(cs).borrow_mut().as_mut().unwrap().enable_rx();
            }),
            MasterAction::DisableRx => critical_section::with(|cs| {
                S7_UART.borrow(cs).borrow_mut().as_mut().unwrap().disable_rx();
            }),
            MasterAction::ReplyReady { handle } => {
                S7_REACTOR.notify(handle, 1);
            }
            MasterAction::ReportError { .. } => {
                S7_ERROR_SEEN.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

fn s7_on_char(arg: u32) {
    // Restarting the hardware timer on every received character is the
    // UART-side ISR's job, independent of the master's own action list: it
    // measures time-since-last-character, not a state the frame arbiter
    // tracks itself.
    critical_section::with(|cs| {
        S7_HW_TIMER.borrow(cs).borrow_mut().as_mut().unwrap().start();
    });
    let actions = critical_section::with(|cs| {
        S7_MASTER
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .unwrap()
            .handle_event(Event::CharReceived(arg as u8))
    });
    s7_apply(actions);
}

fn s7_on_sent(_arg: u32) {
    let actions = critical_section::with(|cs| {
        S7_MASTER.borrow(cs).borrow_mut().as_mut().unwrap().handle_event(Event::FrameSent)
    });
    s7_apply(actions);
}

fn s7_on_t15(_arg: u32) {
    let actions = critical_section::with(|cs| {
        S7_MASTER.borrow(cs).borrow_mut().as_mut().unwrap().handle_event(Event::T15Timeout)
    });
    s7_apply(actions);
}

fn s7_on_t35(_arg: u32) {
    let actions = critical_section::with(|cs| {
        S7_MASTER.borrow(cs).borrow_mut().as_mut().unwrap().handle_event(Event::T35Timeout)
    });
    s7_apply(actions);
}

fn s7_on_t40(_arg: u32) {
    let actions = critical_section::with(|cs| {
        S7_MASTER.borrow(cs).borrow_mut().as_mut().unwrap().handle_event(Event::T40Timeout)
    });
    s7_apply(actions);
}

fn s7_on_reply_timeout(_arg: u32) {
    let actions = critical_section::with(|cs| {
        S7_MASTER.borrow(cs).borrow_mut().as_mut().unwrap().handle_event(Event::ReplyTimeout)
    });
    s7_apply(actions);
}

fn s7_requestor_ready(arg: u32) {
    if arg == 1 {
        S7_REPLY_SEEN.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn s7_master_wired_through_reactor_uart_and_hw_timer() {
    let timing = ModbusTiming::new(520, 750, 1750, 2000, 100_000);

    critical_section::with(|cs| {
        *S7_MASTER.borrow(cs).borrow_mut() =
            Some(ModbusMaster::<4, RtuDatagram<256>>::new(timing));
        *S7_UART.borrow(cs).borrow_mut() =
            Some(SimUart::new(&S7_REACTOR, &UartConfig::new(19200)));
        *S7_HW_TIMER.borrow(cs).borrow_mut() = Some(SimHwTimer::new(&S7_REACTOR));
    });

    let h_requestor = S7_REACTOR.register(s7_requestor_ready, Priority::High);
    let h_char = S7_REACTOR.register(s7_on_char, Priority::High);
    let h_sent = S7_REACTOR.register(s7_on_sent, Priority::High);
    let h_t15 = S7_REACTOR.register(s7_on_t15, Priority::High);
    let h_t35 = S7_REACTOR.register(s7_on_t35, Priority::High);
    let h_t40 = S7_REACTOR.register(s7_on_t40, Priority::High);
    let h_reply_timeout = S7_REACTOR.register(s7_on_reply_timeout, Priority::Low);

    critical_section::with(|cs| {
        *S7_REPLY_TIMEOUT_HANDLE.borrow(cs).borrow_mut() = Some(h_reply_timeout);

        let mut uart = S7_UART.borrow(cs).borrow_mut();
        let uart = uart.as_mut().unwrap();
        uart.react_on_character_received(h_char);
        uart.react_on_send_complete(h_sent);

        let mut hw = S7_HW_TIMER.borrow(cs).borrow_mut();
        let hw = hw.as_mut().unwrap();
        // The third compare channel is unused by the master (only T1.5 and
        // T3.5 are compares; T4.0 is the overflow channel), so it's bound to
        // a value `advance` never reaches.
        hw.react_on_compare(h_t15, h_t35, h_t15);
        hw.set_compare(timing.t15, timing.t35, u32::MAX);
        hw.react_on_overflow(h_t40);

        S7_MASTER
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .unwrap()
            .register_requestor(h_requestor, fill_read_holding);
    });

    // Cold -> Initial, then settle to Idle after T3.5 with nothing queued.
    s7_apply(critical_section::with(|cs| {
        S7_MASTER.borrow(cs).borrow_mut().as_mut().unwrap().handle_event(Event::CanStart)
    }));
    critical_section::with(|cs| {
        S7_HW_TIMER.borrow(cs).borrow_mut().as_mut().unwrap().advance(timing.t35)
    });
    while S7_REACTOR.dispatch_one() {}
    assert_eq!(
        critical_section::with(|cs| S7_MASTER.borrow(cs).borrow().as_ref().unwrap().state()),
        MasterState::Idle
    );

    // Idle master serves the queued request immediately.
    let actions = critical_section::with(|cs| {
        S7_MASTER.borrow(cs).borrow_mut().as_mut().unwrap().request(h_requestor)
    });
    s7_apply(actions);
    let sent_len = critical_section::with(|cs| S7_UART.borrow(cs).borrow().as_ref().unwrap().sent.len());
    assert!(sent_len > 0, "an idle master must send immediately");

    // Simulate the shift register draining.
    critical_section::with(|cs| S7_UART.borrow(cs).borrow_mut().as_mut().unwrap().complete_send());
    while S7_REACTOR.dispatch_one() {}
    assert_eq!(
        critical_section::with(|cs| S7_MASTER.borrow(cs).borrow().as_ref().unwrap().state()),
        MasterState::WaitingForReply
    );

    // The slave replies with a well-formed, CRC-valid frame, one injected
    // character at a time -- each must be dispatched before the next is
    // injected, since `notify` overwrites a still-pending argument.
    let mut reply: RtuDatagram<256> = RtuDatagram::new();
    reply.push_byte(0x03);
    reply.push_byte(0x02);
    reply.push_byte(0x00);
    reply.push_byte(0x2a);
    reply.finish_request(0x11);
    let bytes = reply.get_buffer().to_vec();

    for b in bytes {
        critical_section::with(|cs| {
            S7_UART.borrow(cs).borrow_mut().as_mut().unwrap().inject_received(b)
        });
        while S7_REACTOR.dispatch_one() {}
    }

    // T1.5, then T3.5, since the last received character.
    critical_section::with(|cs| {
        S7_HW_TIMER.borrow(cs).borrow_mut().as_mut().unwrap().advance(timing.t15)
    });
    while S7_REACTOR.dispatch_one() {}
    critical_section::with(|cs| {
        S7_HW_TIMER
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .unwrap()
            .advance(timing.t35 - timing.t15)
    });
    while S7_REACTOR.dispatch_one() {}

    assert_eq!(
        S7_REPLY_SEEN.load(Ordering::SeqCst),
        1,
        "a good reply must notify the requesting handle exactly once"
    );
    assert_eq!(S7_ERROR_SEEN.load(Ordering::SeqCst), 0, "a good reply must not raise an error");

    // T4.0 overflow releases the bus back to idle.
    critical_section::with(|cs| {
        S7_HW_TIMER.borrow(cs).borrow_mut().as_mut().unwrap().overflow()
    });
    while S7_REACTOR.dispatch_one() {}
    assert_eq!(
        critical_section::with(|cs| S7_MASTER.borrow(cs).borrow().as_ref().unwrap().state()),
        MasterState::Idle
    );
}
