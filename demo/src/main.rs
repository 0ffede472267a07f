#![no_std]
#![no_main]

use core::cell::RefCell;

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m_rt::{entry, exception};
use critical_section::Mutex;
use stm32f4::stm32f407::{self, Peripherals};

use abi::{Handle, Priority, Tick};
use drv_gpio_api::OutputPin;
use runtime::{Reactor, TimerWheel};
use static_cell::StaticCell;

use panic_halt as _;

/// The user LED on PA5 (STM32F407 Discovery/Nucleo boards), driven through
/// the same `OutputPin` contract the reactor-based Modbus/EEPROM scenarios
/// are host-tested against.
struct BoardLed {
    gpioa: stm32f407::GPIOA,
}

impl OutputPin for BoardLed {
    fn set_high(&mut self) {
        self.gpioa.bsrr.write(|w| w.bs5().set_bit());
    }

    fn set_low(&mut self) {
        self.gpioa.bsrr.write(|w| w.br5().set_bit());
    }

    fn toggle(&mut self) {
        if self.gpioa.odr.read().odr5().bit_is_set() {
            self.set_low();
        } else {
            self.set_high();
        }
    }
}

static LED: StaticCell<Option<BoardLed>> = StaticCell::new(None);
static WHEEL: Mutex<RefCell<TimerWheel<4>>> = Mutex::new(RefCell::new(TimerWheel::new()));
static TICKS: Mutex<RefCell<Tick>> = Mutex::new(RefCell::new(Tick(0)));
static TICK_HANDLE: Mutex<RefCell<Option<Handle>>> = Mutex::new(RefCell::new(None));
static REACTOR: Reactor<4> = Reactor::new();

const TICK_HZ: u32 = 1_000;
const BLINK_PERIOD_TICKS: u32 = 500;

fn blink(_arg: u32) {
    if let Some(led) = LED.borrow_mut().as_mut() {
        led.toggle();
    }
}

/// Walks the timer wheel against the current tick count, re-notifying any
/// expired targets. Dispatched in main context from the reactor, never
/// called directly from `SysTick`: `TimerWheel::on_tick` re-notifies its
/// expired entries' handles, and doing that from interrupt context would
/// let a timer handler jump the priority order of whatever the main loop
/// was already running.
fn service_timer_wheel(_arg: u32) {
    let now = critical_section::with(|cs| *TICKS.borrow(cs).borrow());
    critical_section::with(|cs| {
        WHEEL
            .borrow(cs)
            .borrow_mut()
            .on_tick(now, |h, a| REACTOR.notify(h, a));
    });
}

#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();
    let dp = Peripherals::take().unwrap();

    dp.RCC.ahb1enr.modify(|_, w| w.gpioaen().set_bit());
    dp.GPIOA.moder.modify(|_, w| w.moder5().output());

    *LED.borrow_mut() = Some(BoardLed { gpioa: dp.GPIOA });

    let handle = REACTOR.register(blink, Priority::High);
    let tick_handle = REACTOR.register(service_timer_wheel, Priority::High);
    critical_section::with(|cs| {
        *TICK_HANDLE.borrow(cs).borrow_mut() = Some(tick_handle);
        WHEEL.borrow(cs).borrow_mut().arm(
            handle,
            Tick(0) + BLINK_PERIOD_TICKS,
            BLINK_PERIOD_TICKS,
            0,
        );
    });

    // 168 MHz core clock, 1 kHz tick.
    let mut syst = cp.SYST;
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(168_000_000 / TICK_HZ - 1);
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();

    REACTOR.run();
}

#[exception]
fn SysTick() {
    critical_section::with(|cs| {
        let mut ticks = TICKS.borrow(cs).borrow_mut();
        *ticks = *ticks + 1;
    });

    if let Some(handle) = critical_section::with(|cs| *TICK_HANDLE.borrow(cs).borrow()) {
        REACTOR.notify_from_isr(handle);
    }
}
