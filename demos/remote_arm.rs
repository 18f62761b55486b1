//! Three-axis arm driven from an NEC infrared remote.
//!
//! Wiring (Pico 1):
//! - GP15: IR receiver module output (idles high)
//! - GP2 / GP4 / GP6: step pulses of channels 1-3 (PWM slices 1-3, output A)
//! - GP3 / GP5 / GP7: direction lines of channels 1-3
//!
//! Keys: POWER idle, 1/2/3 single motor, PLAY chassis, ALIENTEK auto, arrows move,
//! 0 zeroes the counts, DELETE stops everything.

#![no_std]
#![no_main]

use core::convert::Infallible;

use defmt::info;
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::pwm::{Config, Pwm};
use ir_stepper::{
    BoardSequencer, CHANNEL_COUNT, ChannelId, ChannelSequencer, DecoderTiming, IR_REMOTE_ADDRESS,
    IrReceiver, KeyMailbox, PwmPulses, RemoteControl, RemoteControlStatic, Result,
    STEP_FREQUENCY_HZ, SharedSequencer, pwm_pulses,
};
use panic_probe as _;

static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();
static MAILBOX: KeyMailbox = KeyMailbox::new();
static SEQUENCER: BoardSequencer =
    SharedSequencer::new(ChannelSequencer::in_order(PwmPulses::new(STEP_FREQUENCY_HZ)));

#[interrupt]
fn PWM_IRQ_WRAP() {
    pwm_pulses::on_wrap_interrupt(&SEQUENCER);
}

#[interrupt]
#[expect(unsafe_code, reason = "entry point of the high-priority executor")]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let Err(err) = inner_main(spawner).await;
    core::panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    info!("Starting IR remote arm");
    let p = embassy_rp::init(Default::default());

    SEQUENCER.with(|sequencer| {
        let output = sequencer.output_mut();
        output.attach(
            ChannelId::new(0),
            Pwm::new_output_a(p.PWM_SLICE1, p.PIN_2, Config::default()),
            1,
        );
        output.attach(
            ChannelId::new(1),
            Pwm::new_output_a(p.PWM_SLICE2, p.PIN_4, Config::default()),
            2,
        );
        output.attach(
            ChannelId::new(2),
            Pwm::new_output_a(p.PWM_SLICE3, p.PIN_6, Config::default()),
            3,
        );
    });
    interrupt::PWM_IRQ_WRAP.set_priority(Priority::P1);
    enable_pwm_wrap_interrupt();

    // IR edges are timed in a task on the high-priority executor.
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    let timing = DecoderTiming::NEC.with_expected_address(IR_REMOTE_ADDRESS);
    let _ir = IrReceiver::new(p.PIN_15, timing, &MAILBOX, high_spawner)?;

    static REMOTE_CONTROL_STATIC: RemoteControlStatic = RemoteControl::new_static();
    let directions = [
        Output::new(p.PIN_3, Level::Low),
        Output::new(p.PIN_5, Level::Low),
        Output::new(p.PIN_7, Level::Low),
    ];
    let remote = RemoteControl::new(
        &REMOTE_CONTROL_STATIC,
        &MAILBOX,
        &SEQUENCER,
        directions,
        spawner,
    )?;

    // Stand-in for a display: log the state on every change.
    loop {
        remote.wait_refresh().await;
        let key = remote.key();
        info!("key {} (code {}, x{})", key.symbol, key.raw_code, key.press_count);
        for channel in ChannelId::all::<CHANNEL_COUNT>() {
            if let Some(status) = remote.status(channel) {
                info!(
                    "  channel {}: busy={} {} remaining={}",
                    channel, status.busy, status.direction, status.pulses_remaining
                );
            }
        }
    }
}

#[expect(
    unsafe_code,
    reason = "the handler reaches the sequencer only through its critical section"
)]
fn enable_pwm_wrap_interrupt() {
    unsafe { interrupt::PWM_IRQ_WRAP.enable() };
}
