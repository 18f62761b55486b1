//! A device abstraction tying the key mailbox, the motor coordinator and the display refresh
//! together in one cooperative task.
//!
//! See [`RemoteControl`] for usage examples.
use core::cell::Cell;

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_rp::gpio::Output;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};

use crate::Result;
use crate::channel_sequencer::ChannelId;
use crate::key_mailbox::KeyMailbox;
use crate::key_translator::{KeyEvent, KeyMap, KeyTranslator};
use crate::motor_coordinator::{ChannelStatus, MotorConfig, MotorCoordinator, Reaction};
use crate::pwm_pulses::PwmPulses;
use crate::shared_constants::{CHANNEL_COUNT, KEY_POLL_PERIOD, KEY_RELEASE_TIMEOUT};
use crate::shared_sequencer::SharedSequencer;

/// Raised whenever the key state or a channel's busy flag changes.
pub type RefreshSignal = Signal<CriticalSectionRawMutex, ()>;

/// The sequencer driving the board's PWM step outputs.
pub type BoardSequencer = SharedSequencer<PwmPulses<CHANNEL_COUNT>, CHANNEL_COUNT>;

type BoardCoordinator = MotorCoordinator<
    'static,
    PwmPulses<CHANNEL_COUNT>,
    [Output<'static>; CHANNEL_COUNT],
    CHANNEL_COUNT,
>;

/// Static resources for [`RemoteControl`].
pub struct RemoteControlStatic {
    refresh: RefreshSignal,
    key: Mutex<CriticalSectionRawMutex, Cell<KeyEvent>>,
}

/// A device abstraction that reacts to remote keys by programming step runs.
///
/// # Examples
/// ```no_run
/// # #![no_std]
/// # #![no_main]
/// # use panic_probe as _;
/// # use embassy_executor::Spawner;
/// # use embassy_rp::gpio::{Level, Output};
/// # use ir_stepper::{BoardSequencer, ChannelId, KeyMailbox, RemoteControl, RemoteControlStatic};
/// # async fn example(
/// #     p: embassy_rp::Peripherals,
/// #     mailbox: &'static KeyMailbox,
/// #     sequencer: &'static BoardSequencer,
/// #     spawner: Spawner,
/// # ) -> ir_stepper::Result<()> {
/// static REMOTE_CONTROL_STATIC: RemoteControlStatic = RemoteControl::new_static();
/// let directions = [
///     Output::new(p.PIN_3, Level::Low),
///     Output::new(p.PIN_5, Level::Low),
///     Output::new(p.PIN_7, Level::Low),
/// ];
/// let remote = RemoteControl::new(&REMOTE_CONTROL_STATIC, mailbox, sequencer, directions, spawner)?;
/// loop {
///     remote.wait_refresh().await;
///     defmt::info!("key {} ch0 {}", remote.key(), remote.status(ChannelId::new(0)));
/// }
/// # }
/// ```
pub struct RemoteControl {
    remote_control_static: &'static RemoteControlStatic,
    sequencer: &'static BoardSequencer,
}

impl RemoteControl {
    /// Create static resources for [`RemoteControl`].
    #[must_use]
    pub const fn new_static() -> RemoteControlStatic {
        RemoteControlStatic {
            refresh: Signal::new(),
            key: Mutex::new(Cell::new(KeyEvent::NO_KEY)),
        }
    }

    /// Start the remote-control task.
    ///
    /// # Errors
    /// Returns an error if the background task cannot be spawned.
    pub fn new(
        remote_control_static: &'static RemoteControlStatic,
        mailbox: &'static KeyMailbox,
        sequencer: &'static BoardSequencer,
        directions: [Output<'static>; CHANNEL_COUNT],
        spawner: Spawner,
    ) -> Result<Self> {
        let coordinator = MotorCoordinator::new(sequencer, directions, MotorConfig::DEFAULT);
        let token = remote_control_task(remote_control_static, mailbox, coordinator)?;
        spawner.spawn(token);
        Ok(Self {
            remote_control_static,
            sequencer,
        })
    }

    /// Wait until the key state or a busy flag changed.
    pub async fn wait_refresh(&self) {
        self.remote_control_static.refresh.wait().await;
    }

    /// The key state as of the last poll.
    #[must_use]
    pub fn key(&self) -> KeyEvent {
        self.remote_control_static.key.lock(Cell::get)
    }

    #[must_use]
    pub fn status(&self, channel: ChannelId) -> Option<ChannelStatus> {
        self.sequencer.snapshot(channel).map(ChannelStatus::from)
    }
}

#[embassy_executor::task]
async fn remote_control_task(
    remote_control_static: &'static RemoteControlStatic,
    mailbox: &'static KeyMailbox,
    mut coordinator: BoardCoordinator,
) -> ! {
    let mut translator = KeyTranslator::new(KeyMap::remote(), KEY_RELEASE_TIMEOUT);
    let mut was_busy = false;

    info!("remote control task started");
    loop {
        Timer::after(KEY_POLL_PERIOD).await;
        let now = Instant::now();
        let mut changed = false;

        if let Some(event) = translator.poll(now, mailbox.latest()) {
            remote_control_static.key.lock(|key| key.set(event));
            changed = true;
            report(coordinator.handle_key(&event, now));
        }
        report(coordinator.tick(now));

        let busy = coordinator.any_busy();
        if busy != was_busy {
            was_busy = busy;
            changed = true;
        }
        if changed {
            remote_control_static.refresh.signal(());
        }
    }
}

fn report(reaction: Result<Reaction>) {
    match reaction {
        Ok(Reaction::Ignored) => {}
        Ok(reaction) => info!("remote: {}", reaction),
        Err(err) => warn!("remote: {}", err),
    }
}
