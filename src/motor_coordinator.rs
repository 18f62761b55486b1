//! Decides what to program into the sequencer from remote key events.
//!
//! See [`MotorCoordinator`] for the key bindings.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;

use crate::channel_sequencer::{
    ChannelId, ChannelState, Direction, PulseOutput, SequencerMode, StartOutcome,
};
use crate::key_translator::KeyEvent;
use crate::shared_sequencer::SharedSequencer;
use crate::shared_constants::{
    AUTO_PROGRAM, AUTO_RUN_PERIOD, CHANNEL_COUNT, CHASSIS_PULSES, STEP_PULSES,
};
use crate::{Error, Result};

// ===== Direction lines =======================================================

/// The direction line of each channel.
pub trait DirectionOutput {
    /// Drive the direction line of `channel`.
    ///
    /// # Errors
    /// [`Error::DirectionPin`] if the line could not be driven, [`Error::ChannelOutOfRange`] for
    /// an unknown channel.
    fn set_direction(&mut self, channel: ChannelId, direction: Direction) -> Result<()>;
}

impl<P: OutputPin, const N: usize> DirectionOutput for [P; N] {
    fn set_direction(&mut self, channel: ChannelId, direction: Direction) -> Result<()> {
        let pin = self
            .get_mut(channel.index())
            .ok_or(Error::ChannelOutOfRange {
                channel: channel.as_u8(),
            })?;
        let driven = if direction.is_high() {
            pin.set_high()
        } else {
            pin.set_low()
        };
        driven.map_err(|_| Error::DirectionPin { channel })
    }
}

// ===== Modes and configuration ===============================================

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, defmt::Format)]
pub enum OperatingMode {
    /// Directional keys do nothing.
    #[default]
    Idle,
    /// LEFT/RIGHT step one channel.
    SingleMotor(ChannelId),
    /// UP/DOWN/LEFT/RIGHT drive every channel as a chassis.
    ChassisMove,
    /// The preset program runs periodically and on every directional key.
    Auto,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MotorConfig<const N: usize> {
    /// Pulses per LEFT/RIGHT press in [`OperatingMode::SingleMotor`].
    pub step_pulses: u32,
    /// Pulses per channel per press in [`OperatingMode::ChassisMove`].
    pub chassis_pulses: u32,
    /// Pulses per channel for each [`OperatingMode::Auto`] run.
    pub auto_program: [u32; N],
    pub auto_period: Duration,
}

impl MotorConfig<CHANNEL_COUNT> {
    pub const DEFAULT: Self = Self {
        step_pulses: STEP_PULSES,
        chassis_pulses: CHASSIS_PULSES,
        auto_program: AUTO_PROGRAM,
        auto_period: AUTO_RUN_PERIOD,
    };
}

/// What a channel looks like to the display task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct ChannelStatus {
    pub busy: bool,
    pub direction: Direction,
    pub pulses_remaining: u32,
}

impl From<ChannelState> for ChannelStatus {
    fn from(state: ChannelState) -> Self {
        Self {
            busy: state.is_busy(),
            direction: state.direction,
            pulses_remaining: state.pending_pulses,
        }
    }
}

/// What the coordinator did with an input.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum Reaction {
    /// The input means nothing in the current mode.
    Ignored,
    ModeChanged(OperatingMode),
    /// A mode change was refused because a channel is busy.
    ModeRejected,
    /// A run could not be programmed because a channel is busy.
    Busy,
    /// A run started on the given channel.
    Started(ChannelId),
    /// Idle channels were zeroed and direction lines set to the safe default.
    SafeDefault,
    /// Every channel was aborted.
    Stopped,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Heading {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Intent {
    Mode(OperatingMode),
    Move(Heading),
    Zero,
    Stop,
}

fn intent_of(symbol: &str) -> Option<Intent> {
    let intent = match symbol {
        "POWER" => Intent::Mode(OperatingMode::Idle),
        "PLAY" => Intent::Mode(OperatingMode::ChassisMove),
        "ALIENTEK" => Intent::Mode(OperatingMode::Auto),
        "1" => Intent::Mode(OperatingMode::SingleMotor(ChannelId::new(0))),
        "2" => Intent::Mode(OperatingMode::SingleMotor(ChannelId::new(1))),
        "3" => Intent::Mode(OperatingMode::SingleMotor(ChannelId::new(2))),
        "UP" => Intent::Move(Heading::Up),
        "DOWN" => Intent::Move(Heading::Down),
        "LEFT" => Intent::Move(Heading::Left),
        "RIGHT" => Intent::Move(Heading::Right),
        "0" => Intent::Zero,
        "DELETE" => Intent::Stop,
        _ => return None,
    };
    Some(intent)
}

// ===== Coordinator ===========================================================

/// Maps key events onto sequencer runs.
///
/// | Key | Effect |
/// |---|---|
/// | POWER | mode [`OperatingMode::Idle`] |
/// | 1 / 2 / 3 | mode [`OperatingMode::SingleMotor`] on that channel |
/// | PLAY | mode [`OperatingMode::ChassisMove`] |
/// | ALIENTEK | mode [`OperatingMode::Auto`] |
/// | LEFT / RIGHT / UP / DOWN | a run, depending on the mode |
/// | 0, key released | when nothing is busy, zero every channel and set the safe direction |
/// | DELETE | abort every channel |
///
/// Mode changes are refused while any channel is busy, so the interrupt handler never sees a
/// counter reprogrammed under it.
pub struct MotorCoordinator<'a, O, D, const N: usize> {
    sequencer: &'a SharedSequencer<O, N>,
    directions: D,
    config: MotorConfig<N>,
    mode: OperatingMode,
    last_auto_run: Option<Instant>,
}

impl<'a, O: PulseOutput, D: DirectionOutput, const N: usize> MotorCoordinator<'a, O, D, N> {
    #[must_use]
    pub const fn new(
        sequencer: &'a SharedSequencer<O, N>,
        directions: D,
        config: MotorConfig<N>,
    ) -> Self {
        Self {
            sequencer,
            directions,
            config,
            mode: OperatingMode::Idle,
            last_auto_run: None,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> OperatingMode {
        self.mode
    }

    #[must_use]
    pub const fn directions(&self) -> &D {
        &self.directions
    }

    /// Busy flag, direction and remaining pulses of `channel`, copied as one unit.
    #[must_use]
    pub fn status(&self, channel: ChannelId) -> Option<ChannelStatus> {
        self.sequencer.snapshot(channel).map(ChannelStatus::from)
    }

    #[must_use]
    pub fn any_busy(&self) -> bool {
        self.sequencer.any_busy()
    }

    /// React to a key event from the translator.
    ///
    /// Only new presses and releases act; repeats of a held key are ignored so one press
    /// programs one run.
    ///
    /// # Errors
    /// Propagates sequencer misuse and direction line failures.
    pub fn handle_key(&mut self, event: &KeyEvent, now: Instant) -> Result<Reaction> {
        let intent = if !event.is_held() {
            Some(Intent::Zero)
        } else if event.is_new_press {
            event.symbol.and_then(intent_of)
        } else {
            None
        };

        match intent {
            None => Ok(Reaction::Ignored),
            Some(Intent::Mode(mode)) => Ok(self.set_mode(mode, now)),
            Some(Intent::Move(heading)) => self.on_move(heading, now),
            Some(Intent::Zero) => self.safe_default(),
            Some(Intent::Stop) => self.stop(),
        }
    }

    /// Periodic work: in [`OperatingMode::Auto`] start the preset program every
    /// `auto_period` while all channels are idle.
    ///
    /// # Errors
    /// Propagates sequencer misuse and direction line failures.
    pub fn tick(&mut self, now: Instant) -> Result<Reaction> {
        if self.mode != OperatingMode::Auto || self.sequencer.any_busy() {
            return Ok(Reaction::Ignored);
        }
        let due = self
            .last_auto_run
            .and_then(|last| now.checked_duration_since(last))
            .is_none_or(|elapsed| elapsed >= self.config.auto_period);
        if !due {
            return Ok(Reaction::Ignored);
        }
        self.run_auto(Direction::Right, now)
    }

    fn set_mode(&mut self, mode: OperatingMode, now: Instant) -> Reaction {
        if matches!(mode, OperatingMode::SingleMotor(channel) if channel.index() >= N) {
            return Reaction::Ignored;
        }
        if self.sequencer.any_busy() {
            #[cfg(feature = "defmt")]
            defmt::warn!("motors: mode change to {} rejected, channel busy", mode);
            return Reaction::ModeRejected;
        }
        self.mode = mode;
        // The first automatic run waits a full period.
        self.last_auto_run = Some(now);
        #[cfg(feature = "defmt")]
        defmt::info!("motors: mode {}", mode);
        Reaction::ModeChanged(mode)
    }

    fn on_move(&mut self, heading: Heading, now: Instant) -> Result<Reaction> {
        match self.mode {
            OperatingMode::Idle => Ok(Reaction::Ignored),
            OperatingMode::SingleMotor(channel) => {
                let direction = match heading {
                    Heading::Left => Direction::Left,
                    Heading::Right => Direction::Right,
                    Heading::Up | Heading::Down => return Ok(Reaction::Ignored),
                };
                let mut program = [0; N];
                if let Some(pulses) = program.get_mut(channel.index()) {
                    *pulses = self.config.step_pulses;
                }
                self.run(&program, |_| direction, SequencerMode::Manual)
            }
            OperatingMode::ChassisMove => {
                let program = [self.config.chassis_pulses; N];
                let first = self
                    .sequencer
                    .with(|sequencer| sequencer.chain().first().copied());
                let direction_of = |channel: ChannelId| match heading {
                    Heading::Up => Direction::Right,
                    Heading::Down => Direction::Left,
                    Heading::Left if Some(channel) == first => Direction::Left,
                    Heading::Right if Some(channel) == first => Direction::Right,
                    Heading::Left => Direction::Right,
                    Heading::Right => Direction::Left,
                };
                self.run(&program, direction_of, SequencerMode::LinkedAuto)
            }
            OperatingMode::Auto => {
                let direction = match heading {
                    Heading::Right | Heading::Up => Direction::Right,
                    Heading::Left | Heading::Down => Direction::Left,
                };
                self.run_auto(direction, now)
            }
        }
    }

    fn run_auto(&mut self, direction: Direction, now: Instant) -> Result<Reaction> {
        let program = self.config.auto_program;
        let reaction = self.run(&program, |_| direction, SequencerMode::LinkedAuto)?;
        if matches!(reaction, Reaction::Started(_)) {
            self.last_auto_run = Some(now);
        }
        Ok(reaction)
    }

    /// Program every channel with `program[i]` pulses, set its direction line, then start the
    /// first programmed channel of the chain.
    fn run(
        &mut self,
        program: &[u32; N],
        direction_of: impl Fn(ChannelId) -> Direction,
        mode: SequencerMode,
    ) -> Result<Reaction> {
        if self.sequencer.any_busy() {
            #[cfg(feature = "defmt")]
            defmt::warn!("motors: run refused, channel busy");
            return Ok(Reaction::Busy);
        }

        let chain = self.sequencer.with(|sequencer| *sequencer.chain());
        let mut first = None;
        for channel in chain {
            let pulses = program.get(channel.index()).copied().unwrap_or(0);
            let direction = direction_of(channel);
            if pulses > 0 {
                self.directions.set_direction(channel, direction)?;
                first.get_or_insert(channel);
            }
            self.sequencer.program(channel, pulses, direction)?;
        }

        let Some(first) = first else {
            return Ok(Reaction::Ignored);
        };
        match self.sequencer.start(first, mode)? {
            StartOutcome::Started => Ok(Reaction::Started(first)),
            StartOutcome::Completed => Ok(Reaction::Ignored),
        }
    }

    fn safe_default(&mut self) -> Result<Reaction> {
        // A chained run still owns the counts of its waiting channels.
        if self.sequencer.any_busy() {
            return Ok(Reaction::Busy);
        }
        for channel in ChannelId::all::<N>() {
            self.sequencer.program(channel, 0, Direction::default())?;
            self.directions.set_direction(channel, Direction::default())?;
        }
        Ok(Reaction::SafeDefault)
    }

    fn stop(&mut self) -> Result<Reaction> {
        self.sequencer.abort_all();
        for channel in ChannelId::all::<N>() {
            self.directions.set_direction(channel, Direction::default())?;
        }
        #[cfg(feature = "defmt")]
        defmt::info!("motors: stopped");
        Ok(Reaction::Stopped)
    }
}
