//! Pulse-count sequencing for several step channels that share one pulse timer.
//!
//! The timer can only honor one channel's pulse program at a time, so exactly one channel is
//! [`ChannelPhase::Busy`] while a run is in flight. The pulse-complete interrupt calls
//! [`ChannelSequencer::on_pulse_complete`]; when the active channel's count reaches zero it is
//! stopped and, in [`SequencerMode::LinkedAuto`], the next programmed channel of the chain is
//! started from the same interrupt so the pulse train has no gap.
//!
//! Field ownership:
//! - `pending_pulses` and `direction` are written by [`ChannelSequencer::program`] only while
//!   the channel is ready, and decremented only by the interrupt handler while it is busy.
//! - `Ready -> Busy` happens in [`ChannelSequencer::start`] (or in the interrupt when chaining),
//!   `Busy -> Ready` only in the interrupt handler or in [`ChannelSequencer::abort`].

use derive_more::derive::Display;

use crate::{Error, Result};

// ===== Types =================================================================

/// Zero-based index of a step channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Display, defmt::Format)]
pub struct ChannelId(u8);

impl ChannelId {
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// This channel's bit in a busy word; 0 past bit 31.
    #[must_use]
    pub fn mask(self) -> u32 {
        1_u32.checked_shl(u32::from(self.0)).unwrap_or(0)
    }

    /// Channels `0..N`.
    pub fn all<const N: usize>() -> impl Iterator<Item = Self> {
        (0..N).filter_map(|index| u8::try_from(index).ok()).map(Self)
    }
}

/// Rotation direction, driven on a separate direction line before a run starts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, defmt::Format)]
pub enum Direction {
    /// Also the safe default: direction line low.
    #[default]
    Left,
    Right,
}

impl Direction {
    /// Level of the direction line, `true` for high.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::Right)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, defmt::Format)]
pub enum ChannelPhase {
    #[default]
    Ready,
    Busy,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, defmt::Format)]
pub struct ChannelState {
    pub pending_pulses: u32,
    pub phase: ChannelPhase,
    pub direction: Direction,
}

impl ChannelState {
    pub const IDLE: Self = Self {
        pending_pulses: 0,
        phase: ChannelPhase::Ready,
        direction: Direction::Left,
    };

    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self.phase, ChannelPhase::Busy)
    }
}

/// How a run proceeds once the started channel drains.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, defmt::Format)]
pub enum SequencerMode {
    /// Drive exactly one channel to completion and stop.
    #[default]
    Manual,
    /// Chain to the next programmed channel of the configured order as each one completes.
    LinkedAuto,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum StartOutcome {
    /// The channel is busy and its output is armed.
    Started,
    /// Nothing was pending; the run is already complete and no output was touched.
    Completed,
}

/// What one pulse-complete interrupt did.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum PulseOutcome {
    /// The interrupt came from a channel that is not the active, busy one.
    Ignored,
    Counted { remaining: u32 },
    /// The channel drained. `next` is the channel chained to, if any.
    Finished {
        channel: ChannelId,
        next: Option<ChannelId>,
    },
}

/// The timer outputs, one per channel. Implementations touch hardware registers and must be
/// callable from interrupt context.
pub trait PulseOutput {
    /// Begin emitting pulses on `channel` and enable its pulse-complete interrupt.
    fn arm(&mut self, channel: ChannelId);
    /// Stop emitting pulses on `channel` and disable its pulse-complete interrupt.
    fn disarm(&mut self, channel: ChannelId);
}

// ===== Sequencer =============================================================

pub struct ChannelSequencer<O, const N: usize> {
    output: O,
    channels: [ChannelState; N],
    chain: [ChannelId; N],
    active: Option<ChannelId>,
    mode: SequencerMode,
}

impl<O: PulseOutput, const N: usize> ChannelSequencer<O, N> {
    /// Create a sequencer whose linked runs follow `chain`.
    #[must_use]
    pub const fn new(output: O, chain: [ChannelId; N]) -> Self {
        assert!(N <= 32, "busy flags are kept in one 32-bit word");
        Self {
            output,
            channels: [ChannelState::IDLE; N],
            chain,
            active: None,
            mode: SequencerMode::Manual,
        }
    }

    /// Create a sequencer chaining channels in index order.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::indexing_slicing,
        clippy::arithmetic_side_effects,
        reason = "index < N <= 32, checked in new"
    )]
    pub const fn in_order(output: O) -> Self {
        let mut chain = [ChannelId(0); N];
        let mut index = 0;
        while index < N {
            chain[index] = ChannelId(index as u8);
            index += 1;
        }
        Self::new(output, chain)
    }

    /// Set the pulse count and direction for the next run of `channel`.
    ///
    /// # Errors
    /// [`Error::ChannelBusy`] if the channel is busy: overwriting an in-flight count would lose
    /// or duplicate pulses. [`Error::ChannelOutOfRange`] for an unknown channel.
    pub fn program(
        &mut self,
        channel: ChannelId,
        pulse_count: u32,
        direction: Direction,
    ) -> Result<()> {
        let state = self.state_mut(channel)?;
        if state.is_busy() {
            #[cfg(feature = "defmt")]
            defmt::error!("sequencer: program on busy channel {}", channel);
            return Err(Error::ChannelBusy { channel });
        }
        state.pending_pulses = pulse_count;
        state.direction = direction;
        Ok(())
    }

    /// Start a run on `channel`.
    ///
    /// With nothing pending this is a no-op that reports [`StartOutcome::Completed`], even while
    /// another channel owns the timer.
    ///
    /// # Errors
    /// [`Error::ChannelBusy`] if the channel is already running, [`Error::TimerBusy`] if another
    /// channel owns the timer, [`Error::ChannelOutOfRange`] for an unknown channel.
    pub fn start(&mut self, channel: ChannelId, mode: SequencerMode) -> Result<StartOutcome> {
        let state = *self.state_mut(channel)?;
        if state.is_busy() {
            #[cfg(feature = "defmt")]
            defmt::error!("sequencer: start on busy channel {}", channel);
            return Err(Error::ChannelBusy { channel });
        }
        if state.pending_pulses == 0 {
            return Ok(StartOutcome::Completed);
        }
        if let Some(active) = self.active {
            #[cfg(feature = "defmt")]
            defmt::error!("sequencer: start {} while {} owns the timer", channel, active);
            return Err(Error::TimerBusy { active });
        }

        self.mode = mode;
        self.activate(channel);
        #[cfg(feature = "defmt")]
        defmt::info!(
            "sequencer: start {} ({} pulses, {}, {})",
            channel,
            state.pending_pulses,
            state.direction,
            mode
        );
        Ok(StartOutcome::Started)
    }

    /// Handle one pulse-complete interrupt raised by `source`.
    ///
    /// Every armed channel can raise the shared interrupt, so anything but the active, busy
    /// channel is ignored rather than counted.
    pub fn on_pulse_complete(&mut self, source: ChannelId) -> PulseOutcome {
        if self.active != Some(source) {
            return PulseOutcome::Ignored;
        }
        let Some(state) = self.channels.get_mut(source.index()) else {
            return PulseOutcome::Ignored;
        };
        if !state.is_busy() {
            return PulseOutcome::Ignored;
        }

        state.pending_pulses = state.pending_pulses.saturating_sub(1);
        if state.pending_pulses > 0 {
            return PulseOutcome::Counted {
                remaining: state.pending_pulses,
            };
        }

        state.phase = ChannelPhase::Ready;
        self.active = None;
        self.output.disarm(source);

        let next = match self.mode {
            SequencerMode::Manual => None,
            SequencerMode::LinkedAuto => self.next_in_chain(source),
        };
        if let Some(next) = next {
            self.activate(next);
        }
        #[cfg(feature = "defmt")]
        defmt::debug!("sequencer: {} finished, next {}", source, next);
        PulseOutcome::Finished {
            channel: source,
            next,
        }
    }

    /// Stop `channel` immediately: output off, count cleared, ready again.
    ///
    /// # Errors
    /// [`Error::ChannelOutOfRange`] for an unknown channel.
    pub fn abort(&mut self, channel: ChannelId) -> Result<()> {
        let state = self.state_mut(channel)?;
        let was_busy = state.is_busy();
        state.pending_pulses = 0;
        state.phase = ChannelPhase::Ready;
        if was_busy {
            self.output.disarm(channel);
        }
        if self.active == Some(channel) {
            self.active = None;
        }
        #[cfg(feature = "defmt")]
        defmt::info!("sequencer: abort {} (was busy: {})", channel, was_busy);
        Ok(())
    }

    /// Abort every channel, ending any run in progress.
    pub fn abort_all(&mut self) {
        for channel in self.chain {
            // Every chain entry was in range when the sequencer was built.
            let _ = self.abort(channel);
        }
    }

    #[must_use]
    pub fn is_busy(&self, channel: ChannelId) -> bool {
        self.state(channel).is_some_and(|state| state.is_busy())
    }

    #[must_use]
    pub fn any_busy(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn state(&self, channel: ChannelId) -> Option<ChannelState> {
        self.channels.get(channel.index()).copied()
    }

    #[must_use]
    pub const fn active(&self) -> Option<ChannelId> {
        self.active
    }

    #[must_use]
    pub const fn mode(&self) -> SequencerMode {
        self.mode
    }

    #[must_use]
    pub const fn chain(&self) -> &[ChannelId; N] {
        &self.chain
    }

    /// One bit per busy channel, bit `i` for channel `i`.
    #[must_use]
    pub fn busy_bits(&self) -> u32 {
        ChannelId::all::<N>()
            .zip(&self.channels)
            .filter(|(_, state)| state.is_busy())
            .fold(0, |bits, (channel, _)| bits | channel.mask())
    }

    #[must_use]
    pub const fn output(&self) -> &O {
        &self.output
    }

    pub const fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    fn state_mut(&mut self, channel: ChannelId) -> Result<&mut ChannelState> {
        self.channels
            .get_mut(channel.index())
            .ok_or(Error::ChannelOutOfRange {
                channel: channel.as_u8(),
            })
    }

    fn activate(&mut self, channel: ChannelId) {
        if let Some(state) = self.channels.get_mut(channel.index()) {
            state.phase = ChannelPhase::Busy;
            self.active = Some(channel);
            self.output.arm(channel);
        }
    }

    /// The first channel after `channel` in the chain that has pulses pending.
    fn next_in_chain(&self, channel: ChannelId) -> Option<ChannelId> {
        let position = self.chain.iter().position(|&entry| entry == channel)?;
        self.chain
            .iter()
            .skip(position.saturating_add(1))
            .copied()
            .find(|&next| {
                self.state(next)
                    .is_some_and(|state| !state.is_busy() && state.pending_pulses > 0)
            })
    }
}
