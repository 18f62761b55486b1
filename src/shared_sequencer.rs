//! A [`ChannelSequencer`] shared between task context and the pulse-complete interrupt.
//!
//! Every mutation runs inside a critical section, so the interrupt handler can never observe a
//! half-written channel. The busy flags are mirrored into one atomic word after each mutation,
//! which lets tasks poll [`SharedSequencer::is_busy`] without masking interrupts.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicU32, Ordering};

use crate::Result;
use crate::channel_sequencer::{
    ChannelId, ChannelSequencer, ChannelState, Direction, PulseOutcome, PulseOutput,
    SequencerMode, StartOutcome,
};

pub struct SharedSequencer<O, const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<ChannelSequencer<O, N>>>,
    busy_bits: AtomicU32,
}

impl<O: PulseOutput, const N: usize> SharedSequencer<O, N> {
    #[must_use]
    pub const fn new(sequencer: ChannelSequencer<O, N>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(sequencer)),
            busy_bits: AtomicU32::new(0),
        }
    }

    /// See [`ChannelSequencer::program`].
    ///
    /// # Errors
    /// As [`ChannelSequencer::program`].
    pub fn program(
        &self,
        channel: ChannelId,
        pulse_count: u32,
        direction: Direction,
    ) -> Result<()> {
        self.with(|sequencer| sequencer.program(channel, pulse_count, direction))
    }

    /// See [`ChannelSequencer::start`].
    ///
    /// # Errors
    /// As [`ChannelSequencer::start`].
    pub fn start(&self, channel: ChannelId, mode: SequencerMode) -> Result<StartOutcome> {
        self.with(|sequencer| sequencer.start(channel, mode))
    }

    /// Call from the pulse-complete interrupt handler.
    pub fn on_pulse_complete(&self, source: ChannelId) -> PulseOutcome {
        self.with(|sequencer| sequencer.on_pulse_complete(source))
    }

    /// Stop `channel` inside the same critical section the interrupt handler uses.
    ///
    /// # Errors
    /// As [`ChannelSequencer::abort`].
    pub fn abort(&self, channel: ChannelId) -> Result<()> {
        self.with(|sequencer| sequencer.abort(channel))
    }

    pub fn abort_all(&self) {
        self.with(ChannelSequencer::abort_all);
    }

    /// Lock-free read of a channel's busy flag.
    #[must_use]
    pub fn is_busy(&self, channel: ChannelId) -> bool {
        channel.index() < N
            && self.busy_bits.load(Ordering::Acquire) & channel.mask() != 0
    }

    #[must_use]
    pub fn any_busy(&self) -> bool {
        self.busy_bits.load(Ordering::Acquire) != 0
    }

    /// Consistent copy of all of a channel's fields.
    #[must_use]
    pub fn snapshot(&self, channel: ChannelId) -> Option<ChannelState> {
        self.inner.lock(|cell| cell.borrow().state(channel))
    }

    /// Run `f` on the sequencer inside a critical section and refresh the busy flags.
    pub fn with<R>(&self, f: impl FnOnce(&mut ChannelSequencer<O, N>) -> R) -> R {
        self.inner.lock(|cell| {
            let mut sequencer = cell.borrow_mut();
            let result = f(&mut sequencer);
            self.busy_bits.store(sequencer.busy_bits(), Ordering::Release);
            result
        })
    }
}
