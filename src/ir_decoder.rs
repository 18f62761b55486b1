//! NEC pulse-distance decoder.
//!
//! Feed it [`PulseEvent`]s in arrival order with [`ProtocolDecoder::feed`]. A complete frame is
//! published as a [`DecodedKey`] (or the invalid-key sentinel when a complement check fails), and
//! a repeat pulse bumps the press count of the last good key. Timing that fits no band resets
//! the decoder to [`DecoderPhase::Idle`]; nothing is ever published from a partial frame.

use crate::pulse_capture::{Polarity, PulseEvent};

// ===== Timing ================================================================

/// An open microsecond interval, `min_us < d < max_us`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct Band {
    pub min_us: u32,
    pub max_us: u32,
}

impl Band {
    #[must_use]
    pub const fn new(min_us: u32, max_us: u32) -> Self {
        Self { min_us, max_us }
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, duration_us: u32) -> bool {
        duration_us > self.min_us && duration_us < self.max_us
    }
}

/// Space durations (high level at the receiver output) that the decoder recognizes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct DecoderTiming {
    /// Space after the 9 ms leader burst of a full frame (nominal 4.5 ms).
    pub leader: Band,
    /// Space after the leader burst of a repeat code (nominal 2.25 ms).
    pub repeat: Band,
    /// Space of a logical 0 (nominal 560 µs).
    pub bit0: Band,
    /// Space of a logical 1 (nominal 1680 µs).
    pub bit1: Band,
    /// A repeat arriving later than this after the last frame or repeat belongs to no key.
    pub repeat_window_us: u32,
    /// When set, frames addressed to another remote fail address validation.
    pub expected_address: Option<u8>,
}

impl DecoderTiming {
    pub const NEC: Self = Self {
        leader: Band::new(4_200, 4_700),
        repeat: Band::new(2_000, 3_000),
        bit0: Band::new(300, 800),
        bit1: Band::new(1_400, 1_800),
        repeat_window_us: 140_000,
        expected_address: None,
    };

    #[must_use]
    pub const fn with_expected_address(mut self, expected_address: Option<u8>) -> Self {
        self.expected_address = expected_address;
        self
    }
}

impl Default for DecoderTiming {
    fn default() -> Self {
        Self::NEC
    }
}

// ===== Output ================================================================

/// The only decoder state the rest of the system sees.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct DecodedKey {
    /// Command byte of a valid frame, `0` for the invalid-key sentinel.
    pub raw_code: u8,
    pub address: u8,
    pub address_ok: bool,
    pub command_ok: bool,
    /// 1 for a fresh frame, incremented by each accepted repeat, 0 for the sentinel.
    pub press_count: u32,
}

impl DecodedKey {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.address_ok && self.command_ok
    }
}

/// What a single [`ProtocolDecoder::feed`] call produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum DecodeOutcome {
    /// Nothing to publish yet.
    Pending,
    /// A 32-bit frame completed. Check [`DecodedKey::is_valid`] to tell a key from the sentinel.
    Frame(DecodedKey),
    /// A repeat code for the last valid key, with its press count bumped.
    Repeat(DecodedKey),
    /// Timing fit no band (or a repeat had no key to apply to); back to idle.
    Reset,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, defmt::Format)]
pub struct DecoderStats {
    pub frames: u32,
    pub invalid_frames: u32,
    pub repeats: u32,
    pub resets: u32,
}

// ===== State machine =========================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum DecoderPhase {
    Idle,
    LeaderDetected,
    CollectingBits { bit_count: u8, shift_register: u32 },
}

const FRAME_BITS: u8 = 32;

/// Edge-timing state machine for NEC frames.
///
/// Only [`Polarity::Falling`] events are classified: their duration is the space that encodes
/// leader, repeat and bit values. Rising events (carrier bursts) only advance the elapsed-time
/// bookkeeping used for the repeat window.
#[derive(Debug)]
pub struct ProtocolDecoder {
    timing: DecoderTiming,
    phase: DecoderPhase,
    since_last_command_us: u32,
    last_valid: Option<DecodedKey>,
    stats: DecoderStats,
}

impl ProtocolDecoder {
    #[must_use]
    pub const fn new(timing: DecoderTiming) -> Self {
        Self {
            timing,
            phase: DecoderPhase::Idle,
            since_last_command_us: 0,
            last_valid: None,
            stats: DecoderStats {
                frames: 0,
                invalid_frames: 0,
                repeats: 0,
                resets: 0,
            },
        }
    }

    #[must_use]
    pub const fn phase(&self) -> DecoderPhase {
        self.phase
    }

    #[must_use]
    pub const fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Process one edge.
    pub fn feed(&mut self, event: PulseEvent) -> DecodeOutcome {
        let duration_us = event.duration_us;
        self.since_last_command_us = self.since_last_command_us.saturating_add(duration_us);

        if event.polarity == Polarity::Rising {
            return DecodeOutcome::Pending;
        }

        // A leader always starts a new key press, even in the middle of a frame.
        if self.timing.leader.contains(duration_us) {
            if self.phase != DecoderPhase::Idle {
                #[cfg(feature = "defmt")]
                defmt::debug!("IR: leader mid-frame, restarting");
            }
            self.last_valid = None;
            self.phase = DecoderPhase::LeaderDetected;
            return DecodeOutcome::Pending;
        }

        match self.phase {
            DecoderPhase::Idle => {
                if self.timing.repeat.contains(duration_us) {
                    self.on_repeat()
                } else {
                    // Idle-line spaces and frame tails land here.
                    DecodeOutcome::Pending
                }
            }
            DecoderPhase::LeaderDetected => self.on_bit(0, 0, duration_us),
            DecoderPhase::CollectingBits {
                bit_count,
                shift_register,
            } => self.on_bit(bit_count, shift_register, duration_us),
        }
    }

    /// Drop any partial frame.
    pub const fn reset(&mut self) {
        self.phase = DecoderPhase::Idle;
    }

    fn on_bit(&mut self, bit_count: u8, shift_register: u32, duration_us: u32) -> DecodeOutcome {
        let bit = if self.timing.bit1.contains(duration_us) {
            1_u32
        } else if self.timing.bit0.contains(duration_us) {
            0_u32
        } else {
            return self.timing_error(bit_count, duration_us);
        };

        // LSB first: the first bit received ends up in bit 0.
        let shift_register = shift_register | bit.checked_shl(u32::from(bit_count)).unwrap_or(0);
        let bit_count = bit_count.saturating_add(1);
        if bit_count < FRAME_BITS {
            self.phase = DecoderPhase::CollectingBits {
                bit_count,
                shift_register,
            };
            return DecodeOutcome::Pending;
        }

        self.phase = DecoderPhase::Idle;
        self.since_last_command_us = 0;
        let key = self.validate(shift_register);
        if key.is_valid() {
            self.stats.frames = self.stats.frames.wrapping_add(1);
            self.last_valid = Some(key);
            #[cfg(feature = "defmt")]
            defmt::info!("IR: addr=0x{:02X} cmd=0x{:02X}", key.address, key.raw_code);
        } else {
            self.stats.invalid_frames = self.stats.invalid_frames.wrapping_add(1);
            self.last_valid = None;
            #[cfg(feature = "defmt")]
            defmt::info!("IR: frame failed validation (0x{:08X})", shift_register);
        }
        DecodeOutcome::Frame(key)
    }

    fn validate(&self, frame: u32) -> DecodedKey {
        let [address, address_complement, command, command_complement] = frame.to_le_bytes();
        let address_ok = address == !address_complement
            && self
                .timing
                .expected_address
                .is_none_or(|expected| expected == address);
        let command_ok = command == !command_complement;

        if address_ok && command_ok {
            DecodedKey {
                raw_code: command,
                address,
                address_ok,
                command_ok,
                press_count: 1,
            }
        } else {
            DecodedKey {
                raw_code: 0,
                address,
                address_ok,
                command_ok,
                press_count: 0,
            }
        }
    }

    fn on_repeat(&mut self) -> DecodeOutcome {
        let within_window = self.since_last_command_us <= self.timing.repeat_window_us;
        match self.last_valid.as_mut() {
            Some(key) if within_window => {
                key.press_count = key.press_count.saturating_add(1);
                self.since_last_command_us = 0;
                self.stats.repeats = self.stats.repeats.wrapping_add(1);
                #[cfg(feature = "defmt")]
                defmt::trace!("IR: repeat #{}", key.press_count);
                DecodeOutcome::Repeat(*key)
            }
            _ => {
                #[cfg(feature = "defmt")]
                defmt::debug!("IR: repeat without a live key, ignoring");
                self.last_valid = None;
                self.stats.resets = self.stats.resets.wrapping_add(1);
                DecodeOutcome::Reset
            }
        }
    }

    #[cfg_attr(not(feature = "defmt"), expect(unused_variables, reason = "only logged"))]
    fn timing_error(&mut self, bit_count: u8, duration_us: u32) -> DecodeOutcome {
        #[cfg(feature = "defmt")]
        defmt::debug!("IR: bad space {}µs at bit {}, resyncing", duration_us, bit_count);
        self.phase = DecoderPhase::Idle;
        self.stats.resets = self.stats.resets.wrapping_add(1);
        DecodeOutcome::Reset
    }
}

impl Default for ProtocolDecoder {
    fn default() -> Self {
        Self::new(DecoderTiming::NEC)
    }
}
