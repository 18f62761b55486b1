//! Infrared remote control of stepper channels that share one pulse timer.
//!
//! The decoding and sequencing state machines are plain data types that build and test on the
//! host (`--no-default-features --features host`). The `pico1` feature adds the RP2040 device
//! abstractions that feed them from GPIO edges and PWM wrap interrupts.
#![cfg_attr(not(feature = "host"), no_std)]
#![cfg_attr(not(feature = "host"), no_main)]

pub mod channel_sequencer;
mod error;
pub mod ir_decoder;
#[cfg(feature = "pico1")]
mod ir_receiver;
pub mod key_mailbox;
pub mod key_translator;
pub mod motor_coordinator;
pub mod pulse_capture;
#[cfg(feature = "pico1")]
pub mod pwm_pulses;
#[cfg(feature = "pico1")]
mod remote_control;
mod shared_constants;
pub mod shared_sequencer;

// Re-export commonly used items
pub use channel_sequencer::{
    ChannelId, ChannelPhase, ChannelSequencer, ChannelState, Direction, PulseOutcome,
    PulseOutput, SequencerMode, StartOutcome,
};
pub use error::{Error, Result};
pub use ir_decoder::{
    Band, DecodeOutcome, DecodedKey, DecoderPhase, DecoderStats, DecoderTiming, ProtocolDecoder,
};
#[cfg(feature = "pico1")]
pub use ir_receiver::IrReceiver;
pub use key_mailbox::{KeyMailbox, PublishedKey};
pub use key_translator::{INVALID_SYMBOL, KeyEvent, KeyMap, KeyTranslator, REMOTE_KEYS};
pub use motor_coordinator::{
    ChannelStatus, DirectionOutput, MotorConfig, MotorCoordinator, OperatingMode, Reaction,
};
pub use pulse_capture::{Polarity, PulseCapture, PulseEvent};
#[cfg(feature = "pico1")]
pub use pwm_pulses::PwmPulses;
#[cfg(feature = "pico1")]
pub use remote_control::{BoardSequencer, RefreshSignal, RemoteControl, RemoteControlStatic};
pub use shared_constants::*;
pub use shared_sequencer::SharedSequencer;
