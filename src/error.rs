use derive_more::derive::{Display, Error};

use crate::channel_sequencer::ChannelId;

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Define a unified error type for this crate.
#[derive(Debug, Display, Error, defmt::Format)]
pub enum Error {
    // `#[error(not(source))]` below tells `derive_more` that `embassy_executor::SpawnError` does
    // not implement Rust's `core::error::Error` trait.
    #[cfg(feature = "pico1")]
    #[display("{_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),

    /// `program` or `start` was called while the channel still owns an in-flight count.
    #[display("channel {channel} is busy")]
    ChannelBusy { channel: ChannelId },

    /// The shared pulse timer is already driving another channel.
    #[display("pulse timer is busy with channel {active}")]
    TimerBusy { active: ChannelId },

    #[display("channel index {channel} is out of range")]
    ChannelOutOfRange { channel: u8 },

    #[display("could not drive the direction line of channel {channel}")]
    DirectionPin { channel: ChannelId },
}

#[cfg(feature = "pico1")]
impl From<embassy_executor::SpawnError> for Error {
    fn from(err: embassy_executor::SpawnError) -> Self {
        Self::TaskSpawn(err)
    }
}
