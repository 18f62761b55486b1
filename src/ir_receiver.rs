//! A device abstraction for an infrared receiver decoding NEC frames into a [`KeyMailbox`].
//!
//! See [`IrReceiver`] for usage examples.
use defmt::info;
use embassy_executor::SendSpawner;
use embassy_rp::Peri;
use embassy_rp::gpio::{AnyPin, Input, Pin, Pull};
use embassy_time::Instant;

use crate::Result;
use crate::ir_decoder::{DecoderTiming, ProtocolDecoder};
use crate::key_mailbox::{KeyMailbox, PublishedKey};
use crate::pulse_capture::PulseCapture;

/// A device abstraction for an infrared receiver.
///
/// Edges are timestamped and decoded in a background task; give it the spawner of a
/// high-priority `InterruptExecutor` so decoding preempts the cooperative tasks.
///
/// # Examples
/// ```no_run
/// # #![no_std]
/// # #![no_main]
/// # use panic_probe as _;
/// # use embassy_executor::SendSpawner;
/// # use ir_stepper::{DecoderTiming, IrReceiver, KeyMailbox};
/// # fn example(p: embassy_rp::Peripherals, spawner: SendSpawner) -> ir_stepper::Result<()> {
/// static MAILBOX: KeyMailbox = KeyMailbox::new();
/// let ir = IrReceiver::new(p.PIN_15, DecoderTiming::NEC, &MAILBOX, spawner)?;
/// if let Some(published) = ir.latest() {
///     defmt::info!("last key 0x{:02X}", published.key.raw_code);
/// }
/// # Ok(())
/// # }
/// ```
pub struct IrReceiver {
    mailbox: &'static KeyMailbox,
}

impl IrReceiver {
    /// Start decoding the receiver on `pin` into `mailbox`.
    ///
    /// # Errors
    /// Returns an error if the background task cannot be spawned.
    pub fn new<P: Pin>(
        pin: Peri<'static, P>,
        timing: DecoderTiming,
        mailbox: &'static KeyMailbox,
        spawner: SendSpawner,
    ) -> Result<Self> {
        let any: Peri<'static, AnyPin> = pin.into();
        // Typical receiver modules idle high and pull low while the carrier is present.
        let token = ir_capture_task(Input::new(any, Pull::Up), timing, mailbox)?;
        spawner.spawn(token);
        Ok(Self { mailbox })
    }

    /// The last published key, if any.
    #[must_use]
    pub fn latest(&self) -> Option<PublishedKey> {
        self.mailbox.latest()
    }
}

#[embassy_executor::task]
async fn ir_capture_task(
    mut pin: Input<'static>,
    timing: DecoderTiming,
    mailbox: &'static KeyMailbox,
) -> ! {
    let mut capture = PulseCapture::new(pin.is_high());
    let mut decoder = ProtocolDecoder::new(timing);

    info!("IR capture task started");
    loop {
        pin.wait_for_any_edge().await;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "durations are taken modulo 2^32 µs"
        )]
        let now_us = Instant::now().as_micros() as u32;

        match capture.on_edge(now_us, pin.is_high()) {
            Some(event) => mailbox.publish_outcome(decoder.feed(event)),
            // A missed edge leaves the frame unusable.
            None => decoder.reset(),
        }
    }
}
