//! Single-writer hand-off of the last decoded key from interrupt context to tasks.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::ir_decoder::{DecodeOutcome, DecodedKey};

/// A snapshot of the mailbox. `generation` changes on every publish, so a reader can tell a new
/// press of the same key (same code, `press_count == 1` again) from the one it already saw.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct PublishedKey {
    pub key: DecodedKey,
    pub generation: u32,
}

/// Holds the most recent [`DecodedKey`], copied in and out as one unit inside a critical section.
pub struct KeyMailbox {
    slot: Mutex<CriticalSectionRawMutex, Cell<Option<PublishedKey>>>,
}

impl KeyMailbox {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    /// Overwrite the slot with `key`.
    pub fn publish(&self, key: DecodedKey) {
        self.slot.lock(|slot| {
            let generation = slot
                .get()
                .map_or(1, |published| published.generation.wrapping_add(1));
            slot.set(Some(PublishedKey { key, generation }));
        });
    }

    /// Publish whatever a decoder step produced, if anything.
    pub fn publish_outcome(&self, outcome: DecodeOutcome) {
        match outcome {
            DecodeOutcome::Frame(key) | DecodeOutcome::Repeat(key) => self.publish(key),
            DecodeOutcome::Pending | DecodeOutcome::Reset => {}
        }
    }

    #[must_use]
    pub fn latest(&self) -> Option<PublishedKey> {
        self.slot.lock(Cell::get)
    }
}

impl Default for KeyMailbox {
    fn default() -> Self {
        Self::new()
    }
}
