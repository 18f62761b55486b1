//! Turns published [`DecodedKey`]s into edge-triggered key events.
//!
//! See [`KeyTranslator`] for the polling model.

use embassy_time::{Duration, Instant};
use heapless::LinearMap;

use crate::ir_decoder::DecodedKey;
use crate::key_mailbox::PublishedKey;

/// Symbol reported for a frame that failed validation.
pub const INVALID_SYMBOL: &str = "ERROR";

/// Command codes of the 21-key remote (address 0) shipped with the arm.
pub const REMOTE_KEYS: [(u8, &str); 20] = [
    (69, "POWER"),
    (70, "UP"),
    (64, "PLAY"),
    (71, "ALIENTEK"),
    (67, "RIGHT"),
    (68, "LEFT"),
    (7, "VOL-"),
    (21, "DOWN"),
    (9, "VOL+"),
    (22, "1"),
    (25, "2"),
    (13, "3"),
    (12, "4"),
    (24, "5"),
    (94, "6"),
    (8, "7"),
    (28, "8"),
    (90, "9"),
    (66, "0"),
    (74, "DELETE"),
];

/// Raw command code to symbol lookup.
pub struct KeyMap<const N: usize> {
    map: LinearMap<u8, &'static str, N>,
}

impl<const N: usize> KeyMap<N> {
    /// Build a map from `(code, symbol)` pairs. Entries beyond `N` are dropped.
    #[must_use]
    pub fn new(entries: &[(u8, &'static str)]) -> Self {
        let mut map = LinearMap::new();
        for &(code, symbol) in entries {
            if map.insert(code, symbol).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("key map full, dropping code {}", code);
            }
        }
        Self { map }
    }

    #[must_use]
    pub fn symbol(&self, raw_code: u8) -> Option<&'static str> {
        self.map.get(&raw_code).copied()
    }
}

impl KeyMap<20> {
    #[must_use]
    pub fn remote() -> Self {
        Self::new(&REMOTE_KEYS)
    }
}

/// The translator's view of the remote at one poll.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct KeyEvent {
    /// `None` when no key is held or the code is not in the map.
    pub symbol: Option<&'static str>,
    /// `None` when no key is held; `Some(0)` for the invalid-key sentinel.
    pub raw_code: Option<u8>,
    pub press_count: u32,
    /// True only for the poll that first sees a fresh press.
    pub is_new_press: bool,
}

impl KeyEvent {
    pub const NO_KEY: Self = Self {
        symbol: None,
        raw_code: None,
        press_count: 0,
        is_new_press: false,
    };

    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.raw_code.is_some()
    }
}

/// Polls the key mailbox, applies the release timeout and marks new presses.
///
/// A key counts as released when neither a repeat nor a new frame was published for longer
/// than the release timeout. A press is new when it follows "no key", when the code differs
/// from the held one, or when a fresh frame (not a repeat) arrives.
pub struct KeyTranslator<const N: usize> {
    key_map: KeyMap<N>,
    release_timeout: Duration,
    last_generation: Option<u32>,
    last_seen: Option<Instant>,
    current: KeyEvent,
}

impl<const N: usize> KeyTranslator<N> {
    #[must_use]
    pub const fn new(key_map: KeyMap<N>, release_timeout: Duration) -> Self {
        Self {
            key_map,
            release_timeout,
            last_generation: None,
            last_seen: None,
            current: KeyEvent::NO_KEY,
        }
    }

    /// The state published at the last poll.
    #[must_use]
    pub const fn current(&self) -> KeyEvent {
        self.current
    }

    /// Advance to `now` given the mailbox contents.
    ///
    /// Returns the new state when anything a consumer would display changed (a new key, a
    /// higher press count, a release); `None` otherwise.
    pub fn poll(&mut self, now: Instant, latest: Option<PublishedKey>) -> Option<KeyEvent> {
        self.current.is_new_press = false;

        match latest {
            Some(published) if self.last_generation != Some(published.generation) => {
                self.last_generation = Some(published.generation);
                self.last_seen = Some(now);
                self.current = self.translate(published.key);
                #[cfg(feature = "defmt")]
                defmt::debug!("remote: {}", self.current);
                return Some(self.current);
            }
            _ => {}
        }

        let expired = self
            .last_seen
            .and_then(|seen| now.checked_duration_since(seen))
            .is_some_and(|elapsed| elapsed > self.release_timeout);
        if expired && self.current.is_held() {
            self.last_seen = None;
            self.current = KeyEvent::NO_KEY;
            #[cfg(feature = "defmt")]
            defmt::debug!("remote: released");
            return Some(self.current);
        }
        None
    }

    fn translate(&self, key: DecodedKey) -> KeyEvent {
        let (symbol, raw_code) = if key.is_valid() {
            (self.key_map.symbol(key.raw_code), key.raw_code)
        } else {
            (Some(INVALID_SYMBOL), 0)
        };
        let is_new_press = self.current.raw_code != Some(raw_code) || key.press_count <= 1;
        KeyEvent {
            symbol,
            raw_code: Some(raw_code),
            press_count: key.press_count,
            is_new_press,
        }
    }
}
