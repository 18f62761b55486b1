//! Edge timing front end for the infrared receiver.
//!
//! [`PulseCapture`] turns raw edge timestamps from a free-running microsecond counter into
//! [`PulseEvent`]s: the polarity of the edge and how long the line sat at the previous level.
//! It does no allocation and no floating point, so it can run inside an edge interrupt.

/// Which way the receiver output moved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub enum Polarity {
    /// Low to high. The duration is the length of the preceding low level (a carrier burst on an
    /// active-low receiver).
    Rising,
    /// High to low. The duration is the length of the preceding high level (the space that
    /// carries NEC timing information).
    Falling,
}

/// One captured edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, defmt::Format)]
pub struct PulseEvent {
    pub polarity: Polarity,
    pub duration_us: u32,
}

impl PulseEvent {
    #[must_use]
    pub const fn rising(duration_us: u32) -> Self {
        Self {
            polarity: Polarity::Rising,
            duration_us,
        }
    }

    #[must_use]
    pub const fn falling(duration_us: u32) -> Self {
        Self {
            polarity: Polarity::Falling,
            duration_us,
        }
    }
}

/// Measures the time between consecutive edges.
///
/// The counter is treated as a wrapping 32-bit microsecond count; a duration is only meaningful
/// if less than one full counter period elapsed between edges, which holds for every NEC timing.
#[derive(Debug, Default)]
pub struct PulseCapture {
    last_edge_us: Option<u32>,
    level_high: bool,
}

impl PulseCapture {
    /// Create a capture front end for a line currently at `level_high`.
    #[must_use]
    pub const fn new(level_high: bool) -> Self {
        Self {
            last_edge_us: None,
            level_high,
        }
    }

    /// Record an edge seen at `now_us` that left the line at `level_high`.
    ///
    /// Returns `None` for the very first edge (nothing to measure against) and for an edge that
    /// does not change the tracked level (a missed edge); in the latter case the timing
    /// reference is still restarted so the next duration is sane.
    pub fn on_edge(&mut self, now_us: u32, level_high: bool) -> Option<PulseEvent> {
        let previous = self.last_edge_us.replace(now_us);
        if level_high == self.level_high {
            #[cfg(feature = "defmt")]
            defmt::warn!("IR: edge without level change (missed edge?)");
            return None;
        }
        self.level_high = level_high;

        let duration_us = now_us.wrapping_sub(previous?);
        let polarity = if level_high {
            Polarity::Rising
        } else {
            Polarity::Falling
        };
        Some(PulseEvent {
            polarity,
            duration_us,
        })
    }

    /// Forget the timing reference, e.g. after the capture timer was restarted.
    pub const fn reset(&mut self, level_high: bool) {
        self.last_edge_us = None;
        self.level_high = level_high;
    }
}
