//! Host-level tests for edge capture and NEC decoding.

use ir_stepper::{
    Band, DecodeOutcome, DecodedKey, DecoderPhase, DecoderTiming, KeyMailbox, ProtocolDecoder,
    PulseCapture, PulseEvent,
};

const BURST_US: u32 = 560;
const ZERO_SPACE_US: u32 = 560;
const ONE_SPACE_US: u32 = 1_690;

/// The edges an active-low receiver produces for one frame carrying `bytes`, LSB first.
fn frame_edges(bytes: [u8; 4]) -> Vec<PulseEvent> {
    let mut edges = vec![PulseEvent::rising(9_000), PulseEvent::falling(4_500)];
    for byte in bytes {
        for bit in 0..8 {
            let space = if byte & (1 << bit) == 0 {
                ZERO_SPACE_US
            } else {
                ONE_SPACE_US
            };
            edges.push(PulseEvent::rising(BURST_US));
            edges.push(PulseEvent::falling(space));
        }
    }
    edges
}

fn nec_frame(address: u8, command: u8) -> Vec<PulseEvent> {
    frame_edges([address, !address, command, !command])
}

/// Trailing burst, `gap_us` of idle line, then a repeat code.
fn repeat_after(gap_us: u32) -> Vec<PulseEvent> {
    vec![
        PulseEvent::rising(BURST_US),
        PulseEvent::falling(gap_us),
        PulseEvent::rising(9_000),
        PulseEvent::falling(2_250),
    ]
}

/// Feed `edges` and keep only the outcomes that carry information.
fn feed_all(decoder: &mut ProtocolDecoder, edges: &[PulseEvent]) -> Vec<DecodeOutcome> {
    edges
        .iter()
        .map(|&edge| decoder.feed(edge))
        .filter(|outcome| *outcome != DecodeOutcome::Pending)
        .collect()
}

fn single_frame(outcomes: &[DecodeOutcome]) -> DecodedKey {
    match outcomes {
        [DecodeOutcome::Frame(key)] => *key,
        other => panic!("expected one frame, got {other:?}"),
    }
}

#[test]
fn valid_frame_yields_command() {
    let mut decoder = ProtocolDecoder::default();
    let key = single_frame(&feed_all(&mut decoder, &nec_frame(0x00, 69)));

    assert!(key.is_valid());
    assert_eq!(key.raw_code, 69);
    assert_eq!(key.address, 0x00);
    assert_eq!(key.press_count, 1);
    assert_eq!(decoder.phase(), DecoderPhase::Idle);
    assert_eq!(decoder.stats().frames, 1);
}

#[test]
fn bits_are_received_lsb_first() {
    let mut decoder = ProtocolDecoder::default();
    let low = single_frame(&feed_all(&mut decoder, &nec_frame(0x00, 0x01)));
    let high = single_frame(&feed_all(&mut decoder, &nec_frame(0x00, 0x80)));

    assert_eq!(low.raw_code, 0x01);
    assert_eq!(high.raw_code, 0x80);
}

#[test]
fn failed_complement_publishes_sentinel() {
    let mut decoder = ProtocolDecoder::default();
    let key = single_frame(&feed_all(&mut decoder, &frame_edges([0x00, 0xFF, 0x45, 0x45])));

    assert!(!key.is_valid());
    assert!(key.address_ok);
    assert!(!key.command_ok);
    assert_eq!(key.raw_code, 0);
    assert_eq!(key.press_count, 0);
    assert_eq!(decoder.stats().invalid_frames, 1);
    assert_eq!(decoder.stats().frames, 0);
}

#[test]
fn repeats_bump_press_count() {
    let mut decoder = ProtocolDecoder::default();
    feed_all(&mut decoder, &nec_frame(0x00, 70));

    let mut counts = Vec::new();
    for gap in [40_000, 96_000, 96_000] {
        for outcome in feed_all(&mut decoder, &repeat_after(gap)) {
            match outcome {
                DecodeOutcome::Repeat(key) => {
                    assert_eq!(key.raw_code, 70);
                    counts.push(key.press_count);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    assert_eq!(counts, [2, 3, 4]);
    assert_eq!(decoder.stats().repeats, 3);
}

#[test]
fn repeat_after_invalid_frame_is_dropped() {
    let mut decoder = ProtocolDecoder::default();
    feed_all(&mut decoder, &nec_frame(0x00, 70));
    feed_all(&mut decoder, &frame_edges([0x00, 0x00, 0x45, 0xBA]));

    assert_eq!(
        feed_all(&mut decoder, &repeat_after(40_000)),
        [DecodeOutcome::Reset]
    );
}

#[test]
fn repeat_with_no_prior_frame_is_dropped() {
    let mut decoder = ProtocolDecoder::default();
    assert_eq!(
        feed_all(&mut decoder, &repeat_after(40_000)),
        [DecodeOutcome::Reset]
    );
    assert_eq!(decoder.stats().resets, 1);
}

#[test]
fn late_repeat_ends_the_key() {
    let mut decoder = ProtocolDecoder::default();
    feed_all(&mut decoder, &nec_frame(0x00, 70));

    // Well past the repeat window: the remote was released and pressed again elsewhere.
    assert_eq!(
        feed_all(&mut decoder, &repeat_after(200_000)),
        [DecodeOutcome::Reset]
    );
    // The key is gone for good, even for a repeat inside the window.
    assert_eq!(
        feed_all(&mut decoder, &repeat_after(40_000)),
        [DecodeOutcome::Reset]
    );
}

#[test]
fn repeat_after_aborted_leader_is_dropped() {
    let mut decoder = ProtocolDecoder::default();
    feed_all(&mut decoder, &nec_frame(0x00, 70));

    // A new press starts, then its bits break off well inside the repeat window.
    let aborted = [
        PulseEvent::rising(BURST_US),
        PulseEvent::falling(30_000),
        PulseEvent::rising(9_000),
        PulseEvent::falling(4_500),
        PulseEvent::rising(BURST_US),
        PulseEvent::falling(ZERO_SPACE_US),
        PulseEvent::rising(BURST_US),
        PulseEvent::falling(10_000),
    ];
    assert_eq!(feed_all(&mut decoder, &aborted), [DecodeOutcome::Reset]);

    // The old key must not come back through a repeat.
    assert_eq!(
        feed_all(
            &mut decoder,
            &[PulseEvent::rising(9_000), PulseEvent::falling(2_250)]
        ),
        [DecodeOutcome::Reset]
    );
    assert_eq!(decoder.stats().repeats, 0);
}

#[test]
fn leader_mid_frame_restarts_decoding() {
    let mut decoder = ProtocolDecoder::default();
    let partial = nec_frame(0x00, 22);
    let outcomes = feed_all(&mut decoder, partial.get(..22).unwrap_or_default());
    assert!(outcomes.is_empty());
    assert!(matches!(
        decoder.phase(),
        DecoderPhase::CollectingBits { bit_count: 10, .. }
    ));

    let key = single_frame(&feed_all(&mut decoder, &nec_frame(0x00, 25)));
    assert_eq!(key.raw_code, 25);
}

#[test]
fn space_outside_every_band_resets() {
    let mut decoder = ProtocolDecoder::default();
    let outcomes = feed_all(
        &mut decoder,
        &[
            PulseEvent::rising(9_000),
            PulseEvent::falling(4_500),
            PulseEvent::rising(BURST_US),
            PulseEvent::falling(1_100),
        ],
    );

    assert_eq!(outcomes, [DecodeOutcome::Reset]);
    assert_eq!(decoder.phase(), DecoderPhase::Idle);
    assert_eq!(decoder.stats().resets, 1);
}

#[test]
fn rising_edges_are_never_classified() {
    let mut decoder = ProtocolDecoder::default();
    // Burst lengths that would match the leader and bit bands if they were spaces.
    for duration in [4_500, 560, 1_690, 2_250] {
        assert_eq!(
            decoder.feed(PulseEvent::rising(duration)),
            DecodeOutcome::Pending
        );
    }
    assert_eq!(decoder.phase(), DecoderPhase::Idle);
}

#[test]
fn band_edges_are_exclusive() {
    let leader = DecoderTiming::NEC.leader;
    assert!(!leader.contains(4_200));
    assert!(leader.contains(4_201));
    assert!(leader.contains(4_699));
    assert!(!leader.contains(4_700));
    assert_eq!(Band::new(300, 800), DecoderTiming::NEC.bit0);
}

#[test]
fn foreign_address_fails_validation() {
    let timing = DecoderTiming::NEC.with_expected_address(Some(0x10));
    let mut decoder = ProtocolDecoder::new(timing);

    let foreign = single_frame(&feed_all(&mut decoder, &nec_frame(0x00, 69)));
    assert!(!foreign.address_ok);
    assert_eq!(foreign.raw_code, 0);

    let ours = single_frame(&feed_all(&mut decoder, &nec_frame(0x10, 69)));
    assert!(ours.is_valid());
    assert_eq!(ours.address, 0x10);
}

#[test]
fn reset_drops_partial_frame() {
    let mut decoder = ProtocolDecoder::default();
    let frame = nec_frame(0x00, 69);
    feed_all(&mut decoder, frame.get(..12).unwrap_or_default());
    decoder.reset();

    assert_eq!(decoder.phase(), DecoderPhase::Idle);
    // Without a leader the remaining bits mean nothing.
    let rest = feed_all(&mut decoder, frame.get(12..).unwrap_or_default());
    assert!(rest.is_empty());
}

#[test]
fn capture_measures_time_at_previous_level() {
    let mut capture = PulseCapture::new(true);
    assert_eq!(capture.on_edge(1_000, false), None);
    assert_eq!(capture.on_edge(10_000, true), Some(PulseEvent::rising(9_000)));
    assert_eq!(
        capture.on_edge(14_500, false),
        Some(PulseEvent::falling(4_500))
    );
}

#[test]
fn capture_survives_counter_wrap() {
    let mut capture = PulseCapture::new(true);
    assert_eq!(capture.on_edge(u32::MAX - 100, false), None);
    assert_eq!(capture.on_edge(400, true), Some(PulseEvent::rising(501)));
}

#[test]
fn capture_skips_missed_edge() {
    let mut capture = PulseCapture::new(true);
    capture.on_edge(0, false);
    // Level unchanged: an edge in between was lost.
    assert_eq!(capture.on_edge(700, false), None);
    assert_eq!(capture.on_edge(1_260, true), Some(PulseEvent::rising(560)));
}

#[test]
fn capture_and_decoder_agree_end_to_end() {
    let mut capture = PulseCapture::new(true);
    let mut decoder = ProtocolDecoder::default();
    let mailbox = KeyMailbox::new();

    let mut now_us: u32 = 5_000;
    capture.on_edge(now_us, false);
    let mut level_high = false;
    for edge in nec_frame(0x00, 74) {
        now_us = now_us.wrapping_add(edge.duration_us);
        level_high = !level_high;
        if let Some(event) = capture.on_edge(now_us, level_high) {
            mailbox.publish_outcome(decoder.feed(event));
        }
    }

    let published = mailbox.latest().map(|published| published.key);
    assert_eq!(published.map(|key| key.raw_code), Some(74));
}

#[test]
fn mailbox_generation_tracks_publishes() {
    let mailbox = KeyMailbox::new();
    assert_eq!(mailbox.latest(), None);

    let mut decoder = ProtocolDecoder::default();
    for outcome in feed_all(&mut decoder, &nec_frame(0x00, 69)) {
        mailbox.publish_outcome(outcome);
    }
    let first = mailbox.latest().map(|published| published.generation);

    mailbox.publish_outcome(DecodeOutcome::Pending);
    mailbox.publish_outcome(DecodeOutcome::Reset);
    assert_eq!(mailbox.latest().map(|published| published.generation), first);

    for outcome in feed_all(&mut decoder, &repeat_after(40_000)) {
        mailbox.publish_outcome(outcome);
    }
    let second = mailbox.latest();
    assert_eq!(second.map(|published| published.generation), Some(2));
    assert_eq!(second.map(|published| published.key.press_count), Some(2));
}
