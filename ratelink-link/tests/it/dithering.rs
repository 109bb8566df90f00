use ratelink_common::Timestamp;
use ratelink_link::{LinkOptions, INTERPOLATION_SLOTS};

use crate::{recorded_link, step, MBIT};

/// Gaps between consecutive opportunities, the first measured from creation at zero.
fn intervals(opportunities: &[Timestamp]) -> Vec<u64> {
    let mut previous = Timestamp::ZERO;
    opportunities
        .iter()
        .map(|&at| {
            let gap = at.millis_since(previous);
            previous = at;
            gap
        })
        .collect()
}

fn assert_cycles(rate_bps: u64, seed: u64, whole_ms: u64, long_per_cycle: usize) {
    let (_control, mut link) = recorded_link(rate_bps, LinkOptions::default().dither_seed(seed));

    let cycles = 20;
    let horizon = (whole_ms + 1) * (INTERPOLATION_SLOTS * cycles) as u64;
    step(&mut link, 0, horizon);

    let gaps = intervals(&link.telemetry().opportunities);
    assert!(gaps.len() >= INTERPOLATION_SLOTS * cycles / 2);

    for (i, cycle) in gaps.chunks_exact(INTERPOLATION_SLOTS).enumerate() {
        assert!(cycle.iter().all(|&gap| gap == whole_ms || gap == whole_ms + 1), "cycle {i}: {cycle:?}");

        let long = cycle.iter().filter(|&&gap| gap == whole_ms + 1).count();
        assert_eq!(long, long_per_cycle, "rate {rate_bps}, cycle {i}: {cycle:?}");
    }
}

#[test]
fn every_cycle_rounds_up_the_exact_share() {
    // 1.2 ms per cell: 3 of 16 intervals are 2 ms long.
    assert_cycles(10 * MBIT, 1, 1, 3);
    // 2.4 ms per cell: 6 of 16 intervals are 3 ms long.
    assert_cycles(5 * MBIT, 2, 2, 6);
    // 1.333.. ms per cell: 5 of 16 intervals are 2 ms long.
    assert_cycles(9 * MBIT, 3, 1, 5);
}

#[test]
fn cycles_repeat_the_same_pattern() {
    let (_control, mut link) = recorded_link(10 * MBIT, LinkOptions::default().dither_seed(17));
    step(&mut link, 0, 1_000);

    let gaps = intervals(&link.telemetry().opportunities);
    let mut cycles = gaps.chunks_exact(INTERPOLATION_SLOTS);
    let first = cycles.next().unwrap();
    assert!(cycles.all(|cycle| cycle == first));
}

#[test]
fn cycle_length_is_fixed() {
    // At 10 Mbit/s a cycle of 16 cells takes 16 + 3 ms.
    let (_control, mut link) = recorded_link(10 * MBIT, LinkOptions::default().dither_seed(4));
    step(&mut link, 0, 19 * 50);

    assert_eq!(link.opportunities_used(), 16 * 50);
    assert_eq!(link.base_timestamp(), Timestamp::from_millis(19 * 50));
}

#[test]
fn sub_millisecond_intervals_grant_several_opportunities_per_tick() {
    // 24 Mbit/s: half a millisecond per cell, two cells per millisecond on average.
    let (_control, mut link) = recorded_link(24 * MBIT, LinkOptions::default().dither_seed(6));
    step(&mut link, 0, 160);

    // Twenty cycles of 8 ms, plus whatever zero-length gaps open the next one.
    let used = link.opportunities_used();
    assert!((320..=328).contains(&used), "{used}");

    let gaps = intervals(&link.telemetry().opportunities);
    for cycle in gaps.chunks_exact(INTERPOLATION_SLOTS) {
        assert_eq!(cycle.iter().filter(|&&gap| gap == 0).count(), 8);
        assert_eq!(cycle.iter().filter(|&&gap| gap == 1).count(), 8);
    }
}
