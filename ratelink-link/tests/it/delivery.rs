use bytes::{Bytes, BytesMut};
use rand::{rngs::StdRng, Rng, SeedableRng};
use ratelink_link::{LinkOptions, PacketQueue};

use crate::{recorded_link, step, ts, MBIT};

#[test]
fn bytes_are_conserved_across_fragments() {
    let (_control, mut link) =
        recorded_link(24 * MBIT, LinkOptions::default().dither_seed(3).max_packet_size(4_000));
    let mut rng = StdRng::seed_from_u64(42);

    let mut sent = BytesMut::new();
    let mut now = 0;
    for i in 0..500u32 {
        let size = rng.gen_range(1..=4_000);
        let payload: Vec<u8> = (0..size).map(|j| (i as usize + j) as u8).collect();
        sent.extend_from_slice(&payload);

        link.read_packet(Bytes::from(payload), ts(now)).unwrap();
        if i % 7 == 0 {
            now += 1;
        }
    }

    // Plenty of time to drain everything.
    step(&mut link, now, now + 5_000);

    let mut received = BytesMut::new();
    for payload in link.flush_output() {
        received.extend_from_slice(&payload);
    }

    assert_eq!(received.len(), sent.len());
    assert_eq!(received, sent);
    assert_eq!(link.bytes_in_transit(), None);
    assert_eq!(link.telemetry().arrivals.len(), 500);
    assert_eq!(link.telemetry().departures.len(), 500);
}

#[test]
fn oversized_packets_span_exactly_enough_opportunities() {
    const CELL: usize = 1500;

    for k in 0..4usize {
        for r in [1, 700, CELL - 1] {
            let size = k * CELL + r;
            let (_control, mut link) = recorded_link(
                12 * MBIT,
                LinkOptions::default().dither_seed(9).max_packet_size(10 * CELL),
            );

            link.read_packet(Bytes::from(vec![0xab; size]), ts(0)).unwrap();
            // At 12 Mbit/s there is one opportunity per millisecond.
            step(&mut link, 0, 20);

            let recorder = link.telemetry();
            assert_eq!(recorder.departures.len(), 1, "size {size}");

            let (departed_at, departed_size, delay) = recorder.departures[0];
            assert_eq!(departed_size, size);
            assert_eq!(departed_at, ts(k as u64 + 1), "size {size}");
            assert_eq!(delay, departed_at.millis_since(ts(0)));

            let used = recorder.opportunities.iter().filter(|&&at| at <= departed_at).count();
            assert_eq!(used, k + 1, "size {size}");
        }
    }
}

#[test]
fn full_cells_depart_at_opportunity_boundaries() {
    let (_control, mut link) = recorded_link(12 * MBIT, LinkOptions::default().dither_seed(1));

    for _ in 0..3 {
        link.read_packet(Bytes::from(vec![0; 1500]), ts(0)).unwrap();
    }
    link.read_packet(Bytes::from(vec![0; 1000]), ts(2)).unwrap();

    step(&mut link, 0, 10);

    let departures = &link.telemetry().departures;
    assert_eq!(departures, &vec![(ts(1), 1500, 1), (ts(2), 1500, 2), (ts(3), 1500, 3), (ts(4), 1000, 2)]);
}

#[test]
fn long_stall_replays_every_elapsed_opportunity() {
    let (_control, mut link) = recorded_link(12 * MBIT, LinkOptions::default().dither_seed(5));

    for _ in 0..1_000 {
        link.read_packet(Bytes::from_static(b"."), ts(0)).unwrap();
    }

    // Nobody looks at the link for ten seconds.
    link.rationalize(ts(10_000)).unwrap();

    // Every millisecond in between was an opportunity. The first one has room for every tiny
    // packet, the rest find the queue empty.
    assert_eq!(link.opportunities_used(), 10_000);
    assert_eq!(link.base_timestamp(), ts(10_000));
    assert_eq!(link.flush_output().count(), 1_000);
    assert!(link.queue().is_empty());

    let recorder = link.telemetry();
    assert_eq!(recorder.opportunities.len(), 10_000);
    assert_eq!(recorder.opportunities.first(), Some(&ts(1)));
    assert_eq!(recorder.opportunities.last(), Some(&ts(10_000)));
    assert!(recorder.departures.iter().all(|&(at, _, delay)| at == ts(1) && delay == 1));

    // Scheduling carries on one interval after the last opportunity.
    assert_eq!(link.wait_time(ts(10_000)).unwrap(), Some(std::time::Duration::from_millis(1)));
}

#[test]
fn long_stall_delivers_backlog_at_nominal_times() {
    let (_control, mut link) = recorded_link(12 * MBIT, LinkOptions::default().dither_seed(5));

    for _ in 0..100 {
        link.read_packet(Bytes::from(vec![1; 1500]), ts(0)).unwrap();
    }

    link.rationalize(ts(10_000)).unwrap();
    assert_eq!(link.flush_output().count(), 100);

    let departures = &link.telemetry().departures;
    assert_eq!(departures.len(), 100);
    for (k, &(at, size, delay)) in departures.iter().enumerate() {
        let k = k as u64 + 1;
        assert_eq!((at, size, delay), (ts(k), 1500, k));
    }

    // The empty opportunities during the stall are gone, nothing is banked for later.
    link.read_packet(Bytes::from(vec![2; 1500]), ts(10_000)).unwrap();
    link.rationalize(ts(10_000)).unwrap();
    assert_eq!(link.flush_output().count(), 0);

    link.rationalize(ts(10_001)).unwrap();
    assert_eq!(link.flush_output().count(), 1);
    assert_eq!(link.telemetry().departures.last(), Some(&(ts(10_001), 1500, 1)));
}
