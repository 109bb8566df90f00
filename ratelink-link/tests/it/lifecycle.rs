use std::sync::Arc;

use bytes::Bytes;
use ratelink_control::{ControlSnapshot, SharedControl};
use ratelink_link::{
    Admission, DeliveryTime, DropTailQueue, InfiniteQueue, LinkOptions, LinkQueue, LinkState,
    LinkStats, LogTelemetry, PacketQueue, QueueLimits,
};

use crate::{recorded_link, step, ts, MBIT};

#[test]
fn disabled_link_leaves_queue_capacity_alone() {
    let control = SharedControl::new(ControlSnapshot::new(12 * MBIT, true));
    let queue = DropTailQueue::new(QueueLimits::default().packets(1));
    let mut link =
        LinkQueue::new(control.clone(), queue, LinkOptions::default().dither_seed(2), ts(0)).unwrap();

    control.set_enabled(false);
    for i in 0..10 {
        let admission = link.read_packet(Bytes::from_static(b"dropped"), ts(i)).unwrap();
        assert_eq!(admission, Admission::LinkDisabled);
    }
    assert!(link.queue().is_empty());
    assert_eq!(link.queue().dropped(), 0);

    // Opportunities kept passing while disabled, with nothing to carry.
    assert_eq!(link.opportunities_used(), 9);

    control.set_enabled(true);
    assert_eq!(link.read_packet(Bytes::from_static(b"kept"), ts(10)).unwrap(), Admission::Queued);
    assert_eq!(link.queue().len(), 1);
    // The queue holds one packet, so the next one is the queue's to drop.
    assert_eq!(link.read_packet(Bytes::from_static(b"extra"), ts(10)).unwrap(), Admission::Queued);
    assert_eq!(link.queue().dropped(), 1);

    link.rationalize(ts(11)).unwrap();
    let delivered: Vec<_> = link.flush_output().collect();
    assert_eq!(delivered, vec![Bytes::from_static(b"kept")]);
}

#[test]
fn disabling_keeps_delivering_what_was_queued() {
    let (control, mut link) = recorded_link(12 * MBIT, LinkOptions::default().dither_seed(8));

    for _ in 0..3 {
        link.read_packet(Bytes::from(vec![0; 1500]), ts(0)).unwrap();
    }
    control.set_enabled(false);

    step(&mut link, 0, 5);
    assert_eq!(link.flush_output().count(), 3);
}

#[test]
fn finish_is_terminal() {
    let (_control, mut link) = recorded_link(12 * MBIT, LinkOptions::default().dither_seed(8));

    link.read_packet(Bytes::from(vec![0; 1500]), ts(0)).unwrap();
    link.read_packet(Bytes::from(vec![0; 1500]), ts(0)).unwrap();
    link.rationalize(ts(1)).unwrap();

    link.mark_finished();
    assert_eq!(link.state(), LinkState::Finished);

    let used = link.opportunities_used();
    let recorded = link.telemetry().opportunities.len();

    for now in [1, 2, 100, 10_000] {
        assert_eq!(link.next_delivery_time(ts(now)).unwrap(), DeliveryTime::Never);
        assert_eq!(link.wait_time(ts(now)).unwrap(), None);
        assert_eq!(link.read_packet(Bytes::from_static(b"late"), ts(now)).unwrap(), Admission::Finished);
    }

    link.mark_finished();
    assert_eq!(link.opportunities_used(), used);
    assert_eq!(link.telemetry().opportunities.len(), recorded);

    // The packet that departed before the finish is still there, the other one never leaves.
    assert_eq!(link.flush_output().count(), 1);
    assert!(!link.queue().is_empty());
}

#[test]
fn stats_and_log_observe_the_same_link() {
    let control = SharedControl::new(ControlSnapshot::new(12 * MBIT, true));
    let stats = Arc::new(LinkStats::default());
    let options = LinkOptions::default().name("uplink").dither_seed(1);

    let mut link = LinkQueue::new(control, InfiniteQueue::new(), options, ts(0))
        .unwrap()
        .with_telemetry((Arc::clone(&stats), LogTelemetry::new(Vec::new())));

    link.read_packet(Bytes::from(vec![0; 1000]), ts(0)).unwrap();
    link.read_packet(Bytes::from(vec![0; 1000]), ts(0)).unwrap();
    link.rationalize(ts(3)).unwrap();

    assert_eq!(stats.arrivals(), 2);
    assert_eq!(stats.bytes_in(), 2000);
    assert_eq!(stats.opportunities(), 3);
    assert_eq!(stats.departures(), 2);
    assert_eq!(stats.bytes_out(), 2000);
    assert_eq!(stats.max_delay_ms(), 2);
    assert_eq!(stats.mean_delay_ms(), Some(1.5));

    let (_, log) = link.telemetry_mut();
    log.flush().unwrap();
    assert!(log.is_active());

    let text = String::from_utf8(log.get_ref().unwrap().clone()).unwrap();
    assert_eq!(
        text,
        "# ratelink link (uplink) [shared]\n\
         # queue: infinite\n\
         # cell size: 1500\n\
         # base timestamp: 0\n\
         0 + 1000\n\
         0 + 1000\n\
         1 # 1500\n\
         1 - 1000 1\n\
         2 # 1500\n\
         2 - 1000 2\n\
         3 # 1500\n"
    );
}
