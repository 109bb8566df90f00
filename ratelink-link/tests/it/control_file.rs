use std::path::PathBuf;

use bytes::Bytes;
use rand::Rng;
use ratelink_control::{ControlSnapshot, ControlWriter};
use ratelink_link::{InfiniteQueue, LinkError, LinkOptions, LinkQueue};

use crate::{ts, Recorder, MBIT};

/// A control file path removed on drop.
struct ControlPath(PathBuf);

impl ControlPath {
    fn new() -> Self {
        let suffix: u64 = rand::thread_rng().gen();
        Self(std::env::temp_dir().join(format!("ratelink-it-{}-{suffix:x}", std::process::id())))
    }
}

impl Drop for ControlPath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn link_follows_the_control_file() {
    let _ = tracing_subscriber::fmt::try_init();

    let path = ControlPath::new();
    let writer = ControlWriter::create(&path.0, ControlSnapshot::new(12 * MBIT, true)).unwrap();

    let options = LinkOptions::default().name("downlink").dither_seed(11);
    let mut link = LinkQueue::open(&path.0, InfiniteQueue::new(), options, ts(0))
        .unwrap()
        .with_telemetry(Recorder::default());

    let info = link.telemetry().attached.clone().unwrap();
    assert_eq!(info.name, "downlink");
    assert_eq!(info.control, path.0.display().to_string());

    link.read_packet(Bytes::from(vec![1; 1500]), ts(0)).unwrap();
    assert_eq!(link.wait_time(ts(0)).unwrap(), Some(std::time::Duration::from_millis(1)));

    // The controller slows the link down to one cell every 12 ms.
    writer.set_rate_bps(MBIT);
    assert_eq!(link.wait_time(ts(0)).unwrap(), Some(std::time::Duration::from_millis(12)));

    link.rationalize(ts(11)).unwrap();
    assert!(!link.pending_output());
    link.rationalize(ts(12)).unwrap();
    assert_eq!(link.flush_output().count(), 1);

    // Switched off, arrivals go nowhere.
    writer.set_enabled(false);
    link.read_packet(Bytes::from_static(b"off"), ts(13)).unwrap();
    link.rationalize(ts(100)).unwrap();
    assert!(!link.pending_output());

    writer.set_rate_bps(0);
    assert!(matches!(link.wait_time(ts(100)), Err(LinkError::ZeroRate)));
}

#[test]
fn missing_control_file_fails_to_open() {
    let path = ControlPath::new();
    let err = LinkQueue::open(&path.0, InfiniteQueue::new(), LinkOptions::default(), ts(0)).unwrap_err();

    assert!(matches!(err, LinkError::Control(_)));
    assert!(!err.is_configuration());
}
